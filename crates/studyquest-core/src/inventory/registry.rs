//! Purchased booster effects and the multipliers they grant.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::catalog::Catalog;
use super::effect::{BoosterEffect, BoosterKind};
use crate::error::{CoreError, Result};
use crate::ports::Wallet;

/// Holds purchased effects in registration order.
#[derive(Debug, Clone)]
pub struct EffectsRegistry {
    catalog: Catalog,
    effects: Vec<BoosterEffect>,
}

impl EffectsRegistry {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            effects: Vec::new(),
        }
    }

    /// Rebuild a registry from previously persisted effects.
    pub fn with_effects(catalog: Catalog, effects: Vec<BoosterEffect>) -> Self {
        Self { catalog, effects }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Every held effect, expired or not.
    pub fn effects(&self) -> &[BoosterEffect] {
        &self.effects
    }

    /// Effects still in force at `now`, in registration order.
    pub fn active_effects(&self, now: DateTime<Utc>) -> Vec<BoosterEffect> {
        self.effects
            .iter()
            .filter(|e| e.is_active(now))
            .cloned()
            .collect()
    }

    /// Product of all active factors of `kind`; 1.0 when none apply.
    pub fn active_multiplier(&self, kind: BoosterKind, now: DateTime<Utc>) -> f64 {
        self.effects
            .iter()
            .filter(|e| e.kind == kind && e.is_active(now))
            .map(|e| e.factor)
            .product()
    }

    /// Buy `item_name` from the catalog, charging `wallet`.
    ///
    /// # Errors
    /// `UnknownCatalogItem` if the catalog has no such entry and
    /// `InsufficientFunds` if the wallet refuses. Nothing changes on error.
    pub fn purchase(
        &mut self,
        item_name: &str,
        wallet: &mut dyn Wallet,
        now: DateTime<Utc>,
    ) -> Result<BoosterEffect> {
        let item = self
            .catalog
            .get(item_name)
            .ok_or_else(|| CoreError::UnknownCatalogItem(item_name.to_string()))?;

        if !wallet.try_spend(item.price_coins) {
            return Err(CoreError::InsufficientFunds {
                item: item.name.clone(),
                price: item.price_coins,
            });
        }

        let effect = item.effect(now);
        info!(item = %effect.name, kind = ?effect.kind, factor = effect.factor, "booster purchased");
        self.effects.push(effect.clone());
        Ok(effect)
    }

    /// Drop expired timed effects. Permanent effects are never touched.
    /// Returns the number removed.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.effects.len();
        self.effects.retain(|e| e.is_active(now));
        let removed = before - self.effects.len();
        if removed > 0 {
            debug!(removed, "pruned expired boosters");
        }
        removed
    }
}

//! Purchasable booster catalog.
//!
//! The catalog is fixed at registry construction. Items normally come from
//! the `[[catalog]]` tables in `config.toml`.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::effect::{BoosterEffect, BoosterKind, Expiry};
use crate::error::{Result, ValidationError};

const MAX_EFFECT_MINUTES: u64 = 100 * 365 * 24 * 60;

/// One entry of the shop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub name: String,
    pub kind: BoosterKind,
    pub factor: f64,
    pub price_coins: u64,
    /// Lifetime of the purchased effect. Absent means permanent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u64>,
}

impl CatalogItem {
    /// The effect a purchase of this item grants at `now`.
    pub fn effect(&self, now: DateTime<Utc>) -> BoosterEffect {
        let expiry = match self.duration_minutes {
            Some(min) => Expiry::At(now + Duration::minutes(min.min(MAX_EFFECT_MINUTES) as i64)),
            None => Expiry::Permanent,
        };
        BoosterEffect {
            name: self.name.clone(),
            kind: self.kind,
            factor: self.factor,
            expiry,
            acquired_at: now,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "catalog.name".into(),
                message: "item name must not be empty".into(),
            });
        }
        if !self.factor.is_finite() || self.factor <= 0.0 {
            return Err(ValidationError::InvalidValue {
                field: format!("catalog.{}.factor", self.name),
                message: format!("factor must be a positive number, got {}", self.factor),
            });
        }
        if self.duration_minutes == Some(0) {
            return Err(ValidationError::InvalidValue {
                field: format!("catalog.{}.duration_minutes", self.name),
                message: "duration must be at least one minute (omit for permanent)".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    items: Vec<CatalogItem>,
}

impl Catalog {
    /// Build a catalog, rejecting non-positive factors and duplicate names.
    pub fn new(items: Vec<CatalogItem>) -> Result<Self> {
        let mut seen = HashSet::new();
        for item in &items {
            item.validate()?;
            if !seen.insert(item.name.as_str()) {
                return Err(ValidationError::DuplicateCatalogItem(item.name.clone()).into());
            }
        }
        Ok(Self { items })
    }

    pub fn get(&self, name: &str) -> Option<&CatalogItem> {
        self.items.iter().find(|i| i.name == name)
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    /// The shop shipped with a fresh install.
    pub fn default_items() -> Vec<CatalogItem> {
        vec![
            CatalogItem {
                name: "Focus Tonic".into(),
                kind: BoosterKind::XpBooster,
                factor: 1.25,
                price_coins: 50,
                duration_minutes: Some(60),
            },
            CatalogItem {
                name: "Lucky Coin".into(),
                kind: BoosterKind::CoinBooster,
                factor: 1.5,
                price_coins: 80,
                duration_minutes: Some(60),
            },
            CatalogItem {
                name: "Scholar's Crest".into(),
                kind: BoosterKind::XpBooster,
                factor: 1.1,
                price_coins: 500,
                duration_minutes: None,
            },
            CatalogItem {
                name: "Hourglass".into(),
                kind: BoosterKind::TimerExtender,
                factor: 1.2,
                price_coins: 150,
                duration_minutes: None,
            },
            CatalogItem {
                name: "Deep Focus".into(),
                kind: BoosterKind::FocusEnhancer,
                factor: 1.5,
                price_coins: 40,
                duration_minutes: Some(30),
            },
        ]
    }
}

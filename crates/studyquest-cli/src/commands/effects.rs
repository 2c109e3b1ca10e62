use clap::Subcommand;
use serde::Serialize;
use studyquest_core::{BoosterEffect, BoosterKind, Database, Event};

use super::{print_json, App, CliResult};

#[derive(Subcommand)]
pub enum EffectsAction {
    /// List held boosters and the multipliers in force
    List,
    /// Drop expired boosters
    Prune,
}

#[derive(Serialize)]
struct EffectRow<'a> {
    #[serde(flatten)]
    effect: &'a BoosterEffect,
    active: bool,
}

#[derive(Serialize)]
struct EffectsReport<'a> {
    effects: Vec<EffectRow<'a>>,
    xp_multiplier: f64,
    coin_multiplier: f64,
}

pub fn run(action: EffectsAction) -> CliResult {
    let app = App::open()?;

    match action {
        EffectsAction::List => {
            let now = app.service.now();
            let registry = app.service.registry();
            let report = EffectsReport {
                effects: registry
                    .effects()
                    .iter()
                    .map(|effect| EffectRow {
                        effect,
                        active: effect.is_active(now),
                    })
                    .collect(),
                xp_multiplier: registry.active_multiplier(BoosterKind::XpBooster, now),
                coin_multiplier: registry.active_multiplier(BoosterKind::CoinBooster, now),
            };
            print_json(&report)?;
        }
        EffectsAction::Prune => {
            let now = app.service.now();
            let removed = Database::open()?.update_effects(|effects| {
                let before = effects.len();
                effects.retain(|effect| effect.is_active(now));
                before - effects.len()
            })?;
            print_json(&Event::EffectsPruned { removed, at: now })?;
        }
    }
    Ok(())
}

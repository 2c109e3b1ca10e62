pub mod config;
pub mod effects;
pub mod goal;
pub mod log;
pub mod progress;
pub mod shop;
pub mod timer;
pub mod wallet;

use std::error::Error;
use std::sync::Arc;

use serde::Serialize;
use studyquest_core::{
    Config, Database, EffectsRegistry, RewardCalculator, StudyService, SystemClock,
};

pub type CliResult<T = ()> = Result<T, Box<dyn Error>>;

/// A study service wired to the on-disk store.
///
/// The service owns one connection for timer state and logs; a second
/// connection is its reward sink and wallet, so every reward and purchase
/// is merged into the stored ledger as it happens. Other processes sharing
/// the database see the same balances.
pub struct App {
    pub config: Config,
    pub service: StudyService<Database>,
}

impl App {
    pub fn open() -> CliResult<Self> {
        let config = Config::load()?;
        let wallet = Database::open()?;
        let registry = EffectsRegistry::with_effects(config.catalog()?, wallet.load_effects()?);
        let service = StudyService::new(
            RewardCalculator::new(config.rewards, wallet),
            registry,
            Box::new(Database::open()?),
            Arc::new(SystemClock),
        )
        .with_conflict_policy(config.timer.conflict_policy);
        Ok(Self { config, service })
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

//! # StudyQuest Core Library
//!
//! Core logic for a gamified study timer. A study session runs on a
//! wall-clock countdown, completing it earns XP and coins, coins buy
//! time-limited boosters that multiply later rewards, and logged minutes
//! count toward weekly per-category goals.
//!
//! The `studyquest-cli` binary is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Timer Engine**: a wall-clock state machine. Every transition takes an
//!   explicit `now`, so suspension and clock jumps are handled by comparing
//!   against the persisted end date instead of counting ticks
//! - **Rewards**: pure computation plus an injected [`ports::RewardSink`]
//! - **Inventory**: booster catalog and the registry of purchased effects
//! - **Service / Runtime**: [`StudyService`] owns all mutable state, and
//!   [`runtime::spawn`] drives it from a single tokio task
//! - **Storage**: SQLite for timer state, balances and logs, TOML for config
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: countdown state machine
//! - [`RewardCalculator`]: XP/coin computation with booster multipliers
//! - [`EffectsRegistry`]: purchases and active boosters
//! - [`StudyService`]: the orchestrating owner
//! - [`Database`]: persistence
//! - [`Config`]: application configuration

pub mod clock;
pub mod error;
pub mod events;
pub mod inventory;
pub mod ledger;
pub mod ports;
pub mod progress;
pub mod resume;
pub mod rewards;
pub mod runtime;
pub mod service;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::Event;
pub use inventory::{BoosterEffect, BoosterKind, Catalog, CatalogItem, EffectsRegistry, Expiry};
pub use ledger::Ledger;
pub use progress::{CategoryGoal, CategoryLog, WeeklyProgress};
pub use resume::{ResumeController, ResumePlan};
pub use rewards::{RewardCalculator, RewardEvent, RewardPolicy};
pub use runtime::{spawn, StudyHandle};
pub use service::{ConflictPolicy, StudyService};
pub use storage::{Config, Database, MemoryStore};
pub use timer::{Session, SessionPlan, TimerEngine, TimerPhase, TimerState};

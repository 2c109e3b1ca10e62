mod calculator;

pub use calculator::{AppliedMultiplier, RewardCalculator, RewardEvent, RewardPolicy};

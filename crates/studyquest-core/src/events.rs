use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::inventory::BoosterEffect;
use crate::rewards::RewardEvent;
use crate::timer::{Session, TimerPhase};

/// Every state change in the system produces an Event.
/// The CLI prints them; front-ends poll or subscribe to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        session_id: Uuid,
        topic: String,
        duration_secs: u64,
        ends_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// Explicit stop. The session is discarded without reward.
    TimerStopped {
        session_id: Uuid,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerCompleted {
        session: Session,
        at: DateTime<Utc>,
    },
    /// Another owner of the same store stopped or finalized the session
    /// first. This process drops it without reward.
    TimerSuperseded {
        session_id: Uuid,
        at: DateTime<Utc>,
    },
    /// Countdown progress, published by the runtime on every tick.
    Tick {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// A persisted in-flight session was picked up again after activation.
    TimerResumed {
        session_id: Uuid,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// Persisted state was unreadable and the timer fell back to idle.
    TimerRecovered {
        reason: String,
        at: DateTime<Utc>,
    },
    RewardEarned {
        reward: RewardEvent,
    },
    BoosterPurchased {
        effect: BoosterEffect,
        price_coins: u64,
        at: DateTime<Utc>,
    },
    EffectsPruned {
        removed: usize,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        phase: TimerPhase,
        remaining_secs: u64,
        ends_at: Option<DateTime<Utc>>,
        topic: Option<String>,
        progress_pct: f64,
        at: DateTime<Utc>,
    },
}

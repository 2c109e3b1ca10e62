//! Contracts between the study core and its collaborators.
//!
//! The core never reaches for storage, ledgers or UI on its own. Everything
//! it talks to is handed in through one of these traits at construction time.

use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::progress::{CategoryLog, DateRange};
use crate::rewards::RewardEvent;
use crate::timer::TimerState;

/// Receives each reward exactly once per completed session.
pub trait RewardSink {
    fn on_reward_earned(&mut self, reward: &RewardEvent);
}

impl<F> RewardSink for F
where
    F: FnMut(&RewardEvent),
{
    fn on_reward_earned(&mut self, reward: &RewardEvent) {
        self(reward)
    }
}

/// Notified roughly once per second while a session runs.
pub trait TickObserver {
    fn on_tick(&mut self, remaining_secs: u64);
}

impl<F> TickObserver for F
where
    F: FnMut(u64),
{
    fn on_tick(&mut self, remaining_secs: u64) {
        self(remaining_secs)
    }
}

/// Balance check used by purchases.
///
/// Implementations must either debit the full amount and return `true`, or
/// leave the balance untouched and return `false`.
pub trait Wallet {
    fn try_spend(&mut self, coins: u64) -> bool;
}

/// Persistence hook for the in-flight timer.
pub trait TimerStateStore {
    /// `Ok(None)` when nothing was ever saved. Undecodable data is an error.
    fn load_timer_state(&self) -> Result<Option<TimerState>>;

    fn save_timer_state(&mut self, state: &TimerState) -> Result<()>;

    /// Claim the end of `session_id`: if the persisted timer is still
    /// running that session, overwrite it with `Idle` and return `true`.
    ///
    /// `false` means another owner already stopped or finalized it, and the
    /// caller must not reward it. Stores shared between processes should
    /// override this so the check and the write are one atomic step.
    /// Unreadable state counts as claimable, since nobody else can own it.
    fn release_session(&mut self, session_id: Uuid) -> Result<bool> {
        let owned = match self.load_timer_state() {
            Ok(state) => state.is_some_and(|s| s.is_running_session(session_id)),
            Err(CoreError::CorruptPersistedState(_)) => true,
            Err(e) => return Err(e),
        };
        if owned {
            self.save_timer_state(&TimerState::idle())?;
        }
        Ok(owned)
    }
}

/// Read/append access to per-category study minutes.
pub trait CategoryLogStore {
    /// Entries of `category_id` whose date falls in `range`.
    fn load_category_logs(&self, category_id: &str, range: DateRange) -> Result<Vec<CategoryLog>>;

    fn append_category_log(&mut self, entry: CategoryLog) -> Result<()>;
}

/// Everything the study service persists through.
pub trait StudyStore: TimerStateStore + CategoryLogStore {}

impl<T> StudyStore for T where T: TimerStateStore + CategoryLogStore {}

//! In-process store for tests and embedders that bring their own persistence.

use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::ports::{CategoryLogStore, TimerStateStore};
use crate::progress::{CategoryLog, DateRange};
use crate::timer::TimerState;

#[derive(Debug, Default)]
struct Inner {
    timer: Option<TimerState>,
    /// Set to make the next loads fail as if the saved bytes were garbage.
    corrupt: Option<String>,
    logs: Vec<CategoryLog>,
}

/// Clones share the same storage, so a test can keep a handle after giving
/// one to the service.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last saved timer state, if any.
    pub fn timer_state(&self) -> Option<TimerState> {
        self.lock().timer.clone()
    }

    /// Make loads fail with `CorruptPersistedState` until the next save.
    pub fn corrupt(&self, reason: impl Into<String>) {
        self.lock().corrupt = Some(reason.into());
    }

    pub fn logs(&self) -> Vec<CategoryLog> {
        self.lock().logs.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TimerStateStore for MemoryStore {
    fn load_timer_state(&self) -> Result<Option<TimerState>> {
        let inner = self.lock();
        if let Some(reason) = &inner.corrupt {
            return Err(CoreError::CorruptPersistedState(reason.clone()));
        }
        Ok(inner.timer.clone())
    }

    fn save_timer_state(&mut self, state: &TimerState) -> Result<()> {
        let mut inner = self.lock();
        inner.corrupt = None;
        inner.timer = Some(state.clone());
        Ok(())
    }

    fn release_session(&mut self, session_id: Uuid) -> Result<bool> {
        let mut inner = self.lock();
        let owned = inner.corrupt.is_some()
            || inner
                .timer
                .as_ref()
                .is_some_and(|s| s.is_running_session(session_id));
        if owned {
            inner.corrupt = None;
            inner.timer = Some(TimerState::idle());
        }
        Ok(owned)
    }
}

impl CategoryLogStore for MemoryStore {
    fn load_category_logs(&self, category_id: &str, range: DateRange) -> Result<Vec<CategoryLog>> {
        Ok(self
            .lock()
            .logs
            .iter()
            .filter(|l| l.category_id == category_id && range.contains(l.date))
            .cloned()
            .collect())
    }

    fn append_category_log(&mut self, entry: CategoryLog) -> Result<()> {
        self.lock().logs.push(entry);
        Ok(())
    }
}

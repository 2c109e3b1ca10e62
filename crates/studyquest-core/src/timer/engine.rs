//! Timer engine implementation.
//!
//! The timer engine is a wall-clock-based state machine. It does not use
//! internal threads - the caller passes `now` and is responsible for calling
//! `tick()` periodically (the runtime does so at 1 Hz).
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> (Completed | Stopped) -> Idle
//! ```
//!
//! Completion and stop are mutually exclusive: whichever happens first moves
//! the engine out of `Running`, and the other becomes a no-op.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new();
//! engine.start(SessionPlan::minutes("Biology", 25), now)?;
//! // In a loop:
//! engine.tick(now); // Returns Some(Event::TimerCompleted) exactly once
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::session::{planned_duration, Session, SessionPlan};
use crate::error::{CoreError, Result};
use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    Idle,
    Running,
    /// Countdown reached zero. The session was handed off for rewarding.
    Completed,
    /// Session was discarded by an explicit stop.
    Stopped,
}

/// Persisted form of the timer.
///
/// Invariant: `is_running` implies `end_date` and `session` are set and
/// `remaining_secs == max(0, end_date - now)` at the time it was captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub remaining_secs: u64,
    pub is_running: bool,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub session: Option<Session>,
}

impl TimerState {
    pub fn idle() -> Self {
        Self {
            remaining_secs: 0,
            is_running: false,
            end_date: None,
            session: None,
        }
    }

    /// Whether this state records `session_id` as still counting down.
    pub fn is_running_session(&self, session_id: Uuid) -> bool {
        self.is_running && self.session.as_ref().is_some_and(|s| s.id == session_id)
    }

    /// Check the running invariant, returning what is missing.
    pub fn validate(&self) -> Result<()> {
        if !self.is_running {
            return Ok(());
        }
        let end_date = self.end_date.ok_or_else(|| {
            CoreError::CorruptPersistedState("running timer has no end date".into())
        })?;
        let session = self.session.as_ref().ok_or_else(|| {
            CoreError::CorruptPersistedState("running timer has no session".into())
        })?;
        if session.planned_duration_secs == 0 {
            return Err(CoreError::CorruptPersistedState(
                "running session has zero planned duration".into(),
            ));
        }
        if end_date < session.started_at {
            return Err(CoreError::CorruptPersistedState(format!(
                "end date {end_date} precedes session start {}",
                session.started_at
            )));
        }
        Ok(())
    }
}

impl Default for TimerState {
    fn default() -> Self {
        Self::idle()
    }
}

/// Core timer engine.
///
/// Owns at most one active session. Operates on wall-clock deltas -- no
/// internal thread.
#[derive(Debug, Clone)]
pub struct TimerEngine {
    phase: TimerPhase,
    session: Option<Session>,
    remaining_secs: u64,
    end_date: Option<DateTime<Utc>>,
}

impl TimerEngine {
    /// Create an idle engine.
    pub fn new() -> Self {
        Self {
            phase: TimerPhase::Idle,
            session: None,
            remaining_secs: 0,
            end_date: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == TimerPhase::Running
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn end_date(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// 0.0 .. 1.0 progress within the current session.
    pub fn progress(&self) -> f64 {
        let total = match &self.session {
            Some(s) if s.planned_duration_secs > 0 => s.planned_duration_secs,
            _ => return 0.0,
        };
        match self.phase {
            TimerPhase::Completed => 1.0,
            TimerPhase::Running | TimerPhase::Stopped => {
                (1.0 - self.remaining_secs as f64 / total as f64).clamp(0.0, 1.0)
            }
            TimerPhase::Idle => 0.0,
        }
    }

    /// Persisted form of the current state.
    pub fn state(&self) -> TimerState {
        if self.is_running() {
            TimerState {
                remaining_secs: self.remaining_secs,
                is_running: true,
                end_date: self.end_date,
                session: self.session.clone(),
            }
        } else {
            TimerState::idle()
        }
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Event {
        Event::StateSnapshot {
            phase: self.phase,
            remaining_secs: self.remaining_secs,
            ends_at: self.end_date,
            topic: self.session.as_ref().map(|s| s.topic.clone()),
            progress_pct: self.progress() * 100.0,
            at: now,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin counting down a new session.
    ///
    /// # Errors
    /// `InvalidDuration` for a zero-length plan, `SessionAlreadyActive` while
    /// another session is running. Neither changes state.
    pub fn start(&mut self, plan: SessionPlan, now: DateTime<Utc>) -> Result<Event> {
        if plan.duration_secs == 0 {
            return Err(CoreError::InvalidDuration);
        }
        if let (TimerPhase::Running, Some(ends_at)) = (self.phase, self.end_date) {
            return Err(CoreError::SessionAlreadyActive { ends_at });
        }

        let session = Session::begin(plan, now);
        let ends_at = now + planned_duration(session.planned_duration_secs);
        let event = Event::TimerStarted {
            session_id: session.id,
            topic: session.topic.clone(),
            duration_secs: session.planned_duration_secs,
            ends_at,
            at: now,
        };

        self.phase = TimerPhase::Running;
        self.remaining_secs = session.planned_duration_secs;
        self.end_date = Some(ends_at);
        self.session = Some(session);
        Ok(event)
    }

    /// Discard the running session. Idempotent; never completes or rewards.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.phase != TimerPhase::Running {
            return None;
        }
        self.flush_remaining(now);
        self.phase = TimerPhase::Stopped;
        self.end_date = None;
        let session = self.session.as_ref()?;
        Some(Event::TimerStopped {
            session_id: session.id,
            remaining_secs: self.remaining_secs,
            at: now,
        })
    }

    /// Call periodically. Returns `Some(Event::TimerCompleted)` exactly once,
    /// on the tick where the countdown reaches zero.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.phase != TimerPhase::Running {
            return None;
        }
        self.flush_remaining(now);
        if self.remaining_secs > 0 {
            return None;
        }
        self.phase = TimerPhase::Completed;
        self.end_date = None;
        let session = self.session.clone()?;
        Some(Event::TimerCompleted { session, at: now })
    }

    /// Return to `Idle`, forgetting any session.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Rebuild the engine from a persisted state.
    ///
    /// A running state resumes with `remaining_secs` recomputed against
    /// `now`; an overdue one will complete on the next `tick`.
    ///
    /// # Errors
    /// `CorruptPersistedState` if the state breaks its invariant. The engine
    /// is left `Idle` in that case.
    pub fn restore(&mut self, state: TimerState, now: DateTime<Utc>) -> Result<()> {
        self.reset();
        state.validate()?;
        if !state.is_running {
            return Ok(());
        }
        self.phase = TimerPhase::Running;
        self.end_date = state.end_date;
        self.session = state.session;
        self.flush_remaining(now);
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn flush_remaining(&mut self, now: DateTime<Utc>) {
        if let Some(end) = self.end_date {
            self.remaining_secs = remaining_until(end, now);
        }
    }
}

impl Default for TimerEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Whole seconds left until `end`, rounded up so a timer never reports zero
/// before its end date has actually passed.
fn remaining_until(end: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let ms = (end - now).num_milliseconds();
    if ms <= 0 {
        0
    } else {
        (ms as u64).div_ceil(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn start_sets_end_date_and_running() {
        let mut engine = TimerEngine::new();
        assert_eq!(engine.phase(), TimerPhase::Idle);

        let event = engine.start(SessionPlan::new("Chemistry", 300), t0()).unwrap();
        assert!(matches!(event, Event::TimerStarted { duration_secs: 300, .. }));
        assert_eq!(engine.phase(), TimerPhase::Running);
        assert_eq!(engine.end_date(), Some(t0() + Duration::seconds(300)));
        assert_eq!(engine.remaining_secs(), 300);
    }

    #[test]
    fn zero_duration_is_rejected_without_state_change() {
        let mut engine = TimerEngine::new();
        let err = engine.start(SessionPlan::new("Nothing", 0), t0()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidDuration));
        assert_eq!(engine.phase(), TimerPhase::Idle);
        assert!(engine.session().is_none());
    }

    #[test]
    fn second_start_while_running_is_rejected() {
        let mut engine = TimerEngine::new();
        engine.start(SessionPlan::new("First", 600), t0()).unwrap();
        let first_id = engine.session().unwrap().id;

        let err = engine
            .start(SessionPlan::new("Second", 60), t0() + Duration::seconds(5))
            .unwrap_err();
        assert!(matches!(err, CoreError::SessionAlreadyActive { .. }));
        assert_eq!(engine.session().unwrap().id, first_id);
        assert_eq!(engine.end_date(), Some(t0() + Duration::seconds(600)));
    }

    #[test]
    fn ticking_once_per_second_completes_exactly_once() {
        let mut engine = TimerEngine::new();
        engine.start(SessionPlan::new("History", 5), t0()).unwrap();

        let mut completions = 0;
        for i in 1..=5 {
            if engine.tick(t0() + Duration::seconds(i)).is_some() {
                completions += 1;
            }
            assert_eq!(engine.remaining_secs(), (5 - i) as u64);
        }
        assert_eq!(completions, 1);
        assert_eq!(engine.phase(), TimerPhase::Completed);

        // Further ticks are no-ops.
        assert!(engine.tick(t0() + Duration::seconds(6)).is_none());
    }

    #[test]
    fn remaining_rounds_up_partial_seconds() {
        let mut engine = TimerEngine::new();
        engine.start(SessionPlan::new("Physics", 10), t0()).unwrap();
        assert!(engine.tick(t0() + Duration::milliseconds(9_500)).is_none());
        assert_eq!(engine.remaining_secs(), 1);
    }

    #[test]
    fn stop_is_idempotent_and_does_not_complete() {
        let mut engine = TimerEngine::new();
        engine.start(SessionPlan::new("Latin", 60), t0()).unwrap();

        let stopped = engine.stop(t0() + Duration::seconds(20));
        assert!(matches!(stopped, Some(Event::TimerStopped { remaining_secs: 40, .. })));
        assert_eq!(engine.phase(), TimerPhase::Stopped);
        assert!(engine.end_date().is_none());

        assert!(engine.stop(t0() + Duration::seconds(21)).is_none());
        assert!(engine.tick(t0() + Duration::seconds(120)).is_none());
    }

    #[test]
    fn stop_after_completion_is_a_no_op() {
        let mut engine = TimerEngine::new();
        engine.start(SessionPlan::new("Art", 1), t0()).unwrap();
        assert!(engine.tick(t0() + Duration::seconds(1)).is_some());
        assert!(engine.stop(t0() + Duration::seconds(1)).is_none());
        assert_eq!(engine.phase(), TimerPhase::Completed);
    }

    #[test]
    fn terminal_states_allow_a_new_start() {
        let mut engine = TimerEngine::new();
        engine.start(SessionPlan::new("One", 60), t0()).unwrap();
        engine.stop(t0());
        assert!(engine.start(SessionPlan::new("Two", 60), t0()).is_ok());
        assert_eq!(engine.session().unwrap().topic, "Two");
    }

    #[test]
    fn state_round_trips_through_restore() {
        let mut engine = TimerEngine::new();
        engine.start(SessionPlan::new("Music", 600), t0()).unwrap();
        let state = engine.state();
        assert!(state.validate().is_ok());

        let mut restored = TimerEngine::new();
        restored
            .restore(state, t0() + Duration::seconds(100))
            .unwrap();
        assert!(restored.is_running());
        assert_eq!(restored.remaining_secs(), 500);
    }

    #[test]
    fn restore_rejects_running_state_without_end_date() {
        let mut engine = TimerEngine::new();
        let state = TimerState {
            remaining_secs: 30,
            is_running: true,
            end_date: None,
            session: None,
        };
        let err = engine.restore(state, t0()).unwrap_err();
        assert!(matches!(err, CoreError::CorruptPersistedState(_)));
        assert_eq!(engine.phase(), TimerPhase::Idle);
    }

    #[test]
    fn stopped_engine_persists_as_idle() {
        let mut engine = TimerEngine::new();
        engine.start(SessionPlan::new("Geo", 60), t0()).unwrap();
        engine.stop(t0());
        assert_eq!(engine.state(), TimerState::idle());
    }

    #[test]
    fn snapshot_returns_valid_event() {
        let mut engine = TimerEngine::new();
        engine.start(SessionPlan::new("Poetry", 100), t0()).unwrap();
        engine.tick(t0() + Duration::seconds(25));
        match engine.snapshot(t0()) {
            Event::StateSnapshot {
                phase,
                remaining_secs,
                progress_pct,
                topic,
                ..
            } => {
                assert_eq!(phase, TimerPhase::Running);
                assert_eq!(remaining_secs, 75);
                assert!((progress_pct - 25.0).abs() < 1e-9);
                assert_eq!(topic.as_deref(), Some("Poetry"));
            }
            _ => panic!("Expected StateSnapshot"),
        }
    }
}

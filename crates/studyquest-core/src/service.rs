//! The study service: one explicitly constructed owner for the timer, the
//! reward calculator, the booster registry and the storage hooks.
//!
//! All mutations go through `&mut self`, so a single owner (the runtime
//! actor, or a CLI invocation) serializes them. Nothing here is global.
//!
//! The store may be shared with other owners. Ending a session, by stop or
//! by completion, first claims it in the store with
//! [`TimerStateStore::release_session`];
//! whoever claims first wins and the reward is only paid after the claim.

use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::inventory::EffectsRegistry;
use crate::ports::{CategoryLogStore, RewardSink, StudyStore, TickObserver, TimerStateStore, Wallet};
use crate::progress::{self, CategoryGoal, CategoryLog, WeeklyProgress};
use crate::resume::{ResumeController, ResumePlan};
use crate::rewards::RewardCalculator;
use crate::timer::{Session, SessionPlan, TimerEngine, TimerState};

/// What `start` does when a session is already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Fail with `SessionAlreadyActive`.
    #[default]
    Reject,
    /// Stop and discard the running session, then start the new one.
    Replace,
}

pub struct StudyService<S> {
    engine: TimerEngine,
    rewards: RewardCalculator<S>,
    registry: EffectsRegistry,
    store: Box<dyn StudyStore + Send>,
    clock: Arc<dyn Clock>,
    conflict_policy: ConflictPolicy,
    tick_observer: Option<Box<dyn TickObserver + Send>>,
}

impl<S: RewardSink> StudyService<S> {
    pub fn new(
        rewards: RewardCalculator<S>,
        registry: EffectsRegistry,
        store: Box<dyn StudyStore + Send>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            engine: TimerEngine::new(),
            rewards,
            registry,
            store,
            clock,
            conflict_policy: ConflictPolicy::default(),
            tick_observer: None,
        }
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    pub fn set_tick_observer(&mut self, observer: impl TickObserver + Send + 'static) {
        self.tick_observer = Some(Box::new(observer));
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }

    pub fn registry(&self) -> &EffectsRegistry {
        &self.registry
    }

    pub fn rewards(&self) -> &RewardCalculator<S> {
        &self.rewards
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn snapshot(&self) -> Event {
        self.engine.snapshot(self.now())
    }

    /// Progress toward `goal` for the current local week, read from the store.
    pub fn weekly_progress(&self, goal: &CategoryGoal) -> Result<WeeklyProgress> {
        let today = local_date(self.now());
        let logs = self
            .store
            .load_category_logs(&goal.category_id, progress::week_range(today))?;
        let mut report = progress::weekly_report(std::slice::from_ref(goal), &logs, today);
        Ok(report.remove(0))
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a session, applying the configured conflict policy.
    ///
    /// On any error the engine and the persisted state are left as they were.
    pub fn start(&mut self, plan: SessionPlan) -> Result<Vec<Event>> {
        if plan.duration_secs == 0 {
            return Err(CoreError::InvalidDuration);
        }
        let now = self.now();
        let previous = self.engine.clone();
        let mut events = Vec::new();

        if self.engine.is_running() && self.conflict_policy == ConflictPolicy::Replace {
            if let Some(stopped) = self.engine.stop(now) {
                info!("discarding running session to start a new one");
                events.push(stopped);
            }
        }

        match self.engine.start(plan, now) {
            Ok(started) => events.push(started),
            Err(e) => {
                self.engine = previous;
                return Err(e);
            }
        }
        if let Err(e) = self.store.save_timer_state(&self.engine.state()) {
            self.engine = previous;
            return Err(e);
        }
        if let Some(session) = self.engine.session() {
            info!(topic = %session.topic, secs = session.planned_duration_secs, "study session started");
        }
        Ok(events)
    }

    /// Discard the running session without reward. Idempotent.
    ///
    /// If another owner already ended the session, the local copy is
    /// dropped and `TimerSuperseded` is returned instead of `TimerStopped`.
    pub fn stop(&mut self) -> Result<Option<Event>> {
        let now = self.now();
        let Some(session_id) = self.running_session_id() else {
            return Ok(None);
        };
        if !self.store.release_session(session_id)? {
            return Ok(Some(self.supersede(session_id, now)));
        }
        let event = self.engine.stop(now);
        info!("study session stopped");
        Ok(event)
    }

    /// Advance the countdown. On the completing tick the session is rewarded
    /// and logged, and the engine returns to `Idle`.
    ///
    /// A session that another owner stopped or finalized in the shared store
    /// is dropped here with `TimerSuperseded`.
    pub fn tick(&mut self) -> Vec<Event> {
        let now = self.now();
        if let Some(session_id) = self.running_session_id() {
            if self.ended_elsewhere(session_id) {
                return vec![self.supersede(session_id, now)];
            }
        }
        match self.engine.tick(now) {
            Some(Event::TimerCompleted { session, .. }) => self.finish(session, now),
            Some(other) => vec![other],
            None => {
                if self.engine.is_running() {
                    let remaining = self.engine.remaining_secs();
                    debug!(remaining, "tick");
                    if let Some(observer) = self.tick_observer.as_mut() {
                        observer.on_tick(remaining);
                    }
                }
                Vec::new()
            }
        }
    }

    /// Reconcile with persisted state after launch or a return to foreground.
    ///
    /// Never fails: unreadable state is logged and replaced with `Idle`.
    /// Calling it again with nothing running is a no-op.
    pub fn activate(&mut self) -> Vec<Event> {
        let now = self.now();
        if self.engine.is_running() {
            return self.tick();
        }

        let loaded = self.store.load_timer_state();
        match ResumeController::plan(loaded, now) {
            ResumePlan::Nothing => Vec::new(),
            ResumePlan::Resume(state) => match self.engine.restore(state, now) {
                Ok(()) => {
                    let mut events = Vec::new();
                    if let Some(session) = self.engine.session() {
                        info!(remaining = self.engine.remaining_secs(), "resumed study session");
                        events.push(Event::TimerResumed {
                            session_id: session.id,
                            remaining_secs: self.engine.remaining_secs(),
                            at: now,
                        });
                    }
                    events
                }
                Err(e) => vec![self.recover(e.to_string(), now)],
            },
            ResumePlan::Finalize(session) => {
                info!(topic = %session.topic, "session ended while suspended, finalizing");
                self.finish(session, now)
            }
            ResumePlan::Recover { reason } => vec![self.recover(reason, now)],
        }
    }

    /// Drop expired boosters.
    pub fn prune_effects(&mut self) -> Event {
        let now = self.now();
        let removed = self.registry.prune(now);
        Event::EffectsPruned { removed, at: now }
    }

    /// Stop ticking for good. A running session stays persisted so the next
    /// activation can resume or finalize it. Nothing is written when idle or
    /// when another owner already ended the session.
    pub fn shutdown(&mut self) {
        if let Some(session_id) = self.running_session_id() {
            if !self.ended_elsewhere(session_id) {
                if let Err(e) = self.store.save_timer_state(&self.engine.state()) {
                    warn!(error = %e, "failed to persist timer state on shutdown");
                }
            }
        }
        self.tick_observer = None;
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn running_session_id(&self) -> Option<Uuid> {
        self.engine
            .session()
            .filter(|_| self.engine.is_running())
            .map(|s| s.id)
    }

    /// Whether the store no longer records `session_id` as running. Read
    /// failures are treated as "still ours"; the claim on completion decides.
    fn ended_elsewhere(&self, session_id: Uuid) -> bool {
        match self.store.load_timer_state() {
            Ok(state) => !state.is_some_and(|s| s.is_running_session(session_id)),
            Err(e) => {
                debug!(error = %e, "could not re-read timer state");
                false
            }
        }
    }

    fn supersede(&mut self, session_id: Uuid, now: DateTime<Utc>) -> Event {
        info!(%session_id, "session was ended by another owner");
        self.engine.reset();
        Event::TimerSuperseded {
            session_id,
            at: now,
        }
    }

    /// Keep an overdue session running so the next tick or activation
    /// retries the completion.
    fn hold_for_retry(&mut self, session: Session, now: DateTime<Utc>) {
        let state = TimerState {
            remaining_secs: 0,
            is_running: true,
            end_date: Some(session.ends_at()),
            session: Some(session),
        };
        if let Err(e) = self.engine.restore(state, now) {
            error!(error = %e, "could not keep session for retry");
        }
    }

    /// Claim, reward and log a completed session, then return to `Idle`.
    ///
    /// Boosters are evaluated at the session's planned end, so a session
    /// finalized late is rewarded as if it had completed on time. If the
    /// claim cannot be written nothing is paid and the completion is retried.
    fn finish(&mut self, session: Session, now: DateTime<Utc>) -> Vec<Event> {
        match self.store.release_session(session.id) {
            Ok(true) => {}
            Ok(false) => return vec![self.supersede(session.id, now)],
            Err(e) => {
                error!(error = %e, "could not persist completion, will retry");
                self.hold_for_retry(session, now);
                return Vec::new();
            }
        }

        let completed_at = session.ends_at().min(now);
        let effects = self.registry.active_effects(completed_at);
        let reward = self.rewards.award(
            Some(session.id),
            session.planned_duration_secs,
            &effects,
            completed_at,
        );

        if let Some(category_id) = &session.category_id {
            let minutes = u32::try_from(session.whole_minutes()).unwrap_or(u32::MAX);
            let entry = CategoryLog::new(category_id.clone(), local_date(completed_at), minutes);
            if let Err(e) = self.store.append_category_log(entry) {
                error!(error = %e, category = %category_id, "failed to log study minutes");
            }
        }

        self.engine.reset();
        info!(topic = %session.topic, "study session completed");

        vec![
            Event::TimerCompleted {
                session,
                at: completed_at,
            },
            Event::RewardEarned { reward },
        ]
    }

    fn recover(&mut self, reason: String, now: DateTime<Utc>) -> Event {
        warn!(%reason, "persisted timer state unusable, falling back to idle");
        self.engine.reset();
        if let Err(e) = self.store.save_timer_state(&self.engine.state()) {
            warn!(error = %e, "failed to overwrite unusable timer state");
        }
        Event::TimerRecovered { reason, at: now }
    }
}

impl<S: RewardSink + Wallet> StudyService<S> {
    /// Buy a booster, paying from the reward sink's wallet.
    pub fn purchase(&mut self, item_name: &str) -> Result<Event> {
        let now = self.now();
        let effect = self
            .registry
            .purchase(item_name, self.rewards.sink_mut(), now)?;
        let price_coins = self
            .registry
            .catalog()
            .get(item_name)
            .map(|i| i.price_coins)
            .unwrap_or_default();
        Ok(Event::BoosterPurchased {
            effect,
            price_coins,
            at: now,
        })
    }
}

fn local_date(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&Local).date_naive()
}

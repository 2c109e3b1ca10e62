//! End-to-end study flows against a file-backed database.
//!
//! Each "process" is a fresh `StudyService` opened on the same SQLite file,
//! so these tests cover what survives a restart: the in-flight timer, the
//! category logs, and balances saved through the kv store. Two services
//! open at once stand in for two concurrent processes.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use studyquest_core::ports::TimerStateStore;
use studyquest_core::{
    Catalog, CategoryGoal, CoreError, Database, EffectsRegistry, Event, Ledger, ManualClock,
    RewardCalculator, RewardPolicy, SessionPlan, StudyService, TimerPhase,
};
use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

/// A Wednesday, so local-time shifts stay inside one Sunday-based week.
fn wednesday_noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap()
}

/// Open a service the way a fresh process would: balances and boosters
/// from the kv store, timer state and logs through the service's store.
fn open_service(path: &Path, clock: &ManualClock) -> StudyService<Ledger> {
    let balances = Database::open_at(path).unwrap();
    let catalog = Catalog::new(Catalog::default_items()).unwrap();
    StudyService::new(
        RewardCalculator::new(RewardPolicy::default(), balances.load_ledger().unwrap()),
        EffectsRegistry::with_effects(catalog, balances.load_effects().unwrap()),
        Box::new(Database::open_at(path).unwrap()),
        Arc::new(clock.clone()),
    )
}

fn close_service(path: &Path, mut service: StudyService<Ledger>) {
    service.shutdown();
    let balances = Database::open_at(path).unwrap();
    balances.save_ledger(service.rewards().sink()).unwrap();
    balances.save_effects(service.registry().effects()).unwrap();
}

/// Open a service whose reward sink and wallet is the database itself, as
/// the CLI does, so balances are merged with other processes immediately.
fn open_shared_service(path: &Path, clock: &ManualClock) -> StudyService<Database> {
    let wallet = Database::open_at(path).unwrap();
    let catalog = Catalog::new(Catalog::default_items()).unwrap();
    let effects = wallet.load_effects().unwrap();
    StudyService::new(
        RewardCalculator::new(RewardPolicy::default(), wallet),
        EffectsRegistry::with_effects(catalog, effects),
        Box::new(Database::open_at(path).unwrap()),
        Arc::new(clock.clone()),
    )
}

fn reward_of(events: &[Event]) -> Option<&studyquest_core::RewardEvent> {
    events.iter().find_map(|e| match e {
        Event::RewardEarned { reward } => Some(reward),
        _ => None,
    })
}

// ============================================================================
// Restart flows
// ============================================================================

#[test]
fn test_session_finished_while_closed_is_rewarded_once_with_booster() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("studyquest.db");
    let clock = ManualClock::new(wednesday_noon());
    Database::open_at(&path)
        .unwrap()
        .save_ledger(&Ledger::with_coins(100))
        .unwrap();

    // First process: buy a booster, start 25 minutes of math, quit.
    let mut service = open_service(&path, &clock);
    service.purchase("Focus Tonic").unwrap();
    service
        .start(SessionPlan::minutes("Derivatives", 25).in_category("math"))
        .unwrap();
    close_service(&path, service);

    // Second process, ten minutes after the planned end.
    clock.advance_secs(35 * 60);
    let mut service = open_service(&path, &clock);
    let events = service.activate();

    let reward = reward_of(&events).expect("finished session should be rewarded");
    assert_eq!(reward.base_xp, 250);
    assert_eq!(reward.final_xp, 312);
    assert_eq!(reward.final_coins, 25);
    assert_eq!(reward.applied_multipliers.len(), 1);
    assert_eq!(service.engine().phase(), TimerPhase::Idle);

    // Activating again must not pay twice.
    assert!(service.activate().is_empty());
    assert_eq!(service.rewards().sink().xp, 312);
    assert_eq!(service.rewards().sink().coins, 100 - 50 + 25);

    let progress = service
        .weekly_progress(&CategoryGoal {
            category_id: "math".into(),
            weekly_goal_minutes: 100,
        })
        .unwrap();
    assert_eq!(progress.minutes, 25);
    assert!((progress.fraction - 0.25).abs() < f64::EPSILON);
    close_service(&path, service);

    let ledger = Database::open_at(&path).unwrap().load_ledger().unwrap();
    assert_eq!(ledger.xp, 312);
    assert_eq!(ledger.sessions_completed, 1);
}

#[test]
fn test_session_still_running_after_restart_resumes_without_reward() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("studyquest.db");
    let clock = ManualClock::new(wednesday_noon());

    let mut service = open_service(&path, &clock);
    service.start(SessionPlan::minutes("Vocabulary", 30)).unwrap();
    close_service(&path, service);

    clock.advance_secs(10 * 60);
    let mut service = open_service(&path, &clock);
    let events = service.activate();
    assert!(matches!(
        events.as_slice(),
        [Event::TimerResumed {
            remaining_secs: 1200,
            ..
        }]
    ));
    assert!(reward_of(&events).is_none());
    assert!(service.engine().is_running());

    // The countdown carries on from the persisted end date.
    clock.advance_secs(20 * 60);
    let events = service.tick();
    assert_eq!(reward_of(&events).map(|r| r.base_xp), Some(300));
}

#[test]
fn test_stopped_session_is_not_finalized_after_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("studyquest.db");
    let clock = ManualClock::new(wednesday_noon());

    let mut service = open_service(&path, &clock);
    service.start(SessionPlan::minutes("Essay", 20)).unwrap();
    clock.advance_secs(5 * 60);
    assert!(service.stop().unwrap().is_some());
    close_service(&path, service);

    clock.advance_secs(60 * 60);
    let mut service = open_service(&path, &clock);
    assert!(service.activate().is_empty());
    assert_eq!(service.rewards().sink().xp, 0);
}

// ============================================================================
// Shared database
// ============================================================================

#[test]
fn test_two_owners_pay_a_finished_session_once_and_merge_balances() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("studyquest.db");
    let clock = ManualClock::new(wednesday_noon());
    Database::open_at(&path)
        .unwrap()
        .save_ledger(&Ledger::with_coins(100))
        .unwrap();

    let mut runner = open_shared_service(&path, &clock);
    runner.purchase("Focus Tonic").unwrap();
    runner.start(SessionPlan::minutes("Physics", 25)).unwrap();

    let mut other = open_shared_service(&path, &clock);
    assert!(matches!(
        other.activate().as_slice(),
        [Event::TimerResumed { .. }]
    ));

    clock.advance_secs(25 * 60);
    let reward = reward_of(&other.activate()).cloned().expect("other owner finalizes");
    assert_eq!(reward.base_xp, 250);

    let events = runner.tick();
    assert!(matches!(events.as_slice(), [Event::TimerSuperseded { .. }]));
    assert!(runner.tick().is_empty());

    // The runner's purchase and the other owner's reward both landed.
    let ledger = Database::open_at(&path).unwrap().load_ledger().unwrap();
    assert_eq!(ledger.xp, 250);
    assert_eq!(ledger.coins, 100 - 50 + reward.final_coins);
    assert_eq!(ledger.sessions_completed, 1);
}

// ============================================================================
// Recovery
// ============================================================================

#[test]
fn test_garbage_timer_state_recovers_to_idle() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("studyquest.db");
    let clock = ManualClock::new(wednesday_noon());
    Database::open_at(&path)
        .unwrap()
        .kv_set("timer_state", "{\"is_running\": tru")
        .unwrap();

    let mut service = open_service(&path, &clock);
    let events = service.activate();
    assert!(matches!(events.as_slice(), [Event::TimerRecovered { .. }]));
    assert_eq!(service.engine().phase(), TimerPhase::Idle);

    // The unusable bytes were overwritten with an idle state.
    let db = Database::open_at(&path).unwrap();
    assert_eq!(db.load_timer_state().unwrap().map(|s| s.is_running), Some(false));
    assert!(service.activate().is_empty());
}

// ============================================================================
// Boosters
// ============================================================================

#[test]
fn test_expired_booster_no_longer_multiplies() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("studyquest.db");
    let clock = ManualClock::new(wednesday_noon());
    Database::open_at(&path)
        .unwrap()
        .save_ledger(&Ledger::with_coins(80))
        .unwrap();

    let mut service = open_service(&path, &clock);
    service.purchase("Lucky Coin").unwrap();
    assert!(matches!(
        service.purchase("Lucky Coin"),
        Err(CoreError::InsufficientFunds { price: 80, .. })
    ));

    clock.advance_secs(61 * 60);
    service.start(SessionPlan::minutes("Review", 10)).unwrap();
    clock.advance_secs(10 * 60);
    let events = service.tick();
    let reward = reward_of(&events).unwrap();
    assert_eq!(reward.final_coins, reward.base_coins);
    assert!(reward.applied_multipliers.is_empty());

    assert!(matches!(
        service.prune_effects(),
        Event::EffectsPruned { removed: 1, .. }
    ));
    assert!(service.registry().effects().is_empty());
}

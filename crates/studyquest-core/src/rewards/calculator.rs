//! Session reward computation.
//!
//! Base amounts are credited per whole minute studied. Boosters of the
//! matching kind scale the base; the combined factor is applied once and the
//! result floored, so `250 XP * 1.25 = 312 XP`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::inventory::{BoosterEffect, BoosterKind};
use crate::ports::RewardSink;

/// Per-minute reward rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardPolicy {
    #[serde(default = "default_xp_per_minute")]
    pub xp_per_minute: u64,
    #[serde(default = "default_coins_per_minute")]
    pub coins_per_minute: u64,
}

fn default_xp_per_minute() -> u64 {
    10
}
fn default_coins_per_minute() -> u64 {
    1
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            xp_per_minute: default_xp_per_minute(),
            coins_per_minute: default_coins_per_minute(),
        }
    }
}

/// One booster that contributed to a reward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedMultiplier {
    pub name: String,
    pub kind: BoosterKind,
    pub factor: f64,
}

/// Immutable record of what one completed session earned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardEvent {
    #[serde(default)]
    pub session_id: Option<Uuid>,
    pub session_duration_secs: u64,
    pub base_xp: u64,
    pub base_coins: u64,
    /// Audit trail, in registration order.
    pub applied_multipliers: Vec<AppliedMultiplier>,
    pub final_xp: u64,
    pub final_coins: u64,
    pub at: DateTime<Utc>,
}

impl RewardPolicy {
    /// Compute the reward for a session without side effects.
    ///
    /// Only `XpBooster` and `CoinBooster` effects that are active at `now`
    /// take part. Sessions shorter than a minute earn nothing.
    pub fn compute(
        &self,
        session_duration_secs: u64,
        effects: &[BoosterEffect],
        now: DateTime<Utc>,
    ) -> RewardEvent {
        let minutes = session_duration_secs / 60;
        let base_xp = minutes.saturating_mul(self.xp_per_minute);
        let base_coins = minutes.saturating_mul(self.coins_per_minute);

        let applied: Vec<AppliedMultiplier> = effects
            .iter()
            .filter(|e| {
                matches!(e.kind, BoosterKind::XpBooster | BoosterKind::CoinBooster)
                    && e.is_active(now)
            })
            .map(|e| AppliedMultiplier {
                name: e.name.clone(),
                kind: e.kind,
                factor: e.factor,
            })
            .collect();

        let xp_factor = combined_factor(&applied, BoosterKind::XpBooster);
        let coin_factor = combined_factor(&applied, BoosterKind::CoinBooster);

        RewardEvent {
            session_id: None,
            session_duration_secs,
            base_xp,
            base_coins,
            applied_multipliers: applied,
            final_xp: scale(base_xp, xp_factor),
            final_coins: scale(base_coins, coin_factor),
            at: now,
        }
    }
}

fn combined_factor(applied: &[AppliedMultiplier], kind: BoosterKind) -> f64 {
    applied
        .iter()
        .filter(|m| m.kind == kind)
        .map(|m| m.factor)
        .product()
}

/// Floor of `base * factor`; float-to-int `as` saturates at the bounds.
fn scale(base: u64, factor: f64) -> u64 {
    (base as f64 * factor).floor() as u64
}

/// Computes rewards and hands each one to an injected sink.
///
/// The calculator never touches balances itself; whatever ledger the caller
/// wires in as `S` receives the event.
#[derive(Debug)]
pub struct RewardCalculator<S> {
    policy: RewardPolicy,
    sink: S,
}

impl<S: RewardSink> RewardCalculator<S> {
    pub fn new(policy: RewardPolicy, sink: S) -> Self {
        Self { policy, sink }
    }

    pub fn policy(&self) -> &RewardPolicy {
        &self.policy
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn compute(
        &self,
        session_duration_secs: u64,
        effects: &[BoosterEffect],
        now: DateTime<Utc>,
    ) -> RewardEvent {
        self.policy.compute(session_duration_secs, effects, now)
    }

    /// Compute the reward for `session_id` and deliver it to the sink.
    pub fn award(
        &mut self,
        session_id: Option<Uuid>,
        session_duration_secs: u64,
        effects: &[BoosterEffect],
        now: DateTime<Utc>,
    ) -> RewardEvent {
        let mut reward = self.compute(session_duration_secs, effects, now);
        reward.session_id = session_id;
        info!(
            session = ?session_id,
            xp = reward.final_xp,
            coins = reward.final_coins,
            boosters = reward.applied_multipliers.len(),
            "reward earned"
        );
        self.sink.on_reward_earned(&reward);
        reward
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::Expiry;
    use chrono::Duration;
    use proptest::prelude::*;

    fn booster(name: &str, kind: BoosterKind, factor: f64, expiry: Expiry) -> BoosterEffect {
        BoosterEffect {
            name: name.into(),
            kind,
            factor,
            expiry,
            acquired_at: Utc::now(),
        }
    }

    #[test]
    fn twenty_five_minutes_with_xp_booster_floors_the_result() {
        let now = Utc::now();
        let effects = [booster("Tonic", BoosterKind::XpBooster, 1.25, Expiry::Permanent)];
        let reward = RewardPolicy::default().compute(1500, &effects, now);

        assert_eq!(reward.base_xp, 250);
        assert_eq!(reward.final_xp, 312);
        assert_eq!(reward.base_coins, 25);
        assert_eq!(reward.final_coins, 25);
        assert_eq!(reward.applied_multipliers.len(), 1);
    }

    #[test]
    fn under_a_minute_earns_nothing() {
        let now = Utc::now();
        let effects = [
            booster("Big", BoosterKind::XpBooster, 10.0, Expiry::Permanent),
            booster("Rich", BoosterKind::CoinBooster, 10.0, Expiry::Permanent),
        ];
        let reward = RewardPolicy::default().compute(59, &effects, now);
        assert_eq!(reward.final_xp, 0);
        assert_eq!(reward.final_coins, 0);
    }

    #[test]
    fn partial_minutes_are_not_credited() {
        let reward = RewardPolicy::default().compute(179, &[], Utc::now());
        assert_eq!(reward.base_xp, 20);
        assert_eq!(reward.base_coins, 2);
    }

    #[test]
    fn expired_and_unrelated_effects_are_ignored() {
        let now = Utc::now();
        let effects = [
            booster("Old", BoosterKind::XpBooster, 2.0, Expiry::At(now - Duration::minutes(1))),
            booster("Edge", BoosterKind::XpBooster, 2.0, Expiry::At(now)),
            booster("Clock", BoosterKind::TimerExtender, 2.0, Expiry::Permanent),
        ];
        let reward = RewardPolicy::default().compute(600, &effects, now);
        assert_eq!(reward.final_xp, reward.base_xp);
        assert!(reward.applied_multipliers.is_empty());
    }

    #[test]
    fn multipliers_stack_and_keep_registration_order() {
        let now = Utc::now();
        let effects = [
            booster("A", BoosterKind::CoinBooster, 1.5, Expiry::Permanent),
            booster("B", BoosterKind::XpBooster, 2.0, Expiry::Permanent),
            booster("C", BoosterKind::CoinBooster, 2.0, Expiry::Permanent),
        ];
        let reward = RewardPolicy {
            xp_per_minute: 10,
            coins_per_minute: 3,
        }
        .compute(600, &effects, now);

        assert_eq!(reward.final_xp, 200);
        assert_eq!(reward.final_coins, 90);
        let names: Vec<_> = reward.applied_multipliers.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);
    }

    #[test]
    fn award_delivers_to_sink() {
        let mut received = Vec::new();
        let mut calc = RewardCalculator::new(RewardPolicy::default(), |r: &RewardEvent| {
            received.push(r.final_xp)
        });
        let id = Uuid::new_v4();
        let reward = calc.award(Some(id), 120, &[], Utc::now());
        assert_eq!(reward.session_id, Some(id));
        drop(calc);
        assert_eq!(received, [20]);
    }

    proptest! {
        #[test]
        fn reward_without_effects_is_monotonic(a in 0u64..1_000_000, b in 0u64..1_000_000) {
            let now = Utc::now();
            let policy = RewardPolicy::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let r_lo = policy.compute(lo, &[], now);
            let r_hi = policy.compute(hi, &[], now);
            prop_assert!(r_lo.final_xp <= r_hi.final_xp);
            prop_assert!(r_lo.final_coins <= r_hi.final_coins);
        }

        #[test]
        fn sub_minute_sessions_earn_nothing(d in 0u64..60, factor in 1.0f64..50.0) {
            let effects = [
                booster("X", BoosterKind::XpBooster, factor, Expiry::Permanent),
                booster("C", BoosterKind::CoinBooster, factor, Expiry::Permanent),
            ];
            let reward = RewardPolicy::default().compute(d, &effects, Utc::now());
            prop_assert_eq!(reward.final_xp, 0);
            prop_assert_eq!(reward.final_coins, 0);
        }
    }
}

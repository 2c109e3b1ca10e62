//! XP and coin balances.
//!
//! The ledger is the default collaborator on both sides of the economy: it
//! is credited as a [`RewardSink`] and debited as a [`Wallet`].

use serde::{Deserialize, Serialize};

use crate::ports::{RewardSink, Wallet};
use crate::rewards::RewardEvent;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    pub xp: u64,
    pub coins: u64,
    #[serde(default)]
    pub sessions_completed: u64,
}

impl Ledger {
    pub fn with_coins(coins: u64) -> Self {
        Self {
            coins,
            ..Self::default()
        }
    }
}

impl RewardSink for Ledger {
    fn on_reward_earned(&mut self, reward: &RewardEvent) {
        self.xp = self.xp.saturating_add(reward.final_xp);
        self.coins = self.coins.saturating_add(reward.final_coins);
        self.sessions_completed += 1;
    }
}

impl Wallet for Ledger {
    fn try_spend(&mut self, coins: u64) -> bool {
        match self.coins.checked_sub(coins) {
            Some(left) => {
                self.coins = left;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spending_more_than_balance_is_refused() {
        let mut ledger = Ledger::with_coins(10);
        assert!(!ledger.try_spend(11));
        assert_eq!(ledger.coins, 10);
        assert!(ledger.try_spend(10));
        assert_eq!(ledger.coins, 0);
    }

    #[test]
    fn zero_price_always_succeeds() {
        let mut ledger = Ledger::default();
        assert!(ledger.try_spend(0));
    }
}

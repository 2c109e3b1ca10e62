use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a booster acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoosterKind {
    XpBooster,
    CoinBooster,
    TimerExtender,
    FocusEnhancer,
}

impl BoosterKind {
    pub fn description(&self) -> &'static str {
        match self {
            BoosterKind::XpBooster => "Multiplies XP earned per session",
            BoosterKind::CoinBooster => "Multiplies coins earned per session",
            BoosterKind::TimerExtender => "Extends planned session length",
            BoosterKind::FocusEnhancer => "Boosts focus for the session",
        }
    }
}

/// When an effect stops applying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expiry {
    Permanent,
    At(DateTime<Utc>),
}

/// A purchased effect held in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoosterEffect {
    /// Catalog item the effect came from.
    pub name: String,
    pub kind: BoosterKind,
    pub factor: f64,
    pub expiry: Expiry,
    pub acquired_at: DateTime<Utc>,
}

impl BoosterEffect {
    /// Active while permanent or strictly before its expiry.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Expiry::Permanent => true,
            Expiry::At(at) => at > now,
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.expiry == Expiry::Permanent
    }
}

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the user asked for when starting a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPlan {
    pub topic: String,
    pub duration_secs: u64,
    /// Category whose weekly log receives the minutes on completion.
    #[serde(default)]
    pub category_id: Option<String>,
}

impl SessionPlan {
    pub fn new(topic: impl Into<String>, duration_secs: u64) -> Self {
        Self {
            topic: topic.into(),
            duration_secs,
            category_id: None,
        }
    }

    /// Convenience for whole-minute sessions.
    ///
    /// Uses saturating arithmetic to prevent overflow with large values.
    pub fn minutes(topic: impl Into<String>, minutes: u64) -> Self {
        Self::new(topic, minutes.saturating_mul(60))
    }

    pub fn in_category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }
}

/// A study session owned by the timer engine while it counts down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub planned_duration_secs: u64,
    pub topic: String,
    #[serde(default)]
    pub category_id: Option<String>,
}

impl Session {
    pub(crate) fn begin(plan: SessionPlan, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at,
            planned_duration_secs: plan.duration_secs,
            topic: plan.topic,
            category_id: plan.category_id,
        }
    }

    pub fn ends_at(&self) -> DateTime<Utc> {
        self.started_at + planned_duration(self.planned_duration_secs)
    }

    /// Whole minutes credited for this session. Partial minutes are dropped.
    pub fn whole_minutes(&self) -> u64 {
        self.planned_duration_secs / 60
    }
}

/// `chrono::Duration` for a planned length, clamped so huge inputs cannot
/// overflow the timestamp arithmetic.
pub(crate) fn planned_duration(secs: u64) -> Duration {
    const MAX_SECS: u64 = 100 * 365 * 24 * 60 * 60;
    Duration::seconds(secs.min(MAX_SECS) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_carries_plan_fields() {
        let now = Utc::now();
        let plan = SessionPlan::minutes("Linear algebra", 25).in_category("math");
        let session = Session::begin(plan, now);
        assert_eq!(session.planned_duration_secs, 1500);
        assert_eq!(session.category_id.as_deref(), Some("math"));
        assert_eq!(session.ends_at(), now + Duration::minutes(25));
        assert_eq!(session.whole_minutes(), 25);
    }

    #[test]
    fn whole_minutes_drops_partial_minute() {
        let session = Session::begin(SessionPlan::new("Reading", 119), Utc::now());
        assert_eq!(session.whole_minutes(), 1);
    }
}

//! Per-category weekly goal tracking.
//!
//! Weeks run from local Sunday 00:00 to the following Sunday 00:00. Days are
//! numbered 1..=7 with 1 = Sunday. Everything here is a pure function of its
//! inputs, so callers may cache results keyed on the log set.

use chrono::{Datelike, Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Minutes studied in one category on one day. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryLog {
    pub category_id: String,
    pub date: NaiveDate,
    pub minutes: u32,
}

impl CategoryLog {
    pub fn new(category_id: impl Into<String>, date: NaiveDate, minutes: u32) -> Self {
        Self {
            category_id: category_id.into(),
            date,
            minutes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryGoal {
    pub category_id: String,
    pub weekly_goal_minutes: u32,
}

/// Half-open date range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyProgress {
    pub category_id: String,
    pub minutes: u64,
    pub goal_minutes: u32,
    /// 0.0 ..= 1.0
    pub fraction: f64,
}

/// 1 = Sunday .. 7 = Saturday.
pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().number_from_sunday() as u8
}

/// The Sunday that opens the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

pub fn week_range(today: NaiveDate) -> DateRange {
    let start = week_start(today);
    DateRange {
        start,
        end: start + Duration::days(7),
    }
}

/// Today's date on the local calendar.
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Sum of `category_id` minutes logged in the week containing `today`.
pub fn weekly_minutes(category_id: &str, logs: &[CategoryLog], today: NaiveDate) -> u64 {
    let week = week_range(today);
    logs.iter()
        .filter(|l| l.category_id == category_id && week.contains(l.date))
        .map(|l| u64::from(l.minutes))
        .sum()
}

/// Fraction of the weekly goal reached, clamped to `[0, 1]`.
/// A zero goal always yields 0.
pub fn weekly_progress(
    category_id: &str,
    logs: &[CategoryLog],
    goal_minutes: u32,
    today: NaiveDate,
) -> f64 {
    fraction(weekly_minutes(category_id, logs, today), goal_minutes)
}

/// One row per goal, in goal order.
pub fn weekly_report(
    goals: &[CategoryGoal],
    logs: &[CategoryLog],
    today: NaiveDate,
) -> Vec<WeeklyProgress> {
    goals
        .iter()
        .map(|goal| {
            let minutes = weekly_minutes(&goal.category_id, logs, today);
            WeeklyProgress {
                category_id: goal.category_id.clone(),
                minutes,
                goal_minutes: goal.weekly_goal_minutes,
                fraction: fraction(minutes, goal.weekly_goal_minutes),
            }
        })
        .collect()
}

fn fraction(minutes: u64, goal_minutes: u32) -> f64 {
    if goal_minutes == 0 {
        return 0.0;
    }
    (minutes as f64 / f64::from(goal_minutes)).clamp(0.0, 1.0)
}

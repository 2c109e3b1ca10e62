//! Weekly category progress.

mod weekly;

pub use weekly::{
    day_of_week, local_today, week_range, week_start, weekly_minutes, weekly_progress,
    weekly_report, CategoryGoal, CategoryLog, DateRange, WeeklyProgress,
};

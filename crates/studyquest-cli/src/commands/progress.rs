use studyquest_core::progress::{local_today, week_range, weekly_report};
use studyquest_core::{CategoryGoal, Config, Database};

use super::{print_json, CliResult};

pub fn run(category: Option<String>) -> CliResult {
    let config = Config::load()?;
    let db = Database::open()?;
    let today = local_today();
    let logs = db.logs_in_range(week_range(today))?;

    let goals = match category {
        // A category without a goal still reports its minutes.
        Some(id) => vec![config.goal(&id).cloned().unwrap_or(CategoryGoal {
            category_id: id,
            weekly_goal_minutes: 0,
        })],
        None => config.goals.clone(),
    };

    print_json(&weekly_report(&goals, &logs, today))
}

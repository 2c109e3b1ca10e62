use chrono::NaiveDate;
use clap::Subcommand;
use studyquest_core::ports::CategoryLogStore;
use studyquest_core::progress::local_today;
use studyquest_core::{CategoryLog, Database};

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum LogAction {
    /// Record minutes studied outside the timer
    Add {
        /// Category id (e.g. "math")
        category: String,
        /// Minutes studied
        minutes: u32,
        /// Day studied, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

pub fn run(action: LogAction) -> CliResult {
    let mut db = Database::open()?;

    match action {
        LogAction::Add {
            category,
            minutes,
            date,
        } => {
            if category.trim().is_empty() {
                return Err("category must not be empty".into());
            }
            if minutes == 0 {
                return Err("minutes must be greater than zero".into());
            }
            let entry = CategoryLog::new(category, date.unwrap_or_else(local_today), minutes);
            db.append_category_log(entry.clone())?;
            print_json(&entry)?;
        }
    }
    Ok(())
}

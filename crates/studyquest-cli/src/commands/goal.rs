use clap::Subcommand;
use studyquest_core::Config;

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum GoalAction {
    /// Set the weekly goal for a category
    Set {
        category: String,
        /// Weekly goal in minutes
        minutes: u32,
    },
    /// List all weekly goals
    List,
    /// Remove a category's goal
    Remove { category: String },
}

pub fn run(action: GoalAction) -> CliResult {
    let mut config = Config::load()?;

    match action {
        GoalAction::Set { category, minutes } => {
            if category.trim().is_empty() {
                return Err("category must not be empty".into());
            }
            config.set_goal(&category, minutes);
            config.save()?;
            print_json(&config.goal(&category))?;
        }
        GoalAction::List => print_json(&config.goals)?,
        GoalAction::Remove { category } => {
            let before = config.goals.len();
            config.goals.retain(|g| g.category_id != category);
            if config.goals.len() == before {
                return Err(format!("no goal for category: {category}").into());
            }
            config.save()?;
            println!("ok");
        }
    }
    Ok(())
}

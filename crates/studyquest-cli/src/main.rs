use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "studyquest-cli", version, about = "StudyQuest CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Study timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Booster shop
    Shop {
        #[command(subcommand)]
        action: commands::shop::ShopAction,
    },
    /// Purchased booster effects
    Effects {
        #[command(subcommand)]
        action: commands::effects::EffectsAction,
    },
    /// Show XP and coin balances
    Wallet,
    /// Record study minutes
    Log {
        #[command(subcommand)]
        action: commands::log::LogAction,
    },
    /// Weekly progress toward category goals
    Progress {
        /// Only report this category
        #[arg(long)]
        category: Option<String>,
    },
    /// Weekly category goals
    Goal {
        #[command(subcommand)]
        action: commands::goal::GoalAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Timer { action } => commands::timer::run(action),
        Commands::Shop { action } => commands::shop::run(action),
        Commands::Effects { action } => commands::effects::run(action),
        Commands::Wallet => commands::wallet::run(),
        Commands::Log { action } => commands::log::run(action),
        Commands::Progress { category } => commands::progress::run(category),
        Commands::Goal { action } => commands::goal::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

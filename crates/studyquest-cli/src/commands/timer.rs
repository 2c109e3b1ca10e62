use std::time::Duration;

use clap::Subcommand;
use studyquest_core::{Event, SessionPlan, StudyHandle};
use tokio::sync::broadcast::error::RecvError;

use super::{print_json, App, CliResult};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a study session
    Start {
        #[command(flatten)]
        plan: PlanArgs,
    },
    /// Start a session and stay in the foreground until it completes,
    /// printing one JSON event per line
    Run {
        #[command(flatten)]
        plan: PlanArgs,
    },
    /// Stop the running session (no reward)
    Stop,
    /// Print current timer state as JSON
    Status,
    /// Pick up a persisted session: resume it, or reward it if it already ended
    Resume,
}

#[derive(clap::Args)]
pub struct PlanArgs {
    /// Session length in minutes (defaults to timer.default_duration_min)
    #[arg(long)]
    minutes: Option<u64>,
    /// What is being studied
    #[arg(long, default_value = "Study")]
    topic: String,
    /// Category the minutes count toward
    #[arg(long)]
    category: Option<String>,
}

impl PlanArgs {
    fn into_plan(self, default_minutes: u64) -> SessionPlan {
        let plan = SessionPlan::minutes(self.topic, self.minutes.unwrap_or(default_minutes));
        match self.category {
            Some(category) => plan.in_category(category),
            None => plan,
        }
    }
}

pub fn run(action: TimerAction) -> CliResult {
    let mut app = App::open()?;
    // Every invocation is a fresh process, so first reconcile with whatever
    // the previous one persisted.
    let mut events = app.service.activate();

    match action {
        TimerAction::Start { plan } => {
            let plan = plan.into_plan(app.config.timer.default_duration_min);
            events.extend(app.service.start(plan)?);
            print_json(&events)?;
        }
        TimerAction::Run { plan } => {
            let plan = plan.into_plan(app.config.timer.default_duration_min);
            for event in &events {
                println!("{}", serde_json::to_string(event)?);
            }
            return run_foreground(app, plan);
        }
        TimerAction::Stop => {
            events.extend(app.service.stop()?);
            print_json(&events)?;
        }
        TimerAction::Status => {
            print_json(&app.service.snapshot())?;
        }
        TimerAction::Resume => {
            print_json(&events)?;
        }
    }
    Ok(())
}

fn run_foreground(app: App, plan: SessionPlan) -> CliResult {
    let App { config, service } = app;
    let tick_every = Duration::from_millis(config.timer.tick_interval_ms.max(1));
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async move {
        let (handle, task) = studyquest_core::spawn(service, tick_every);
        let outcome = stream_until_ended(&handle, plan).await;
        handle.shutdown().await?;
        task.await?;
        outcome
    })
}

/// Print events until the session is rewarded here, or ended by another
/// invocation (`timer stop`, or a `resume` that finalized it first).
async fn stream_until_ended(handle: &StudyHandle, plan: SessionPlan) -> CliResult {
    let mut events = handle.subscribe();
    handle.start(plan).await?;
    loop {
        match events.recv().await {
            Ok(event) => {
                println!("{}", serde_json::to_string(&event)?);
                if matches!(
                    event,
                    Event::RewardEarned { .. } | Event::TimerSuperseded { .. }
                ) {
                    return Ok(());
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event stream lagged");
            }
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}

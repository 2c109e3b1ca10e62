//! Single-writer runtime for a [`StudyService`].
//!
//! The service lives inside one tokio task. Every command arrives on an mpsc
//! queue and is answered over a oneshot, and a `tokio::time::interval`
//! drives ticks between commands. Because the task handles one message at a
//! time, a stop and a completing tick can never interleave: whichever is
//! processed first wins. Every tick of a running session is also published
//! as [`Event::Tick`].

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::ports::{RewardSink, Wallet};
use crate::service::StudyService;
use crate::timer::SessionPlan;

const COMMAND_QUEUE: usize = 32;
const EVENT_BUFFER: usize = 64;

enum Command {
    Start {
        plan: SessionPlan,
        reply: oneshot::Sender<Result<Vec<Event>>>,
    },
    Stop {
        reply: oneshot::Sender<Result<Option<Event>>>,
    },
    Activate {
        reply: oneshot::Sender<Vec<Event>>,
    },
    Purchase {
        item: String,
        reply: oneshot::Sender<Result<Event>>,
    },
    PruneEffects {
        reply: oneshot::Sender<Event>,
    },
    Snapshot {
        reply: oneshot::Sender<Event>,
    },
    Shutdown,
}

/// Cheap, cloneable handle to a running study service.
#[derive(Clone)]
pub struct StudyHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<Event>,
}

/// Move `service` into its own task and start ticking every `tick_every`.
///
/// The join handle yields the service back after [`StudyHandle::shutdown`],
/// so the caller can persist balances or inspect final state.
pub fn spawn<S>(
    service: StudyService<S>,
    tick_every: Duration,
) -> (StudyHandle, JoinHandle<StudyService<S>>)
where
    S: RewardSink + Wallet + Send + 'static,
{
    let (commands, rx) = mpsc::channel(COMMAND_QUEUE);
    let (events, _) = broadcast::channel(EVENT_BUFFER);
    let task = tokio::spawn(run(service, rx, events.clone(), tick_every));
    (StudyHandle { commands, events }, task)
}

async fn run<S>(
    mut service: StudyService<S>,
    mut rx: mpsc::Receiver<Command>,
    events: broadcast::Sender<Event>,
    tick_every: Duration,
) -> StudyService<S>
where
    S: RewardSink + Wallet,
{
    let mut ticker = tokio::time::interval(tick_every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("study runtime started");
    for event in service.activate() {
        publish(&events, event);
    }

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for event in service.tick() {
                    publish(&events, event);
                }
                if service.engine().is_running() {
                    publish(&events, Event::Tick {
                        remaining_secs: service.engine().remaining_secs(),
                        at: service.now(),
                    });
                }
            }
            cmd = rx.recv() => match cmd {
                None | Some(Command::Shutdown) => break,
                Some(cmd) => handle(&mut service, cmd, &events),
            },
        }
    }

    service.shutdown();
    info!("study runtime stopped");
    service
}

fn handle<S>(service: &mut StudyService<S>, cmd: Command, events: &broadcast::Sender<Event>)
where
    S: RewardSink + Wallet,
{
    // A dropped reply receiver just means the caller stopped waiting.
    match cmd {
        Command::Start { plan, reply } => {
            let result = service.start(plan);
            if let Ok(started) = &result {
                started.iter().cloned().for_each(|e| publish(events, e));
            }
            let _ = reply.send(result);
        }
        Command::Stop { reply } => {
            let result = service.stop();
            if let Ok(Some(stopped)) = &result {
                publish(events, stopped.clone());
            }
            let _ = reply.send(result);
        }
        Command::Activate { reply } => {
            let produced = service.activate();
            produced.iter().cloned().for_each(|e| publish(events, e));
            let _ = reply.send(produced);
        }
        Command::Purchase { item, reply } => {
            let result = service.purchase(&item);
            if let Ok(bought) = &result {
                publish(events, bought.clone());
            }
            let _ = reply.send(result);
        }
        Command::PruneEffects { reply } => {
            let _ = reply.send(service.prune_effects());
        }
        Command::Snapshot { reply } => {
            let _ = reply.send(service.snapshot());
        }
        Command::Shutdown => {}
    }
}

fn publish(events: &broadcast::Sender<Event>, event: Event) {
    // No subscribers is fine; the event is simply dropped.
    if events.send(event).is_err() {
        debug!("event published with no subscribers");
    }
}

impl StudyHandle {
    /// Receive every event the service produces from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub async fn start(&self, plan: SessionPlan) -> Result<Vec<Event>> {
        self.request(|reply| Command::Start { plan, reply }).await?
    }

    pub async fn stop(&self) -> Result<Option<Event>> {
        self.request(|reply| Command::Stop { reply }).await?
    }

    /// Foreground/activation transition.
    pub async fn activate(&self) -> Result<Vec<Event>> {
        self.request(|reply| Command::Activate { reply }).await
    }

    pub async fn purchase(&self, item: impl Into<String>) -> Result<Event> {
        let item = item.into();
        self.request(|reply| Command::Purchase { item, reply }).await?
    }

    pub async fn prune_effects(&self) -> Result<Event> {
        self.request(|reply| Command::PruneEffects { reply }).await
    }

    pub async fn snapshot(&self) -> Result<Event> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Ask the runtime to persist and exit. Outstanding commands queued
    /// before this one are still processed.
    pub async fn shutdown(&self) -> Result<()> {
        self.commands
            .send(Command::Shutdown)
            .await
            .map_err(|_| CoreError::RuntimeClosed)
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| CoreError::RuntimeClosed)?;
        response.await.map_err(|_| CoreError::RuntimeClosed)
    }
}

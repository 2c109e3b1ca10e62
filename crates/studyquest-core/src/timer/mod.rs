mod engine;
mod session;

pub use engine::{TimerEngine, TimerPhase, TimerState};
pub use session::{Session, SessionPlan};

//! Reconciling a persisted timer after the process was suspended.
//!
//! Deciding what to do is kept separate from doing it: [`ResumeController::plan`]
//! only looks at the loaded state and the clock, and the service carries the
//! plan out. That keeps activation idempotent; planning twice against the
//! same idle state yields `Nothing` both times.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::timer::{Session, TimerState};

/// What activation should do with the persisted timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumePlan {
    /// Nothing was running. No-op.
    Nothing,
    /// Still counting down; restore and keep ticking.
    Resume(TimerState),
    /// End date passed while suspended; reward the planned duration once.
    Finalize(Session),
    /// State was missing a required field or failed to decode.
    Recover { reason: String },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResumeController;

impl ResumeController {
    pub fn plan(loaded: Result<Option<TimerState>>, now: DateTime<Utc>) -> ResumePlan {
        let state = match loaded {
            Ok(Some(state)) => state,
            Ok(None) => return ResumePlan::Nothing,
            Err(e) => {
                return ResumePlan::Recover {
                    reason: e.to_string(),
                }
            }
        };

        if !state.is_running {
            return ResumePlan::Nothing;
        }
        if let Err(e) = state.validate() {
            return ResumePlan::Recover {
                reason: e.to_string(),
            };
        }

        match (state.end_date, state.session.clone()) {
            (Some(end), Some(session)) if end <= now => ResumePlan::Finalize(session),
            (Some(_), Some(_)) => ResumePlan::Resume(state),
            _ => ResumePlan::Recover {
                reason: "running timer is incomplete".into(),
            },
        }
    }
}

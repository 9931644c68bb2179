//! Session timers
//!
//! Countdown, guided and breathing timers are state machines driven by the
//! caller advancing elapsed time. No timer owns a thread.
//!
//! ```text
//! Idle -> Running -> (Paused <-> Running) -> Complete
//! ```

mod breathing;
mod countdown;
mod guided;

pub use breathing::{BreathPhase, BreathingCycle, BreathingState};
pub use countdown::{CountdownState, CountdownTimer};
pub use guided::{GuidedSession, Narrator, COMPLETION_PHRASE};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::SessionType;

/// A finished countdown, ready to be recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedSession {
    #[serde(rename = "type")]
    pub session_type: SessionType,
    pub duration_minutes: u32,
    pub completed_at: DateTime<Utc>,
}

/// Every timer state change produces an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TimerEvent {
    Started { remaining_secs: u64 },
    Paused { remaining_secs: u64 },
    Resumed { remaining_secs: u64 },
    /// Whole seconds were consumed while running
    Ticked { remaining_secs: u64 },
    Reset { remaining_secs: u64 },
    Completed { session: CompletedSession },
    PhaseChanged { phase: BreathPhase },
    CycleCompleted { cycles: u32 },
    Stopped,
}

/// Format seconds as `m:ss`
pub fn format_time(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

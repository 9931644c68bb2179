//! Narrated guided session.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{CompletedSession, CountdownState, CountdownTimer, TimerEvent};
use crate::types::{Recommendation, SessionType};

pub const COMPLETION_PHRASE: &str = "Session complete. Great job!";

/// Text-to-speech collaborator.
///
/// Implementations queue utterances; `pause`/`resume` act on the current one.
pub trait Narrator {
    fn speak(&mut self, text: &str);
    fn pause(&mut self);
    fn resume(&mut self);
    fn cancel(&mut self);
}

/// Countdown paired with spoken intro and completion phrases
pub struct GuidedSession<N: Narrator> {
    intro: String,
    timer: CountdownTimer,
    narrator: N,
}

impl<N: Narrator> GuidedSession<N> {
    pub fn new(recommendation: &Recommendation, narrator: N) -> Self {
        Self {
            intro: format!(
                "Let's begin {}. {}",
                recommendation.title, recommendation.description
            ),
            timer: CountdownTimer::new(SessionType::Guided, recommendation.duration_minutes),
            narrator,
        }
    }

    pub fn on_complete<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&CompletedSession) + 'static,
    {
        self.timer.set_on_complete(hook);
        self
    }

    pub fn timer(&self) -> &CountdownTimer {
        &self.timer
    }

    pub fn narrator(&self) -> &N {
        &self.narrator
    }

    pub fn start(&mut self) -> Option<TimerEvent> {
        let event = self.timer.start()?;
        self.narrator.speak(&self.intro);
        Some(event)
    }

    pub fn pause(&mut self) -> Option<TimerEvent> {
        let event = self.timer.pause()?;
        self.narrator.pause();
        Some(event)
    }

    pub fn resume(&mut self) -> Option<TimerEvent> {
        let event = self.timer.resume()?;
        self.narrator.resume();
        Some(event)
    }

    pub fn reset(&mut self) -> Option<TimerEvent> {
        self.narrator.cancel();
        self.timer.reset()
    }

    pub fn advance(&mut self, elapsed: Duration, now: DateTime<Utc>) -> Vec<TimerEvent> {
        let events = self.timer.advance(elapsed, now);
        if events
            .iter()
            .any(|e| matches!(e, TimerEvent::Completed { .. }))
        {
            self.narrator.speak(COMPLETION_PHRASE);
        }
        events
    }
}

impl<N: Narrator> Drop for GuidedSession<N> {
    fn drop(&mut self) {
        if self.timer.state() != CountdownState::Idle {
            self.narrator.cancel();
        }
    }
}

//! Countdown timer for silent and guided sessions.
//!
//! Remaining time is kept in whole seconds. Sub-second elapsed time is carried
//! between advances so irregular caller ticks still add up.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{format_time, CompletedSession, TimerEvent};
use crate::types::SessionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountdownState {
    Idle,
    Running,
    Paused,
    Complete,
}

type CompletionHook = Box<dyn FnMut(&CompletedSession)>;

/// Caller-driven countdown
pub struct CountdownTimer {
    session_type: SessionType,
    duration_minutes: u32,
    state: CountdownState,
    remaining_secs: u64,
    /// Sub-second running time not yet applied to `remaining_secs`
    carry: Duration,
    on_complete: Option<CompletionHook>,
    completed: Option<CompletedSession>,
}

impl fmt::Debug for CountdownTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountdownTimer")
            .field("session_type", &self.session_type)
            .field("duration_minutes", &self.duration_minutes)
            .field("state", &self.state)
            .field("remaining_secs", &self.remaining_secs)
            .field("carry", &self.carry)
            .field("completed", &self.completed)
            .finish_non_exhaustive()
    }
}

impl CountdownTimer {
    pub fn new(session_type: SessionType, duration_minutes: u32) -> Self {
        Self {
            session_type,
            duration_minutes,
            state: CountdownState::Idle,
            remaining_secs: u64::from(duration_minutes) * 60,
            carry: Duration::ZERO,
            on_complete: None,
            completed: None,
        }
    }

    /// Register a hook invoked exactly once when the countdown reaches zero
    pub fn on_complete<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&CompletedSession) + 'static,
    {
        self.set_on_complete(hook);
        self
    }

    pub fn set_on_complete<F>(&mut self, hook: F)
    where
        F: FnMut(&CompletedSession) + 'static,
    {
        self.on_complete = Some(Box::new(hook));
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> CountdownState {
        self.state
    }

    pub fn session_type(&self) -> SessionType {
        self.session_type
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    pub fn total_secs(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    /// 0.0 .. 1.0 elapsed fraction
    pub fn progress(&self) -> f64 {
        let total = self.total_secs();
        if total == 0 {
            return if self.state == CountdownState::Complete {
                1.0
            } else {
                0.0
            };
        }
        1.0 - (self.remaining_secs as f64 / total as f64)
    }

    /// Remaining time as `m:ss`
    pub fn display(&self) -> String {
        format_time(self.remaining_secs)
    }

    /// The finished session, once complete
    pub fn completed(&self) -> Option<&CompletedSession> {
        self.completed.as_ref()
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<TimerEvent> {
        match self.state {
            CountdownState::Idle => {
                self.state = CountdownState::Running;
                info!(
                    session_type = ?self.session_type,
                    duration_minutes = self.duration_minutes,
                    "countdown started"
                );
                Some(TimerEvent::Started {
                    remaining_secs: self.remaining_secs,
                })
            }
            _ => None,
        }
    }

    pub fn pause(&mut self) -> Option<TimerEvent> {
        match self.state {
            CountdownState::Running => {
                self.state = CountdownState::Paused;
                Some(TimerEvent::Paused {
                    remaining_secs: self.remaining_secs,
                })
            }
            _ => None,
        }
    }

    pub fn resume(&mut self) -> Option<TimerEvent> {
        match self.state {
            CountdownState::Paused => {
                self.state = CountdownState::Running;
                Some(TimerEvent::Resumed {
                    remaining_secs: self.remaining_secs,
                })
            }
            _ => None,
        }
    }

    /// Back to `Idle` with the full duration. Returns `None` if already there.
    pub fn reset(&mut self) -> Option<TimerEvent> {
        let pristine = self.state == CountdownState::Idle
            && self.remaining_secs == self.total_secs()
            && self.carry.is_zero();
        self.state = CountdownState::Idle;
        self.remaining_secs = self.total_secs();
        self.carry = Duration::ZERO;
        self.completed = None;
        if pristine {
            return None;
        }
        debug!("countdown reset");
        Some(TimerEvent::Reset {
            remaining_secs: self.remaining_secs,
        })
    }

    /// Consume elapsed running time. Ignored unless running.
    pub fn advance(&mut self, elapsed: Duration, now: DateTime<Utc>) -> Vec<TimerEvent> {
        let mut events = Vec::new();
        if self.state != CountdownState::Running {
            return events;
        }

        let total = self.carry.saturating_add(elapsed);
        let whole = total.as_secs();
        self.carry = total - Duration::from_secs(whole);

        if whole > 0 && self.remaining_secs > 0 {
            self.remaining_secs = self.remaining_secs.saturating_sub(whole);
            events.push(TimerEvent::Ticked {
                remaining_secs: self.remaining_secs,
            });
        }

        if self.remaining_secs == 0 {
            events.push(self.complete(now));
        }
        events
    }

    fn complete(&mut self, now: DateTime<Utc>) -> TimerEvent {
        self.state = CountdownState::Complete;
        self.carry = Duration::ZERO;

        let session = CompletedSession {
            session_type: self.session_type,
            duration_minutes: self.duration_minutes,
            completed_at: now,
        };
        self.completed = Some(session);
        info!(session_type = ?self.session_type, "countdown complete");

        if let Some(hook) = self.on_complete.as_mut() {
            hook(&session);
        }
        TimerEvent::Completed { session }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use std::rc::Rc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_start_pause_resume() {
        let mut timer = CountdownTimer::new(SessionType::Silent, 5);
        assert_eq!(timer.state(), CountdownState::Idle);

        assert!(timer.start().is_some());
        assert_eq!(timer.state(), CountdownState::Running);
        assert!(timer.start().is_none());

        assert!(timer.pause().is_some());
        assert_eq!(timer.state(), CountdownState::Paused);

        assert!(timer.resume().is_some());
        assert_eq!(timer.state(), CountdownState::Running);
    }

    #[test]
    fn test_five_minutes_completes_once() {
        let fired = Rc::new(Cell::new(0));
        let counter = Rc::clone(&fired);
        let mut timer = CountdownTimer::new(SessionType::Silent, 5)
            .on_complete(move |_| counter.set(counter.get() + 1));

        timer.start();
        let mut completions = 0;
        for _ in 0..300 {
            completions += timer
                .advance(secs(1), now())
                .iter()
                .filter(|e| matches!(e, TimerEvent::Completed { .. }))
                .count();
        }

        assert_eq!(completions, 1);
        assert_eq!(fired.get(), 1);
        assert_eq!(timer.remaining_secs(), 0);
        assert_eq!(timer.state(), CountdownState::Complete);
        assert_eq!(timer.progress(), 1.0);

        // Further advances are no-ops
        assert!(timer.advance(secs(10), now()).is_empty());
        assert!(timer.pause().is_none());
        assert!(timer.resume().is_none());
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_completed_session_details() {
        let mut timer = CountdownTimer::new(SessionType::Guided, 1);
        timer.start();
        let events = timer.advance(secs(90), now());
        assert_eq!(
            events.last(),
            Some(&TimerEvent::Completed {
                session: CompletedSession {
                    session_type: SessionType::Guided,
                    duration_minutes: 1,
                    completed_at: now(),
                }
            })
        );
        assert_eq!(timer.completed().map(|s| s.duration_minutes), Some(1));
    }

    #[test]
    fn test_paused_time_is_not_counted() {
        let mut timer = CountdownTimer::new(SessionType::Silent, 1);
        timer.start();
        timer.advance(secs(10), now());
        timer.pause();
        assert!(timer.advance(secs(30), now()).is_empty());
        assert_eq!(timer.remaining_secs(), 50);

        timer.resume();
        timer.advance(secs(5), now());
        assert_eq!(timer.remaining_secs(), 45);
    }

    #[test]
    fn test_sub_second_carry_survives_pause() {
        let mut timer = CountdownTimer::new(SessionType::Silent, 1);
        timer.start();
        timer.advance(Duration::from_millis(600), now());
        assert_eq!(timer.remaining_secs(), 60);

        timer.pause();
        timer.resume();
        timer.advance(Duration::from_millis(600), now());
        assert_eq!(timer.remaining_secs(), 59);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut timer = CountdownTimer::new(SessionType::Silent, 2);
        assert!(timer.reset().is_none());

        timer.start();
        timer.advance(secs(30), now());
        assert_eq!(
            timer.reset(),
            Some(TimerEvent::Reset {
                remaining_secs: 120
            })
        );
        assert!(timer.reset().is_none());
        assert_eq!(timer.state(), CountdownState::Idle);
        assert_eq!(timer.progress(), 0.0);
    }

    #[test]
    fn test_progress_and_display() {
        let mut timer = CountdownTimer::new(SessionType::Silent, 10);
        assert_eq!(timer.display(), "10:00");
        timer.start();
        timer.advance(secs(150), now());
        assert!((timer.progress() - 0.25).abs() < 1e-9);
        assert_eq!(timer.display(), "7:30");
    }

    #[test]
    fn test_zero_minute_session_completes_on_first_advance() {
        let mut timer = CountdownTimer::new(SessionType::Breathing, 0);
        assert_eq!(timer.progress(), 0.0);
        timer.start();
        let events = timer.advance(Duration::ZERO, now());
        assert!(matches!(events.as_slice(), [TimerEvent::Completed { .. }]));
        assert_eq!(timer.progress(), 1.0);
    }

    #[test]
    fn test_advance_before_start_is_ignored() {
        let mut timer = CountdownTimer::new(SessionType::Silent, 1);
        assert!(timer.advance(secs(30), now()).is_empty());
        assert_eq!(timer.remaining_secs(), 60);
    }

    #[test]
    fn test_huge_elapsed_after_carry_completes() {
        let mut timer = CountdownTimer::new(SessionType::Silent, 1);
        timer.start();
        timer.advance(Duration::from_millis(500), now());
        let events = timer.advance(Duration::MAX, now());
        assert!(matches!(events.last(), Some(TimerEvent::Completed { .. })));
        assert_eq!(timer.remaining_secs(), 0);
        assert_eq!(timer.state(), CountdownState::Complete);
    }
}

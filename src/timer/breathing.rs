//! 4-7-8 breathing cycle player.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::TimerEvent;

/// One inhale, hold and exhale
const CYCLE: Duration = Duration::from_secs(19);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreathPhase {
    Inhale,
    Hold,
    Exhale,
}

impl BreathPhase {
    pub fn duration(&self) -> Duration {
        match self {
            BreathPhase::Inhale => Duration::from_secs(4),
            BreathPhase::Hold => Duration::from_secs(7),
            BreathPhase::Exhale => Duration::from_secs(8),
        }
    }

    pub fn next(&self) -> BreathPhase {
        match self {
            BreathPhase::Inhale => BreathPhase::Hold,
            BreathPhase::Hold => BreathPhase::Exhale,
            BreathPhase::Exhale => BreathPhase::Inhale,
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            BreathPhase::Inhale => "Breathe In",
            BreathPhase::Hold => "Hold",
            BreathPhase::Exhale => "Breathe Out",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreathingState {
    Idle,
    Running,
    Paused,
}

/// Looping inhale/hold/exhale player. Has no terminal state.
#[derive(Debug, Clone)]
pub struct BreathingCycle {
    state: BreathingState,
    phase: BreathPhase,
    in_phase: Duration,
    cycles: u32,
}

impl Default for BreathingCycle {
    fn default() -> Self {
        Self::new()
    }
}

impl BreathingCycle {
    pub fn new() -> Self {
        Self {
            state: BreathingState::Idle,
            phase: BreathPhase::Inhale,
            in_phase: Duration::ZERO,
            cycles: 0,
        }
    }

    pub fn state(&self) -> BreathingState {
        self.state
    }

    pub fn phase(&self) -> BreathPhase {
        self.phase
    }

    /// Completed inhale-hold-exhale loops
    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    /// 0.0 .. 100.0 within the current phase
    pub fn progress(&self) -> f64 {
        if self.state == BreathingState::Idle {
            return 0.0;
        }
        let fraction = self.in_phase.as_secs_f64() / self.phase.duration().as_secs_f64();
        (fraction * 100.0).min(100.0)
    }

    /// Start from inhale. Only valid from `Idle`.
    pub fn start(&mut self) -> Option<TimerEvent> {
        if self.state != BreathingState::Idle {
            return None;
        }
        self.state = BreathingState::Running;
        self.phase = BreathPhase::Inhale;
        self.in_phase = Duration::ZERO;
        Some(TimerEvent::PhaseChanged { phase: self.phase })
    }

    pub fn pause(&mut self) -> Option<TimerEvent> {
        if self.state != BreathingState::Running {
            return None;
        }
        self.state = BreathingState::Paused;
        Some(TimerEvent::Paused { remaining_secs: self.phase_remaining_secs() })
    }

    pub fn resume(&mut self) -> Option<TimerEvent> {
        if self.state != BreathingState::Paused {
            return None;
        }
        self.state = BreathingState::Running;
        Some(TimerEvent::Resumed { remaining_secs: self.phase_remaining_secs() })
    }

    /// Back to `Idle` keeping the cycle count
    pub fn stop(&mut self) -> Option<TimerEvent> {
        if self.state == BreathingState::Idle {
            return None;
        }
        self.state = BreathingState::Idle;
        self.in_phase = Duration::ZERO;
        debug!(cycles = self.cycles, "breathing stopped");
        Some(TimerEvent::Stopped)
    }

    /// Back to `Idle` at inhale with zero cycles
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Consume elapsed running time.
    ///
    /// Whole loops beyond the last one are counted without emitting events.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<TimerEvent> {
        let mut events = Vec::new();
        if self.state != BreathingState::Running {
            return events;
        }

        let total = self.in_phase.saturating_add(elapsed);
        let cycle_nanos = CYCLE.as_nanos();
        let loops = total.as_nanos() / cycle_nanos;
        self.in_phase = if loops > 1 {
            let skipped = u32::try_from(loops - 1).unwrap_or(u32::MAX);
            self.cycles = self.cycles.saturating_add(skipped);
            Duration::from_nanos((total.as_nanos() % cycle_nanos + cycle_nanos) as u64)
        } else {
            total
        };

        while self.in_phase >= self.phase.duration() {
            self.in_phase -= self.phase.duration();
            if self.phase == BreathPhase::Exhale {
                self.cycles = self.cycles.saturating_add(1);
                events.push(TimerEvent::CycleCompleted {
                    cycles: self.cycles,
                });
            }
            self.phase = self.phase.next();
            events.push(TimerEvent::PhaseChanged { phase: self.phase });
        }
        events
    }

    fn phase_remaining_secs(&self) -> u64 {
        self.phase.duration().saturating_sub(self.in_phase).as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_one_full_cycle() {
        let mut breathing = BreathingCycle::new();
        breathing.start();
        assert_eq!(breathing.phase(), BreathPhase::Inhale);

        let mut completed = 0;
        for _ in 0..19 {
            completed += breathing
                .advance(secs(1))
                .iter()
                .filter(|e| matches!(e, TimerEvent::CycleCompleted { .. }))
                .count();
        }
        assert_eq!(completed, 1);
        assert_eq!(breathing.cycles(), 1);
        assert_eq!(breathing.phase(), BreathPhase::Inhale);
        assert_eq!(breathing.progress(), 0.0);
    }

    #[test]
    fn test_phase_sequence_and_progress() {
        let mut breathing = BreathingCycle::new();
        breathing.start();

        breathing.advance(secs(2));
        assert!((breathing.progress() - 50.0).abs() < 1e-9);

        let events = breathing.advance(secs(2));
        assert_eq!(
            events,
            vec![TimerEvent::PhaseChanged {
                phase: BreathPhase::Hold
            }]
        );

        breathing.advance(secs(7));
        assert_eq!(breathing.phase(), BreathPhase::Exhale);
        assert_eq!(breathing.cycles(), 0);
    }

    #[test]
    fn test_pause_freezes_phase() {
        let mut breathing = BreathingCycle::new();
        breathing.start();
        breathing.advance(secs(3));
        breathing.pause();
        assert!(breathing.advance(secs(30)).is_empty());
        assert_eq!(breathing.phase(), BreathPhase::Inhale);

        breathing.resume();
        breathing.advance(secs(1));
        assert_eq!(breathing.phase(), BreathPhase::Hold);
    }

    #[test]
    fn test_stop_keeps_cycles() {
        let mut breathing = BreathingCycle::new();
        breathing.start();
        breathing.advance(secs(40));
        assert_eq!(breathing.cycles(), 2);

        assert_eq!(breathing.stop(), Some(TimerEvent::Stopped));
        assert_eq!(breathing.state(), BreathingState::Idle);
        assert_eq!(breathing.progress(), 0.0);
        assert_eq!(breathing.cycles(), 2);
        assert!(breathing.stop().is_none());

        breathing.reset();
        assert_eq!(breathing.cycles(), 0);
        assert_eq!(breathing.phase(), BreathPhase::Inhale);
    }

    #[test]
    fn test_restart_begins_at_inhale() {
        let mut breathing = BreathingCycle::new();
        breathing.start();
        breathing.advance(secs(5));
        breathing.stop();
        assert_eq!(
            breathing.start(),
            Some(TimerEvent::PhaseChanged {
                phase: BreathPhase::Inhale
            })
        );
    }

    #[test]
    fn test_long_advance_counts_skipped_cycles() {
        let mut breathing = BreathingCycle::new();
        breathing.start();
        breathing.advance(secs(5));

        // 5s + 190s = ten loops plus 5s, still inside hold
        let events = breathing.advance(secs(190));
        assert_eq!(breathing.cycles(), 10);
        assert_eq!(breathing.phase(), BreathPhase::Hold);
        assert!(events.len() <= 6);

        breathing.advance(Duration::MAX);
        assert_eq!(breathing.state(), BreathingState::Running);
        assert!(breathing.cycles() > 10);
    }
}

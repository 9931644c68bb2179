//! Typing cadence stress sampler
//!
//! Keeps the most recent keydown timestamps and scores the mean inter-key
//! interval: faster typing maps to higher stress, saturating at 10 keys/s.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::TypingConfig;
use crate::types::{clamp_stress, StressChannel, StressSample};

/// Keys per second treated as maximal stress
const MAX_KEYS_PER_SEC: f64 = 10.0;

/// Source of keydown timestamps.
///
/// Decouples the sampler from process-wide key listening so tests and hosts can
/// feed synthetic events.
pub trait KeyEventSource {
    /// Take all keydown timestamps received since the last call, oldest first
    fn drain_keydowns(&mut self) -> Vec<DateTime<Utc>>;
}

/// Key source fed by hand, e.g. from a host keyboard hook
#[derive(Debug, Default)]
pub struct ManualKeySource {
    pending: VecDeque<DateTime<Utc>>,
}

impl ManualKeySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, at: DateTime<Utc>) {
        self.pending.push_back(at);
    }
}

impl KeyEventSource for ManualKeySource {
    fn drain_keydowns(&mut self) -> Vec<DateTime<Utc>> {
        self.pending.drain(..).collect()
    }
}

#[derive(Debug)]
enum TypingState {
    Idle,
    Listening { keys: VecDeque<DateTime<Utc>> },
}

/// Global key-interval typing sampler
#[derive(Debug)]
pub struct TypingSampler {
    window: usize,
    state: TypingState,
    speed: f64,
    score: f64,
}

impl TypingSampler {
    pub fn new(config: &TypingConfig) -> Self {
        Self {
            window: config.key_window.max(2),
            state: TypingState::Idle,
            speed: 0.0,
            score: 0.0,
        }
    }

    pub fn is_listening(&self) -> bool {
        matches!(self.state, TypingState::Listening { .. })
    }

    /// Current typing speed in keys per second
    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    /// Begin accepting key events. Idempotent.
    pub fn start(&mut self) {
        if !self.is_listening() {
            self.state = TypingState::Listening {
                keys: VecDeque::with_capacity(self.window),
            };
            info!("typing sampling started");
        }
    }

    /// Stop accepting key events and forget the window. Idempotent.
    pub fn stop(&mut self) {
        if self.is_listening() {
            self.state = TypingState::Idle;
            info!("typing sampling stopped");
        }
    }

    /// Record one keydown. Returns a sample once at least two keys are known.
    pub fn record_key(&mut self, at: DateTime<Utc>) -> Option<StressSample> {
        let TypingState::Listening { keys } = &mut self.state else {
            return None;
        };

        keys.push_back(at);
        while keys.len() > self.window {
            keys.pop_front();
        }

        let mean_interval_ms = mean_interval_ms(keys)?;
        self.speed = keys_per_second(mean_interval_ms);
        self.score = score_speed(self.speed);
        debug!(speed = self.speed, score = self.score, "typing score updated");

        Some(StressSample::new(StressChannel::Typing, self.score, at))
    }

    /// Drain a key source, returning the sample for the latest key if any
    pub fn poll<K: KeyEventSource>(&mut self, source: &mut K) -> Option<StressSample> {
        let mut latest = None;
        for at in source.drain_keydowns() {
            if let Some(sample) = self.record_key(at) {
                latest = Some(sample);
            }
        }
        latest
    }
}

/// Mean of consecutive deltas in milliseconds; `None` for fewer than two keys
fn mean_interval_ms(keys: &VecDeque<DateTime<Utc>>) -> Option<f64> {
    if keys.len() < 2 {
        return None;
    }
    let total: f64 = keys
        .iter()
        .zip(keys.iter().skip(1))
        .map(|(prev, next)| (*next - *prev).num_milliseconds() as f64)
        .sum();
    Some(total / (keys.len() - 1) as f64)
}

/// `1000 / mean_interval_ms`; simultaneous keys count as infinitely fast
fn keys_per_second(mean_interval_ms: f64) -> f64 {
    if mean_interval_ms <= 0.0 {
        return f64::INFINITY;
    }
    1000.0 / mean_interval_ms
}

/// Formula: `min(1, speed / 10) * 100`
fn score_speed(keys_per_sec: f64) -> f64 {
    clamp_stress((keys_per_sec / MAX_KEYS_PER_SEC).min(1.0) * 100.0)
}

//! Stress aggregation
//!
//! Combines the latest per-channel scores into one overall estimate and keeps a
//! bounded history for trend display. Nothing here is persisted.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use crate::config::AggregationConfig;
use crate::types::{clamp_stress, AggregatedStress, StressBand, StressSample};

/// Fixed channel weights for the overall estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelWeights {
    pub facial: f64,
    pub typing: f64,
    pub voice: f64,
}

impl Default for ChannelWeights {
    fn default() -> Self {
        Self {
            facial: 0.4,
            typing: 0.3,
            voice: 0.3,
        }
    }
}

impl From<&AggregationConfig> for ChannelWeights {
    fn from(config: &AggregationConfig) -> Self {
        Self {
            facial: config.facial_weight,
            typing: config.typing_weight,
            voice: config.voice_weight,
        }
    }
}

/// Weighted overall stress, clamped to [0, 100]
///
/// Formula: `0.4 * facial + 0.3 * typing + 0.3 * voice` with default weights.
pub fn overall_stress(aggregate: &AggregatedStress, weights: &ChannelWeights) -> f64 {
    clamp_stress(
        aggregate.facial * weights.facial
            + aggregate.typing * weights.typing
            + aggregate.voice * weights.voice,
    )
}

/// One point of the trend history
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
    pub aggregate: AggregatedStress,
    pub overall: f64,
    pub band: StressBand,
}

/// Stateful aggregator owning the current snapshot and trend history
#[derive(Debug, Clone)]
pub struct StressAggregator {
    weights: ChannelWeights,
    /// `None` keeps every snapshot
    retention: Option<Duration>,
    current: Option<AggregatedStress>,
    history: VecDeque<AggregatedStress>,
}

impl Default for StressAggregator {
    fn default() -> Self {
        Self::new(&AggregationConfig::default())
    }
}

impl StressAggregator {
    pub fn new(config: &AggregationConfig) -> Self {
        Self {
            weights: ChannelWeights::from(config),
            retention: Duration::try_hours(config.history_hours),
            current: None,
            history: VecDeque::new(),
        }
    }

    pub fn weights(&self) -> &ChannelWeights {
        &self.weights
    }

    /// Latest snapshot; all channels zero before the first sample
    pub fn current(&self) -> AggregatedStress {
        self.current
            .unwrap_or_else(|| AggregatedStress::empty(DateTime::<Utc>::UNIX_EPOCH))
    }

    pub fn overall(&self) -> f64 {
        overall_stress(&self.current(), &self.weights)
    }

    pub fn band(&self) -> StressBand {
        StressBand::from_score(self.overall())
    }

    /// Apply a new channel score and record the resulting snapshot
    pub fn ingest(&mut self, sample: &StressSample) -> AggregatedStress {
        let mut next = self
            .current
            .unwrap_or_else(|| AggregatedStress::empty(sample.timestamp));
        next.set_channel(sample.channel, sample.value);
        next.timestamp = sample.timestamp;

        self.current = Some(next);
        self.history.push_back(next);
        self.prune(sample.timestamp);

        debug!(
            channel = sample.channel.as_str(),
            value = sample.value,
            overall = overall_stress(&next, &self.weights),
            "aggregate updated"
        );
        next
    }

    /// Drop history entries at or older than `now - retention`
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let Some(cutoff) = self
            .retention
            .and_then(|retention| now.checked_sub_signed(retention))
        else {
            return;
        };
        self.history.retain(|entry| entry.timestamp > cutoff);
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Latest `count` snapshots, oldest first
    pub fn recent(&self, count: usize) -> Vec<TrendPoint> {
        let skip = self.history.len().saturating_sub(count);
        self.history
            .iter()
            .skip(skip)
            .map(|aggregate| {
                let overall = overall_stress(aggregate, &self.weights);
                TrendPoint {
                    aggregate: *aggregate,
                    overall,
                    band: StressBand::from_score(overall),
                }
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.history.clear();
    }
}

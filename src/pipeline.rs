//! Pipeline orchestration
//!
//! This module provides the public API for Mindful Pulse.
//! It wires samples through aggregation into recommendations, and exposes
//! stateless JSON entry points used by the CLI and FFI layers.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregator::{StressAggregator, TrendPoint};
use crate::config::PulseConfig;
use crate::error::PulseError;
use crate::recommend::{describe_stress_level, recommend};
use crate::sampler::facial::score_expressions;
use crate::stats::compute_stats;
use crate::types::{
    AggregatedStress, MeditationSession, MeditationStats, Recommendation, StressBand,
    StressChannel, StressIndicators, StressSample,
};

/// Snapshot of the current stress picture and what to do about it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StressReport {
    pub aggregate: AggregatedStress,
    pub overall: f64,
    pub band: StressBand,
    pub indicators: StressIndicators,
    pub description: &'static str,
    pub recommendations: Vec<Recommendation>,
}

impl StressReport {
    pub fn from_indicators(aggregate: AggregatedStress, overall: f64, indicators: StressIndicators) -> Self {
        let mean = indicators.mean_stress();
        Self {
            aggregate,
            overall,
            band: StressBand::from_score(overall),
            indicators,
            description: describe_stress_level(mean),
            recommendations: recommend(&indicators),
        }
    }
}

/// Stateful processor feeding samples into the aggregator.
///
/// Only channels that have produced at least one sample count towards the
/// recommendation mean.
#[derive(Debug, Clone, Default)]
pub struct StressProcessor {
    aggregator: StressAggregator,
    active: HashSet<StressChannel>,
    sentiment: Option<f64>,
}

impl StressProcessor {
    /// Create a new processor with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a processor with aggregation settings from config
    pub fn with_config(config: &PulseConfig) -> Self {
        Self {
            aggregator: StressAggregator::new(&config.aggregation),
            active: HashSet::new(),
            sentiment: None,
        }
    }

    pub fn aggregator(&self) -> &StressAggregator {
        &self.aggregator
    }

    /// External sentiment in [0, 1]; `None` means unknown
    pub fn set_sentiment(&mut self, sentiment: Option<f64>) {
        self.sentiment = sentiment
            .filter(|s| s.is_finite())
            .map(|s| s.clamp(0.0, 1.0));
    }

    pub fn ingest(&mut self, sample: &StressSample) -> StressReport {
        self.aggregator.ingest(sample);
        self.active.insert(sample.channel);
        self.report()
    }

    pub fn indicators(&self) -> StressIndicators {
        let aggregate = self.aggregator.current();
        let value = |channel: StressChannel| {
            self.active
                .contains(&channel)
                .then(|| aggregate.channel(channel))
        };
        StressIndicators {
            facial_stress: value(StressChannel::Facial),
            typing_stress: value(StressChannel::Typing),
            voice_stress: value(StressChannel::Voice),
            sentiment: self.sentiment,
        }
    }

    pub fn report(&self) -> StressReport {
        StressReport::from_indicators(
            self.aggregator.current(),
            self.aggregator.overall(),
            self.indicators(),
        )
    }

    pub fn trend(&self, count: usize) -> Vec<TrendPoint> {
        self.aggregator.recent(count)
    }

    pub fn reset(&mut self) {
        self.aggregator.clear();
        self.active.clear();
    }
}

/// Recommendation response for a JSON indicators object
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResponse {
    pub mean_stress: f64,
    pub description: &'static str,
    pub recommendations: Vec<Recommendation>,
}

pub fn recommend_for(indicators: &StressIndicators) -> RecommendationResponse {
    let mean_stress = indicators.mean_stress();
    RecommendationResponse {
        mean_stress,
        description: describe_stress_level(mean_stress),
        recommendations: recommend(indicators),
    }
}

/// Recommend activities for a JSON-encoded [`StressIndicators`].
///
/// # Example
/// ```ignore
/// let json = recommend_json(r#"{"facial_stress": 80, "sentiment": 0.1}"#)?;
/// ```
pub fn recommend_json(indicators_json: &str) -> Result<String, PulseError> {
    let indicators: StressIndicators = serde_json::from_str(indicators_json)?;
    Ok(serde_json::to_string(&recommend_for(&indicators))?)
}

/// Compute statistics for a JSON array of sessions
pub fn stats_json(sessions_json: &str, window_start: DateTime<Utc>) -> Result<String, PulseError> {
    let sessions: Vec<MeditationSession> = serde_json::from_str(sessions_json)?;
    let stats: MeditationStats = compute_stats(&sessions, window_start);
    Ok(serde_json::to_string(&stats)?)
}

/// Facial stress for a JSON emotion → probability map
pub fn facial_score_json(expressions_json: &str) -> Result<f64, PulseError> {
    let expressions: HashMap<String, f64> = serde_json::from_str(expressions_json)?;
    Ok(score_expressions(&expressions))
}

//! Core data types shared across the stress and session pipeline
//!
//! Stress values flow from the samplers as [`StressSample`]s into the aggregator,
//! which keeps an [`AggregatedStress`] snapshot. Completed meditation sessions are
//! persisted as [`MeditationSession`] records and summarised as [`MeditationStats`].

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

/// Lower bound of every stress score
pub const MIN_STRESS: f64 = 0.0;

/// Upper bound of every stress score
pub const MAX_STRESS: f64 = 100.0;

/// Clamp a raw score into the valid stress range
pub fn clamp_stress(value: f64) -> f64 {
    if value.is_nan() {
        return MIN_STRESS;
    }
    value.clamp(MIN_STRESS, MAX_STRESS)
}

/// Independent stress-signal source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressChannel {
    Facial,
    Typing,
    Voice,
}

impl StressChannel {
    pub const ALL: [StressChannel; 3] = [
        StressChannel::Facial,
        StressChannel::Typing,
        StressChannel::Voice,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StressChannel::Facial => "facial",
            StressChannel::Typing => "typing",
            StressChannel::Voice => "voice",
        }
    }
}

impl std::str::FromStr for StressChannel {
    type Err = crate::error::PulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StressChannel::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                crate::error::PulseError::ParseError(format!("unknown stress channel '{s}'"))
            })
    }
}

/// A single normalized score emitted by a sampler
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressSample {
    /// Channel that produced the score
    pub channel: StressChannel,
    /// Score in [0, 100]
    pub value: f64,
    /// When the score was produced
    pub timestamp: DateTime<Utc>,
}

impl StressSample {
    /// Create a sample, clamping the value into [0, 100]
    pub fn new(channel: StressChannel, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            channel,
            value: clamp_stress(value),
            timestamp,
        }
    }

    /// Value rounded to one decimal place for display
    pub fn display_value(&self) -> f64 {
        (self.value * 10.0).round() / 10.0
    }
}

/// Latest value of every channel, recomputed on each new sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatedStress {
    pub facial: f64,
    pub typing: f64,
    pub voice: f64,
    pub timestamp: DateTime<Utc>,
}

impl AggregatedStress {
    /// All channels inactive (zero) at the given time
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            facial: 0.0,
            typing: 0.0,
            voice: 0.0,
            timestamp,
        }
    }

    pub fn channel(&self, channel: StressChannel) -> f64 {
        match channel {
            StressChannel::Facial => self.facial,
            StressChannel::Typing => self.typing,
            StressChannel::Voice => self.voice,
        }
    }

    pub(crate) fn set_channel(&mut self, channel: StressChannel, value: f64) {
        let value = clamp_stress(value);
        match channel {
            StressChannel::Facial => self.facial = value,
            StressChannel::Typing => self.typing = value,
            StressChannel::Voice => self.voice = value,
        }
    }
}

/// Coarse label for an overall stress score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressBand {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl StressBand {
    /// `<30` low, `<60` medium, `<80` high, otherwise very high
    pub fn from_score(score: f64) -> Self {
        if score < 30.0 {
            StressBand::Low
        } else if score < 60.0 {
            StressBand::Medium
        } else if score < 80.0 {
            StressBand::High
        } else {
            StressBand::VeryHigh
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StressBand::Low => "Low",
            StressBand::Medium => "Medium",
            StressBand::High => "High",
            StressBand::VeryHigh => "Very High",
        }
    }
}

/// Kind of wellness activity in the recommendation catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Exercise,
    Meditation,
    Breathing,
}

/// Effort level of a catalog activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Low,
    Medium,
    High,
}

/// Static catalog entry; selected, never mutated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub activity: ActivityType,
    pub title: &'static str,
    pub description: &'static str,
    pub duration_minutes: u32,
    pub intensity: Intensity,
}

/// Optional per-channel stress values plus an external sentiment signal
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StressIndicators {
    #[serde(default)]
    pub facial_stress: Option<f64>,
    #[serde(default)]
    pub typing_stress: Option<f64>,
    #[serde(default)]
    pub voice_stress: Option<f64>,
    /// Sentiment in [0, 1]; 0.5 is neutral
    #[serde(default)]
    pub sentiment: Option<f64>,
}

impl StressIndicators {
    /// Mean of the defined channel values, 0 when none are defined
    pub fn mean_stress(&self) -> f64 {
        let values: Vec<f64> = [self.facial_stress, self.typing_stress, self.voice_stress]
            .into_iter()
            .flatten()
            .collect();
        if values.is_empty() {
            return 0.0;
        }
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl From<&AggregatedStress> for StressIndicators {
    fn from(aggregate: &AggregatedStress) -> Self {
        Self {
            facial_stress: Some(aggregate.facial),
            typing_stress: Some(aggregate.typing),
            voice_stress: Some(aggregate.voice),
            sentiment: None,
        }
    }
}

/// Kind of meditation session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Guided,
    Silent,
    Breathing,
}

impl std::str::FromStr for SessionType {
    type Err = crate::error::PulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "guided" => Ok(SessionType::Guided),
            "silent" => Ok(SessionType::Silent),
            "breathing" => Ok(SessionType::Breathing),
            other => Err(crate::error::PulseError::ParseError(format!(
                "unknown session type '{other}'"
            ))),
        }
    }
}

/// A persisted meditation session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeditationSession {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub session_type: SessionType,
    /// Duration in minutes
    #[serde(alias = "duration")]
    pub duration_minutes: u32,
    pub completed: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stress_level: Option<u8>,
}

/// Per-type session counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTypeCounts {
    pub guided: u32,
    pub silent: u32,
    pub breathing: u32,
}

impl SessionTypeCounts {
    pub(crate) fn increment(&mut self, session_type: SessionType) {
        match session_type {
            SessionType::Guided => self.guided += 1,
            SessionType::Silent => self.silent += 1,
            SessionType::Breathing => self.breathing += 1,
        }
    }
}

/// Summary statistics over a time-windowed list of sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeditationStats {
    pub total_sessions: u32,
    /// Total minutes
    pub total_duration: u64,
    /// Average minutes per session, 0 when there are no sessions
    pub average_duration: f64,
    /// Consecutive calendar days with at least one session, newest first
    pub streak: u32,
    pub last_session_date: Option<DateTime<Utc>>,
    pub session_types: SessionTypeCounts,
}

/// Reporting window for statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    #[default]
    Week,
    Month,
    Year,
}

impl TimeRange {
    /// Start of the window ending at `now`
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            TimeRange::Week => now - chrono::Duration::days(7),
            TimeRange::Month => now
                .checked_sub_months(Months::new(1))
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            TimeRange::Year => now
                .checked_sub_months(Months::new(12))
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        }
    }
}

impl std::str::FromStr for TimeRange {
    type Err = crate::error::PulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "week" => Ok(TimeRange::Week),
            "month" => Ok(TimeRange::Month),
            "year" => Ok(TimeRange::Year),
            other => Err(crate::error::PulseError::ParseError(format!(
                "unknown time range '{other}'"
            ))),
        }
    }
}

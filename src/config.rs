//! Runtime configuration
//!
//! All tunables have defaults matching the reference scoring formulas, so an
//! empty TOML document is a valid configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PulseError;
use crate::types::TimeRange;

/// Longest accepted trend retention, one hundred years
pub const MAX_HISTORY_HOURS: i64 = 24 * 366 * 100;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub aggregation: AggregationConfig,
    pub facial: FacialConfig,
    pub voice: VoiceConfig,
    pub typing: TypingConfig,
    pub stats: StatsConfig,
}

/// Weights for the overall stress estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub facial_weight: f64,
    pub typing_weight: f64,
    pub voice_weight: f64,
    /// Trend history retention
    pub history_hours: i64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            facial_weight: 0.4,
            typing_weight: 0.3,
            voice_weight: 0.3,
            history_hours: 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacialConfig {
    /// Directory holding the classifier model artifacts
    pub model_path: PathBuf,
    /// Minimum milliseconds between emitted scores
    pub emit_interval_ms: i64,
    /// Amount subtracted from the previous score when no face is detected
    pub no_face_decay: f64,
}

impl Default for FacialConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("/models"),
            emit_interval_ms: 1000,
            no_face_decay: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Number of volume and dominant-frequency samples kept
    pub window_size: usize,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self { window_size: 20 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypingConfig {
    /// Number of keydown timestamps kept
    pub key_window: usize,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self { key_window: 10 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub default_range: TimeRange,
    /// Optional path of the JSON-lines session store used by the CLI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
}

impl PulseConfig {
    /// Load and validate a TOML configuration file
    pub fn load(path: &Path) -> Result<Self, PulseError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, PulseError> {
        let config: PulseConfig =
            toml::from_str(content).map_err(|e| PulseError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, PulseError> {
        toml::to_string_pretty(self).map_err(|e| PulseError::ConfigError(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), PulseError> {
        let weights = [
            ("facial_weight", self.aggregation.facial_weight),
            ("typing_weight", self.aggregation.typing_weight),
            ("voice_weight", self.aggregation.voice_weight),
        ];
        for (name, weight) in weights {
            if !(0.0..=1.0).contains(&weight) {
                return Err(PulseError::ConfigError(format!(
                    "aggregation.{name} must be within [0, 1], got {weight}"
                )));
            }
        }
        if !(1..=MAX_HISTORY_HOURS).contains(&self.aggregation.history_hours) {
            return Err(PulseError::ConfigError(format!(
                "aggregation.history_hours must be within [1, {MAX_HISTORY_HOURS}], got {}",
                self.aggregation.history_hours
            )));
        }
        if self.facial.emit_interval_ms < 0 {
            return Err(PulseError::ConfigError(
                "facial.emit_interval_ms must not be negative".to_string(),
            ));
        }
        if self.voice.window_size < 2 {
            return Err(PulseError::ConfigError(
                "voice.window_size must be at least 2".to_string(),
            ));
        }
        if self.typing.key_window < 2 {
            return Err(PulseError::ConfigError(
                "typing.key_window must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = PulseConfig::from_toml_str("").unwrap();
        assert_eq!(config, PulseConfig::default());
        assert_eq!(config.facial.model_path, PathBuf::from("/models"));
        assert_eq!(config.voice.window_size, 20);
        assert_eq!(config.typing.key_window, 10);
    }

    #[test]
    fn test_partial_override() {
        let config = PulseConfig::from_toml_str(
            r#"
            [aggregation]
            facial_weight = 0.5

            [stats]
            default_range = "month"
            "#,
        )
        .unwrap();
        assert_eq!(config.aggregation.facial_weight, 0.5);
        assert_eq!(config.aggregation.typing_weight, 0.3);
        assert_eq!(config.stats.default_range, TimeRange::Month);
    }

    #[test]
    fn test_rejects_out_of_range_weight() {
        let err = PulseConfig::from_toml_str("[aggregation]\nvoice_weight = 1.5\n").unwrap_err();
        assert!(matches!(err, PulseError::ConfigError(_)));
    }

    #[test]
    fn test_rejects_unbounded_history_retention() {
        let err = PulseConfig::from_toml_str("[aggregation]\nhistory_hours = 10000000000\n")
            .unwrap_err();
        assert!(err.to_string().contains("history_hours"));

        let longest = format!("[aggregation]\nhistory_hours = {MAX_HISTORY_HOURS}\n");
        assert!(PulseConfig::from_toml_str(&longest).is_ok());
    }

    #[test]
    fn test_rejects_tiny_voice_window() {
        let err = PulseConfig::from_toml_str("[voice]\nwindow_size = 1\n").unwrap_err();
        assert!(err.to_string().contains("window_size"));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = PulseConfig::default();
        let text = config.to_toml_string().unwrap();
        assert_eq!(PulseConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pulse.toml");
        fs::write(&path, "[facial]\nmodel_path = \"/opt/models\"\n").unwrap();
        let config = PulseConfig::load(&path).unwrap();
        assert_eq!(config.facial.model_path, PathBuf::from("/opt/models"));
    }
}

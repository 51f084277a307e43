//! Tunable parameters for the narrative core.
//!
//! Every section has working defaults; a TOML file only needs to name the
//! values it wants to change.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeConfig {
    pub traversal: TraversalConfig,
    pub actors: ActorDefaults,
    pub echo: EchoConfig,
    pub binding: BindingConfig,

    /// Seed for the default response strategy.
    pub seed: u64,
}

/// Weights for biased memory traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    pub emotional_weight: f64,
    pub recency_weight: f64,
    pub causality_weight: f64,

    /// Contradiction edges heavier than this are never followed.
    pub contradiction_tolerance: f64,

    /// Node age at which recency priority reaches zero.
    pub recency_horizon_hours: f64,

    /// Priority multiplier applied per hop.
    pub hop_decay: f64,

    /// Boost for successors sharing the actor's dominant emotion.
    pub emotion_match_boost: f64,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            emotional_weight: 0.4,
            recency_weight: 0.3,
            causality_weight: 0.3,
            contradiction_tolerance: 0.7,
            recency_horizon_hours: 24.0,
            hop_decay: 0.9,
            emotion_match_boost: 1.5,
        }
    }
}

/// Defaults applied to newly created actors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorDefaults {
    pub default_threshold: f64,
    pub default_drift_rate: f64,
    pub default_echo_probability: f64,
    /// Validity window, in turns, of echoes produced by the engine.
    pub default_echo_window: u64,
}

impl Default for ActorDefaults {
    fn default() -> Self {
        Self {
            default_threshold: 0.5,
            default_drift_rate: 0.1,
            default_echo_probability: 0.2,
            default_echo_window: 3,
        }
    }
}

/// Echo matcher thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoConfig {
    /// Threshold for a fresh echo with no failed attempts.
    pub base_threshold: f64,
    /// Floor the decaying threshold never drops below.
    pub min_threshold: f64,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            base_threshold: 0.7,
            min_threshold: 0.3,
        }
    }
}

/// Binding resolver parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    /// Lexical similarity a deferred reaction must exceed to fold into a stimulus.
    pub deferred_similarity_threshold: f64,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            deferred_similarity_threshold: 0.5,
        }
    }
}

impl NarrativeConfig {
    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: NarrativeConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Check that every value is in its meaningful range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = [
            ("traversal.emotional_weight", self.traversal.emotional_weight),
            ("traversal.recency_weight", self.traversal.recency_weight),
            ("traversal.causality_weight", self.traversal.causality_weight),
            ("traversal.contradiction_tolerance", self.traversal.contradiction_tolerance),
            ("traversal.hop_decay", self.traversal.hop_decay),
            ("actors.default_threshold", self.actors.default_threshold),
            ("actors.default_drift_rate", self.actors.default_drift_rate),
            ("actors.default_echo_probability", self.actors.default_echo_probability),
            ("echo.base_threshold", self.echo.base_threshold),
            ("echo.min_threshold", self.echo.min_threshold),
            ("binding.deferred_similarity_threshold", self.binding.deferred_similarity_threshold),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!("{name} must be in [0, 1], got {value}")));
            }
        }

        if !(self.traversal.recency_horizon_hours > 0.0) {
            return Err(ConfigError::Invalid(
                "traversal.recency_horizon_hours must be positive".to_string(),
            ));
        }
        if !(self.traversal.emotion_match_boost >= 1.0) {
            return Err(ConfigError::Invalid(
                "traversal.emotion_match_boost must be at least 1".to_string(),
            ));
        }
        if self.actors.default_echo_window == 0 {
            return Err(ConfigError::Invalid(
                "actors.default_echo_window must be at least one turn".to_string(),
            ));
        }
        if self.echo.min_threshold > self.echo.base_threshold {
            return Err(ConfigError::Invalid(
                "echo.min_threshold must not exceed echo.base_threshold".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = NarrativeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.echo.min_threshold, 0.3);
        assert_eq!(config.traversal.recency_horizon_hours, 24.0);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = NarrativeConfig::from_toml_str(
            r#"
            seed = 42

            [traversal]
            emotional_weight = 0.6

            [actors]
            default_echo_window = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.seed, 42);
        assert_eq!(config.traversal.emotional_weight, 0.6);
        assert_eq!(config.traversal.recency_weight, 0.3);
        assert_eq!(config.actors.default_echo_window, 5);
        assert_eq!(config.binding.deferred_similarity_threshold, 0.5);
    }

    #[test]
    fn test_out_of_range_value_is_rejected() {
        let err = NarrativeConfig::from_toml_str("[echo]\nmin_threshold = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("echo.min_threshold")));
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        let err = NarrativeConfig::from_toml_str("[traversal\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_zero_echo_window_is_rejected() {
        let err =
            NarrativeConfig::from_toml_str("[actors]\ndefault_echo_window = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}

//! Engine configuration.
//!
//! Only language-agnostic knobs live here; `hanzi-pinyin` layers its own
//! options on top with `#[serde(flatten)]`.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for a composition engine and its collaborators.
///
/// Missing fields fall back to their defaults when deserializing.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Location of the persistent dictionary store
    pub dictionary_path: PathBuf,
    /// Location of the prediction model artifact
    pub model_path: PathBuf,

    /// Upper bound on the candidate list shown to the host (must be > 0)
    pub max_candidates: usize,
    pub enable_prediction: bool,
    pub enable_learning: bool,
    /// Prediction candidates scoring below this are discarded, in [0, 1]
    pub prediction_threshold: f64,

    // Prediction runtime
    /// Run model inference on a background worker instead of inline
    pub background_prediction: bool,
    /// Wall-clock budget handed to the model for one generation
    pub prediction_timeout_ms: u64,
    /// Token budget per prediction slot
    pub max_prediction_tokens: usize,
    /// Capacity of the per-engine input -> selection memory
    pub user_pattern_capacity: usize,

    /// Insert the built-in base vocabulary when opening the dictionary
    pub seed_system_dictionary: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dictionary_path: PathBuf::from("data/dictionary.redb"),
            model_path: PathBuf::from("models/phrase-model.bincode"),
            max_candidates: 9,
            enable_prediction: true,
            enable_learning: true,
            prediction_threshold: 0.5,
            background_prediction: false,
            prediction_timeout_ms: 300,
            max_prediction_tokens: 15,
            user_pattern_capacity: 1000,
            seed_system_dictionary: true,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Parse configuration from TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize configuration to TOML string.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_candidates == 0 {
            return Err(ConfigError::Invalid("max_candidates must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.prediction_threshold) {
            return Err(ConfigError::Invalid(format!(
                "prediction_threshold {} is outside [0, 1]",
                self.prediction_threshold
            )));
        }
        if self.user_pattern_capacity == 0 {
            return Err(ConfigError::Invalid(
                "user_pattern_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn prediction_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.prediction_timeout_ms)
    }
}

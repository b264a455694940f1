//! Pinyin-specific configuration that extends the base `EngineConfig` from core.
//!
//! This configuration includes:
//! - All generic options from `hanzi_core::EngineConfig` (flattened via serde)
//! - The prefix policy used while typing
//!
//! # Example
//!
//! ```rust
//! use hanzi_pinyin::PinyinConfig;
//!
//! let config = PinyinConfig::from_toml_str("max_candidates = 5\nallow_syllable_sequences = true").unwrap();
//! assert_eq!(config.base().max_candidates, 5);
//! assert!(config.allow_syllable_sequences);
//! ```

use hanzi_core::{ConfigError, EngineConfig, PrefixPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PinyinConfig {
    /// Base configuration fields (paths, limits, prediction knobs)
    #[serde(flatten)]
    pub base: EngineConfig,

    // Accept syllable sequences ("nihao") instead of stopping at a prefix of
    // one syllable ("ni").
    pub allow_syllable_sequences: bool,
}

impl PinyinConfig {
    /// Convert this pinyin config into the base config for `Engine::new()`
    pub fn into_base(self) -> EngineConfig {
        self.base
    }

    /// Get a reference to the base config
    pub fn base(&self) -> &EngineConfig {
        &self.base
    }

    /// Get a mutable reference to the base config
    pub fn base_mut(&mut self) -> &mut EngineConfig {
        &mut self.base
    }

    pub fn prefix_policy(&self) -> PrefixPolicy {
        if self.allow_syllable_sequences {
            PrefixPolicy::SyllableSequence
        } else {
            PrefixPolicy::SingleSyllable
        }
    }

    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        config.base.validate()?;
        Ok(config)
    }

    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

impl From<EngineConfig> for PinyinConfig {
    fn from(base: EngineConfig) -> Self {
        Self {
            base,
            allow_syllable_sequences: false,
        }
    }
}

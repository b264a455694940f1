//! hanzi-core
//!
//! Language-agnostic input-composition engine shared by romanization crates
//! (see `hanzi-pinyin`).
//!
//! Persistent vocabulary lives in `redb`, prediction models are opaque
//! artifacts behind a loader trait, and the engine ties them together as a
//! small state machine driven by host key events.
//!
//! Public API:
//! - `Segmenter` / `CompositionBuffer` - validated romanization buffer and segmentation
//! - `DictionaryStore` / `WordStore` - frequency-ranked persistent dictionary
//! - `PredictionAdapter` / `Predictor` - optional model-backed candidates
//! - `Engine` - composition state machine merging both sources
//! - `EngineConfig` - configuration shared by all of the above

pub mod candidate;
pub use candidate::{Candidate, CandidateList};

pub mod config;
pub use config::EngineConfig;

pub mod error;
pub use error::{ConfigError, DictionaryError, EngineError, PredictionError};

pub mod trie;
pub use trie::TrieNode;

pub mod segmenter;
pub use segmenter::{CompositionBuffer, PrefixPolicy, Segmenter, Segmentations, SyllableSet};

pub mod dictionary;
pub use dictionary::{
    DictionaryEntry, DictionaryFormat, DictionaryStats, DictionaryStore, WordStore,
};

pub mod model;
pub use model::{GenerationRequest, LanguageModel, ModelLoader, PhraseTable, PhraseTableLoader};

pub mod prediction;
pub use prediction::{PredictionAdapter, Predictor, UserPatternMemory};

pub mod worker;
pub use worker::{PredictionRequest, PredictionResponse, PredictionWorker};

pub mod engine;
pub use engine::{
    keys, CompositionUpdate, ConfigUpdate, Engine, InputEvent, InputEventKind, InputState,
    Modifiers,
};

/// Utility helpers.
pub mod utils {
    /// Normalize input strings (NFC) and trim whitespace.
    pub fn normalize(s: &str) -> String {
        use unicode_normalization::UnicodeNormalization;
        s.nfc().collect::<String>().trim().to_string()
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn normalize_composes_and_trims() {
            // "e" + combining acute accent composes to a single code point
            assert_eq!(normalize(" e\u{0301} "), "\u{00e9}");
            assert_eq!(normalize("你好"), "你好");
        }
    }
}

//! hanzi-pinyin crate root
//!
//! Pinyin front end for `hanzi-core`: the syllable inventory, a validated
//! pinyin buffer, the pinyin configuration and `PinyinIme`, which opens the
//! dictionary and model and assembles a ready composition engine.
//!
//! Public API exported here:
//! - `PinyinBuffer` and `normalize_pinyin` from `buffer`
//! - `PinyinConfig` from `config`
//! - `PinyinIme` and `PinyinEngine` from `engine`
//! - `PINYIN_SYLLABLES` and `pinyin_syllables` from `syllables`

pub mod buffer;
pub mod config;
pub mod engine;
pub mod syllables;

// Core types callers need to drive the engine.
pub use hanzi_core::{
    keys, Candidate, CompositionBuffer, CompositionUpdate, ConfigUpdate, DictionaryStore,
    EngineConfig, EngineError, InputEvent, InputState, Modifiers, PrefixPolicy,
};

pub use buffer::{normalize_pinyin, PinyinBuffer};
pub use config::PinyinConfig;
pub use engine::{PinyinEngine, PinyinIme};
pub use syllables::{pinyin_syllables, PINYIN_SYLLABLES};

/// Install a stderr `tracing` subscriber filtered by `RUST_LOG`
/// (default `info`). Safe to call more than once.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

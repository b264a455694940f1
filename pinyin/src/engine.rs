//! Pinyin engine assembly.
//!
//! Opens the persistent dictionary, loads the optional phrase model and
//! wires both into a `hanzi_core::Engine` driving a `PinyinBuffer`.

use crate::buffer::PinyinBuffer;
use crate::config::PinyinConfig;
use hanzi_core::{
    DictionaryStore, Engine, EngineError, PhraseTableLoader, PredictionAdapter, Predictor,
    WordStore,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Composition engine over pinyin input.
pub type PinyinEngine = Engine<PinyinBuffer>;

/// A ready-to-use pinyin input method: the engine plus handles to the
/// collaborators it was built with.
pub struct PinyinIme {
    engine: PinyinEngine,
    dictionary: Arc<DictionaryStore>,
    predictor: Arc<PredictionAdapter>,
}

impl PinyinIme {
    /// Build the input method described by `config`.
    ///
    /// A dictionary that cannot be opened is fatal. A missing or broken
    /// prediction model is not; prediction just stays unavailable until a
    /// model is loaded.
    pub fn open(config: PinyinConfig) -> Result<Self, EngineError> {
        let policy = config.prefix_policy();
        let base = config.into_base();
        base.validate()?;

        let dictionary = Arc::new(DictionaryStore::open(&base.dictionary_path)?);
        if base.seed_system_dictionary {
            let seeded = dictionary.seed_system_words()?;
            debug!(seeded, "system vocabulary ready");
        }

        let predictor = Arc::new(PredictionAdapter::from_config(
            Arc::new(PhraseTableLoader),
            &base,
        ));
        info!(
            dictionary = %base.dictionary_path.display(),
            prediction = predictor.is_available(),
            "pinyin engine ready"
        );

        let engine = Engine::new(
            base,
            PinyinBuffer::with_policy(policy),
            Arc::clone(&dictionary) as Arc<dyn WordStore>,
            Some(Arc::clone(&predictor) as Arc<dyn Predictor>),
        )?;

        Ok(Self {
            engine,
            dictionary,
            predictor,
        })
    }

    pub fn engine(&self) -> &PinyinEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut PinyinEngine {
        &mut self.engine
    }

    /// The store backing dictionary candidates, for maintenance calls.
    pub fn dictionary(&self) -> &Arc<DictionaryStore> {
        &self.dictionary
    }

    pub fn predictor(&self) -> &Arc<PredictionAdapter> {
        &self.predictor
    }

    pub fn into_engine(self) -> PinyinEngine {
        self.engine
    }
}

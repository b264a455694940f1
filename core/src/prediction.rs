//! Prediction adapter: wraps a local language model as a candidate source.
//!
//! Prediction is an enhancement layer. Without a loaded model every query
//! returns nothing and every mutation is a no-op, so composition never
//! depends on it.

use crate::candidate::Candidate;
use crate::config::EngineConfig;
use crate::error::PredictionError;
use crate::model::{GenerationRequest, LanguageModel, ModelLoader};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const BASE_SCORE: f64 = 0.6;
pub const USER_PATTERN_BONUS: f64 = 0.3;
pub const CONTEXT_BONUS: f64 = 0.1;

/// Build the generation prompt for a romanization and its context.
pub fn build_prompt(romanization: &str, context: &str) -> String {
    format!(
        "根据拼音'{}'和上下文'{}'，预测可能的中文词汇：",
        romanization, context
    )
}

fn is_cjk(ch: char) -> bool {
    matches!(ch,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2A6DF}'
        | '\u{2A700}'..='\u{2EBEF}'
        | '\u{30000}'..='\u{3134F}')
}

/// Split raw model output into distinct runs of CJK ideographs, in order.
pub fn extract_candidates(output: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut current = String::new();
    for ch in output.trim().chars() {
        if is_cjk(ch) {
            current.push(ch);
        } else if !current.is_empty() {
            let run = std::mem::take(&mut current);
            if !out.contains(&run) {
                out.push(run);
            }
        }
    }
    if !current.is_empty() && !out.contains(&current) {
        out.push(current);
    }
    out
}

/// Input sequence -> texts the user picked for it, bounded; the least
/// recently recorded input is evicted first.
#[derive(Debug)]
pub struct UserPatternMemory {
    entries: LruCache<String, Vec<String>>,
}

impl UserPatternMemory {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(cap),
        }
    }

    pub fn record(&mut self, input: &str, selected: &str) {
        if input.is_empty() || selected.is_empty() {
            return;
        }
        match self.entries.get_mut(input) {
            Some(texts) => {
                if !texts.iter().any(|t| t == selected) {
                    texts.push(selected.to_string());
                }
            }
            None => {
                self.entries.put(input.to_string(), vec![selected.to_string()]);
            }
        }
    }

    /// Lookups do not refresh recency.
    pub fn contains(&self, input: &str, selected: &str) -> bool {
        self.entries
            .peek(input)
            .is_some_and(|texts| texts.iter().any(|t| t == selected))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// The prediction operations the composition engine relies on.
pub trait Predictor: Send + Sync {
    fn is_available(&self) -> bool;

    /// Scored candidates for `romanization`, already filtered by threshold.
    fn predict(&self, romanization: &str, context: &str, max_predictions: usize) -> Vec<Candidate>;

    fn learn_pattern(&self, input: &str, selected: &str);

    fn set_threshold(&self, threshold: f64);

    /// Swap the model. `false` leaves the previous model active.
    fn reload_model(&self, path: &Path) -> bool;
}

struct LoadedModel {
    path: PathBuf,
    model: Box<dyn LanguageModel>,
}

/// Model-backed candidate source with a threshold and pattern memory.
pub struct PredictionAdapter {
    loader: Arc<dyn ModelLoader>,
    model: RwLock<Option<LoadedModel>>,
    threshold: RwLock<f64>,
    patterns: Mutex<UserPatternMemory>,
    tokens_per_prediction: usize,
    timeout: Duration,
}

impl std::fmt::Debug for PredictionAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionAdapter")
            .field("model", &self.model_info())
            .field("threshold", &self.threshold())
            .finish()
    }
}

impl PredictionAdapter {
    /// Adapter with no model loaded; call `load_model` to enable it.
    pub fn new(loader: Arc<dyn ModelLoader>, config: &EngineConfig) -> Self {
        Self {
            loader,
            model: RwLock::new(None),
            threshold: RwLock::new(config.prediction_threshold.clamp(0.0, 1.0)),
            patterns: Mutex::new(UserPatternMemory::new(config.user_pattern_capacity)),
            tokens_per_prediction: config.max_prediction_tokens.max(1),
            timeout: config.prediction_timeout(),
        }
    }

    /// Adapter that tries `config.model_path` and stays unavailable if it
    /// cannot be loaded.
    pub fn from_config(loader: Arc<dyn ModelLoader>, config: &EngineConfig) -> Self {
        let adapter = Self::new(loader, config);
        if let Err(e) = adapter.load_model(&config.model_path) {
            warn!(error = %e, "prediction disabled");
        }
        adapter
    }

    /// Load a model, replacing any current one.
    pub fn load_model<P: AsRef<Path>>(&self, path: P) -> Result<(), PredictionError> {
        let path = path.as_ref();
        let model = self.loader.load(path)?;
        info!(path = %path.display(), model = %model.describe(), "prediction model ready");
        *self.model.write().unwrap_or_else(PoisonError::into_inner) = Some(LoadedModel {
            path: path.to_path_buf(),
            model,
        });
        Ok(())
    }

    /// Swap to the model at `path`.
    ///
    /// The same path as the active model is a successful no-op. On failure
    /// the active model stays in place.
    pub fn update_model<P: AsRef<Path>>(&self, path: P) -> Result<(), PredictionError> {
        let path = path.as_ref();
        let unchanged = self
            .model
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|m| m.path == path);
        if unchanged {
            return Ok(());
        }
        self.load_model(path)
    }

    /// Drop the active model; prediction becomes unavailable.
    pub fn unload(&self) {
        if self.model.write().unwrap_or_else(PoisonError::into_inner).take().is_some() {
            info!("prediction model unloaded");
        }
    }

    pub fn is_available(&self) -> bool {
        self.model.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    pub fn model_path(&self) -> Option<PathBuf> {
        self.model
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|m| m.path.clone())
    }

    /// Description of the loaded model, `None` when unavailable.
    pub fn model_info(&self) -> Option<String> {
        self.model
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|m| format!("{} from {}", m.model.describe(), m.path.display()))
    }

    pub fn threshold(&self) -> f64 {
        *self.threshold.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clamped to [0, 1].
    pub fn set_threshold(&self, threshold: f64) {
        let value = if threshold.is_nan() { 0.0 } else { threshold.clamp(0.0, 1.0) };
        *self.threshold.write().unwrap_or_else(PoisonError::into_inner) = value;
    }

    fn generate(&self, romanization: &str, context: &str, max_predictions: usize) -> Option<String> {
        let guard = self.model.read().unwrap_or_else(PoisonError::into_inner);
        let loaded = guard.as_ref()?;
        let prompt = build_prompt(romanization, context);
        let request = GenerationRequest {
            prompt: &prompt,
            romanization,
            context,
            max_tokens: max_predictions.saturating_mul(self.tokens_per_prediction),
            timeout: self.timeout,
        };
        match loaded.model.generate(&request) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(romanization, error = %e, "model inference failed");
                None
            }
        }
    }

    fn score(&self, romanization: &str, context: &str, text: &str) -> f64 {
        let mut score = BASE_SCORE;
        let patterns = self.patterns.lock().unwrap_or_else(PoisonError::into_inner);
        if patterns.contains(romanization, text) {
            score += USER_PATTERN_BONUS;
        }
        if !context.contains(text) {
            score += CONTEXT_BONUS;
        }
        score.min(1.0)
    }

    /// Predicted candidates for `romanization`, scored and filtered by the
    /// threshold, at most `max_predictions` of them.
    pub fn predict_from_romanization(
        &self,
        romanization: &str,
        context: &str,
        max_predictions: usize,
    ) -> Vec<Candidate> {
        if max_predictions == 0 {
            return Vec::new();
        }
        let Some(output) = self.generate(romanization, context, max_predictions) else {
            return Vec::new();
        };
        let threshold = self.threshold();
        extract_candidates(&output)
            .into_iter()
            .map(|text| {
                let score = self.score(romanization, context, &text);
                Candidate::predicted(text, romanization, score)
            })
            .filter(|c| c.score >= threshold)
            .take(max_predictions)
            .collect()
    }

    /// Likely text following `context`.
    pub fn predict_next_words(&self, context: &str, max_predictions: usize) -> Vec<String> {
        if context.is_empty() {
            return Vec::new();
        }
        self.predict_from_romanization("", context, max_predictions)
            .into_iter()
            .map(|c| c.text)
            .collect()
    }

    /// Completions for a partially typed romanization.
    pub fn complete_partial_input(&self, partial: &str, max_completions: usize) -> Vec<String> {
        if partial.is_empty() {
            return Vec::new();
        }
        self.predict_from_romanization(partial, "", max_completions)
            .into_iter()
            .map(|c| c.text)
            .collect()
    }

    /// Remember that `selected` was chosen for `input`. No-op without a model.
    pub fn learn_user_pattern(&self, input: &str, selected: &str) {
        if !self.is_available() {
            return;
        }
        self.patterns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(input, selected);
        debug!(input, selected, "user pattern recorded");
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Predictor for PredictionAdapter {
    fn is_available(&self) -> bool {
        PredictionAdapter::is_available(self)
    }

    fn predict(&self, romanization: &str, context: &str, max_predictions: usize) -> Vec<Candidate> {
        self.predict_from_romanization(romanization, context, max_predictions)
    }

    fn learn_pattern(&self, input: &str, selected: &str) {
        self.learn_user_pattern(input, selected);
    }

    fn set_threshold(&self, threshold: f64) {
        PredictionAdapter::set_threshold(self, threshold);
    }

    fn reload_model(&self, path: &Path) -> bool {
        match self.update_model(path) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "model swap failed, keeping current model");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Returns canned output per romanization.
    struct CannedModel {
        name: String,
        outputs: HashMap<String, String>,
    }

    impl LanguageModel for CannedModel {
        fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, PredictionError> {
            match self.outputs.get(request.romanization) {
                Some(text) => Ok(text.clone()),
                None => Err(PredictionError::Inference("no output".into())),
            }
        }

        fn describe(&self) -> String {
            self.name.clone()
        }
    }

    /// Serves models for paths containing "good"; everything else is missing.
    struct CannedLoader;

    impl ModelLoader for CannedLoader {
        fn load(&self, path: &Path) -> Result<Box<dyn LanguageModel>, PredictionError> {
            let name = path.display().to_string();
            if !name.contains("good") {
                return Err(PredictionError::ModelNotFound(path.to_path_buf()));
            }
            let mut outputs = HashMap::new();
            outputs.insert("nihao".to_string(), "你好，你好吗 nihao 你们".to_string());
            outputs.insert(String::new(), "世界".to_string());
            Ok(Box::new(CannedModel { name, outputs }))
        }
    }

    fn adapter() -> PredictionAdapter {
        let adapter = PredictionAdapter::new(Arc::new(CannedLoader), &EngineConfig::default());
        adapter.load_model("models/good-a").unwrap();
        adapter
    }

    #[test]
    fn unavailable_adapter_degrades_silently() {
        let adapter = PredictionAdapter::new(Arc::new(CannedLoader), &EngineConfig::default());
        assert!(!adapter.is_available());
        assert!(adapter.predict_from_romanization("nihao", "", 5).is_empty());
        adapter.learn_user_pattern("nihao", "你好");
        assert_eq!(adapter.pattern_count(), 0);
        assert!(adapter.model_info().is_none());
    }

    #[test]
    fn from_config_with_missing_model_is_unavailable() {
        let mut cfg = EngineConfig::default();
        cfg.model_path = PathBuf::from("models/missing.bin");
        let adapter = PredictionAdapter::from_config(Arc::new(CannedLoader), &cfg);
        assert!(!adapter.is_available());
    }

    #[test]
    fn output_is_split_into_cjk_runs() {
        assert_eq!(
            extract_candidates("  你好，你好吗 nihao 你们 你好 "),
            vec!["你好", "你好吗", "你们"]
        );
        assert!(extract_candidates("abc 123").is_empty());
    }

    #[test]
    fn scores_include_pattern_and_context_bonus() {
        let adapter = adapter();
        let preds = adapter.predict_from_romanization("nihao", "", 5);
        assert_eq!(preds.len(), 3);
        assert!(preds.iter().all(|c| c.is_prediction && c.romanization == "nihao"));
        assert!((preds[0].score - 0.7).abs() < 1e-9);

        adapter.learn_user_pattern("nihao", "你们");
        let preds = adapter.predict_from_romanization("nihao", "", 5);
        let ours = preds.iter().find(|c| c.text == "你们").unwrap();
        assert!((ours.score - 1.0).abs() < 1e-9);

        // already present in the context: no context bonus
        let preds = adapter.predict_from_romanization("nihao", "你好", 5);
        let hello = preds.iter().find(|c| c.text == "你好").unwrap();
        assert!((hello.score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn threshold_filters_and_is_clamped() {
        let adapter = adapter();
        adapter.set_threshold(0.8);
        assert!(adapter.predict_from_romanization("nihao", "", 5).is_empty());

        adapter.set_threshold(7.0);
        assert_eq!(adapter.threshold(), 1.0);
        adapter.set_threshold(-1.0);
        assert_eq!(adapter.threshold(), 0.0);
    }

    #[test]
    fn max_predictions_is_respected() {
        let adapter = adapter();
        assert_eq!(adapter.predict_from_romanization("nihao", "", 2).len(), 2);
        assert!(adapter.predict_from_romanization("nihao", "", 0).is_empty());
    }

    #[test]
    fn inference_failure_yields_nothing() {
        let adapter = adapter();
        assert!(adapter.predict_from_romanization("zzz", "", 5).is_empty());
    }

    #[test]
    fn update_model_keeps_old_model_on_failure() {
        let adapter = adapter();
        assert!(adapter.update_model("models/good-a").is_ok());
        assert!(adapter.update_model("models/missing").is_err());
        assert_eq!(adapter.model_path(), Some(PathBuf::from("models/good-a")));

        assert!(adapter.update_model("models/good-b").is_ok());
        assert_eq!(adapter.model_path(), Some(PathBuf::from("models/good-b")));

        adapter.unload();
        assert!(!adapter.is_available());
    }

    #[test]
    fn next_words_and_completion_helpers() {
        let adapter = adapter();
        assert_eq!(adapter.predict_next_words("你好", 3), vec!["世界"]);
        assert!(adapter.predict_next_words("", 3).is_empty());
        assert_eq!(adapter.complete_partial_input("nihao", 1), vec!["你好"]);
    }

    #[test]
    fn pattern_memory_evicts_oldest() {
        let mut memory = UserPatternMemory::new(2);
        memory.record("a", "啊");
        memory.record("b", "吧");
        memory.record("a", "阿");
        memory.record("c", "从");

        assert_eq!(memory.len(), 2);
        assert!(memory.contains("a", "啊"));
        assert!(memory.contains("a", "阿"));
        assert!(!memory.contains("b", "吧"));
        assert!(memory.contains("c", "从"));
    }
}

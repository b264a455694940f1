//! Composition engine: the Idle / Composing / Selecting state machine.
//!
//! The engine owns the romanization buffer and the current candidate list.
//! Dictionary and predictor handles are injected and shared. Every buffer
//! mutation bumps a generation counter; background predictions are applied
//! only while their generation is still current.

use crate::candidate::{Candidate, CandidateList};
use crate::config::EngineConfig;
use crate::dictionary::WordStore;
use crate::error::ConfigError;
use crate::prediction::Predictor;
use crate::segmenter::CompositionBuffer;
use crate::worker::{PredictionRequest, PredictionWorker};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Key codes with special meaning while composing.
pub mod keys {
    pub const BACKSPACE: u32 = 8;
    pub const ENTER: u32 = 13;
    pub const ESCAPE: u32 = 27;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InputState {
    /// Empty buffer.
    #[default]
    Idle,
    /// Buffer non-empty, no candidates yet.
    Composing,
    /// Buffer non-empty with at least one candidate.
    Selecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEventKind {
    KeyPress,
    CandidateSelect,
    CommitText,
    ClearComposition,
}

/// An event delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputEvent {
    pub kind: InputEventKind,
    pub payload: String,
    pub key_code: u32,
    pub modifiers: Modifiers,
}

impl InputEvent {
    /// Key press identified by its code only.
    pub fn key(key_code: u32) -> Self {
        Self {
            kind: InputEventKind::KeyPress,
            payload: String::new(),
            key_code,
            modifiers: Modifiers::default(),
        }
    }

    /// Key press for a printable character.
    pub fn char(ch: char) -> Self {
        Self {
            kind: InputEventKind::KeyPress,
            payload: ch.to_string(),
            key_code: ch as u32,
            modifiers: Modifiers::default(),
        }
    }

    /// Select the candidate at a 0-based index.
    pub fn select(index: usize) -> Self {
        Self {
            kind: InputEventKind::CandidateSelect,
            payload: index.to_string(),
            key_code: 0,
            modifiers: Modifiers::default(),
        }
    }

    /// Host-forced commit of `text`.
    pub fn commit<S: Into<String>>(text: S) -> Self {
        Self {
            kind: InputEventKind::CommitText,
            payload: text.into(),
            key_code: 0,
            modifiers: Modifiers::default(),
        }
    }

    pub fn clear() -> Self {
        Self {
            kind: InputEventKind::ClearComposition,
            payload: String::new(),
            key_code: 0,
            modifiers: Modifiers::default(),
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// The character this key press stands for, from the key code or the payload.
    fn key_char(&self) -> Option<char> {
        if self.key_code != 0 {
            return char::from_u32(self.key_code);
        }
        let mut chars = self.payload.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => Some(ch),
            _ => None,
        }
    }
}

/// Result of one `process_input` call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompositionUpdate {
    /// Whether the engine consumed the event.
    pub handled: bool,
    /// Text committed while handling the event.
    pub committed: Option<String>,
    /// Candidate list after the event.
    pub candidates: Vec<Candidate>,
    pub state: InputState,
}

/// What `update_config` did beyond storing the new values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigUpdate {
    /// `Some(success)` when `model_path` changed and a swap was attempted.
    pub model_reloaded: Option<bool>,
    /// `dictionary_path` changed; the injected store is not reopened.
    pub dictionary_reopen_required: bool,
}

pub type CandidateCallback = Box<dyn FnMut(&[Candidate])>;
pub type CommitCallback = Box<dyn FnMut(&str)>;
pub type StateChangeCallback = Box<dyn FnMut(InputState)>;

/// Composition engine over a romanization buffer `B`.
pub struct Engine<B: CompositionBuffer> {
    config: EngineConfig,
    buffer: B,
    dictionary: Arc<dyn WordStore>,
    predictor: Option<Arc<dyn Predictor>>,
    worker: Option<PredictionWorker>,
    candidates: CandidateList,
    /// Dictionary part of the current list, kept to merge late predictions.
    dictionary_results: Vec<Candidate>,
    state: InputState,
    generation: u64,
    last_commit: Option<String>,
    on_candidates: Option<CandidateCallback>,
    on_commit: Option<CommitCallback>,
    on_state_change: Option<StateChangeCallback>,
}

impl<B: CompositionBuffer> Engine<B> {
    /// Build an engine. Only an invalid configuration is rejected; a missing
    /// or unavailable predictor just disables prediction.
    pub fn new(
        config: EngineConfig,
        buffer: B,
        dictionary: Arc<dyn WordStore>,
        predictor: Option<Arc<dyn Predictor>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if let Some(p) = &predictor {
            p.set_threshold(config.prediction_threshold);
        }
        let mut engine = Self {
            config,
            buffer,
            dictionary,
            predictor,
            worker: None,
            candidates: CandidateList::new(),
            dictionary_results: Vec::new(),
            state: InputState::Idle,
            generation: 0,
            last_commit: None,
            on_candidates: None,
            on_commit: None,
            on_state_change: None,
        };
        engine.sync_worker();
        Ok(engine)
    }

    // ========== Callbacks ==========

    pub fn set_candidate_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&[Candidate]) + 'static,
    {
        self.on_candidates = Some(Box::new(callback));
    }

    pub fn set_commit_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&str) + 'static,
    {
        self.on_commit = Some(Box::new(callback));
    }

    pub fn set_state_change_callback<F>(&mut self, callback: F)
    where
        F: FnMut(InputState) + 'static,
    {
        self.on_state_change = Some(Box::new(callback));
    }

    // ========== Accessors ==========

    pub fn state(&self) -> InputState {
        self.state
    }

    /// Raw buffer text.
    pub fn composition(&self) -> &str {
        self.buffer.text()
    }

    pub fn candidates(&self) -> &[Candidate] {
        self.candidates.as_slice()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    /// Counter bumped by every buffer mutation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Syllable decompositions of the current buffer.
    pub fn segments(&self) -> Vec<Vec<String>> {
        self.buffer.segments().collect()
    }

    pub fn is_prediction_available(&self) -> bool {
        self.config.enable_prediction && self.predictor.as_ref().is_some_and(|p| p.is_available())
    }

    // ========== Event dispatch ==========

    pub fn process_input(&mut self, event: &InputEvent) -> CompositionUpdate {
        self.last_commit = None;
        let handled = match event.kind {
            InputEventKind::KeyPress => self.handle_key(event),
            InputEventKind::CandidateSelect => match event.payload.trim().parse::<usize>() {
                Ok(index) => self.select_candidate(index),
                Err(_) => {
                    debug!(payload = %event.payload, "unparseable candidate index");
                    false
                }
            },
            InputEventKind::CommitText => {
                self.emit_commit(&event.payload);
                self.clear_composition();
                true
            }
            InputEventKind::ClearComposition => {
                self.clear_composition();
                true
            }
        };
        CompositionUpdate {
            handled,
            committed: self.last_commit.take(),
            candidates: self.candidates.as_slice().to_vec(),
            state: self.state,
        }
    }

    fn handle_key(&mut self, event: &InputEvent) -> bool {
        // shortcuts belong to the host
        if event.modifiers.ctrl || event.modifiers.alt {
            return false;
        }
        match event.key_code {
            keys::BACKSPACE => {
                if !self.buffer.remove_last_char() {
                    return false;
                }
                self.buffer_changed();
                true
            }
            keys::ESCAPE => {
                self.clear_composition();
                true
            }
            keys::ENTER => self.commit_composition().is_some(),
            _ => match event.key_char() {
                Some(ch @ '1'..='9') => {
                    if self.state == InputState::Idle {
                        return false;
                    }
                    self.select_candidate(ch as usize - '1' as usize)
                }
                Some(ch) if ch.is_ascii_alphabetic() => {
                    if !self.buffer.add_char(ch.to_ascii_lowercase()) {
                        return false;
                    }
                    self.buffer_changed();
                    true
                }
                _ => false,
            },
        }
    }

    fn buffer_changed(&mut self) {
        self.generation += 1;
        if self.buffer.is_empty() {
            self.reset();
            return;
        }
        if self.state == InputState::Idle {
            self.set_state(InputState::Composing);
        }
        self.update_candidates();
    }

    // ========== Candidates ==========

    fn update_candidates(&mut self) {
        let composition = self.buffer.text().to_string();
        let max = self.config.max_candidates;

        self.dictionary_results = self.dictionary.search(&composition, max);
        let mut list = CandidateList::from_candidates(self.dictionary_results.clone());

        if self.is_prediction_available() {
            let slots = max.saturating_sub(list.len()).max(1);
            match (&self.worker, &self.predictor) {
                (Some(worker), _) => {
                    let queued = worker.submit(PredictionRequest {
                        generation: self.generation,
                        romanization: composition.clone(),
                        context: String::new(),
                        max_predictions: slots,
                    });
                    if !queued {
                        warn!("prediction worker unavailable");
                    }
                }
                (None, Some(predictor)) => {
                    let predictions = predictor.predict(&composition, "", slots);
                    self.merge_predictions(&mut list, predictions);
                }
                (None, None) => {}
            }
        }

        self.publish(list);
    }

    fn merge_predictions(&self, list: &mut CandidateList, predictions: Vec<Candidate>) {
        let threshold = self.config.prediction_threshold;
        list.extend_unique(predictions.into_iter().filter(|c| c.score >= threshold));
    }

    fn publish(&mut self, mut list: CandidateList) {
        list.rank(self.config.max_candidates);
        self.candidates = list;
        let next = if self.candidates.is_empty() {
            InputState::Composing
        } else {
            InputState::Selecting
        };
        self.set_state(next);
        self.notify_candidates();
    }

    /// Apply finished background predictions without blocking.
    ///
    /// Returns whether the candidate list changed. Results for a buffer that
    /// has since changed are dropped.
    pub fn poll_predictions(&mut self) -> bool {
        let mut current = None;
        if let Some(worker) = &self.worker {
            while let Some(resp) = worker.try_next() {
                if resp.generation == self.generation {
                    current = Some(resp.candidates);
                } else {
                    debug!(stale = resp.generation, current = self.generation, "dropping stale predictions");
                }
            }
        }
        match current {
            Some(predictions) => self.apply_predictions(predictions),
            None => false,
        }
    }

    /// Wait up to `timeout` for predictions matching the current buffer.
    pub fn wait_for_predictions(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            let resp = match &self.worker {
                Some(worker) => worker.next_timeout(remaining),
                None => return false,
            };
            match resp {
                Some(resp) if resp.generation == self.generation => {
                    return self.apply_predictions(resp.candidates);
                }
                Some(resp) => {
                    debug!(stale = resp.generation, current = self.generation, "dropping stale predictions");
                }
                None => return false,
            }
        }
    }

    fn apply_predictions(&mut self, predictions: Vec<Candidate>) -> bool {
        if self.buffer.is_empty() || predictions.is_empty() {
            return false;
        }
        let mut list = CandidateList::from_candidates(self.dictionary_results.clone());
        self.merge_predictions(&mut list, predictions);
        self.publish(list);
        true
    }

    // ========== Selection and commit ==========

    /// Commit the candidate at `index` (0-based).
    ///
    /// Out of range is a no-op returning `false`.
    pub fn select_candidate(&mut self, index: usize) -> bool {
        let Some(candidate) = self.candidates.get(index).cloned() else {
            return false;
        };
        if self.config.enable_learning {
            self.learn_selection(&candidate);
        }
        self.emit_commit(&candidate.text);
        self.clear_composition();
        true
    }

    fn learn_selection(&self, candidate: &Candidate) {
        if candidate.is_prediction {
            if let Some(syllables) = self.buffer.best_segmentation() {
                self.dictionary.learn(&candidate.text, &syllables);
            }
        } else {
            self.dictionary.record_selection(&candidate.text, &candidate.romanization);
        }
        if let Some(predictor) = &self.predictor {
            if predictor.is_available() {
                predictor.learn_pattern(self.buffer.text(), &candidate.text);
            }
        }
    }

    /// Commit the raw buffer text. Returns it, or `None` for an empty buffer.
    pub fn commit_composition(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let text = self.buffer.text().to_string();
        self.emit_commit(&text);
        self.clear_composition();
        Some(text)
    }

    /// Drop buffer and candidates and return to `Idle`.
    ///
    /// Always notifies both the candidate and state callbacks.
    pub fn clear_composition(&mut self) {
        self.buffer.clear();
        self.generation += 1;
        self.candidates.clear();
        self.dictionary_results.clear();
        self.state = InputState::Idle;
        self.notify_candidates();
        if let Some(cb) = self.on_state_change.as_mut() {
            cb(InputState::Idle);
        }
    }

    /// Buffer emptied by editing: hide candidates, go idle.
    fn reset(&mut self) {
        self.candidates.clear();
        self.dictionary_results.clear();
        self.notify_candidates();
        self.set_state(InputState::Idle);
    }

    fn emit_commit(&mut self, text: &str) {
        self.last_commit = Some(text.to_string());
        if let Some(cb) = self.on_commit.as_mut() {
            cb(text);
        }
    }

    fn notify_candidates(&mut self) {
        if let Some(cb) = self.on_candidates.as_mut() {
            cb(self.candidates.as_slice());
        }
    }

    fn set_state(&mut self, state: InputState) {
        if self.state == state {
            return;
        }
        self.state = state;
        if let Some(cb) = self.on_state_change.as_mut() {
            cb(state);
        }
    }

    // ========== Configuration ==========

    /// Replace the configuration.
    ///
    /// Numeric and boolean knobs apply at once and the current candidates are
    /// recomputed. A new `model_path` is hot-swapped through the predictor.
    /// A new `dictionary_path` is stored but the injected store stays open;
    /// the report asks the caller to rebuild the engine.
    pub fn update_config(&mut self, config: EngineConfig) -> Result<ConfigUpdate, ConfigError> {
        config.validate()?;
        let mut report = ConfigUpdate::default();

        if let Some(predictor) = &self.predictor {
            predictor.set_threshold(config.prediction_threshold);
            if config.model_path != self.config.model_path {
                report.model_reloaded = Some(predictor.reload_model(&config.model_path));
            }
        }
        if config.dictionary_path != self.config.dictionary_path {
            warn!(
                path = %config.dictionary_path.display(),
                "dictionary path changed; the open store is kept until the engine is rebuilt"
            );
            report.dictionary_reopen_required = true;
        }

        self.config = config;
        self.sync_worker();

        if !self.buffer.is_empty() {
            self.generation += 1;
            self.update_candidates();
        }
        Ok(report)
    }

    /// Start or stop the background worker to match the config.
    fn sync_worker(&mut self) {
        let wanted = self.config.background_prediction
            && self.config.enable_prediction
            && self.predictor.is_some();
        match (wanted, self.worker.is_some()) {
            (true, false) => {
                if let Some(predictor) = &self.predictor {
                    match PredictionWorker::spawn(Arc::clone(predictor)) {
                        Ok(worker) => self.worker = Some(worker),
                        Err(e) => warn!(error = %e, "cannot start prediction worker, predicting inline"),
                    }
                }
            }
            (false, true) => self.worker = None,
            _ => {}
        }
    }
}

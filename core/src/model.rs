//! Model-inference backends for the prediction adapter.
//!
//! The adapter only sees `LanguageModel` and `ModelLoader`. `PhraseTable` is
//! the built-in local backend: a bincode artifact mapping romanizations to
//! weighted phrases plus phrase-to-phrase continuations. Heavier inference
//! engines plug in by implementing the same two traits.

use crate::dictionary::compact_romanization;
use crate::error::PredictionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::info;

/// Everything a backend may condition a generation on.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    /// Rendered prompt for text-generation backends.
    pub prompt: &'a str,
    pub romanization: &'a str,
    pub context: &'a str,
    /// Upper bound on generated tokens.
    pub max_tokens: usize,
    /// Wall-clock budget; backends return what they have when it runs out.
    pub timeout: Duration,
}

/// A loaded model able to produce candidate text.
pub trait LanguageModel: Send + Sync {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, PredictionError>;

    /// Short human-readable description for diagnostics.
    fn describe(&self) -> String;
}

/// Opens model artifacts from disk.
pub trait ModelLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Box<dyn LanguageModel>, PredictionError>;
}

/// Weighted phrase table used as the default local predictor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhraseTable {
    pub name: String,
    /// compact romanization -> (phrase, weight)
    phrases: BTreeMap<String, Vec<(String, u32)>>,
    /// phrase -> (following phrase, weight)
    continuations: BTreeMap<String, Vec<(String, u32)>>,
}

fn add_weighted(list: &mut Vec<(String, u32)>, text: &str, weight: u32) {
    match list.iter_mut().find(|(t, _)| t == text) {
        Some(entry) => entry.1 = entry.1.saturating_add(weight),
        None => list.push((text.to_string(), weight)),
    }
}

impl PhraseTable {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Register `phrase` under `romanization`; weights accumulate.
    pub fn insert_phrase(&mut self, romanization: &str, phrase: &str, weight: u32) {
        let key = compact_romanization(romanization);
        if key.is_empty() || phrase.is_empty() {
            return;
        }
        add_weighted(self.phrases.entry(key).or_default(), phrase, weight);
    }

    /// Register `next` as a continuation of `previous`.
    pub fn insert_continuation(&mut self, previous: &str, next: &str, weight: u32) {
        if previous.is_empty() || next.is_empty() {
            return;
        }
        add_weighted(
            self.continuations.entry(previous.to_string()).or_default(),
            next,
            weight,
        );
    }

    pub fn reading_count(&self) -> usize {
        self.phrases.len()
    }

    pub fn continuation_count(&self) -> usize {
        self.continuations.len()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), PredictionError> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PredictionError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(bincode::deserialize_from(reader)?)
    }

    /// Phrases for a romanization prefix: exact readings first, then by weight.
    fn by_reading(&self, romanization: &str) -> Vec<&str> {
        let key = compact_romanization(romanization);
        if key.is_empty() {
            return Vec::new();
        }
        let mut hits: Vec<(bool, u32, &str)> = Vec::new();
        for (reading, list) in self.phrases.range(key.clone()..) {
            if !reading.starts_with(&key) {
                break;
            }
            let exact = *reading == key;
            hits.extend(list.iter().map(|(t, w)| (exact, *w, t.as_str())));
        }
        hits.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)).then(a.2.cmp(b.2)));
        hits.into_iter().map(|(_, _, t)| t).collect()
    }

    /// Continuations of the longest context suffix the table knows.
    fn by_context(&self, context: &str) -> Vec<&str> {
        let offsets: Vec<usize> = context.char_indices().map(|(i, _)| i).collect();
        for start in offsets {
            if let Some(list) = self.continuations.get(&context[start..]) {
                let mut hits: Vec<&(String, u32)> = list.iter().collect();
                hits.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
                return hits.into_iter().map(|(t, _)| t.as_str()).collect();
            }
        }
        Vec::new()
    }
}

impl LanguageModel for PhraseTable {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, PredictionError> {
        let started = Instant::now();
        let ranked = if request.romanization.is_empty() {
            self.by_context(request.context)
        } else {
            self.by_reading(request.romanization)
        };

        let mut out = String::new();
        let mut tokens = 0;
        for text in ranked {
            if started.elapsed() >= request.timeout {
                break;
            }
            let cost = text.chars().count();
            if tokens + cost > request.max_tokens {
                break;
            }
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(text);
            tokens += cost;
        }
        Ok(out)
    }

    fn describe(&self) -> String {
        format!(
            "phrase table '{}' ({} readings, {} continuations)",
            self.name,
            self.reading_count(),
            self.continuation_count()
        )
    }
}

/// Loads bincode `PhraseTable` artifacts.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhraseTableLoader;

impl ModelLoader for PhraseTableLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn LanguageModel>, PredictionError> {
        if !path.is_file() {
            return Err(PredictionError::ModelNotFound(path.to_path_buf()));
        }
        let table = PhraseTable::load(path).map_err(|e| PredictionError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        info!(model = %table.describe(), "phrase table loaded");
        Ok(Box::new(table))
    }
}

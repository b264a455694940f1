//! Candidate types produced by a composition query.
//!
//! This module provides:
//! - `Candidate`: a text candidate with its score and provenance
//! - `CandidateList`: the ranked, deduplicated, bounded list shown to the host

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A single text candidate with an associated score.
///
/// `score` is transient and recomputed per query; higher is better.
/// `frequency` mirrors the stored dictionary count (0 for predictions).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub text: String,
    pub romanization: String,
    pub score: f64,
    pub frequency: u64,
    pub is_prediction: bool,
}

impl Candidate {
    /// Candidate backed by a dictionary entry.
    pub fn from_dictionary<T, R>(text: T, romanization: R, score: f64, frequency: u64) -> Self
    where
        T: Into<String>,
        R: Into<String>,
    {
        Candidate {
            text: text.into(),
            romanization: romanization.into(),
            score,
            frequency,
            is_prediction: false,
        }
    }

    /// Candidate produced by the prediction adapter.
    pub fn predicted<T, R>(text: T, romanization: R, score: f64) -> Self
    where
        T: Into<String>,
        R: Into<String>,
    {
        Candidate {
            text: text.into(),
            romanization: romanization.into(),
            score,
            frequency: 0,
            is_prediction: true,
        }
    }
}

/// Ordered candidate list, descending by score.
///
/// Entries are unique by `text`. Ranking is a stable sort, so among equal
/// scores the entry inserted first stays first; the engine inserts
/// dictionary results before predictions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateList {
    items: Vec<Candidate>,
}

impl CandidateList {
    /// Create a new empty candidate list.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a list from candidates, dropping later duplicates by text.
    pub fn from_candidates(candidates: Vec<Candidate>) -> Self {
        let mut list = Self::new();
        list.extend_unique(candidates);
        list
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Candidate> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Candidate] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<Candidate> {
        self.items
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Whether a candidate with exactly this text is present.
    pub fn contains_text(&self, text: &str) -> bool {
        self.items.iter().any(|c| c.text == text)
    }

    /// Append candidates whose text is not already present.
    ///
    /// Returns how many were added.
    pub fn extend_unique<I>(&mut self, candidates: I) -> usize
    where
        I: IntoIterator<Item = Candidate>,
    {
        let before = self.items.len();
        for cand in candidates {
            if !self.contains_text(&cand.text) {
                self.items.push(cand);
            }
        }
        self.items.len() - before
    }

    /// Sort descending by score (stable) and keep at most `max` entries.
    pub fn rank(&mut self, max: usize) {
        self.items
            .sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        self.items.truncate(max);
    }
}

impl<'a> IntoIterator for &'a CandidateList {
    type Item = &'a Candidate;
    type IntoIter = std::slice::Iter<'a, Candidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

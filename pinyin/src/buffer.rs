//! Pinyin input buffer.
//!
//! A thin layer over `hanzi_core::Segmenter` that knows the standard
//! syllable inventory and pinyin spelling conventions (tone marks, `ü`).

use crate::syllables::pinyin_syllables;
use hanzi_core::{CompositionBuffer, PrefixPolicy, Segmentations, Segmenter, SyllableSet};
use std::sync::Arc;
use unicode_normalization::UnicodeNormalization;

/// Reduce pinyin as people write it to buffer spelling.
///
/// Lowercases, strips tone marks and tone digits, writes `ü` as `v`, and
/// drops separators such as spaces and apostrophes.
///
/// ```
/// use hanzi_pinyin::normalize_pinyin;
///
/// assert_eq!(normalize_pinyin("Nǐ hǎo"), "nihao");
/// assert_eq!(normalize_pinyin("lǜ3"), "lv");
/// assert_eq!(normalize_pinyin("xi'an"), "xian");
/// ```
pub fn normalize_pinyin(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.nfd() {
        match ch {
            // combining diaeresis: u + ¨ is ü
            '\u{0308}' if out.ends_with('u') => {
                out.pop();
                out.push('v');
            }
            c if c.is_ascii_alphabetic() => out.push(c.to_ascii_lowercase()),
            _ => {}
        }
    }
    out
}

/// Syllable-validated pinyin buffer.
#[derive(Debug, Clone)]
pub struct PinyinBuffer {
    inner: Segmenter,
}

impl Default for PinyinBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PinyinBuffer {
    pub fn new() -> Self {
        Self::with_policy(PrefixPolicy::default())
    }

    pub fn with_policy(policy: PrefixPolicy) -> Self {
        Self::with_syllables(pinyin_syllables(), policy)
    }

    /// Buffer over a custom syllable set.
    pub fn with_syllables(syllables: Arc<SyllableSet>, policy: PrefixPolicy) -> Self {
        Self {
            inner: Segmenter::with_policy(syllables, policy),
        }
    }

    pub fn policy(&self) -> PrefixPolicy {
        self.inner.policy()
    }

    /// Feed normalized `input` character by character.
    ///
    /// Stops at the first rejected character; returns how many were accepted.
    pub fn push_str(&mut self, input: &str) -> usize {
        let mut accepted = 0;
        for ch in normalize_pinyin(input).chars() {
            if !self.inner.add_char(ch) {
                break;
            }
            accepted += 1;
        }
        accepted
    }

    /// Whether `syllable` (after normalization) is a single known syllable.
    pub fn is_valid_pinyin(&self, syllable: &str) -> bool {
        let normalized = normalize_pinyin(syllable);
        !normalized.is_empty() && self.inner.is_valid_syllable(&normalized)
    }

    /// Known syllables starting with `prefix`.
    pub fn prefixes(&self, prefix: &str) -> Vec<String> {
        self.inner.prefixes(&normalize_pinyin(prefix))
    }

    pub fn normalize(input: &str) -> String {
        normalize_pinyin(input)
    }

    pub fn segmentations(&self) -> Segmentations<'_> {
        self.inner.segmentations()
    }
}

impl CompositionBuffer for PinyinBuffer {
    fn add_char(&mut self, ch: char) -> bool {
        self.inner.add_char(ch)
    }

    fn remove_last_char(&mut self) -> bool {
        self.inner.remove_last_char()
    }

    fn clear(&mut self) {
        self.inner.clear()
    }

    fn text(&self) -> &str {
        self.inner.text()
    }

    fn segments(&self) -> Box<dyn Iterator<Item = Vec<String>> + '_> {
        self.inner.segments()
    }
}

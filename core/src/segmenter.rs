//! Romanization buffer and syllable segmentation.
//!
//! The buffer only ever holds text that can still grow into valid input:
//! `add_char` refuses characters that would leave the known-syllable set.
//! By default that means a prefix of one syllable; `PrefixPolicy::SyllableSequence`
//! opts into typing several syllables in a row.
//! Segmentation enumerates every way to split the buffer into complete
//! syllables by backtracking over the syllable trie.

use crate::trie::TrieNode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Immutable set of known syllables, shared between buffers via `Arc`.
#[derive(Debug, Default)]
pub struct SyllableSet {
    trie: TrieNode,
    len: usize,
}

impl SyllableSet {
    pub fn new<I, S>(syllables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut trie = TrieNode::new();
        let mut len = 0;
        for s in syllables {
            let s = s.as_ref();
            if !s.is_empty() && !trie.contains_word(s) {
                trie.insert(s);
                len += 1;
            }
        }
        Self { trie, len }
    }

    /// Number of distinct syllables.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, syllable: &str) -> bool {
        self.trie.contains_word(syllable)
    }

    /// Whether `text` is a prefix of a single known syllable.
    pub fn is_syllable_prefix(&self, text: &str) -> bool {
        self.trie.has_prefix(text)
    }

    /// Whether `text` is zero or more complete syllables followed by a
    /// prefix of one more syllable.
    pub fn is_sequence_prefix(&self, text: &str) -> bool {
        let chars: Vec<char> = text.chars().collect();
        // offsets where a complete syllable ends; each is explored once
        let mut visited = vec![false; chars.len() + 1];
        let mut pending = vec![0];
        while let Some(start) = pending.pop() {
            if visited[start] {
                continue;
            }
            visited[start] = true;
            if start == chars.len() || self.trie.has_prefix_chars(&chars[start..]) {
                return true;
            }
            for (end, _) in self.trie.walk_prefixes(&chars, start) {
                if end < chars.len() && !visited[end] {
                    pending.push(end);
                }
            }
        }
        false
    }

    /// Known syllables starting with `prefix`, sorted.
    pub fn prefixes(&self, prefix: &str) -> Vec<String> {
        self.trie.words_with_prefix(prefix)
    }

    pub fn trie(&self) -> &TrieNode {
        &self.trie
    }
}

/// Rule applied by `add_char` to decide whether the grown buffer is acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefixPolicy {
    /// The whole buffer must be a prefix of one syllable.
    #[default]
    SingleSyllable,
    /// Opt-in: the buffer may be complete syllables followed by a syllable
    /// prefix, so multi-syllable input such as "nihao" can be typed.
    SyllableSequence,
}

/// The seam between the composition engine and a romanization scheme.
pub trait CompositionBuffer {
    /// Append `ch` if the grown buffer stays valid. Returns whether it was accepted.
    fn add_char(&mut self, ch: char) -> bool;

    /// Pop the last character. Returns `false` on an empty buffer.
    fn remove_last_char(&mut self) -> bool;

    fn clear(&mut self);

    /// Current buffer contents.
    fn text(&self) -> &str;

    fn is_empty(&self) -> bool {
        self.text().is_empty()
    }

    /// All full decompositions of the buffer into known syllables.
    fn segments(&self) -> Box<dyn Iterator<Item = Vec<String>> + '_>;

    /// The decomposition with the fewest syllables, first found on ties.
    fn best_segmentation(&self) -> Option<Vec<String>> {
        let mut best: Option<Vec<String>> = None;
        for seg in self.segments() {
            if best.as_ref().map_or(true, |b| seg.len() < b.len()) {
                best = Some(seg);
            }
        }
        best
    }
}

/// Syllable-validated input buffer.
#[derive(Debug, Clone)]
pub struct Segmenter {
    syllables: Arc<SyllableSet>,
    policy: PrefixPolicy,
    text: String,
}

impl Segmenter {
    pub fn new(syllables: Arc<SyllableSet>) -> Self {
        Self::with_policy(syllables, PrefixPolicy::default())
    }

    pub fn with_policy(syllables: Arc<SyllableSet>, policy: PrefixPolicy) -> Self {
        Self {
            syllables,
            policy,
            text: String::new(),
        }
    }

    pub fn policy(&self) -> PrefixPolicy {
        self.policy
    }

    pub fn syllables(&self) -> &Arc<SyllableSet> {
        &self.syllables
    }

    /// Lazily enumerate decompositions. Each call starts a fresh enumeration.
    pub fn segmentations(&self) -> Segmentations<'_> {
        Segmentations::new(&self.syllables, &self.text)
    }

    pub fn is_valid_syllable(&self, syllable: &str) -> bool {
        self.syllables.contains(syllable)
    }

    /// Known syllables beginning with `prefix`.
    pub fn prefixes(&self, prefix: &str) -> Vec<String> {
        self.syllables.prefixes(prefix)
    }

    /// Lowercase and drop everything that is not an ASCII letter.
    pub fn normalize(input: &str) -> String {
        input
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_ascii_lowercase())
            .collect()
    }

    fn accepts(&self, candidate: &str) -> bool {
        match self.policy {
            PrefixPolicy::SingleSyllable => self.syllables.is_syllable_prefix(candidate),
            PrefixPolicy::SyllableSequence => self.syllables.is_sequence_prefix(candidate),
        }
    }
}

impl CompositionBuffer for Segmenter {
    fn add_char(&mut self, ch: char) -> bool {
        let mut grown = String::with_capacity(self.text.len() + ch.len_utf8());
        grown.push_str(&self.text);
        grown.push(ch);
        if self.accepts(&grown) {
            self.text = grown;
            true
        } else {
            false
        }
    }

    fn remove_last_char(&mut self) -> bool {
        self.text.pop().is_some()
    }

    fn clear(&mut self) {
        self.text.clear();
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn segments(&self) -> Box<dyn Iterator<Item = Vec<String>> + '_> {
        Box::new(self.segmentations())
    }
}

struct Frame {
    /// Syllables starting at this frame's offset, as (end, syllable).
    choices: Vec<(usize, String)>,
    next: usize,
}

/// Depth-first enumeration of syllable decompositions.
///
/// At each offset every syllable starting there is tried, shortest first;
/// a path is yielded only when it consumes the whole input.
pub struct Segmentations<'a> {
    syllables: &'a SyllableSet,
    input: Vec<char>,
    frames: Vec<Frame>,
    path: Vec<String>,
}

impl<'a> Segmentations<'a> {
    fn new(syllables: &'a SyllableSet, text: &str) -> Self {
        let input: Vec<char> = text.chars().collect();
        let mut frames = Vec::new();
        if !input.is_empty() {
            frames.push(Frame {
                choices: syllables.trie().walk_prefixes(&input, 0),
                next: 0,
            });
        }
        Self {
            syllables,
            input,
            frames,
            path: Vec::new(),
        }
    }
}

impl Iterator for Segmentations<'_> {
    type Item = Vec<String>;

    fn next(&mut self) -> Option<Vec<String>> {
        loop {
            let frame = self.frames.last_mut()?;
            if frame.next < frame.choices.len() {
                let (end, syllable) = frame.choices[frame.next].clone();
                frame.next += 1;
                self.path.push(syllable);
                if end == self.input.len() {
                    let found = self.path.clone();
                    self.path.pop();
                    return Some(found);
                }
                let choices = self.syllables.trie().walk_prefixes(&self.input, end);
                self.frames.push(Frame { choices, next: 0 });
            } else {
                // exhausted: drop the frame and the syllable that led into it
                self.frames.pop();
                self.path.pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> Arc<SyllableSet> {
        Arc::new(SyllableSet::new([
            "a", "ai", "an", "ni", "hao", "xi", "xian", "ge", "n", "e", "shi", "jie",
        ]))
    }

    fn buffer_with(text: &str) -> Segmenter {
        let mut buf = Segmenter::with_policy(set(), PrefixPolicy::SyllableSequence);
        for ch in text.chars() {
            assert!(buf.add_char(ch), "rejected {:?} in {:?}", ch, text);
        }
        buf
    }

    #[test]
    fn add_char_rejects_invalid_growth() {
        let mut buf = Segmenter::new(set());
        assert!(!buf.add_char('q'));
        assert!(buf.is_empty());

        assert!(buf.add_char('n'));
        assert!(buf.add_char('i'));
        assert!(!buf.add_char('z'));
        assert_eq!(buf.text(), "ni");
    }

    #[test]
    fn sequence_policy_accepts_multi_syllable_input() {
        let buf = buffer_with("nihao");
        assert_eq!(buf.text(), "nihao");
    }

    #[test]
    fn default_policy_stops_at_syllable_boundary() {
        let mut buf = Segmenter::new(set());
        assert_eq!(buf.policy(), PrefixPolicy::SingleSyllable);
        assert!(buf.add_char('n'));
        assert!(buf.add_char('i'));
        assert!(!buf.add_char('h'));
        assert_eq!(buf.text(), "ni");
    }

    #[test]
    fn default_buffer_is_always_a_syllable_prefix() {
        let mut buf = Segmenter::new(set());
        for ch in "nihaoxianshijieaigen".chars() {
            if buf.add_char(ch) {
                assert!(!buf.prefixes(buf.text()).is_empty(), "{:?}", buf.text());
            } else {
                buf.clear();
            }
        }
    }

    #[test]
    fn sequence_check_handles_long_ambiguous_input() {
        let set = set();
        let long = "xian".repeat(200);
        assert!(set.is_sequence_prefix(&long));
        assert!(!set.is_sequence_prefix(&format!("{}q", long)));
    }

    #[test]
    fn remove_last_char_on_empty_buffer_fails() {
        let mut buf = buffer_with("ni");
        assert!(buf.remove_last_char());
        assert!(buf.remove_last_char());
        assert!(!buf.remove_last_char());
        assert!(buf.is_empty());
    }

    #[test]
    fn segments_enumerates_every_split() {
        let buf = buffer_with("xian");
        let segs: Vec<Vec<String>> = buf.segmentations().collect();
        assert_eq!(
            segs,
            vec![
                vec!["xi".to_string(), "a".to_string(), "n".to_string()],
                vec!["xi".to_string(), "an".to_string()],
                vec!["xian".to_string()],
            ]
        );
    }

    #[test]
    fn segments_are_restartable_and_rejoin_to_buffer() {
        let buf = buffer_with("shijie");
        let first: Vec<_> = buf.segments().collect();
        let second: Vec<_> = buf.segments().collect();
        assert_eq!(first, second);
        assert!(first.contains(&vec!["shi".to_string(), "jie".to_string()]));
        for seg in &first {
            assert_eq!(seg.concat(), "shijie");
        }
    }

    #[test]
    fn incomplete_tail_has_no_segmentation() {
        let buf = buffer_with("nih");
        assert_eq!(buf.segments().count(), 0);
        assert!(buf.best_segmentation().is_none());
    }

    #[test]
    fn best_segmentation_prefers_fewest_syllables() {
        let buf = buffer_with("xian");
        assert_eq!(buf.best_segmentation(), Some(vec!["xian".to_string()]));
    }

    #[test]
    fn helpers() {
        let buf = Segmenter::new(set());
        assert!(buf.is_valid_syllable("hao"));
        assert!(!buf.is_valid_syllable("ha"));
        assert_eq!(buf.prefixes("xi"), vec!["xi", "xian"]);
        assert_eq!(Segmenter::normalize("Ni Hao!"), "nihao");
    }
}

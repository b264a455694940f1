//! Prefix trie over the known-syllable set.

use std::collections::HashMap;

/// A prefix tree of valid syllables.
///
/// Backs buffer validation (`has_prefix`), syllable lookup
/// (`contains_word`) and the backtracking segmenter (`walk_prefixes`).
///
/// # Example
/// ```
/// use hanzi_core::trie::TrieNode;
///
/// let mut trie = TrieNode::new();
/// trie.insert("ni");
/// trie.insert("hao");
///
/// assert!(trie.contains_word("ni"));
/// assert!(!trie.contains_word("n"));
/// assert!(trie.has_prefix("ha"));
///
/// let input: Vec<char> = "nihao".chars().collect();
/// assert_eq!(trie.walk_prefixes(&input, 0), vec![(2, "ni".to_string())]);
/// ```
#[derive(Debug, Default)]
pub struct TrieNode {
    children: HashMap<char, Box<TrieNode>>,
    /// Set on nodes that terminate a syllable.
    word: Option<String>,
}

impl TrieNode {
    /// Create a new empty trie root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a trie from a list of syllables.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut root = Self::new();
        for w in words {
            root.insert(w.as_ref());
        }
        root
    }

    /// Insert a syllable into the trie. Empty strings are ignored.
    pub fn insert(&mut self, syllable: &str) {
        if syllable.is_empty() {
            return;
        }
        let mut node = self;
        for ch in syllable.chars() {
            node = node.children.entry(ch).or_default();
        }
        node.word = Some(syllable.to_string());
    }

    fn descend(&self, prefix: &str) -> Option<&TrieNode> {
        self.descend_chars(prefix.chars())
    }

    fn descend_chars<I: IntoIterator<Item = char>>(&self, prefix: I) -> Option<&TrieNode> {
        let mut node = self;
        for ch in prefix {
            node = node.children.get(&ch)?;
        }
        Some(node)
    }

    /// Check whether the trie contains exactly the given word, not just as a
    /// prefix.
    pub fn contains_word(&self, word: &str) -> bool {
        self.descend(word).is_some_and(|n| n.word.is_some())
    }

    /// Whether `prefix` is a (non-strict) prefix of at least one stored word.
    ///
    /// The empty string is a prefix of everything in a non-empty trie.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        Self::reaches_word(self.descend(prefix))
    }

    /// `has_prefix` over an already split character slice.
    pub fn has_prefix_chars(&self, prefix: &[char]) -> bool {
        Self::reaches_word(self.descend_chars(prefix.iter().copied()))
    }

    fn reaches_word(node: Option<&TrieNode>) -> bool {
        node.is_some_and(|n| n.word.is_some() || !n.children.is_empty())
    }

    /// All stored words starting with `prefix`, sorted.
    pub fn words_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(node) = self.descend(prefix) {
            node.collect_words(&mut out);
        }
        out.sort();
        out
    }

    fn collect_words(&self, out: &mut Vec<String>) {
        if let Some(w) = &self.word {
            out.push(w.clone());
        }
        for child in self.children.values() {
            child.collect_words(out);
        }
    }

    /// Walk the trie from `start` in `input` and return every syllable that
    /// begins there, as `(exclusive_end_index, syllable)`.
    ///
    /// Results are in order of increasing length.
    pub fn walk_prefixes(&self, input: &[char], start: usize) -> Vec<(usize, String)> {
        let mut res = Vec::new();
        let mut node = self;
        let mut idx = start;
        while idx < input.len() {
            match node.children.get(&input[idx]) {
                Some(child) => {
                    node = child;
                    idx += 1;
                    if let Some(w) = &node.word {
                        res.push((idx, w.clone()));
                    }
                }
                None => break,
            }
        }
        res
    }
}

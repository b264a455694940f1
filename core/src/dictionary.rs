//! Persistent word dictionary backed by `redb`.
//!
//! Layout:
//! - `words`: `(compact romanization, romanization, word) -> bincode(EntryRecord)`.
//!   The compact key (lowercase, no spaces or apostrophes) makes prefix
//!   search a range scan and lets the buffer text `"nihao"` match the
//!   stored `"ni hao"`. `(word, romanization)` is unique because the compact
//!   key is derived from the romanization.
//! - `words_by_frequency`: `(frequency, romanization, word) -> ()`, kept in
//!   step with `words`, used for cleanup and frequency-ordered export.
//!
//! Query methods never fail: backend errors are logged and yield no results.
//! Mutations return `Result` so maintenance tools can report failures.

use crate::candidate::Candidate;
use crate::error::DictionaryError;
use crate::utils::normalize;
use redb::{Database, ReadableTable, ReadableTableMetadata, Table, TableDefinition};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

type WordKey = (&'static str, &'static str, &'static str);
type FrequencyKey = (u64, &'static str, &'static str);

const WORDS: TableDefinition<'static, WordKey, &'static [u8]> = TableDefinition::new("words");
const WORDS_BY_FREQUENCY: TableDefinition<'static, FrequencyKey, ()> =
    TableDefinition::new("words_by_frequency");

/// Base vocabulary inserted by `seed_system_words`.
pub const SYSTEM_WORDS: &[(&str, &str)] = &[
    ("你好", "ni hao"),
    ("世界", "shi jie"),
    ("中国", "zhong guo"),
    ("输入法", "shu ru fa"),
    ("计算机", "ji suan ji"),
    ("程序", "cheng xu"),
    ("软件", "ruan jian"),
    ("开发", "kai fa"),
    ("技术", "ji shu"),
    ("人工智能", "ren gong zhi neng"),
];

pub const SYSTEM_WORD_FREQUENCY: u64 = 100;

/// Stored value for one dictionary row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct EntryRecord {
    frequency: u64,
    is_user_word: bool,
    created_at: u64,
    updated_at: u64,
}

/// A dictionary row as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub word: String,
    pub romanization: String,
    #[serde(default = "default_frequency")]
    pub frequency: u64,
    #[serde(default)]
    pub is_user_word: bool,
    /// Unix seconds
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub updated_at: u64,
}

fn default_frequency() -> u64 {
    1
}

impl DictionaryEntry {
    fn from_record(word: &str, romanization: &str, record: EntryRecord) -> Self {
        Self {
            word: word.to_string(),
            romanization: romanization.to_string(),
            frequency: record.frequency,
            is_user_word: record.is_user_word,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Bulk import/export format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictionaryFormat {
    /// One `word romanization frequency` entry per line.
    Text,
    /// A JSON array of `DictionaryEntry`.
    Json,
}

impl FromStr for DictionaryFormat {
    type Err = DictionaryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(DictionaryFormat::Text),
            "json" => Ok(DictionaryFormat::Json),
            other => Err(DictionaryError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for DictionaryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DictionaryFormat::Text => f.write_str("txt"),
            DictionaryFormat::Json => f.write_str("json"),
        }
    }
}

/// Aggregate counts over the store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DictionaryStats {
    pub total_words: usize,
    pub user_words: usize,
    pub system_words: usize,
    pub average_frequency: f64,
}

impl fmt::Display for DictionaryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total words: {}", self.total_words)?;
        writeln!(f, "User words: {}", self.user_words)?;
        writeln!(f, "System words: {}", self.system_words)?;
        write!(f, "Average frequency: {:.2}", self.average_frequency)
    }
}

/// The dictionary operations the composition engine relies on while typing.
///
/// Implementations must not fail: errors degrade to empty results or `false`.
pub trait WordStore: Send + Sync {
    /// Ranked candidates for a romanization prefix.
    fn search(&self, romanization: &str, max_results: usize) -> Vec<Candidate>;

    /// Bump the frequency of a chosen entry.
    fn record_selection(&self, word: &str, romanization: &str) -> bool;

    /// Store committed text as user vocabulary under its syllables.
    fn learn(&self, text: &str, syllables: &[String]) -> bool;
}

/// Strip spacing and apostrophes and lowercase, for romanization matching.
pub fn compact_romanization(romanization: &str) -> String {
    romanization
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\'')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Bonus for how `query` relates to an entry's compact romanization.
fn match_bonus(entry_compact: &str, query: &str) -> f64 {
    if entry_compact == query {
        30.0
    } else if entry_compact.starts_with(query) {
        20.0
    } else if entry_compact.contains(query) {
        10.0
    } else {
        0.0
    }
}

/// `min(50, frequency / 10) + max(0, 20 - len(word)) + match_bonus`.
pub fn score_entry(word: &str, romanization: &str, frequency: u64, query: &str) -> f64 {
    let frequency_score = (frequency as f64 / 10.0).min(50.0);
    let length_score = (20.0 - word.chars().count() as f64).max(0.0);
    frequency_score + length_score + match_bonus(&compact_romanization(romanization), query)
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Frequency descending, then shorter words first.
fn rank_entries(entries: &mut [DictionaryEntry]) {
    entries.sort_by(|a, b| {
        b.frequency
            .cmp(&a.frequency)
            .then_with(|| a.word.chars().count().cmp(&b.word.chars().count()))
            .then_with(|| a.word.cmp(&b.word))
    });
}

fn get_record<T>(
    words: &T,
    word: &str,
    romanization: &str,
) -> Result<Option<EntryRecord>, DictionaryError>
where
    T: ReadableTable<WordKey, &'static [u8]>,
{
    let compact = compact_romanization(romanization);
    let word = normalize(word);
    match words.get((compact.as_str(), romanization, word.as_str()))? {
        Some(guard) => Ok(Some(bincode::deserialize(guard.value())?)),
        None => Ok(None),
    }
}

/// Whether a row would have non-empty text and romanization once stored.
fn is_storable(word: &str, romanization: &str) -> bool {
    !normalize(word).is_empty() && !compact_romanization(romanization).is_empty()
}

fn put_record(
    words: &mut Table<'_, WordKey, &'static [u8]>,
    by_frequency: &mut Table<'_, FrequencyKey, ()>,
    word: &str,
    romanization: &str,
    record: &EntryRecord,
) -> Result<(), DictionaryError> {
    let compact = compact_romanization(romanization);
    let word = normalize(word);
    let word = word.as_str();
    let bytes = bincode::serialize(record)?;
    let previous = match words.insert((compact.as_str(), romanization, word), bytes.as_slice())? {
        Some(guard) => Some(bincode::deserialize::<EntryRecord>(guard.value())?),
        None => None,
    };
    if let Some(prev) = previous {
        by_frequency.remove((prev.frequency, romanization, word))?;
    }
    by_frequency.insert((record.frequency, romanization, word), ())?;
    Ok(())
}

fn delete_record(
    words: &mut Table<'_, WordKey, &'static [u8]>,
    by_frequency: &mut Table<'_, FrequencyKey, ()>,
    word: &str,
    romanization: &str,
    record: &EntryRecord,
) -> Result<(), DictionaryError> {
    let compact = compact_romanization(romanization);
    let word = normalize(word);
    let word = word.as_str();
    words.remove((compact.as_str(), romanization, word))?;
    by_frequency.remove((record.frequency, romanization, word))?;
    Ok(())
}

/// Parse one line of the text format.
///
/// `word romanization... [frequency]`: the last field is the frequency when
/// it is numeric; everything between word and frequency is the romanization,
/// so both `ni hao` and `nihao` spellings load.
fn parse_text_line(line: &str) -> Option<(String, String, u64)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 2 {
        return None;
    }
    let word = fields[0];
    let (romanization, frequency) = match fields[fields.len() - 1].parse::<u64>() {
        Ok(freq) if fields.len() >= 3 => (fields[1..fields.len() - 1].join(" "), freq),
        Ok(_) => return None,
        Err(_) => (fields[1..].join(" "), default_frequency()),
    };
    Some((word.to_string(), romanization, frequency))
}

/// Persistent dictionary store.
pub struct DictionaryStore {
    db: Database,
    path: PathBuf,
}

impl fmt::Debug for DictionaryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DictionaryStore").field("path", &self.path).finish()
    }
}

impl DictionaryStore {
    /// Open or create the store at `path` and make sure its tables exist.
    ///
    /// Failure here is fatal for the engine.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DictionaryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Database::create(path)?;
        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(WORDS)?;
            write_txn.open_table(WORDS_BY_FREQUENCY)?;
        }
        write_txn.commit()?;
        info!(path = %path.display(), "dictionary store opened");
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert the built-in base vocabulary, leaving existing rows alone.
    ///
    /// Returns how many rows were new.
    pub fn seed_system_words(&self) -> Result<usize, DictionaryError> {
        let mut inserted = 0;
        for (word, romanization) in SYSTEM_WORDS {
            if self.insert_system_word(word, romanization, SYSTEM_WORD_FREQUENCY)? {
                inserted += 1;
            }
        }
        if inserted > 0 {
            info!(inserted, "seeded system vocabulary");
        }
        Ok(inserted)
    }

    /// Insert a system entry unless `(word, romanization)` already exists.
    pub fn insert_system_word(
        &self,
        word: &str,
        romanization: &str,
        frequency: u64,
    ) -> Result<bool, DictionaryError> {
        if !is_storable(word, romanization) {
            return Ok(false);
        }
        let write_txn = self.db.begin_write()?;
        let inserted = {
            let mut words = write_txn.open_table(WORDS)?;
            let mut by_frequency = write_txn.open_table(WORDS_BY_FREQUENCY)?;
            if get_record(&words, word, romanization)?.is_some() {
                false
            } else {
                let ts = now();
                let record = EntryRecord {
                    frequency,
                    is_user_word: false,
                    created_at: ts,
                    updated_at: ts,
                };
                put_record(&mut words, &mut by_frequency, word, romanization, &record)?;
                true
            }
        };
        write_txn.commit()?;
        Ok(inserted)
    }

    // ========== Queries ==========

    /// Entries whose romanization equals `input` or starts with it.
    ///
    /// Ordered by frequency descending, then word length ascending, and
    /// scored with `score_entry`. Backend errors yield an empty list.
    pub fn search_by_romanization(&self, input: &str, max_results: usize) -> Vec<Candidate> {
        let query = compact_romanization(input);
        if query.is_empty() || max_results == 0 {
            return Vec::new();
        }
        match self.prefix_entries(&query) {
            Ok(entries) => Self::to_candidates(entries, &query, max_results),
            Err(e) => {
                warn!(input, error = %e, "dictionary search failed");
                Vec::new()
            }
        }
    }

    /// Same as `search_by_romanization` with syllables joined by spaces.
    pub fn search_by_romanization_sequence<S: AsRef<str>>(
        &self,
        syllables: &[S],
        max_results: usize,
    ) -> Vec<Candidate> {
        let joined: Vec<&str> = syllables.iter().map(AsRef::as_ref).collect();
        self.search_by_romanization(&joined.join(" "), max_results)
    }

    /// Entries whose romanization contains `partial` anywhere.
    pub fn fuzzy_search(&self, partial: &str, max_results: usize) -> Vec<Candidate> {
        let query = compact_romanization(partial);
        if query.is_empty() || max_results == 0 {
            return Vec::new();
        }
        match self.filter_entries(|compact, _| compact.contains(query.as_str())) {
            Ok(entries) => Self::to_candidates(entries, &query, max_results),
            Err(e) => {
                warn!(partial, error = %e, "dictionary fuzzy search failed");
                Vec::new()
            }
        }
    }

    fn to_candidates(
        mut entries: Vec<DictionaryEntry>,
        query: &str,
        max_results: usize,
    ) -> Vec<Candidate> {
        rank_entries(&mut entries);
        entries.truncate(max_results);
        entries
            .into_iter()
            .map(|e| {
                let score = score_entry(&e.word, &e.romanization, e.frequency, query);
                Candidate::from_dictionary(e.word, e.romanization, score, e.frequency)
            })
            .collect()
    }

    fn prefix_entries(&self, query: &str) -> Result<Vec<DictionaryEntry>, DictionaryError> {
        let read_txn = self.db.begin_read()?;
        let words = read_txn.open_table(WORDS)?;
        let mut out = Vec::new();
        for item in words.range((query, "", "")..)? {
            let (key, value) = item?;
            let (compact, romanization, word) = key.value();
            if !compact.starts_with(query) {
                break;
            }
            let record: EntryRecord = bincode::deserialize(value.value())?;
            out.push(DictionaryEntry::from_record(word, romanization, record));
        }
        Ok(out)
    }

    fn filter_entries<F>(&self, keep: F) -> Result<Vec<DictionaryEntry>, DictionaryError>
    where
        F: Fn(&str, &EntryRecord) -> bool,
    {
        let read_txn = self.db.begin_read()?;
        let words = read_txn.open_table(WORDS)?;
        let mut out = Vec::new();
        for item in words.iter()? {
            let (key, value) = item?;
            let (compact, romanization, word) = key.value();
            let record: EntryRecord = bincode::deserialize(value.value())?;
            if keep(compact, &record) {
                out.push(DictionaryEntry::from_record(word, romanization, record));
            }
        }
        Ok(out)
    }

    /// Full row for `(word, romanization)`.
    pub fn word_info(
        &self,
        word: &str,
        romanization: &str,
    ) -> Result<Option<DictionaryEntry>, DictionaryError> {
        let read_txn = self.db.begin_read()?;
        let words = read_txn.open_table(WORDS)?;
        Ok(get_record(&words, word, romanization)?
            .map(|record| DictionaryEntry::from_record(word, romanization, record)))
    }

    pub fn statistics(&self) -> Result<DictionaryStats, DictionaryError> {
        let read_txn = self.db.begin_read()?;
        let words = read_txn.open_table(WORDS)?;
        let mut stats = DictionaryStats {
            total_words: words.len()? as usize,
            ..Default::default()
        };
        let mut frequency_sum = 0u128;
        for item in words.iter()? {
            let (_, value) = item?;
            let record: EntryRecord = bincode::deserialize(value.value())?;
            if record.is_user_word {
                stats.user_words += 1;
            } else {
                stats.system_words += 1;
            }
            frequency_sum += record.frequency as u128;
        }
        if stats.total_words > 0 {
            stats.average_frequency = frequency_sum as f64 / stats.total_words as f64;
        }
        Ok(stats)
    }

    // ========== Mutations ==========

    /// Insert or replace a user entry. A second call for the same
    /// `(word, romanization)` overwrites the frequency.
    pub fn add_user_word(
        &self,
        word: &str,
        romanization: &str,
        frequency: u64,
    ) -> Result<bool, DictionaryError> {
        if !is_storable(word, romanization) {
            return Ok(false);
        }
        let write_txn = self.db.begin_write()?;
        {
            let mut words = write_txn.open_table(WORDS)?;
            let mut by_frequency = write_txn.open_table(WORDS_BY_FREQUENCY)?;
            let ts = now();
            let created_at = get_record(&words, word, romanization)?
                .map(|r| r.created_at)
                .unwrap_or(ts);
            let record = EntryRecord {
                frequency,
                is_user_word: true,
                created_at,
                updated_at: ts,
            };
            put_record(&mut words, &mut by_frequency, word, romanization, &record)?;
        }
        write_txn.commit()?;
        debug!(word, romanization, frequency, "user word stored");
        Ok(true)
    }

    /// Increment the stored frequency by one.
    ///
    /// Returns `Ok(false)` when the entry does not exist.
    pub fn update_word_frequency(
        &self,
        word: &str,
        romanization: &str,
    ) -> Result<bool, DictionaryError> {
        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut words = write_txn.open_table(WORDS)?;
            let mut by_frequency = write_txn.open_table(WORDS_BY_FREQUENCY)?;
            match get_record(&words, word, romanization)? {
                Some(mut record) => {
                    record.frequency = record.frequency.saturating_add(1);
                    record.updated_at = now();
                    put_record(&mut words, &mut by_frequency, word, romanization, &record)?;
                    true
                }
                None => false,
            }
        };
        write_txn.commit()?;
        Ok(updated)
    }

    /// Delete a user entry. System entries are left untouched.
    pub fn remove_user_word(&self, word: &str, romanization: &str) -> Result<bool, DictionaryError> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut words = write_txn.open_table(WORDS)?;
            let mut by_frequency = write_txn.open_table(WORDS_BY_FREQUENCY)?;
            match get_record(&words, word, romanization)? {
                Some(record) if record.is_user_word => {
                    delete_record(&mut words, &mut by_frequency, word, romanization, &record)?;
                    true
                }
                _ => false,
            }
        };
        write_txn.commit()?;
        Ok(removed)
    }

    /// Record committed text as user vocabulary keyed by the space-joined
    /// syllables. Existing rows get a frequency boost instead.
    pub fn learn_user_input<S: AsRef<str>>(
        &self,
        text: &str,
        syllables: &[S],
    ) -> Result<bool, DictionaryError> {
        if text.is_empty() || syllables.is_empty() {
            return Ok(false);
        }
        let parts: Vec<&str> = syllables.iter().map(AsRef::as_ref).collect();
        let romanization = parts.join(" ");
        if self.update_word_frequency(text, &romanization)? {
            debug!(text, romanization = %romanization, "boosted learned word");
            return Ok(true);
        }
        self.add_user_word(text, &romanization, 1)
    }

    /// Delete user entries with frequency below `min_frequency`.
    ///
    /// Returns the number of rows removed.
    pub fn cleanup_low_frequency_words(&self, min_frequency: u64) -> Result<usize, DictionaryError> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut words = write_txn.open_table(WORDS)?;
            let mut by_frequency = write_txn.open_table(WORDS_BY_FREQUENCY)?;
            let mut low = Vec::new();
            for item in by_frequency.range(..(min_frequency, "", ""))? {
                let (key, _) = item?;
                let (_, romanization, word) = key.value();
                low.push((word.to_string(), romanization.to_string()));
            }
            let mut removed = 0;
            for (word, romanization) in low {
                if let Some(record) = get_record(&words, &word, &romanization)? {
                    if record.is_user_word {
                        delete_record(&mut words, &mut by_frequency, &word, &romanization, &record)?;
                        removed += 1;
                    }
                }
            }
            removed
        };
        write_txn.commit()?;
        info!(min_frequency, removed, "low-frequency user words cleaned up");
        Ok(removed)
    }

    // ========== Bulk import/export ==========

    /// Load entries from `path` as user words. Malformed text lines are
    /// skipped with a warning.
    ///
    /// Returns the number of rows written.
    pub fn import_dictionary<P: AsRef<Path>>(
        &self,
        path: P,
        format: DictionaryFormat,
    ) -> Result<usize, DictionaryError> {
        let entries = Self::read_entries(path.as_ref(), format)?;
        let imported = self.write_entries(&entries, true)?;
        info!(path = %path.as_ref().display(), imported, "dictionary imported");
        Ok(imported)
    }

    /// Load entries from `path` as system words, overwriting frequencies of
    /// existing system rows.
    pub fn import_system_dictionary<P: AsRef<Path>>(
        &self,
        path: P,
        format: DictionaryFormat,
    ) -> Result<usize, DictionaryError> {
        let entries = Self::read_entries(path.as_ref(), format)?;
        let imported = self.write_entries(&entries, false)?;
        info!(path = %path.as_ref().display(), imported, "system dictionary imported");
        Ok(imported)
    }

    fn read_entries(path: &Path, format: DictionaryFormat) -> Result<Vec<DictionaryEntry>, DictionaryError> {
        let file = std::fs::File::open(path)?;
        match format {
            DictionaryFormat::Json => Ok(serde_json::from_reader(BufReader::new(file))?),
            DictionaryFormat::Text => {
                let mut out = Vec::new();
                for (idx, line) in BufReader::new(file).lines().enumerate() {
                    let line = line?;
                    let trimmed = line.trim();
                    if trimmed.is_empty() || trimmed.starts_with('#') {
                        continue;
                    }
                    match parse_text_line(trimmed) {
                        Some((word, romanization, frequency)) => out.push(DictionaryEntry {
                            word,
                            romanization,
                            frequency,
                            is_user_word: true,
                            created_at: 0,
                            updated_at: 0,
                        }),
                        None => warn!(line = idx + 1, content = trimmed, "skipping malformed entry"),
                    }
                }
                Ok(out)
            }
        }
    }

    fn write_entries(&self, entries: &[DictionaryEntry], as_user: bool) -> Result<usize, DictionaryError> {
        let write_txn = self.db.begin_write()?;
        let mut written = 0;
        {
            let mut words = write_txn.open_table(WORDS)?;
            let mut by_frequency = write_txn.open_table(WORDS_BY_FREQUENCY)?;
            let ts = now();
            for entry in entries {
                if !is_storable(&entry.word, &entry.romanization) {
                    continue;
                }
                let existing = get_record(&words, &entry.word, &entry.romanization)?;
                // user rows are never demoted by a system import
                if !as_user && existing.is_some_and(|r| r.is_user_word) {
                    continue;
                }
                let record = EntryRecord {
                    frequency: entry.frequency,
                    is_user_word: as_user,
                    created_at: existing.map(|r| r.created_at).unwrap_or(ts),
                    updated_at: ts,
                };
                put_record(&mut words, &mut by_frequency, &entry.word, &entry.romanization, &record)?;
                written += 1;
            }
        }
        write_txn.commit()?;
        Ok(written)
    }

    /// User entries in frequency-descending order.
    pub fn user_entries(&self) -> Result<Vec<DictionaryEntry>, DictionaryError> {
        let read_txn = self.db.begin_read()?;
        let words = read_txn.open_table(WORDS)?;
        let by_frequency = read_txn.open_table(WORDS_BY_FREQUENCY)?;
        let mut out = Vec::new();
        for item in by_frequency.iter()?.rev() {
            let (key, _) = item?;
            let (_, romanization, word) = key.value();
            if let Some(record) = get_record(&words, word, romanization)? {
                if record.is_user_word {
                    out.push(DictionaryEntry::from_record(word, romanization, record));
                }
            }
        }
        Ok(out)
    }

    /// Write user entries to `path`, most frequent first.
    ///
    /// Returns the number of entries written.
    pub fn export_user_dictionary<P: AsRef<Path>>(
        &self,
        path: P,
        format: DictionaryFormat,
    ) -> Result<usize, DictionaryError> {
        let entries = self.user_entries()?;
        let mut out = BufWriter::new(std::fs::File::create(path.as_ref())?);
        match format {
            DictionaryFormat::Json => serde_json::to_writer_pretty(&mut out, &entries)?,
            DictionaryFormat::Text => {
                for e in &entries {
                    writeln!(out, "{} {} {}", e.word, e.romanization, e.frequency)?;
                }
            }
        }
        out.flush()?;
        info!(path = %path.as_ref().display(), exported = entries.len(), "user dictionary exported");
        Ok(entries.len())
    }
}

impl WordStore for DictionaryStore {
    fn search(&self, romanization: &str, max_results: usize) -> Vec<Candidate> {
        self.search_by_romanization(romanization, max_results)
    }

    fn record_selection(&self, word: &str, romanization: &str) -> bool {
        self.update_word_frequency(word, romanization)
            .unwrap_or_else(|e| {
                warn!(word, romanization, error = %e, "frequency update failed");
                false
            })
    }

    fn learn(&self, text: &str, syllables: &[String]) -> bool {
        self.learn_user_input(text, syllables).unwrap_or_else(|e| {
            warn!(text, error = %e, "learning user input failed");
            false
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "test_{}_{}.redb",
            name,
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos()
        ))
    }

    fn open(name: &str) -> (DictionaryStore, PathBuf) {
        let path = temp_path(name);
        (DictionaryStore::open(&path).unwrap(), path)
    }

    #[test]
    fn exact_match_scores_highest() {
        let (store, path) = open("dict_exact");
        store.add_user_word("你好", "ni hao", 100).unwrap();
        store.add_user_word("你", "ni", 100).unwrap();

        let results = store.search_by_romanization("nihao", 10);
        assert_eq!(results.len(), 1);
        let top = &results[0];
        assert_eq!(top.text, "你好");
        assert_eq!(top.romanization, "ni hao");
        assert_eq!(top.frequency, 100);
        assert!(!top.is_prediction);
        // 10 (frequency) + 18 (length) + 30 (exact)
        assert!((top.score - 58.0).abs() < 1e-9);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn prefix_results_ordered_by_frequency_then_length() {
        let (store, path) = open("dict_order");
        store.add_user_word("你们好", "ni men hao", 50).unwrap();
        store.add_user_word("你们", "ni men", 50).unwrap();
        store.add_user_word("你", "ni", 200).unwrap();
        store.add_user_word("世界", "shi jie", 500).unwrap();

        let texts: Vec<String> = store
            .search_by_romanization("ni", 10)
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(texts, vec!["你", "你们", "你们好"]);

        assert_eq!(store.search_by_romanization("ni", 2).len(), 2);
        assert!(store.search_by_romanization("", 10).is_empty());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn fuzzy_search_matches_substrings() {
        let (store, path) = open("dict_fuzzy");
        store.seed_system_words().unwrap();

        let texts: Vec<String> = store.fuzzy_search("suan", 10).into_iter().map(|c| c.text).collect();
        assert_eq!(texts, vec!["计算机"]);
        let hit = &store.fuzzy_search("suan", 10)[0];
        // 10 + 17 + 10 (substring)
        assert!((hit.score - 37.0).abs() < 1e-9);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn add_user_word_upserts() {
        let (store, path) = open("dict_upsert");
        store.add_user_word("程序员", "cheng xu yuan", 5).unwrap();
        store.add_user_word("程序员", "cheng xu yuan", 12).unwrap();

        let stats = store.statistics().unwrap();
        assert_eq!(stats.total_words, 1);
        let info = store.word_info("程序员", "cheng xu yuan").unwrap().unwrap();
        assert_eq!(info.frequency, 12);
        assert!(info.is_user_word);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn blank_words_are_never_stored() {
        let (store, path) = open("dict_blank");
        assert!(!store.add_user_word("   ", "ni", 5).unwrap());
        assert!(!store.add_user_word("\u{3000}", "ni", 5).unwrap());
        assert!(!store.insert_system_word(" \t", "ni", 5).unwrap());
        assert!(!store.learn_user_input(" ", &["ni"]).unwrap());
        assert!(store.search_by_romanization("ni", 10).is_empty());

        let json = path.with_extension("json");
        std::fs::write(
            &json,
            r#"[{"word":"  ","romanization":"ni","frequency":3},{"word":"你","romanization":"ni","frequency":3}]"#,
        )
        .unwrap();
        assert_eq!(store.import_dictionary(&json, DictionaryFormat::Json).unwrap(), 1);
        let texts: Vec<String> = store
            .search_by_romanization("ni", 10)
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(texts, vec!["你".to_string()]);

        let _ = std::fs::remove_file(&json);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn update_frequency_increments_by_one() {
        let (store, path) = open("dict_freq");
        store.add_user_word("开发", "kai fa", 7).unwrap();
        for _ in 0..3 {
            assert!(store.update_word_frequency("开发", "kai fa").unwrap());
        }
        assert_eq!(store.word_info("开发", "kai fa").unwrap().unwrap().frequency, 10);
        assert!(!store.update_word_frequency("不存在", "bu cun zai").unwrap());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn system_words_survive_user_removal_and_cleanup() {
        let (store, path) = open("dict_system");
        assert_eq!(store.seed_system_words().unwrap(), SYSTEM_WORDS.len());
        assert_eq!(store.seed_system_words().unwrap(), 0);

        assert!(!store.remove_user_word("你好", "ni hao").unwrap());
        store.add_user_word("你好吗", "ni hao ma", 1).unwrap();
        store.add_user_word("好的", "hao de", 3).unwrap();
        assert!(store.remove_user_word("你好吗", "ni hao ma").unwrap());

        assert_eq!(store.cleanup_low_frequency_words(1000).unwrap(), 1);
        let stats = store.statistics().unwrap();
        assert_eq!(stats.user_words, 0);
        assert_eq!(stats.system_words, SYSTEM_WORDS.len());
        assert!((stats.average_frequency - 100.0).abs() < 1e-9);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn learn_user_input_creates_then_boosts() {
        let (store, path) = open("dict_learn");
        let syllables = vec!["shu".to_string(), "ru".to_string()];
        assert!(store.learn_user_input("输入", &syllables).unwrap());
        assert!(store.learn_user_input("输入", &syllables).unwrap());
        let info = store.word_info("输入", "shu ru").unwrap().unwrap();
        assert_eq!(info.frequency, 2);
        assert!(info.is_user_word);

        let empty: Vec<String> = Vec::new();
        assert!(!store.learn_user_input("输入", &empty).unwrap());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn search_by_sequence_joins_syllables() {
        let (store, path) = open("dict_sequence");
        store.seed_system_words().unwrap();
        let results = store.search_by_romanization_sequence(&["zhong", "guo"], 5);
        assert_eq!(results[0].text, "中国");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn text_export_and_import() {
        let (store, path) = open("dict_export");
        store.seed_system_words().unwrap();
        store.add_user_word("拼音", "pin yin", 30).unwrap();
        store.add_user_word("汉字", "han zi", 40).unwrap();

        let out = temp_path("dict_export_txt").with_extension("txt");
        assert_eq!(store.export_user_dictionary(&out, DictionaryFormat::Text).unwrap(), 2);
        let content = std::fs::read_to_string(&out).unwrap();
        assert_eq!(content, "汉字 han zi 40\n拼音 pin yin 30\n");

        let (other, other_path) = open("dict_import");
        assert_eq!(other.import_dictionary(&out, DictionaryFormat::Text).unwrap(), 2);
        assert_eq!(
            other.word_info("汉字", "han zi").unwrap().unwrap().frequency,
            40
        );

        let _ = std::fs::remove_file(&out);
        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(&other_path);
    }

    #[test]
    fn json_export_roundtrip() {
        let (store, path) = open("dict_json");
        store.add_user_word("测试", "ce shi", 9).unwrap();
        let out = temp_path("dict_json_out").with_extension("json");
        store.export_user_dictionary(&out, DictionaryFormat::Json).unwrap();

        let (other, other_path) = open("dict_json_in");
        assert_eq!(other.import_dictionary(&out, DictionaryFormat::Json).unwrap(), 1);
        assert_eq!(other.search_by_romanization("ceshi", 1)[0].text, "测试");

        let _ = std::fs::remove_file(&out);
        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(&other_path);
    }

    #[test]
    fn parse_text_line_variants() {
        assert_eq!(
            parse_text_line("你好 ni hao 100"),
            Some(("你好".into(), "ni hao".into(), 100))
        );
        assert_eq!(
            parse_text_line("你好 nihao"),
            Some(("你好".into(), "nihao".into(), 1))
        );
        assert_eq!(parse_text_line("你好"), None);
        assert_eq!(parse_text_line("你好 100"), None);
    }

    #[test]
    fn format_parsing() {
        assert_eq!("txt".parse::<DictionaryFormat>().unwrap(), DictionaryFormat::Text);
        assert_eq!("JSON".parse::<DictionaryFormat>().unwrap(), DictionaryFormat::Json);
        assert!("csv".parse::<DictionaryFormat>().is_err());
    }
}

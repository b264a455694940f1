use anyhow::{Context, Result};
use hanzi_core::PhraseTable;
use hanzi_pinyin::normalize_pinyin;
use std::path::Path;
use tracing::warn;

/// Split off a trailing integer weight, defaulting to 1.
fn split_weight<'a>(fields: &[&'a str]) -> (Vec<&'a str>, u32) {
    match fields.split_last() {
        Some((last, rest)) if !rest.is_empty() => match last.parse::<u32>() {
            Ok(w) => (rest.to_vec(), w),
            Err(_) => (fields.to_vec(), 1),
        },
        _ => (fields.to_vec(), 1),
    }
}

/// Parse `phrase syllable... [weight]`. Syllables may carry tone marks.
fn parse_phrase_line(line: &str) -> Option<(String, String, u32)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let (fields, weight) = split_weight(&fields);
    let (phrase, syllables) = fields.split_first()?;
    let reading: Vec<String> = syllables
        .iter()
        .map(|s| normalize_pinyin(s))
        .filter(|s| !s.is_empty())
        .collect();
    if reading.is_empty() {
        return None;
    }
    Some((phrase.to_string(), reading.join(" "), weight))
}

/// Parse `previous next [weight]`.
fn parse_continuation_line(line: &str) -> Option<(String, String, u32)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    match split_weight(&fields) {
        (pair, weight) if pair.len() == 2 => Some((pair[0].to_string(), pair[1].to_string(), weight)),
        _ => None,
    }
}

fn for_each_line<F>(path: &Path, mut f: F) -> Result<()>
where
    F: FnMut(usize, &str) -> bool,
{
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if !f(idx + 1, line) {
            warn!(file = %path.display(), line = idx + 1, "skipping malformed line");
        }
    }
    Ok(())
}

pub fn run(input: &Path, continuations: Option<&Path>, name: &str) -> Result<PhraseTable> {
    let mut table = PhraseTable::new(name);
    for_each_line(input, |_, line| match parse_phrase_line(line) {
        Some((phrase, reading, weight)) => {
            table.insert_phrase(&reading, &phrase, weight);
            true
        }
        None => false,
    })?;
    if let Some(path) = continuations {
        for_each_line(path, |_, line| match parse_continuation_line(line) {
            Some((previous, next, weight)) => {
                table.insert_continuation(&previous, &next, weight);
                true
            }
            None => false,
        })?;
    }
    Ok(table)
}

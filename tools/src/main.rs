//! Dictionary and model maintenance for hanzi stores.
//!
//! Usage:
//!   cargo run -p hanzi-tools -- --db data/dictionary.redb import words.txt
//!   cargo run -p hanzi-tools -- --db data/dictionary.redb export user.json --format json
//!   cargo run -p hanzi-tools -- --db data/dictionary.redb search nihao
//!   cargo run -p hanzi-tools -- build-model phrases.txt --output models/phrase-model.bincode

mod build_model;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hanzi_core::{DictionaryFormat, DictionaryStore};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "hanzi-dict")]
#[command(about = "Inspect and maintain hanzi dictionaries and phrase models")]
struct Args {
    /// Path to the dictionary database
    #[arg(long, default_value = "data/dictionary.redb")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import entries from a txt or json file
    Import {
        input: PathBuf,
        /// txt or json (defaults to the file extension)
        #[arg(short, long)]
        format: Option<String>,
        /// Store as system vocabulary instead of user words
        #[arg(long)]
        system: bool,
    },
    /// Export user words, most frequent first
    Export {
        output: PathBuf,
        #[arg(short, long)]
        format: Option<String>,
    },
    /// Remove user words below a frequency
    Cleanup {
        #[arg(long, default_value_t = 2)]
        min_frequency: u64,
    },
    /// Print word counts
    Stats,
    /// Look up a romanization
    Search {
        romanization: String,
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
        /// Match anywhere in the romanization, not just the start
        #[arg(long)]
        fuzzy: bool,
    },
    /// Add or overwrite a user word
    Add {
        word: String,
        /// Space-separated syllables, e.g. "ni hao"
        romanization: String,
        #[arg(long, default_value_t = 1)]
        frequency: u64,
    },
    /// Remove a user word
    Remove { word: String, romanization: String },
    /// Compile a phrase list into a prediction model
    BuildModel {
        input: PathBuf,
        /// Lines of `previous next [weight]`
        #[arg(long)]
        continuations: Option<PathBuf>,
        #[arg(short, long, default_value = "models/phrase-model.bincode")]
        output: PathBuf,
        #[arg(long, default_value = "phrases")]
        name: String,
    },
}

/// Explicit `--format`, else the file extension.
fn resolve_format(path: &Path, format: Option<&str>) -> Result<DictionaryFormat> {
    let name = match format {
        Some(f) => f.to_string(),
        None => path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("txt")
            .to_string(),
    };
    Ok(name.parse::<DictionaryFormat>()?)
}

fn open_store(path: &Path) -> Result<DictionaryStore> {
    DictionaryStore::open(path).with_context(|| format!("Failed to open dictionary {}", path.display()))
}

fn main() -> Result<()> {
    hanzi_pinyin::init_logging();
    let args = Args::parse();

    match args.command {
        Command::Import {
            input,
            format,
            system,
        } => {
            let format = resolve_format(&input, format.as_deref())?;
            let store = open_store(&args.db)?;
            let imported = if system {
                store.import_system_dictionary(&input, format)?
            } else {
                store.import_dictionary(&input, format)?
            };
            println!("Imported {} entries from {}", imported, input.display());
        }
        Command::Export { output, format } => {
            let format = resolve_format(&output, format.as_deref())?;
            let store = open_store(&args.db)?;
            let exported = store.export_user_dictionary(&output, format)?;
            println!("Exported {} entries to {}", exported, output.display());
        }
        Command::Cleanup { min_frequency } => {
            let removed = open_store(&args.db)?.cleanup_low_frequency_words(min_frequency)?;
            println!("Removed {} user words below frequency {}", removed, min_frequency);
        }
        Command::Stats => {
            println!("{}", open_store(&args.db)?.statistics()?);
        }
        Command::Search {
            romanization,
            limit,
            fuzzy,
        } => {
            let store = open_store(&args.db)?;
            let hits = if fuzzy {
                store.fuzzy_search(&romanization, limit)
            } else {
                store.search_by_romanization(&romanization, limit)
            };
            if hits.is_empty() {
                println!("(no entries)");
            }
            for (i, c) in hits.iter().enumerate() {
                println!(
                    "{:>2}. {} [{}] freq={} score={:.1}",
                    i + 1,
                    c.text,
                    c.romanization,
                    c.frequency,
                    c.score
                );
            }
        }
        Command::Add {
            word,
            romanization,
            frequency,
        } => {
            if !open_store(&args.db)?.add_user_word(&word, &romanization, frequency)? {
                anyhow::bail!("Refusing empty word or romanization");
            }
            println!("Stored {} [{}] with frequency {}", word, romanization, frequency);
        }
        Command::Remove { word, romanization } => {
            if open_store(&args.db)?.remove_user_word(&word, &romanization)? {
                println!("Removed {} [{}]", word, romanization);
            } else {
                println!("No user word {} [{}]", word, romanization);
            }
        }
        Command::BuildModel {
            input,
            continuations,
            output,
            name,
        } => {
            let table = build_model::run(&input, continuations.as_deref(), &name)?;
            if let Some(parent) = output.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            table.save(&output)?;
            println!(
                "Wrote {} readings and {} continuations to {}",
                table.reading_count(),
                table.continuation_count(),
                output.display()
            );
        }
    }

    Ok(())
}

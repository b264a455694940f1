use anyhow::Context;
use clap::Parser;
use hanzi_pinyin::{Candidate, InputEvent, PinyinConfig, PinyinIme};
use std::cell::RefCell;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Parser, Debug)]
#[command(name = "hanzi-pinyin", about = "Interactive pinyin input test")]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the dictionary location
    #[arg(long)]
    dictionary: Option<PathBuf>,

    /// Override the prediction model location
    #[arg(long)]
    model: Option<PathBuf>,

    /// Disable model predictions
    #[arg(long)]
    no_prediction: bool,

    /// Accept several syllables in a row ("nihao")
    #[arg(long)]
    sequences: bool,
}

fn print_candidates(candidates: &[Candidate]) {
    if candidates.is_empty() {
        println!("  → (no candidates found)");
        return;
    }
    for (i, c) in candidates.iter().enumerate() {
        let marker = if c.is_prediction { " *" } else { "" };
        println!("  {}. {} (score: {:.1}){}", i + 1, c.text, c.score, marker);
    }
}

fn main() -> anyhow::Result<()> {
    hanzi_pinyin::init_logging();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PinyinConfig::load_toml(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PinyinConfig::default(),
    };
    if let Some(path) = args.dictionary {
        config.base.dictionary_path = path;
    }
    if let Some(path) = args.model {
        config.base.model_path = path;
    }
    if args.no_prediction {
        config.base.enable_prediction = false;
    }
    if args.sequences {
        config.allow_syllable_sequences = true;
    }

    let mut ime = PinyinIme::open(config).context("opening pinyin engine")?;
    let committed = Rc::new(RefCell::new(String::new()));
    let sink = Rc::clone(&committed);
    ime.engine_mut().set_commit_callback(move |text| sink.borrow_mut().push_str(text));

    println!("═══════════════════════════════════════════════════");
    println!("  hanzi-pinyin - Interactive Pinyin Input Test");
    println!("═══════════════════════════════════════════════════");
    println!();
    println!("Type pinyin letters, a digit to pick a candidate, and Enter.");
    println!("Commands: :commit  :clear  :back  :stats  :quit");
    println!("Examples: ni, hao1, zhong (nihao with --sequences)");
    println!();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let engine = ime.engine_mut();
        match input {
            ":quit" => break,
            ":commit" => {
                engine.process_input(&InputEvent::key(hanzi_pinyin::keys::ENTER));
            }
            ":clear" => {
                engine.process_input(&InputEvent::key(hanzi_pinyin::keys::ESCAPE));
            }
            ":back" => {
                engine.process_input(&InputEvent::key(hanzi_pinyin::keys::BACKSPACE));
            }
            ":stats" => {
                println!("  {}", ime.dictionary().statistics()?);
                continue;
            }
            _ => {
                for ch in input.chars() {
                    let update = engine.process_input(&InputEvent::char(ch));
                    if !update.handled {
                        println!("  (ignored '{}')", ch);
                    }
                }
            }
        }

        let engine = ime.engine_mut();
        if engine.config().background_prediction {
            let timeout = engine.config().prediction_timeout();
            engine.wait_for_predictions(timeout);
        }

        let text = committed.take();
        if !text.is_empty() {
            println!("  ⇒ {}", text);
        }
        if !engine.composition().is_empty() {
            println!("  [{}] {:?}", engine.composition(), engine.state());
            print_candidates(engine.candidates());
        }
        println!();
        io::stdout().flush()?;
    }
    Ok(())
}

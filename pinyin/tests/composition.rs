// End-to-end composition against a real redb dictionary.

use hanzi_pinyin::{keys, InputEvent, InputState, PinyinConfig, PinyinIme};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "hanzi_pinyin_{}_{}",
        name,
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn config_in(dir: &PathBuf) -> PinyinConfig {
    let mut config = PinyinConfig::default();
    config.base.dictionary_path = dir.join("dictionary.redb");
    config.base.model_path = dir.join("missing-model.bincode");
    config
}

fn sequence_config_in(dir: &PathBuf) -> PinyinConfig {
    let mut config = config_in(dir);
    config.allow_syllable_sequences = true;
    config
}

#[test]
fn default_buffer_rejects_h_after_ni() {
    let dir = temp_dir("default_prefix");
    let mut ime = PinyinIme::open(config_in(&dir)).unwrap();

    let engine = ime.engine_mut();
    assert!(engine.process_input(&InputEvent::char('n')).handled);
    assert!(engine.process_input(&InputEvent::char('i')).handled);
    let update = engine.process_input(&InputEvent::char('h'));
    assert!(!update.handled);
    assert_eq!(engine.composition(), "ni");
    assert_eq!(engine.state(), InputState::Selecting);

    let direct = ime.dictionary().search_by_romanization("nihao", 10);
    assert_eq!(direct[0].text, "你好");
    assert_eq!(direct[0].score, 58.0);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn nihao_commits_and_learns() {
    let dir = temp_dir("nihao");
    let mut ime = PinyinIme::open(sequence_config_in(&dir)).unwrap();
    assert!(!ime.engine().is_prediction_available());

    let commits = Rc::new(RefCell::new(Vec::<String>::new()));
    let sink = Rc::clone(&commits);
    ime.engine_mut()
        .set_commit_callback(move |text| sink.borrow_mut().push(text.to_string()));

    assert_eq!(ime.engine().state(), InputState::Idle);
    for (ch, expected) in [('n', "n"), ('i', "ni"), ('h', "nih"), ('a', "niha"), ('o', "nihao")] {
        let update = ime.engine_mut().process_input(&InputEvent::char(ch));
        assert!(update.handled, "{} rejected", ch);
        assert_eq!(ime.engine().composition(), expected);
    }

    let direct = ime.dictionary().search_by_romanization("nihao", 10);
    assert_eq!(direct[0].text, "你好");
    assert_eq!(direct[0].score, 58.0);

    let engine = ime.engine_mut();
    assert_eq!(engine.state(), InputState::Selecting);
    assert_eq!(engine.candidates()[0].text, "你好");
    assert!(engine.select_candidate(0));

    assert_eq!(*commits.borrow(), vec!["你好".to_string()]);
    assert_eq!(engine.state(), InputState::Idle);
    assert!(engine.composition().is_empty());
    assert!(engine.candidates().is_empty());

    let entry = ime.dictionary().word_info("你好", "ni hao").unwrap().unwrap();
    assert_eq!(entry.frequency, 101);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn keys_drive_the_state_machine() {
    let dir = temp_dir("keys");
    let mut ime = PinyinIme::open(sequence_config_in(&dir)).unwrap();
    let engine = ime.engine_mut();

    for ch in "zhongguo".chars() {
        engine.process_input(&InputEvent::char(ch));
    }
    assert_eq!(engine.candidates()[0].text, "中国");

    // backspace edits, a fully erased buffer returns to idle
    let update = engine.process_input(&InputEvent::key(keys::BACKSPACE));
    assert!(update.handled);
    assert_eq!(engine.composition(), "zhongguo".trim_end_matches('o'));
    for _ in 0.."zhonggu".len() {
        engine.process_input(&InputEvent::key(keys::BACKSPACE));
    }
    assert_eq!(engine.state(), InputState::Idle);
    assert!(!engine.process_input(&InputEvent::key(keys::BACKSPACE)).handled);

    // enter commits the raw romanization
    for ch in "shijie".chars() {
        engine.process_input(&InputEvent::char(ch));
    }
    let update = engine.process_input(&InputEvent::key(keys::ENTER));
    assert_eq!(update.committed.as_deref(), Some("shijie"));
    assert_eq!(update.state, InputState::Idle);

    // escape clears without committing, also when already idle
    engine.process_input(&InputEvent::char('k'));
    let update = engine.process_input(&InputEvent::key(keys::ESCAPE));
    assert!(update.handled);
    assert!(update.committed.is_none());
    let update = engine.process_input(&InputEvent::key(keys::ESCAPE));
    assert!(update.handled);
    assert_eq!(update.state, InputState::Idle);

    // digit keys select while candidates are shown
    for ch in "kaifa".chars() {
        engine.process_input(&InputEvent::char(ch));
    }
    let update = engine.process_input(&InputEvent::char('1'));
    assert_eq!(update.committed.as_deref(), Some("开发"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn learned_frequency_survives_reopen() {
    let dir = temp_dir("reopen");
    {
        let mut ime = PinyinIme::open(sequence_config_in(&dir)).unwrap();
        let engine = ime.engine_mut();
        for ch in "ruanjian".chars() {
            engine.process_input(&InputEvent::char(ch));
        }
        assert!(engine.select_candidate(0));
    }
    let ime = PinyinIme::open(config_in(&dir)).unwrap();
    let entry = ime.dictionary().word_info("软件", "ruan jian").unwrap().unwrap();
    assert_eq!(entry.frequency, 101);
    assert!(!entry.is_user_word);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn learning_disabled_leaves_frequency() {
    let dir = temp_dir("nolearn");
    let mut config = sequence_config_in(&dir);
    config.base.enable_learning = false;
    let mut ime = PinyinIme::open(config).unwrap();
    let engine = ime.engine_mut();
    for ch in "nihao".chars() {
        engine.process_input(&InputEvent::char(ch));
    }
    assert!(engine.select_candidate(0));
    let entry = ime.dictionary().word_info("你好", "ni hao").unwrap().unwrap();
    assert_eq!(entry.frequency, 100);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unopenable_dictionary_is_fatal() {
    let dir = temp_dir("fatal");
    let blocker = dir.join("not-a-dir");
    std::fs::write(&blocker, b"file").unwrap();
    let mut config = config_in(&dir);
    config.base.dictionary_path = blocker.join("dictionary.redb");
    assert!(PinyinIme::open(config).is_err());
    let _ = std::fs::remove_dir_all(&dir);
}

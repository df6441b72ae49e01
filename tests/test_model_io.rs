// Model persistence: save, load, vocab dump, token binaries.
use bytepair::{read_encoded, write_encoded, SplitPreset, Tokenizer};
use std::fs;

const CORPUS: &str = "The five boxing wizards jump quickly, the wizards jump again.";

#[test]
fn saved_model_reloads_to_identical_encoding() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wizards.model");

    let mut trained = Tokenizer::with_preset(SplitPreset::Gpt2).unwrap();
    trained.train(CORPUS, 320, false).unwrap();
    trained
        .set_special_tokens([("<|end|>".to_string(), 100257)])
        .unwrap();
    trained.save(&path, false).unwrap();

    let loaded = Tokenizer::from_model_file(&path).unwrap();
    assert_eq!(loaded.pattern(), trained.pattern());
    assert_eq!(loaded.merges(), trained.merges());
    assert_eq!(loaded.vocab_size(), trained.vocab_size());
    assert_eq!(loaded.special_tokens(), trained.special_tokens());

    for text in [CORPUS, "jump quickly", "with <|end|> inside", ""] {
        assert_eq!(
            loaded.encode(text).unwrap(),
            trained.encode(text).unwrap(),
            "input {text:?}"
        );
    }
}

#[test]
fn model_file_layout_is_line_oriented() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("layout.model");

    let mut tokenizer = Tokenizer::new();
    tokenizer.train("abab", 257, false).unwrap();
    tokenizer
        .set_special_tokens([("<|end|>".to_string(), 500)])
        .unwrap();
    tokenizer.save(&path, false).unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    assert_eq!(contents, "minbpe v1\n\n1\n<|end|> 500\n97 98\n");
}

#[test]
fn basic_model_round_trips_empty_pattern() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("basic.model");

    let mut tokenizer = Tokenizer::new();
    tokenizer.train("banana", 300, false).unwrap();
    tokenizer.save(&path, false).unwrap();

    let loaded = Tokenizer::from_model_file(&path).unwrap();
    assert_eq!(loaded.pattern(), "");
    assert_eq!(
        loaded.encode("banana").unwrap(),
        tokenizer.encode("banana").unwrap()
    );
}

#[test]
fn save_before_training_is_a_state_error() {
    let dir = tempfile::tempdir().unwrap();
    let tokenizer = Tokenizer::new();
    let err = tokenizer
        .save(dir.path().join("nothing.model"), false)
        .unwrap_err();
    assert!(matches!(err, bytepair::Error::State(_)));
}

#[test]
fn wrong_version_header_is_a_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("old.model");
    fs::write(&path, "minbpe v0\n\n0\n97 98\n").unwrap();

    let err = Tokenizer::from_model_file(&path).unwrap_err();
    assert!(matches!(err, bytepair::Error::Format(_)));
}

#[test]
fn missing_model_file_is_an_io_error() {
    let err = Tokenizer::from_model_file("/nonexistent/model/path.model").unwrap_err();
    assert!(matches!(err, bytepair::Error::Io(_)));
}

#[test]
fn write_vocab_emits_sibling_dump() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dump.model");

    let mut tokenizer = Tokenizer::new();
    tokenizer.train("hihihihi", 257, false).unwrap();
    tokenizer.save(&path, true).unwrap();

    let dump = fs::read_to_string(dir.path().join("dump.model.vocab")).unwrap();
    let lines: Vec<&str> = dump.lines().collect();
    assert_eq!(lines.len(), 257);
    assert_eq!(lines[256], "256   : \"hi\"");
}

#[test]
fn encoded_token_file_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let bin_path = dir.path().join("corpus.tokens");

    let mut tokenizer = Tokenizer::with_preset(SplitPreset::Gpt4).unwrap();
    tokenizer.train(CORPUS, 300, false).unwrap();

    let tokens = tokenizer.encode(CORPUS).unwrap();
    write_encoded(&bin_path, &tokens).unwrap();

    let loaded = read_encoded(&bin_path).unwrap();
    assert_eq!(loaded, tokens);
    assert_eq!(tokenizer.decode(&loaded), CORPUS.as_bytes());
}

#[test]
fn stored_pattern_survives_and_still_splits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gpt4.model");

    let mut trained = Tokenizer::with_preset(SplitPreset::Gpt4).unwrap();
    trained.train("it's 12345 o'clock", 280, false).unwrap();
    trained.save(&path, false).unwrap();

    let loaded = Tokenizer::from_model_file(&path).unwrap();
    assert_eq!(loaded.pattern(), bytepair::GPT4_SPLIT_PATTERN);
    let text = "it's 12345 o'clock";
    assert_eq!(loaded.encode(text).unwrap(), trained.encode(text).unwrap());
}

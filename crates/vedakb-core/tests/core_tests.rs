use std::fs;
use std::io::Write;
use tempfile::TempDir;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use vedakb_core::config::{BackoffKind, Config, Settings};
use vedakb_core::data_processor::{ChunkingConfig, DataProcessor};
use vedakb_core::error::Error;
use vedakb_core::types::{NamingStrategy, RankOrder};

#[test]
fn process_directory_single_small_file() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let file_path = dir.join("a.txt");
    let mut f = fs::File::create(&file_path).unwrap();
    writeln!(f, "Short text").unwrap();

    let processor = DataProcessor::new();
    let chunks = processor.process_directory(dir).expect("process");

    assert_eq!(chunks.len(), 1, "one small file becomes one chunk");
    assert_eq!(chunks[0].content, "Short text");
    assert_eq!(chunks[0].id, "a:0");
    assert!(chunks[0].source.ends_with("a.txt"));
}

#[test]
fn missing_directory_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let err = DataProcessor::new().process_directory(&tmp.path().join("nope")).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NotFound(_))), "{err}");
}

#[test]
fn only_txt_files_are_ingested() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("notes.txt"), "plain text").unwrap();
    fs::write(tmp.path().join("scan.pdf"), "%PDF-1.4 binary").unwrap();
    fs::write(tmp.path().join("letter.docx"), "PK zipped").unwrap();

    let chunks = DataProcessor::new().process_directory(tmp.path()).expect("process");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].id, "notes:0");
}

#[test]
fn process_directory_limited_two_files_limit_one() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("a.txt"), "alpha bravo").unwrap();
    fs::write(dir.join("b.txt"), "charlie delta").unwrap();

    let processor = DataProcessor::new();
    let chunks = processor
        .process_directory_limited(dir, 1)
        .expect("process limited");

    // Only chunks from one document should be present
    let mut sources = std::collections::HashSet::new();
    for c in &chunks { sources.insert(c.source.clone()); }
    assert_eq!(sources.len(), 1, "limited to one source document");
}

#[test]
fn split_text_bounds_and_overlaps_chunks() {
    let processor = DataProcessor::with_config(ChunkingConfig { max_chars: 20, overlap_chars: 5 });
    let text = "one two three four five six seven eight nine ten eleven twelve";
    let chunks = processor.split_text(text);

    assert!(chunks.len() > 1);
    for c in &chunks { assert!(c.chars().count() <= 20, "chunk too long: {c:?}"); }
    // Every word survives chunking
    for word in text.split_whitespace() {
        assert!(chunks.iter().any(|c| c.contains(word)), "lost {word}");
    }
}

#[test]
fn settings_defaults_match_documented_values() {
    let config = Config::from_figment(Figment::from(Serialized::defaults(Settings::default())));
    let settings = config.settings().expect("settings");

    assert_eq!(settings.retrieval.top_k, 5);
    assert_eq!(settings.connection.max_retries, 3);
    assert_eq!(settings.connection.retry_delay_ms, 5_000);
    assert_eq!(settings.retrieval.ordering, RankOrder::Score);
    assert_eq!(
        settings.retrieval.naming_strategy(),
        NamingStrategy::Suffix("vedas_knowledge_base".into())
    );
}

#[test]
fn settings_accept_comma_separated_instances() {
    let toml = r#"
        [connection]
        backend_url = "/tmp/kb"
        backoff = "exponential"

        [retrieval]
        instances = "rig, sama ,yajur"
        top_k = 3
        ordering = "arrival"
        naming = "verbatim"
    "#;
    let config = Config::from_figment(
        Figment::from(Serialized::defaults(Settings::default())).merge(Toml::string(toml)),
    );
    let settings = config.settings().expect("settings");

    assert_eq!(settings.retrieval.instances, vec!["rig", " sama ", "yajur"]);
    assert_eq!(settings.retrieval.top_k, 3);
    assert_eq!(settings.retrieval.ordering, RankOrder::Arrival);
    assert_eq!(settings.retrieval.naming_strategy(), NamingStrategy::Verbatim);
    assert_eq!(settings.connection.backoff, BackoffKind::Exponential);
}

fn instances_from_env(prefix: &str, value: &str) -> Vec<String> {
    std::env::set_var(format!("{prefix}RETRIEVAL__INSTANCES"), value);
    let config = Config::from_figment(
        Figment::from(Serialized::defaults(Settings::default())).merge(Env::prefixed(prefix).split("__")),
    );
    let settings = config.settings().expect("settings");
    std::env::remove_var(format!("{prefix}RETRIEVAL__INSTANCES"));
    settings.retrieval.instances
}

#[test]
fn env_instances_accept_comma_separated_list() {
    assert_eq!(instances_from_env("VEDAKB_T1_", "rig,sama"), vec!["rig", "sama"]);
}

#[test]
fn env_instances_accept_scalar_looking_values() {
    assert_eq!(instances_from_env("VEDAKB_T2_", "1"), vec!["1"]);
    assert_eq!(instances_from_env("VEDAKB_T3_", "2024"), vec!["2024"]);
    assert_eq!(instances_from_env("VEDAKB_T4_", "true"), vec!["true"]);
    assert_eq!(instances_from_env("VEDAKB_T5_", "2024,rig"), vec!["2024", "rig"]);
}

#[test]
fn toml_instances_list_may_hold_numbers() {
    let config = Config::from_figment(
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::string("[retrieval]\ninstances = [\"rig\", 7]\n")),
    );
    assert_eq!(config.settings().expect("settings").retrieval.instances, vec!["rig", "7"]);
}

#[test]
fn settings_reject_zero_top_k() {
    let config = Config::from_figment(
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::string("[retrieval]\ntop_k = 0\n")),
    );
    assert!(config.settings().is_err());
}

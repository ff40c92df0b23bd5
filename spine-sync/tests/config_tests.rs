use pretty_assertions::assert_eq;
use spine_sync::{SyncConfig, SyncError};
use std::io::Write;
use tempfile::NamedTempFile;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

// ── Parsing ──────────────────────────────────────────────────────

#[test]
fn parses_sync_table() {
    let config = SyncConfig::from_toml_str("[sync]\nemulate_http = true\n").unwrap();
    assert_eq!(
        config,
        SyncConfig {
            emulate_http: true,
            emulate_json: false,
        }
    );
}

#[test]
fn missing_table_yields_defaults() {
    let config = SyncConfig::from_toml_str("[other]\nkey = 1\n").unwrap();
    assert_eq!(config, SyncConfig::default());
}

#[test]
fn bad_toml_is_an_error() {
    let err = SyncConfig::from_toml_str("[sync\n").unwrap_err();
    assert!(matches!(err, SyncError::Toml(_)));
}

// ── Loading from disk ────────────────────────────────────────────

#[test]
fn load_from_reads_file() {
    init_tracing();
    let file = write_config("[sync]\nemulate_http = true\nemulate_json = true\n");
    let config = SyncConfig::load_from(file.path());
    assert!(config.emulate_http);
    assert!(config.emulate_json);
}

#[test]
fn load_from_missing_file_falls_back() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = SyncConfig::load_from(dir.path().join("absent.toml"));
    assert_eq!(config, SyncConfig::default());
}

#[test]
fn load_from_malformed_file_falls_back() {
    init_tracing();
    let file = write_config("[sync]\nemulate_http = \"yes\"\n");
    assert_eq!(SyncConfig::load_from(file.path()), SyncConfig::default());
}

#[test]
fn read_surfaces_io_errors() {
    let dir = tempfile::tempdir().unwrap();
    let err = SyncConfig::read(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, SyncError::Io(_)));
}

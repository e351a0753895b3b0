use tempfile::TempDir;

use super::*;

#[test]
fn defaults_are_valid() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.gemini.model, "text-embedding-004");
    assert_eq!(config.chunking.max_chunk_chars, 1200);
    assert_eq!(config.chunking.overlap_chars, 150);
}

#[test]
fn load_without_file_uses_defaults() {
    let dir = TempDir::new().expect("can create temp dir");
    let config = Config::load(dir.path()).expect("load should succeed");

    assert_eq!(config, Config {
        base_dir: dir.path().to_path_buf(),
        ..Config::default()
    });
    assert_eq!(config.sessions_dir(), dir.path().join("sessions"));
}

#[test]
fn config_round_trips_through_toml() {
    let dir = TempDir::new().expect("can create temp dir");

    let mut config = Config {
        base_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    config.gemini.model = "custom-embedding-model".to_string();
    config.chunking.max_chunk_chars = 800;
    config.save().expect("save should succeed");

    let loaded = Config::load(dir.path()).expect("load should succeed");
    assert_eq!(loaded, config);
}

#[test]
fn partial_file_fills_in_defaults() {
    let dir = TempDir::new().expect("can create temp dir");
    std::fs::write(
        dir.path().join("config.toml"),
        "[chunking]\nmax_chunk_chars = 600\n",
    )
    .expect("can write config");

    let config = Config::load(dir.path()).expect("load should succeed");
    assert_eq!(config.chunking.max_chunk_chars, 600);
    assert_eq!(config.chunking.overlap_chars, 150);
    assert_eq!(config.gemini, GeminiConfig::default());
}

#[test]
fn invalid_endpoint_is_rejected() {
    let mut config = Config::default();
    config.gemini.endpoint = "not a url".to_string();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidEndpoint(_))
    ));
}

#[test]
fn empty_model_is_rejected() {
    let mut config = Config::default();
    config.gemini.model = "  ".to_string();
    assert!(matches!(config.validate(), Err(ConfigError::InvalidModel(_))));
}

#[test]
fn batch_size_bounds_are_enforced() {
    let mut config = Config::default();
    config.gemini.batch_size = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidBatchSize(0))
    ));

    config.gemini.batch_size = 101;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidBatchSize(101))
    ));
}

#[test]
fn overlap_must_be_less_than_max_chunk_size() {
    let mut config = Config::default();
    config.chunking.max_chunk_chars = 100;
    config.chunking.overlap_chars = 100;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::OverlapTooLarge(100, 100))
    ));

    config.chunking.overlap_chars = 99;
    assert!(config.validate().is_ok());
}

#[test]
fn invalid_file_fails_to_load() {
    let dir = TempDir::new().expect("can create temp dir");
    std::fs::write(dir.path().join("config.toml"), "not valid toml [")
        .expect("can write config");

    assert!(Config::load(dir.path()).is_err());
}

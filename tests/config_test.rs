//! Integration tests for loading [`EngineConfig`] from disk.

use std::time::Duration;

use huginn::{Engine, EngineConfig, HuginnError};

#[test]
fn load_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "max_concurrent = 2\nmax_queue_size = 8\ncache_ttl_ms = 1000\n",
    )
    .unwrap();

    let config = EngineConfig::load(Some(&path)).unwrap();
    assert_eq!(config.limiter.max_concurrent, 2);
    assert_eq!(config.limiter.max_queue_size, 8);
    assert_eq!(config.cache.ttl, Duration::from_secs(1));
    // Untouched keys keep their defaults.
    assert_eq!(config.retry.max_attempts, 3);
}

#[test]
fn invalid_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "max_concurrent = \"many\"").unwrap();

    let err = EngineConfig::load(Some(&path)).unwrap_err();
    assert!(matches!(err, HuginnError::Configuration(_)));
    assert!(err.to_string().contains("broken.toml"));
}

#[test]
fn missing_explicit_file_is_not_defaulted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    assert!(EngineConfig::load_or_default(Some(&path)).is_err());
}

#[tokio::test]
async fn loaded_config_drives_engine() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "max_concurrent = 1\nmax_queue_size = 0\n").unwrap();

    let config = EngineConfig::load(Some(&path)).unwrap();
    let engine: Engine<u32> = Engine::new(config).unwrap();
    assert_eq!(engine.config().limiter.max_queue_size, 0);
    assert_eq!(engine.fetch("k", None, || async { Ok(3) }).await.unwrap(), 3);
}

#[test]
fn builder_rejects_invalid_config() {
    let result = Engine::<u32>::builder()
        .config(EngineConfig::new().limiter(huginn::LimiterConfig::new().max_concurrent(0)))
        .build();
    assert!(matches!(result, Err(HuginnError::Configuration(_))));
}

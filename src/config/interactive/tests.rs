use super::load_existing_config as load_existing_config_impl;
use super::test_ollama_connection;
use crate::config::{Config, OllamaConfig};
use tempfile::TempDir;

#[test]
fn load_existing_config() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = load_existing_config_impl(temp_dir.path()).expect("config loaded successfully");
    assert!(!config.ollama.host.is_empty());
    assert!(config.ollama.port > 0);
    assert!(!config.ollama.embedding_model.is_empty());
    assert!(config.ollama.batch_size > 0);
    assert_eq!(config.base_dir, temp_dir.path());
}

#[test]
fn unreadable_config_falls_back_to_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(temp_dir.path().join("config.toml"), "not = [valid").expect("should write");

    let config = load_existing_config_impl(temp_dir.path()).expect("config loaded successfully");
    assert_eq!(config.ollama, OllamaConfig::default());
}

#[test]
fn unreachable_ollama_reports_failure() {
    let config = Config {
        ollama: OllamaConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..OllamaConfig::default()
        },
        ..Config::default()
    };
    assert!(!test_ollama_connection(&config));
}

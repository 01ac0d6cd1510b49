use super::*;
use std::fs;
use tempfile::TempDir;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn config_file_persistence() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let config_path = temp_dir.path().join("config.toml");

        let original_config = Config {
            provider: Provider::Ollama,
            ollama: OllamaConfig {
                protocol: "https".to_string(),
                host: "test-host".to_string(),
                port: 8080,
                chat_model: "test-model".to_string(),
                ..OllamaConfig::default()
            },
            base_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };

        let toml_content = toml::to_string_pretty(&original_config)
            .expect("config should convert to toml string successfully");
        fs::write(&config_path, toml_content).expect("should write to config_path successfully");

        let loaded_config =
            Config::load_file(temp_dir.path()).expect("should load config file successfully");

        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let toml_str = r#"provider = "bedrock""#;
        let result: Result<Config, toml::de::Error> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn invalid_file_fails_to_load() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        fs::write(temp_dir.path().join("config.toml"), "[server]\nport = \"x\"\n")
            .expect("should write config");

        assert!(Config::load_file(temp_dir.path()).is_err());
    }

    #[test]
    fn openai_compatible_server_round_trips() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let mut config = Config {
            base_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };
        config.openai.base_url = "http://gateway.internal:8000/openai".to_string();
        config
            .openai
            .set_embedding_dimension(3072)
            .expect("3072 should be a valid dimension");
        config.save().expect("should save config");

        let loaded = Config::load_file(temp_dir.path()).expect("should load config file");
        assert_eq!(loaded.embedding_dimension(), 3072);
        assert_eq!(
            loaded.openai_url().expect("openai_url is ok").as_str(),
            "http://gateway.internal:8000/openai"
        );
    }

    #[test]
    fn absent_secrets_are_omitted_from_file() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let config = Config {
            base_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };
        config.save().expect("should save config");

        let written = fs::read_to_string(config.config_file_path())
            .expect("should read saved config");
        assert!(!written.contains("api_key"));
        assert!(!written.contains("base_dir"));
    }

    #[test]
    fn store_settings_are_validated() {
        let bad_collection = Config {
            vector_store: VectorStoreConfig {
                collection: "docs collection".to_string(),
                ..VectorStoreConfig::default()
            },
            ..Config::default()
        };
        assert!(matches!(
            bad_collection.validate(),
            Err(ConfigError::InvalidCollection(_))
        ));

        let bad_top_k = Config {
            vector_store: VectorStoreConfig {
                top_k: 0,
                ..VectorStoreConfig::default()
            },
            ..Config::default()
        };
        assert!(matches!(
            bad_top_k.validate(),
            Err(ConfigError::InvalidTopK(0))
        ));
    }
}

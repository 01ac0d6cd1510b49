use super::*;
use std::collections::HashMap;
use tempfile::TempDir;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.provider, Provider::OpenAi);
    assert_eq!(config.ollama.protocol, "http");
    assert_eq!(config.ollama.host, "localhost");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.ollama.embedding_model, "mxbai-embed-large");
    assert_eq!(config.ollama.embedding_dimension, 1024);
    assert_eq!(config.openai.embedding_model, "text-embedding-3-small");
    assert_eq!(config.openai.embedding_dimension, 1536);
    assert_eq!(config.openai.chat_model, "gpt-4o-mini");
    assert_eq!(config.openai.base_url, "https://api.openai.com/v1");
    assert_eq!(config.vector_store.collection, "docmind_collection");
    assert_eq!(config.vector_store.top_k, 3);
    assert_eq!(config.chunking.chunk_size, 1000);
    assert_eq!(config.chunking.chunk_overlap, 200);
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.ollama.protocol = "ftp".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.embedding_model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.openai.batch_size = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.openai.base_url = "not a url".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.vector_store.collection = "bad name!".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.vector_store.top_k = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.chunking.chunk_overlap = invalid_config.chunking.chunk_size;
    assert!(invalid_config.validate().is_err());
}

#[test]
fn active_provider_selection() {
    let mut config = Config::default();
    assert_eq!(config.embedding_model(), "text-embedding-3-small");
    assert_eq!(config.embedding_dimension(), 1536);

    config.provider = Provider::Ollama;
    assert_eq!(config.embedding_model(), "mxbai-embed-large");
    assert_eq!(config.embedding_dimension(), 1024);
    assert_eq!(config.chat_model(Provider::Ollama), "llama3");
    assert_eq!(config.chat_model(Provider::OpenAi), "gpt-4o-mini");
}

#[test]
fn provider_parsing() {
    assert_eq!("openai".parse::<Provider>().ok(), Some(Provider::OpenAi));
    assert_eq!(" Ollama ".parse::<Provider>().ok(), Some(Provider::Ollama));
    assert!("anthropic".parse::<Provider>().is_err());
    assert_eq!(Provider::Ollama.to_string(), "ollama");
}

#[test]
fn ollama_url_generation() {
    let config = Config::default();
    let url = config
        .ollama_url()
        .expect("should generate ollama_url successfully");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let mut parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    parsed_config.base_dir = config.base_dir.clone();
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_toml_uses_defaults() {
    let partial = r#"
        provider = "ollama"

        [ollama]
        host = "gpu-box"
    "#;

    let config: Config = toml::from_str(partial).expect("should parse partial toml");
    assert_eq!(config.provider, Provider::Ollama);
    assert_eq!(config.ollama.host, "gpu-box");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.openai, OpenAiConfig::default());
}

#[test]
fn environment_overrides() {
    let mut config = Config::default();
    config
        .apply_overrides(lookup_from(&[
            ("LLM_PROVIDER", "OLLAMA"),
            ("OLLAMA_BASE_URL", "http://host.docker.internal:11435"),
            ("OLLAMA_MODEL", "llama3.1"),
            ("OLLAMA_EMBED_MODEL", "nomic-embed-text"),
            ("OPENAI_API_KEY", "sk-test"),
            ("DOCMIND_PORT", "9000"),
            ("VECTOR_STORE_URI", "/data/vectors"),
        ]))
        .expect("overrides should apply");

    assert_eq!(config.provider, Provider::Ollama);
    assert_eq!(config.ollama.host, "host.docker.internal");
    assert_eq!(config.ollama.port, 11435);
    assert_eq!(config.ollama.chat_model, "llama3.1");
    assert_eq!(config.ollama.embedding_model, "nomic-embed-text");
    assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.vector_store_uri(), "/data/vectors");
}

#[test]
fn invalid_environment_overrides() {
    let mut config = Config::default();
    assert!(
        config
            .apply_overrides(lookup_from(&[("LLM_PROVIDER", "azure")]))
            .is_err()
    );
    assert!(
        config
            .apply_overrides(lookup_from(&[("DOCMIND_PORT", "eighty")]))
            .is_err()
    );
    assert!(
        config
            .apply_overrides(lookup_from(&[("OLLAMA_BASE_URL", "::nope")]))
            .is_err()
    );
}

#[test]
fn empty_api_key_is_ignored() {
    let mut config = Config::default();
    config
        .apply_overrides(lookup_from(&[("OPENAI_API_KEY", "  ")]))
        .expect("overrides should apply");
    assert_eq!(config.openai.api_key, None);
}

#[test]
fn save_and_load_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    config.provider = Provider::Ollama;
    config.server.port = 8181;

    config.save().expect("should save config");
    assert!(temp_dir.path().join("config.toml").exists());

    let loaded = Config::load_file(temp_dir.path()).expect("should load config");
    assert_eq!(loaded, config);
}

#[test]
fn missing_file_gives_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let loaded = Config::load_file(temp_dir.path()).expect("should load defaults");
    assert_eq!(loaded.server, ServerConfig::default());
    assert_eq!(loaded.base_dir, temp_dir.path());
}

#[test]
fn default_vector_store_location() {
    let config = Config {
        base_dir: PathBuf::from("/srv/docmind"),
        ..Config::default()
    };
    assert!(config.vector_store_uri().ends_with("vectors"));
    assert!(config.vector_store_uri().starts_with("/srv/docmind"));
}

#[test]
fn setter_validation() {
    let mut config = OllamaConfig::default();

    assert!(config.set_protocol("https".to_string()).is_ok());
    assert!(config.set_host("example.com".to_string()).is_ok());
    assert!(config.set_port(8080).is_ok());
    assert!(config.set_chat_model("mistral".to_string()).is_ok());
    assert!(config.set_batch_size(128).is_ok());
    assert!(config.set_embedding_dimension(768).is_ok());

    assert!(config.set_protocol("ftp".to_string()).is_err());
    assert!(config.set_port(0).is_err());
    assert!(config.set_embedding_model("   ".to_string()).is_err());
    assert!(config.set_batch_size(0).is_err());
    assert!(config.set_batch_size(1001).is_err());
    assert!(config.set_embedding_dimension(8).is_err());
}

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use url::Url;

use crate::backends::DEFAULT_TIMEOUT_SECONDS;
use crate::embeddings::chunking::ChunkingConfig;

const DEFAULT_COLLECTION: &str = "docmind_collection";

/// Backend family used for embeddings (process-wide) and for answer
/// generation (per request)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Provider {
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "ollama")]
    Ollama,
}

impl Provider {
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }
}

impl fmt::Display for Provider {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::InvalidProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub provider: Provider,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

const fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            server: ServerConfig::default(),
            ollama: OllamaConfig::default(),
            openai: OpenAiConfig::default(),
            chunking: ChunkingConfig::default(),
            vector_store: VectorStoreConfig::default(),
            base_dir: Config::default_base_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub embedding_model: String,
    pub embedding_dimension: u32,
    pub chat_model: String,
    pub batch_size: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            embedding_model: "mxbai-embed-large".to_string(),
            embedding_dimension: 1024,
            chat_model: "llama3".to_string(),
            batch_size: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OpenAiConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub embedding_model: String,
    pub embedding_dimension: u32,
    pub chat_model: String,
    pub batch_size: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimension: 1536,
            chat_model: "gpt-4o-mini".to_string(),
            batch_size: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// Local directory or remote `db://` URI. Defaults to `<base_dir>/vectors`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    pub collection: String,
    pub top_k: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            uri: None,
            collection: DEFAULT_COLLECTION.to_string(),
            top_k: 3,
            api_key: None,
            region: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid provider: {0} (must be 'openai' or 'ollama')")]
    InvalidProvider(String),
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid chunk size: {0} (must be between 100 and 8000 characters)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid collection name: {0:?} (letters, digits, '_' and '-' only)")]
    InvalidCollection(String),
    #[error("Invalid top_k: {0} (must be between 1 and 50)")]
    InvalidTopK(usize),
    #[error("Invalid upload limit: {0} bytes (must be greater than 0)")]
    InvalidUploadLimit(usize),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid value for {0}: {1:?}")]
    InvalidEnvironment(String, String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Default application directory: `$DOCMIND_HOME`, else `~/.docmind`
    #[inline]
    pub fn default_base_dir() -> PathBuf {
        if let Some(home) = std::env::var_os("DOCMIND_HOME") {
            return PathBuf::from(home);
        }
        dirs::home_dir().map_or_else(|| PathBuf::from(".docmind"), |h| h.join(".docmind"))
    }

    /// Load from the default directory with environment overrides applied
    #[inline]
    pub fn load_default() -> Result<Self> {
        Self::load(Self::default_base_dir())
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let mut config = Self::load_file(config_dir)?;
        config
            .apply_overrides(|key| std::env::var(key).ok())
            .context("Invalid environment override")?;

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    /// Read `config.toml` without consulting the environment
    #[inline]
    pub fn load_file<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Apply environment-style overrides from `lookup`
    ///
    /// Recognised keys: `LLM_PROVIDER`, `OLLAMA_BASE_URL`, `OLLAMA_MODEL`,
    /// `OLLAMA_EMBED_MODEL`, `OPENAI_API_KEY`, `OPENAI_BASE_URL`,
    /// `DOCMIND_HOST`, `DOCMIND_PORT`, `VECTOR_STORE_URI`, `LANCEDB_API_KEY`.
    #[inline]
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("LLM_PROVIDER") {
            self.provider = provider.parse()?;
        }

        if let Some(base_url) = lookup("OLLAMA_BASE_URL") {
            let url = Url::parse(&base_url)
                .map_err(|_| ConfigError::InvalidUrl(base_url.clone()))?;
            self.ollama.set_protocol(url.scheme().to_string())?;
            let host = url
                .host_str()
                .ok_or_else(|| ConfigError::InvalidUrl(base_url.clone()))?;
            self.ollama.host = host.to_string();
            if let Some(port) = url.port_or_known_default() {
                self.ollama.set_port(port)?;
            }
        }

        if let Some(model) = lookup("OLLAMA_MODEL") {
            self.ollama.set_chat_model(model)?;
        }

        if let Some(model) = lookup("OLLAMA_EMBED_MODEL") {
            self.ollama.set_embedding_model(model)?;
        }

        if let Some(key) = lookup("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                self.openai.api_key = Some(key);
            }
        }

        if let Some(base_url) = lookup("OPENAI_BASE_URL") {
            Url::parse(&base_url).map_err(|_| ConfigError::InvalidUrl(base_url.clone()))?;
            self.openai.base_url = base_url;
        }

        if let Some(host) = lookup("DOCMIND_HOST") {
            self.server.host = host;
        }

        if let Some(port) = lookup("DOCMIND_PORT") {
            let port: u16 = port
                .parse()
                .map_err(|_| ConfigError::InvalidEnvironment("DOCMIND_PORT".to_string(), port))?;
            if port == 0 {
                return Err(ConfigError::InvalidPort(port));
            }
            self.server.port = port;
        }

        if let Some(uri) = lookup("VECTOR_STORE_URI") {
            self.vector_store.uri = Some(uri);
        }

        if let Some(key) = lookup("LANCEDB_API_KEY") {
            self.vector_store.api_key = Some(key);
        }

        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama.validate()?;
        self.openai.validate()?;
        self.chunking.validate()?;
        self.validate_server_config()?;
        self.validate_vector_store_config()?;

        if !(1..=600).contains(&self.timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }

        Ok(())
    }

    fn validate_server_config(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort(self.server.port));
        }

        if self.server.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidUploadLimit(self.server.max_upload_bytes));
        }

        Ok(())
    }

    fn validate_vector_store_config(&self) -> Result<(), ConfigError> {
        let store = &self.vector_store;

        let valid_name = !store.collection.is_empty()
            && store
                .collection
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid_name {
            return Err(ConfigError::InvalidCollection(store.collection.clone()));
        }

        if !(1..=50).contains(&store.top_k) {
            return Err(ConfigError::InvalidTopK(store.top_k));
        }

        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// Location handed to LanceDB: the configured URI or `<base_dir>/vectors`
    #[inline]
    pub fn vector_store_uri(&self) -> String {
        self.vector_store.uri.clone().unwrap_or_else(|| {
            self.get_base_dir()
                .join("vectors")
                .to_string_lossy()
                .into_owned()
        })
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.ollama.ollama_url()
    }

    #[inline]
    pub fn openai_url(&self) -> Result<Url, ConfigError> {
        self.openai.openai_url()
    }

    /// Embedding model of the process-wide provider
    #[inline]
    pub fn embedding_model(&self) -> &str {
        match self.provider {
            Provider::OpenAi => &self.openai.embedding_model,
            Provider::Ollama => &self.ollama.embedding_model,
        }
    }

    /// Vector dimension of the process-wide provider
    #[inline]
    pub fn embedding_dimension(&self) -> usize {
        match self.provider {
            Provider::OpenAi => self.openai.embedding_dimension as usize,
            Provider::Ollama => self.ollama.embedding_dimension as usize,
        }
    }

    /// Chat model used when answering through `provider`
    #[inline]
    pub fn chat_model(&self, provider: Provider) -> &str {
        match provider {
            Provider::OpenAi => &self.openai.chat_model,
            Provider::Ollama => &self.ollama.chat_model,
        }
    }
}

fn validate_model_name(model: &str) -> Result<(), ConfigError> {
    if model.trim().is_empty() {
        return Err(ConfigError::InvalidModel(model.to_string()));
    }
    Ok(())
}

fn validate_batch_size(batch_size: u32) -> Result<(), ConfigError> {
    if batch_size == 0 || batch_size > 1000 {
        return Err(ConfigError::InvalidBatchSize(batch_size));
    }
    Ok(())
}

fn validate_dimension(dimension: u32) -> Result<(), ConfigError> {
    if !(64..=4096).contains(&dimension) {
        return Err(ConfigError::InvalidEmbeddingDimension(dimension));
    }
    Ok(())
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidUrl(format!(
                "{}://:{}",
                self.protocol, self.port
            )));
        }

        self.ollama_url()?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        validate_model_name(&self.embedding_model)?;
        validate_model_name(&self.chat_model)?;
        validate_batch_size(self.batch_size)?;
        validate_dimension(self.embedding_dimension)?;

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    pub fn set_protocol(&mut self, protocol: String) -> Result<(), ConfigError> {
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::InvalidProtocol(protocol));
        }
        self.protocol = protocol;
        Ok(())
    }

    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        let temp_config = OllamaConfig {
            host: host.clone(),
            ..self.clone()
        };
        temp_config.validate()?;
        self.host = host;
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    pub fn set_embedding_model(&mut self, model: String) -> Result<(), ConfigError> {
        validate_model_name(&model)?;
        self.embedding_model = model;
        Ok(())
    }

    pub fn set_chat_model(&mut self, model: String) -> Result<(), ConfigError> {
        validate_model_name(&model)?;
        self.chat_model = model;
        Ok(())
    }

    pub fn set_batch_size(&mut self, batch_size: u32) -> Result<(), ConfigError> {
        validate_batch_size(batch_size)?;
        self.batch_size = batch_size;
        Ok(())
    }

    pub fn set_embedding_dimension(&mut self, dimension: u32) -> Result<(), ConfigError> {
        validate_dimension(dimension)?;
        self.embedding_dimension = dimension;
        Ok(())
    }
}

impl OpenAiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.openai_url()?;
        validate_model_name(&self.embedding_model)?;
        validate_model_name(&self.chat_model)?;
        validate_batch_size(self.batch_size)?;
        validate_dimension(self.embedding_dimension)?;
        Ok(())
    }

    pub fn openai_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.base_url)
            .map_err(|_| ConfigError::InvalidUrl(self.base_url.clone()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidProtocol(url.scheme().to_string()));
        }
        Ok(url)
    }

    pub fn set_chat_model(&mut self, model: String) -> Result<(), ConfigError> {
        validate_model_name(&model)?;
        self.chat_model = model;
        Ok(())
    }

    pub fn set_embedding_model(&mut self, model: String) -> Result<(), ConfigError> {
        validate_model_name(&model)?;
        self.embedding_model = model;
        Ok(())
    }

    pub fn set_embedding_dimension(&mut self, dimension: u32) -> Result<(), ConfigError> {
        validate_dimension(dimension)?;
        self.embedding_dimension = dimension;
        Ok(())
    }
}

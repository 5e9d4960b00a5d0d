//! Configuration loading, validation, and management for Docbot.
//!
//! Loads configuration from `~/.docbot/config.toml` (or an explicit path)
//! with environment variable overrides. Validates all settings at startup;
//! nothing is re-read once a session is running.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.docbot/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the LLM / embeddings endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Log level used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Language model settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Query embedding settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Retrieval settings
    #[serde(default)]
    pub retriever: RetrieverConfig,

    /// Conversation memory settings
    #[serde(default)]
    pub history: HistoryConfig,

    /// Vector store backend
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
}

fn default_log_level() -> String {
    "info".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("log_level", &self.log_level)
            .field("llm", &self.llm)
            .field("embedding", &self.embedding)
            .field("retriever", &self.retriever)
            .field("history", &self.history)
            .field("vector_store", &self.vector_store)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name, used for logging and the default endpoint
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub temperature: f32,

    /// Size of the model's context window in tokens
    #[serde(default = "default_context_window")]
    pub context_window_tokens: usize,

    /// Override the OpenAI-compatible base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Per-call timeout for completion and embedding requests
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_context_window() -> usize {
    16385
}
fn default_timeout_secs() -> u64 {
    10
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            temperature: 0.0,
            context_window_tokens: default_context_window(),
            api_url: None,
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieverConfig {
    /// Number of documents fetched per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Chunk size (tokens) the index was built with
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Per-call timeout for vector store requests
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_top_k() -> usize {
    5
}
fn default_chunk_size() -> usize {
    500
}

impl RetrieverConfig {
    /// Tokens reserved for the retrieved context: `top_k × chunk_size`.
    pub fn context_max_tokens(&self) -> usize {
        self.top_k * self.chunk_size
    }

    /// Slack for titles and URLs rendered around each chunk: one chunk's worth.
    pub fn metadata_buffer_tokens(&self) -> usize {
        self.chunk_size
    }
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            chunk_size: default_chunk_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Token ceiling of the rolling conversation memory
    #[serde(default = "default_history_tokens")]
    pub max_tokens: usize,
}

// Short answers run ~40 tokens, long ones ~200: room for about five long exchanges.
fn default_history_tokens() -> usize {
    1200
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_history_tokens(),
        }
    }
}

/// Which vector store serves similarity search. Selected by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum VectorStoreConfig {
    Pinecone(PineconeConfig),
    Opensearch(OpenSearchConfig),
}

impl VectorStoreConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pinecone(_) => "pinecone",
            Self::Opensearch(_) => "opensearch",
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self::Pinecone(PineconeConfig::default())
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct PineconeConfig {
    #[serde(default = "default_index_name")]
    pub index_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Data-plane host of the index; resolved through the control plane when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default = "default_control_plane")]
    pub control_plane_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

fn default_index_name() -> String {
    "apify-doc-platform".into()
}
fn default_control_plane() -> String {
    "https://api.pinecone.io".into()
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            index_name: default_index_name(),
            api_key: None,
            host: None,
            control_plane_url: default_control_plane(),
            namespace: None,
        }
    }
}

impl std::fmt::Debug for PineconeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PineconeConfig")
            .field("index_name", &self.index_name)
            .field("api_key", &redact(&self.api_key))
            .field("host", &self.host)
            .field("control_plane_url", &self.control_plane_url)
            .field("namespace", &self.namespace)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct OpenSearchConfig {
    /// Cluster endpoint, with or without scheme
    pub url: String,

    #[serde(default = "default_index_name")]
    pub index_name: String,

    #[serde(default = "default_vector_field")]
    pub vector_field: String,

    #[serde(default = "default_text_field")]
    pub text_field: String,

    #[serde(default = "default_true")]
    pub use_ssl: bool,

    #[serde(default = "default_true")]
    pub verify_certs: bool,

    /// Sign requests with AWS SigV4
    #[serde(default)]
    pub aws4_auth: bool,

    #[serde(default = "default_aws_region")]
    pub aws_region: String,

    /// "es" for managed domains, "aoss" for serverless collections
    #[serde(default = "default_aws_service")]
    pub aws_service_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_access_key_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_secret_access_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_session_token: Option<String>,
}

fn default_vector_field() -> String {
    "vector_field".into()
}
fn default_text_field() -> String {
    "text".into()
}
fn default_true() -> bool {
    true
}
fn default_aws_region() -> String {
    "us-east-1".into()
}
fn default_aws_service() -> String {
    "es".into()
}

impl std::fmt::Debug for OpenSearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenSearchConfig")
            .field("url", &self.url)
            .field("index_name", &self.index_name)
            .field("vector_field", &self.vector_field)
            .field("text_field", &self.text_field)
            .field("use_ssl", &self.use_ssl)
            .field("verify_certs", &self.verify_certs)
            .field("aws4_auth", &self.aws4_auth)
            .field("aws_region", &self.aws_region)
            .field("aws_service_name", &self.aws_service_name)
            .field("aws_access_key_id", &redact(&self.aws_access_key_id))
            .field("aws_secret_access_key", &redact(&self.aws_secret_access_key))
            .field("aws_session_token", &redact(&self.aws_session_token))
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.docbot/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Load configuration from `path` (or the default path), then apply
    /// environment variable overrides:
    /// - `DOCBOT_API_KEY`, then `OPENAI_API_KEY`
    /// - `DOCBOT_MODEL`, `DOCBOT_LOG_LEVEL`
    /// - `PINECONE_API_KEY`, `PINECONE_INDEX_NAME` (Pinecone backend)
    /// - `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_SESSION_TOKEN` (OpenSearch backend)
    pub fn load_with(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path(),
        };
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup. Keys already set in the
    /// file win for secrets; model and log level always follow the environment.
    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = env("DOCBOT_API_KEY").or_else(|| env("OPENAI_API_KEY"));
        }

        if let Some(model) = env("DOCBOT_MODEL") {
            self.llm.model = model;
        }

        if let Some(level) = env("DOCBOT_LOG_LEVEL") {
            self.log_level = level;
        }

        match &mut self.vector_store {
            VectorStoreConfig::Pinecone(pc) => {
                if pc.api_key.is_none() {
                    pc.api_key = env("PINECONE_API_KEY");
                }
                if let Some(index) = env("PINECONE_INDEX_NAME") {
                    pc.index_name = index;
                }
            }
            VectorStoreConfig::Opensearch(os) => {
                if os.aws_access_key_id.is_none() {
                    os.aws_access_key_id = env("AWS_ACCESS_KEY_ID");
                }
                if os.aws_secret_access_key.is_none() {
                    os.aws_secret_access_key = env("AWS_SECRET_ACCESS_KEY");
                }
                if os.aws_session_token.is_none() {
                    os.aws_session_token = env("AWS_SESSION_TOKEN");
                }
            }
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".docbot")
    }

    /// Get the default configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.temperature < 0.0 || self.llm.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "llm.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.llm.context_window_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "llm.context_window_tokens must be > 0".into(),
            ));
        }

        if self.retriever.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retriever.top_k must be > 0".into(),
            ));
        }

        if self.retriever.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "retriever.chunk_size must be > 0".into(),
            ));
        }

        if self.history.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "history.max_tokens must be > 0".into(),
            ));
        }

        match &self.vector_store {
            VectorStoreConfig::Pinecone(pc) if pc.index_name.trim().is_empty() => Err(
                ConfigError::ValidationError("vector_store.index_name must not be empty".into()),
            ),
            VectorStoreConfig::Opensearch(os) if os.url.trim().is_empty() => Err(
                ConfigError::ValidationError("vector_store.url must not be empty".into()),
            ),
            _ => Ok(()),
        }
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// A copy with every secret replaced by `[REDACTED]`, safe to print.
    pub fn redacted(&self) -> Self {
        fn mask(s: &mut Option<String>) {
            if s.is_some() {
                *s = Some("[REDACTED]".into());
            }
        }

        let mut config = self.clone();
        mask(&mut config.api_key);
        match &mut config.vector_store {
            VectorStoreConfig::Pinecone(pc) => mask(&mut pc.api_key),
            VectorStoreConfig::Opensearch(os) => {
                mask(&mut os.aws_access_key_id);
                mask(&mut os.aws_secret_access_key);
                mask(&mut os.aws_session_token);
            }
        }
        config
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            log_level: default_log_level(),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            retriever: RetrieverConfig::default(),
            history: HistoryConfig::default(),
            vector_store: VectorStoreConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

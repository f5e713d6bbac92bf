//! Configuration loading, validation, and management for sourcewell.
//!
//! Loads configuration from `~/.sourcewell/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Tokenizers the approaches know how to build.
pub const KNOWN_TOKENIZERS: &[&str] = &["tiktoken", "heuristic"];

/// Prompt budget policies the message builder understands.
pub const KNOWN_BUDGET_POLICIES: &[&str] = &["history_only", "everything"];

/// The root configuration structure.
///
/// Maps directly to `~/.sourcewell/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chat and embedding endpoint (OpenAI-compatible)
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Search index service
    #[serde(default)]
    pub search: SearchConfig,

    /// Blob storage holding rendered page images
    #[serde(default)]
    pub storage: StorageConfig,

    /// Image-query vectorization endpoint
    #[serde(default)]
    pub vision: VisionConfig,

    /// Prompt assembly and answering behavior
    #[serde(default)]
    pub approach: ApproachConfig,

    /// HTTP gateway
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Model used for query rewriting and text-only answers
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Vision-capable model used when images are sent
    #[serde(default = "default_vision_model")]
    pub vision_model: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_chat_model() -> String {
    "gpt-35-turbo".into()
}
fn default_vision_model() -> String {
    "gpt-4v".into()
}
fn default_embedding_model() -> String {
    "text-embedding-ada-002".into()
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openai_base_url(),
            chat_model: default_chat_model(),
            vision_model: default_vision_model(),
            embedding_model: default_embedding_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .field("vision_model", &self.vision_model)
            .field("embedding_model", &self.embedding_model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Service endpoint, e.g. `https://mysearch.search.windows.net`.
    /// Required: the gateway refuses to start without it.
    #[serde(default)]
    pub endpoint: String,

    #[serde(default = "default_index")]
    pub index: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_search_api_version")]
    pub api_version: String,

    #[serde(default = "default_query_language")]
    pub query_language: String,

    #[serde(default = "default_query_speller")]
    pub query_speller: String,

    #[serde(default = "default_semantic_configuration")]
    pub semantic_configuration: String,
}

fn default_index() -> String {
    "gptkbindex".into()
}
fn default_search_api_version() -> String {
    "2023-07-01-Preview".into()
}
fn default_query_language() -> String {
    "en-us".into()
}
fn default_query_speller() -> String {
    "lexicon".into()
}
fn default_semantic_configuration() -> String {
    "default".into()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            index: default_index(),
            api_key: None,
            api_version: default_search_api_version(),
            query_language: default_query_language(),
            query_speller: default_query_speller(),
            semantic_configuration: default_semantic_configuration(),
        }
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("endpoint", &self.endpoint)
            .field("index", &self.index)
            .field("api_key", &redact(&self.api_key))
            .field("api_version", &self.api_version)
            .field("query_language", &self.query_language)
            .field("query_speller", &self.query_speller)
            .field("semantic_configuration", &self.semantic_configuration)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Account URL, e.g. `https://myaccount.blob.core.windows.net`.
    /// Empty disables image fetching.
    #[serde(default)]
    pub base_url: String,

    #[serde(default = "default_container")]
    pub container: String,
}

fn default_container() -> String {
    "content".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            container: default_container(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    /// Serve requests with the vision model and image retrieval
    #[serde(default)]
    pub enabled: bool,

    /// Vectorizer endpoint, with trailing slash
    #[serde(default)]
    pub endpoint: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_vision_api_version")]
    pub api_version: String,

    #[serde(default = "default_model_version")]
    pub model_version: String,
}

fn default_vision_api_version() -> String {
    "2023-02-01-preview".into()
}
fn default_model_version() -> String {
    "latest".into()
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            api_key: None,
            api_version: default_vision_api_version(),
            model_version: default_model_version(),
        }
    }
}

impl std::fmt::Debug for VisionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionConfig")
            .field("enabled", &self.enabled)
            .field("endpoint", &self.endpoint)
            .field("api_key", &redact(&self.api_key))
            .field("api_version", &self.api_version)
            .field("model_version", &self.model_version)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproachConfig {
    /// `tiktoken` (exact BPE) or `heuristic` (~4 chars per token)
    #[serde(default = "default_tokenizer")]
    pub tokenizer: String,

    /// `history_only` or `everything`
    #[serde(default = "default_budget_policy")]
    pub budget_policy: String,

    /// Completion tokens reserved for the answer
    #[serde(default = "default_response_token_limit")]
    pub response_token_limit: u32,

    #[serde(default = "default_query_max_tokens")]
    pub query_max_tokens: u32,

    /// Answer temperature when the request doesn't set one
    #[serde(default = "default_chat_temperature")]
    pub chat_temperature: f32,

    /// Single-shot answer temperature for text-only models
    #[serde(default = "default_ask_temperature")]
    pub ask_temperature: f32,

    #[serde(default = "default_true")]
    pub streaming: bool,
}

fn default_tokenizer() -> String {
    "tiktoken".into()
}
fn default_budget_policy() -> String {
    "history_only".into()
}
fn default_response_token_limit() -> u32 {
    1024
}
fn default_query_max_tokens() -> u32 {
    100
}
fn default_chat_temperature() -> f32 {
    0.7
}
fn default_ask_temperature() -> f32 {
    0.3
}
fn default_true() -> bool {
    true
}

impl Default for ApproachConfig {
    fn default() -> Self {
        Self {
            tokenizer: default_tokenizer(),
            budget_policy: default_budget_policy(),
            response_token_limit: default_response_token_limit(),
            query_max_tokens: default_query_max_tokens(),
            chat_temperature: default_chat_temperature(),
            ask_temperature: default_ask_temperature(),
            streaming: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Origins allowed by CORS and allowed to send the identity headers;
    /// empty allows any origin without them
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    50505
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location with environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply environment overrides and validate.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
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

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("SOURCEWELL_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.openai.api_key = Some(key);
        }
        if let Some(key) = lookup("SOURCEWELL_SEARCH_KEY") {
            self.search.api_key = Some(key);
        }
        if let Some(key) = lookup("SOURCEWELL_VISION_KEY") {
            self.vision.api_key = Some(key);
        }
        if let Some(model) = lookup("SOURCEWELL_CHAT_MODEL") {
            self.openai.chat_model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".sourcewell")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let a = &self.approach;
        for (name, t) in [
            ("approach.chat_temperature", a.chat_temperature),
            ("approach.ask_temperature", a.ask_temperature),
        ] {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between 0.0 and 2.0"
                )));
            }
        }

        if a.response_token_limit == 0 || a.query_max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "approach token limits must be > 0".into(),
            ));
        }

        if !KNOWN_TOKENIZERS.contains(&a.tokenizer.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown tokenizer '{}' (expected one of: {})",
                a.tokenizer,
                KNOWN_TOKENIZERS.join(", ")
            )));
        }

        if !KNOWN_BUDGET_POLICIES.contains(&a.budget_policy.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown budget_policy '{}' (expected one of: {})",
                a.budget_policy,
                KNOWN_BUDGET_POLICIES.join(", ")
            )));
        }

        if self.openai.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "openai.timeout_secs must be > 0".into(),
            ));
        }

        if self.vision.enabled && self.vision.endpoint.is_empty() {
            tracing::warn!("vision.enabled is set without vision.endpoint; image vectors are unavailable");
        }

        Ok(())
    }

    /// Check if a model API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.openai.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
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

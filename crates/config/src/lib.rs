//! Configuration loading, validation, and management for FixDesk.
//!
//! Loads configuration from `~/.fixdesk/config.toml` with environment
//! variable overrides. Validates all settings at startup; a configuration
//! that fails [`AppConfig::validate_configuration`] refuses all operation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.fixdesk/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the completion backend (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Knowledge store (vector database) configuration
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Dialogue / stage orchestration settings
    #[serde(default)]
    pub dialogue: DialogueConfig,

    /// Supported device catalog
    #[serde(default = "default_devices")]
    pub devices: Vec<DeviceModel>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_true() -> bool {
    true
}

/// Redact a secret for Debug output.
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
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("providers", &self.providers)
            .field("embedding", &self.embedding)
            .field("knowledge", &self.knowledge)
            .field("dialogue", &self.dialogue)
            .field("devices", &self.devices)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

/// Which service turns text into vectors.
#[derive(Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "voyage", "openai", or any OpenAI-compatible name with `api_url` set
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub model: String,
}

fn default_embedding_provider() -> String {
    "voyage".into()
}
fn default_embedding_model() -> String {
    "voyage-3-large".into()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_url: None,
            model: default_embedding_model(),
        }
    }
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("provider", &self.provider)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// "qdrant" or "in_memory"
    #[serde(default = "default_knowledge_backend")]
    pub backend: String,

    #[serde(default = "default_qdrant_url")]
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_collection")]
    pub collection: String,

    /// Embedding dimension expected by the collection
    #[serde(default = "default_vector_size")]
    pub vector_size: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Create the collection at startup when it is absent
    #[serde(default)]
    pub create_collection_if_missing: bool,

    /// Candidate solutions retrieved per remediation step
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_knowledge_backend() -> String {
    "qdrant".into()
}
fn default_qdrant_url() -> String {
    "http://localhost:6333".into()
}
fn default_collection() -> String {
    "device_solutions".into()
}
fn default_vector_size() -> usize {
    1024
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_top_k() -> usize {
    3
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            backend: default_knowledge_backend(),
            url: default_qdrant_url(),
            api_key: None,
            collection: default_collection(),
            vector_size: default_vector_size(),
            timeout_secs: default_timeout_secs(),
            create_collection_if_missing: false,
            top_k: default_top_k(),
        }
    }
}

impl std::fmt::Debug for KnowledgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeConfig")
            .field("backend", &self.backend)
            .field("url", &self.url)
            .field("api_key", &redact(&self.api_key))
            .field("collection", &self.collection)
            .field("vector_size", &self.vector_size)
            .field("timeout_secs", &self.timeout_secs)
            .field("create_collection_if_missing", &self.create_collection_if_missing)
            .field("top_k", &self.top_k)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueConfig {
    /// Symptom turns after which the phase is complete regardless of content
    #[serde(default = "default_symptom_turn_cap")]
    pub symptom_turn_cap: u32,

    /// Ask the backend for a JSON completion flag during symptom gathering
    #[serde(default = "default_true")]
    pub structured_completion: bool,

    /// Also treat completion phrases in the agent's reply as a signal
    #[serde(default = "default_true")]
    pub phrase_matching: bool,

    /// Phrases (lowercase) that mark the symptom phase as complete
    #[serde(default = "default_completion_phrases")]
    pub completion_phrases: Vec<String>,

    /// Attempts at producing a valid single remediation step per turn
    #[serde(default = "default_max_step_attempts")]
    pub max_step_attempts: u32,
}

fn default_symptom_turn_cap() -> u32 {
    5
}
fn default_max_step_attempts() -> u32 {
    2
}
fn default_completion_phrases() -> Vec<String> {
    [
        "all symptoms",
        "ready to troubleshoot",
        "enough information",
        "i have all the information",
        "let me now",
        "now i'll",
        "proceeding to",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            symptom_turn_cap: default_symptom_turn_cap(),
            structured_completion: true,
            phrase_matching: true,
            completion_phrases: default_completion_phrases(),
            max_step_attempts: default_max_step_attempts(),
        }
    }
}

/// A supported device in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceModel {
    /// Model identifier (e.g. "EH222")
    pub model: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,
}

impl DeviceModel {
    pub fn new(model: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            description: description.into(),
        }
    }

    /// "EH222 - Ice Cube Machine"
    pub fn display_name(&self) -> String {
        if self.description.is_empty() {
            self.model.clone()
        } else {
            format!("{} - {}", self.model, self.description)
        }
    }
}

fn default_devices() -> Vec<DeviceModel> {
    vec![
        DeviceModel::new("EH222", "Ice Cube Machine"),
        DeviceModel::new("EH130", "Ice Cube Machine"),
        DeviceModel::new("EH330", "Ice Cube Machine"),
    ]
}

impl AppConfig {
    /// Load configuration from the default path (~/.fixdesk/config.toml).
    ///
    /// Environment variables override file values (see [`AppConfig::apply_overrides`]).
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
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

    /// Apply environment overrides through `lookup`. Values are trimmed and
    /// blank values are ignored.
    ///
    /// - `FIXDESK_API_KEY`, then `OPENAI_API_KEY`: completion backend key (only if unset)
    /// - `FIXDESK_PROVIDER`, `MODEL`, `AGENT_TEMPERATURE`
    /// - `FIXDESK_EMBEDDING_API_KEY`, then `VOYAGE_API_KEY`: embedding key (only if unset)
    /// - `QDRANT_URL`, `QDRANT_API_KEY`, `QDRANT_COLLECTION_NAME`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if self.api_key.is_none() {
            self.api_key = get("FIXDESK_API_KEY").or_else(|| get("OPENAI_API_KEY"));
        }
        if let Some(provider) = get("FIXDESK_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(model) = get("MODEL") {
            self.default_model = model;
        }
        if let Some(temperature) = get("AGENT_TEMPERATURE") {
            match temperature.parse() {
                Ok(t) => self.default_temperature = t,
                Err(_) => tracing::warn!(value = %temperature, "Ignoring unparseable AGENT_TEMPERATURE"),
            }
        }

        if self.embedding.api_key.is_none() {
            self.embedding.api_key =
                get("FIXDESK_EMBEDDING_API_KEY").or_else(|| get("VOYAGE_API_KEY"));
        }

        if let Some(url) = get("QDRANT_URL") {
            self.knowledge.url = url;
        }
        if let Some(key) = get("QDRANT_API_KEY") {
            self.knowledge.api_key = Some(key);
        }
        if let Some(collection) = get("QDRANT_COLLECTION_NAME") {
            self.knowledge.collection = collection;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".fixdesk")
    }

    /// Validate value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.dialogue.symptom_turn_cap == 0 {
            return Err(ConfigError::ValidationError(
                "dialogue.symptom_turn_cap must be at least 1".into(),
            ));
        }

        if self.dialogue.max_step_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "dialogue.max_step_attempts must be at least 1".into(),
            ));
        }

        if self.knowledge.vector_size == 0 {
            return Err(ConfigError::ValidationError(
                "knowledge.vector_size must be > 0".into(),
            ));
        }

        if self.devices.is_empty() {
            return Err(ConfigError::ValidationError(
                "device catalog is empty; add at least one [[devices]] entry".into(),
            ));
        }

        Ok(())
    }

    /// Startup gate consulted before any turn is processed.
    ///
    /// Returns `(ok, message)`; `message` explains the first failure.
    pub fn validate_configuration(&self) -> (bool, Option<String>) {
        match self.check() {
            Ok(()) => (true, None),
            Err(e) => (false, Some(e.to_string())),
        }
    }

    /// Like [`validate_configuration`](Self::validate_configuration), as a `Result`.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()?;
        if !self.has_api_key() {
            return Err(ConfigError::MissingCredential("OPENAI_API_KEY not set".into()));
        }
        Ok(())
    }

    /// Check if a completion backend API key is available.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
    }

    /// Look up a catalog entry by model id (case-insensitive).
    pub fn device(&self, model: &str) -> Option<&DeviceModel> {
        self.devices
            .iter()
            .find(|d| d.model.eq_ignore_ascii_case(model.trim()))
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            providers: HashMap::new(),
            embedding: EmbeddingConfig::default(),
            knowledge: KnowledgeConfig::default(),
            dialogue: DialogueConfig::default(),
            devices: default_devices(),
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

    #[error("{0}")]
    MissingCredential(String),
}

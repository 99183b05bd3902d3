//! Configuration loading, validation, and management for FBot.
//!
//! Loads configuration from `~/.fbot/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.fbot/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Model used by handlers (and the router, unless overridden)
    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub compaction: CompactionConfig,

    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_true() -> bool {
    true
}

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
            .field("gateway", &self.gateway)
            .field("storage", &self.storage)
            .field("orchestrator", &self.orchestrator)
            .field("compaction", &self.compaction)
            .field("knowledge", &self.knowledge)
            .field("search", &self.search)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

/// Durable stores for threads and tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite URL, or `memory` for the in-process stores
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Upper bound of the shared connection pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Seconds a caller waits for a pooled connection before "service unavailable"
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_database_url() -> String {
    format!("sqlite://{}?mode=rwc", AppConfig::config_dir().join("fbot.db").display())
}
fn default_max_connections() -> u32 {
    15
}
fn default_acquire_timeout() -> u64 {
    30
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }
}

impl StorageConfig {
    pub fn is_in_memory(&self) -> bool {
        self.database_url == "memory"
    }
}

/// What to do when a message arrives for a thread that is mid-turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnBusy {
    /// Fail immediately with a "turn in progress" condition
    #[default]
    Reject,
    /// Wait for the running turn to finish
    Queue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Model used by the router; falls back to `default_model`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router_model: Option<String>,

    /// Tool rounds a handler may run before it must answer
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,

    /// Turns of history shown to the router
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    #[serde(default)]
    pub on_busy: OnBusy,

    /// Owner of threads created without an explicit user
    #[serde(default = "default_user_id")]
    pub default_user_id: String,
}

fn default_max_tool_rounds() -> u32 {
    8
}
fn default_history_window() -> usize {
    10
}
fn default_user_id() -> String {
    "1".into()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            router_model: None,
            max_tool_rounds: default_max_tool_rounds(),
            history_window: default_history_window(),
            on_busy: OnBusy::default(),
            default_user_id: default_user_id(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Compact once the active history holds more turns than this
    #[serde(default = "default_compaction_max_turns")]
    pub max_turns: usize,

    /// ...or more characters than this
    #[serde(default = "default_compaction_max_chars")]
    pub max_chars: usize,

    /// Most recent turns always kept verbatim
    #[serde(default = "default_keep_recent")]
    pub keep_recent: usize,
}

fn default_compaction_max_turns() -> usize {
    20
}
fn default_compaction_max_chars() -> usize {
    12_000
}
fn default_keep_recent() -> usize {
    6
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_turns: default_compaction_max_turns(),
            max_chars: default_compaction_max_chars(),
            keep_recent: default_keep_recent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Directory of `.txt` / `.md` documents to index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs_dir: Option<PathBuf>,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_top_k() -> usize {
    3
}
fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            docs_dir: None,
            top_k: default_top_k(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Tavily API key; web search is unavailable without one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_search_results")]
    pub max_results: usize,
}

fn default_search_results() -> usize {
    3
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            max_results: default_search_results(),
        }
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("api_key", &redact(&self.api_key))
            .field("max_results", &self.max_results)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.fbot/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply environment overrides and validate.
    ///
    /// Recognized variables:
    /// - `FBOT_API_KEY`, then `OPENAI_API_KEY` (only when no key is configured)
    /// - `FBOT_PROVIDER`, `FBOT_MODEL`
    /// - `FBOT_DATABASE_URL`
    /// - `TAVILY_API_KEY`
    /// - `FBOT_KNOWLEDGE_DIR`
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

    /// Apply overrides from an environment lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("FBOT_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(provider) = lookup("FBOT_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(model) = lookup("FBOT_MODEL") {
            self.default_model = model;
        }
        if let Some(url) = lookup("FBOT_DATABASE_URL") {
            self.storage.database_url = url;
        }
        if self.search.api_key.is_none() {
            self.search.api_key = lookup("TAVILY_API_KEY");
        }
        if let Some(dir) = lookup("FBOT_KNOWLEDGE_DIR") {
            self.knowledge.docs_dir = Some(PathBuf::from(dir));
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".fbot")
    }

    /// Model the router classifies with.
    pub fn router_model(&self) -> &str {
        self.orchestrator.router_model.as_deref().unwrap_or(&self.default_model)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !(1..=10).contains(&self.orchestrator.max_tool_rounds) {
            return Err(ConfigError::ValidationError(
                "orchestrator.max_tool_rounds must be between 1 and 10".into(),
            ));
        }

        if self.compaction.keep_recent < 4 {
            return Err(ConfigError::ValidationError(
                "compaction.keep_recent must be at least 4".into(),
            ));
        }

        if self.compaction.max_turns <= self.compaction.keep_recent {
            return Err(ConfigError::ValidationError(
                "compaction.max_turns must be greater than compaction.keep_recent".into(),
            ));
        }

        if self.storage.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "storage.max_connections must be > 0".into(),
            ));
        }

        if self.knowledge.chunk_overlap >= self.knowledge.chunk_size {
            return Err(ConfigError::ValidationError(
                "knowledge.chunk_overlap must be smaller than knowledge.chunk_size".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
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
            gateway: GatewayConfig::default(),
            storage: StorageConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            compaction: CompactionConfig::default(),
            knowledge: KnowledgeConfig::default(),
            search: SearchConfig::default(),
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

//! Configuration loading, validation, and management for toolchat.
//!
//! Loads configuration from `~/.toolchat/config.toml` (or an explicit path)
//! with environment variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default system prompt: an engineer persona that explores before writing.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a software engineer and a hard worker. \
Before any implementation you explore the repository and read all relevant folders and files. \
After exploring you create an implementation plan. The source code is in the ./src folder.\n\n\
You can use read-directory and read-file to explore existing folders and files, \
and write-file to generate new code. Use ping to check whether a host is reachable.";

/// The root configuration structure.
///
/// Maps directly to `~/.toolchat/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Provider name: "openrouter", "openai", "ollama", or any name with `api_url`
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Override the provider's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Model identifier passed to the provider
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response (provider default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "mistralai/codestral-2508".into()
}
fn default_temperature() -> f32 {
    0.7
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
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("agent", &self.agent)
            .field("gateway", &self.gateway)
            .field("tools", &self.tools)
            .finish()
    }
}

/// Orchestrator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Upper bound on model rounds per user turn
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_max_rounds() -> u32 {
    25
}
fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            system_prompt: default_system_prompt(),
        }
    }
}

/// Model gateway transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// HTTP request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra attempts for transient failures. 0 = fail on first error.
    #[serde(default)]
    pub max_retries: u32,

    /// Delay before retry n is n * this value
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_timeout_secs() -> u64 {
    120
}
fn default_retry_backoff_ms() -> u64 {
    500
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Built-in tool settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Directories file tools may touch. Empty = anywhere.
    #[serde(default)]
    pub allowed_roots: Vec<String>,

    /// Path prefixes file tools must never touch.
    #[serde(default)]
    pub forbidden_paths: Vec<String>,

    #[serde(default)]
    pub ping: PingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingConfig {
    /// Budget for one ping, including process start-up
    #[serde(default = "default_ping_timeout_secs")]
    pub timeout_secs: u64,

    /// Binary to run
    #[serde(default = "default_ping_command")]
    pub command: String,
}

fn default_ping_timeout_secs() -> u64 {
    10
}
fn default_ping_command() -> String {
    "ping".into()
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_ping_timeout_secs(),
            command: default_ping_command(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.toolchat/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load configuration from `path`, then apply environment overrides.
    ///
    /// API key lookup order when the file has none:
    /// - `TOOLCHAT_API_KEY`
    /// - `OPENROUTER_API_KEY`
    /// - `OR_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|name| std::env::var(name).ok());
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

    /// Apply environment overrides through `lookup` (injectable for tests).
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = ["TOOLCHAT_API_KEY", "OPENROUTER_API_KEY", "OR_KEY", "OPENAI_API_KEY"]
                .iter()
                .find_map(|name| lookup(name).filter(|v| !v.is_empty()));
        }

        if let Some(provider) = lookup("TOOLCHAT_PROVIDER") {
            self.provider = provider;
        }

        if let Some(model) = lookup("TOOLCHAT_MODEL") {
            self.model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".toolchat")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_rounds == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_rounds must be at least 1".into(),
            ));
        }

        if self.tools.ping.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "tools.ping.timeout_secs must be at least 1".into(),
            ));
        }

        if self.provider.trim().is_empty() {
            return Err(ConfigError::ValidationError("provider must not be empty".into()));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            api_url: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            agent: AgentConfig::default(),
            gateway: GatewayConfig::default(),
            tools: ToolsConfig::default(),
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

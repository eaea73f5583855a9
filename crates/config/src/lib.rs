//! Configuration loading, validation, and management for codemate.
//!
//! Loads configuration from `~/.codemate/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.codemate/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Chat-completions endpoint base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Default model
    #[serde(default = "default_model")]
    pub model: String,

    /// Default temperature
    #[serde(default)]
    pub temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// GitHub repository configuration
    #[serde(default)]
    pub github: GitHubConfig,

    /// Transport retry configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Agent loop configuration
    #[serde(default)]
    pub agent: AgentConfig,
}

fn default_api_url() -> String {
    "https://api.groq.com/openai/v1".into()
}
fn default_model() -> String {
    "llama3-8b-8192".into()
}
fn default_max_tokens() -> u32 {
    1024
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
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("github", &self.github)
            .field("retry", &self.retry)
            .field("agent", &self.agent)
            .finish()
    }
}

/// Which GitHub repository the agent starts on, and how it authenticates.
#[derive(Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Personal access token (optional for public repositories)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Initial repository owner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Initial repository name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,

    /// Branch used for tree queries
    #[serde(default = "default_branch")]
    pub branch: String,
}

fn default_branch() -> String {
    "main".into()
}

impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("token", &redact(&self.token))
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .finish()
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            owner: None,
            repo: None,
            branch: default_branch(),
        }
    }
}

/// Retry/backoff settings for the model transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum request attempts before surfacing the last error
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Ceiling on any single backoff sleep, in seconds
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

fn default_max_attempts() -> u32 {
    6
}
fn default_max_backoff_secs() -> u64 {
    30
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            max_backoff_secs: default_max_backoff_secs(),
        }
    }
}

/// Agent loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum loop turns before surfacing an exhaustion diagnostic
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Character cap on tool results appended to the conversation
    #[serde(default = "default_tool_result_cap")]
    pub tool_result_cap: usize,

    /// Character cap on tool-result previews in emitted events
    #[serde(default = "default_preview_cap")]
    pub preview_cap: usize,
}

fn default_max_turns() -> u32 {
    16
}
fn default_tool_result_cap() -> usize {
    4000
}
fn default_preview_cap() -> usize {
    1200
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            tool_result_cap: default_tool_result_cap(),
            preview_cap: default_preview_cap(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.codemate/config.toml).
    ///
    /// Also checks environment variables:
    /// - `CODEMATE_API_KEY` / `GROQ_API_KEY` — model endpoint key
    /// - `CODEMATE_MODEL` — model override
    /// - `GITHUB_TOKEN`, `GITHUB_OWNER`, `GITHUB_REPO` — repository settings
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        // Environment variable overrides (highest priority)
        if config.api_key.is_none() {
            config.api_key = std::env::var("CODEMATE_API_KEY")
                .ok()
                .or_else(|| std::env::var("GROQ_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("CODEMATE_MODEL") {
            config.model = model;
        }

        if config.github.token.is_none() {
            config.github.token = std::env::var("GITHUB_TOKEN").ok();
        }
        if config.github.owner.is_none() {
            config.github.owner = std::env::var("GITHUB_OWNER").ok();
        }
        if config.github.repo.is_none() {
            config.github.repo = std::env::var("GITHUB_REPO").ok();
        }

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

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".codemate")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        if self.agent.max_turns == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_turns must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            github: GitHubConfig::default(),
            retry: RetryConfig::default(),
            agent: AgentConfig::default(),
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

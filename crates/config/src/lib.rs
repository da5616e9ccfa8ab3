//! Configuration loading, validation, and management for Dayloop.
//!
//! Loads configuration from `~/.dayloop/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.dayloop/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per assistant reply
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Model names per processing tier
    #[serde(default)]
    pub models: ModelsConfig,

    /// Record windowing and context-string shaping
    #[serde(default)]
    pub context: ContextConfig,

    /// Token budget for conversation history
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Retry policy for model calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Summary cascade calendar rules
    #[serde(default)]
    pub cascade: CascadeConfig,

    /// Summary and session persistence
    #[serde(default)]
    pub storage: StorageConfig,

    /// Where the user's records come from
    #[serde(default)]
    pub records: RecordsConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_temperature() -> f32 {
    0.7
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
            .field("default_provider", &self.default_provider)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("models", &self.models)
            .field("context", &self.context)
            .field("budget", &self.budget)
            .field("retry", &self.retry)
            .field("cascade", &self.cascade)
            .field("storage", &self.storage)
            .field("records", &self.records)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Model names for each processing tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Used for complex chat messages and monthly-and-above rollups
    #[serde(default = "default_deep_model")]
    pub deep: String,

    /// Used for simple chat messages and daily/weekly rollups
    #[serde(default = "default_quick_model")]
    pub quick: String,

    /// The cheap classifier behind the complexity router
    #[serde(default = "default_router_model")]
    pub router: String,
}

fn default_deep_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_quick_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_router_model() -> String {
    "openai/gpt-4o-mini".into()
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            deep: default_deep_model(),
            quick: default_quick_model(),
            router: default_router_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Trailing days of records in the chat context
    #[serde(default = "default_window_days")]
    pub window_days: u32,

    /// Spending categories listed in the context
    #[serde(default = "default_top_categories")]
    pub top_categories: usize,

    /// Character cap for the latest journal excerpt
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,

    /// Override the built-in persona statement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
}

fn default_window_days() -> u32 {
    7
}
fn default_top_categories() -> usize {
    3
}
fn default_excerpt_chars() -> usize {
    280
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            top_categories: default_top_categories(),
            excerpt_chars: default_excerpt_chars(),
            persona: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Ceiling on estimated input + reply tokens per chat request
    #[serde(default = "default_total_tokens")]
    pub total_tokens: usize,

    /// Tokens held back for the reply
    #[serde(default = "default_reply_reserve")]
    pub reply_reserve: usize,
}

fn default_total_tokens() -> usize {
    8000
}
fn default_reply_reserve() -> usize {
    1024
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            total_tokens: default_total_tokens(),
            reply_reserve: default_reply_reserve(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Base delay for rate-limit backoff (doubled per attempt)
    #[serde(default = "default_rate_limit_base_ms")]
    pub rate_limit_base_ms: u64,

    /// Fixed delay after a 5xx-class failure
    #[serde(default = "default_server_backoff_ms")]
    pub server_backoff_ms: u64,

    /// Upper bound on any single backoff
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Per-attempt timeout
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
}

fn default_retries() -> u32 {
    2
}
fn default_rate_limit_base_ms() -> u64 {
    1000
}
fn default_server_backoff_ms() -> u64 {
    500
}
fn default_max_backoff_ms() -> u64 {
    30_000
}
fn default_attempt_timeout_secs() -> u64 {
    60
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            rate_limit_base_ms: default_rate_limit_base_ms(),
            server_backoff_ms: default_server_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeConfig {
    /// Weekday the weekly summary is produced on (e.g., "monday")
    #[serde(default = "default_week_start")]
    pub week_start: String,

    /// Regenerate a tier later in its period if its trigger day was missed.
    /// Off by default: tiers fire only on their trigger day.
    #[serde(default)]
    pub catch_up_missed: bool,

    /// Minutes between due checks in `dayloop daemon`
    #[serde(default = "default_check_interval")]
    pub check_interval_minutes: u32,
}

fn default_week_start() -> String {
    "monday".into()
}
fn default_check_interval() -> u32 {
    30
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            week_start: default_week_start(),
            catch_up_missed: false,
            check_interval_minutes: default_check_interval(),
        }
    }
}

impl CascadeConfig {
    /// Parse `week_start` into a weekday.
    pub fn week_start_day(&self) -> Result<chrono::Weekday, ConfigError> {
        self.week_start.parse::<chrono::Weekday>().map_err(|_| {
            ConfigError::ValidationError(format!(
                "cascade.week_start '{}' is not a weekday",
                self.week_start
            ))
        })
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Local cache file (defaults to ~/.dayloop/store.jsonl)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,

    /// Remote authoritative store base URL. Unset = local only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,

    /// Bearer token for the remote store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_token: Option<String>,

    /// Days of chat sessions kept in the local cache
    #[serde(default = "default_session_retention")]
    pub session_retention_days: u32,
}

fn default_session_retention() -> u32 {
    30
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            local_path: None,
            remote_url: None,
            remote_token: None,
            session_retention_days: default_session_retention(),
        }
    }
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("local_path", &self.local_path)
            .field("remote_url", &self.remote_url)
            .field("remote_token", &redact(&self.remote_token))
            .field("session_retention_days", &self.session_retention_days)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordsConfig {
    /// JSON export of the dashboard records (defaults to ~/.dayloop/records.json)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.dayloop/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `DAYLOOP_API_KEY` (highest priority)
    /// - `OPENROUTER_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("DAYLOOP_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("DAYLOOP_PROVIDER") {
            config.default_provider = provider;
        }

        // Overrides the deep model only; quick and router stay cheap
        if let Ok(model) = std::env::var("DAYLOOP_MODEL") {
            config.models.deep = model;
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
        dirs_home().join(".dayloop")
    }

    /// The local cache file for summaries, markers and sessions.
    pub fn local_store_path(&self) -> PathBuf {
        self.storage
            .local_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::config_dir().join("store.jsonl"))
    }

    /// The records export file.
    pub fn records_path(&self) -> PathBuf {
        self.records
            .path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::config_dir().join("records.json"))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.budget.total_tokens <= self.budget.reply_reserve {
            return Err(ConfigError::ValidationError(
                "budget.total_tokens must be greater than budget.reply_reserve".into(),
            ));
        }

        if self.context.top_categories == 0 {
            return Err(ConfigError::ValidationError(
                "context.top_categories must be at least 1".into(),
            ));
        }

        if self.context.window_days == 0 {
            return Err(ConfigError::ValidationError(
                "context.window_days must be at least 1".into(),
            ));
        }

        self.cascade.week_start_day()?;
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
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            models: ModelsConfig::default(),
            context: ContextConfig::default(),
            budget: BudgetConfig::default(),
            retry: RetryConfig::default(),
            cascade: CascadeConfig::default(),
            storage: StorageConfig::default(),
            records: RecordsConfig::default(),
            providers: HashMap::new(),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, "openrouter");
        assert_eq!(config.context.window_days, 7);
        assert_eq!(config.retry.retries, 2);
        assert!(!config.cascade.catch_up_missed);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.budget.total_tokens, config.budget.total_tokens);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn reply_reserve_must_fit_in_budget() {
        let config = AppConfig {
            budget: BudgetConfig {
                total_tokens: 500,
                reply_reserve: 500,
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_week_start_rejected() {
        let mut config = AppConfig::default();
        config.cascade.week_start = "someday".into();
        assert!(config.validate().is_err());

        config.cascade.week_start = "sunday".into();
        assert!(config.validate().is_ok());
        assert_eq!(config.cascade.week_start_day().unwrap(), chrono::Weekday::Sun);
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().default_provider, "openrouter");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_provider = "openai"

[models]
deep = "gpt-4o"

[cascade]
week_start = "sunday"
catch_up_missed = true

[storage]
remote_url = "https://store.example.com/kv"
remote_token = "secret"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_provider, "openai");
        assert_eq!(config.models.deep, "gpt-4o");
        assert_eq!(config.models.quick, "openai/gpt-4o-mini");
        assert!(config.cascade.catch_up_missed);
        assert_eq!(config.storage.session_retention_days, 30);
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("openrouter"));
        assert!(toml_str.contains("week_start"));
    }
}

//! Configuration for the moderation pipeline.
//!
//! Every field has a serde default, so a partial document (or none at all)
//! yields a working configuration. [`ModerationConfig::from_env`] overlays
//! environment variables on the defaults.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::pipeline::{JitterStrategy, RetryPolicy};

/// Comma-separated backoff delays in milliseconds.
pub const ENV_RETRY_DELAYS_MS: &str = "MODERATION_RETRY_DELAYS_MS";
/// Rate-limited retries allowed per run.
pub const ENV_MAX_RATE_LIMIT_RETRIES: &str = "MODERATION_MAX_RATE_LIMIT_RETRIES";
/// Cap on a single retry-after wait, in milliseconds.
pub const ENV_MAX_RETRY_AFTER_MS: &str = "MODERATION_MAX_RETRY_AFTER_MS";
/// Shutdown grace period in seconds.
pub const ENV_SHUTDOWN_GRACE_SECONDS: &str = "MODERATION_SHUTDOWN_GRACE_SECONDS";
/// Groq API key.
pub const ENV_GROQ_API_KEY: &str = "GROQ_API_KEY";
/// Groq model name.
pub const ENV_GROQ_MODEL: &str = "GROQ_MODEL";
/// Groq API base URL.
pub const ENV_GROQ_BASE_URL: &str = "GROQ_BASE_URL";
/// `json` or `text`.
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";
/// Log filter directives.
pub const ENV_RUST_LOG: &str = "RUST_LOG";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Classifier retry behavior.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Background run management.
    #[serde(default)]
    pub spawner: SpawnerConfig,
    /// Groq classifier client.
    #[serde(default)]
    pub groq: GroqConfig,
    /// Logging.
    #[serde(default)]
    pub log: LogConfig,
}

impl ModerationConfig {
    /// Loads defaults overlaid with environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads defaults overlaid with values from `lookup`.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(raw) = get(ENV_RETRY_DELAYS_MS) {
            config.retry.delays_ms = parse_delays(&raw)?;
        }
        if let Some(raw) = get(ENV_MAX_RATE_LIMIT_RETRIES) {
            config.retry.max_rate_limit_retries = parse_number(ENV_MAX_RATE_LIMIT_RETRIES, &raw)?;
        }
        if let Some(raw) = get(ENV_MAX_RETRY_AFTER_MS) {
            config.retry.max_retry_after_ms = parse_number(ENV_MAX_RETRY_AFTER_MS, &raw)?;
        }
        if let Some(raw) = get(ENV_SHUTDOWN_GRACE_SECONDS) {
            config.spawner.shutdown_grace_seconds = parse_number(ENV_SHUTDOWN_GRACE_SECONDS, &raw)?;
        }
        if let Some(key) = get(ENV_GROQ_API_KEY) {
            config.groq.api_key = key;
        }
        if let Some(model) = get(ENV_GROQ_MODEL) {
            config.groq.model = model;
        }
        if let Some(url) = get(ENV_GROQ_BASE_URL) {
            config.groq.base_url = url;
        }
        if let Some(format) = get(ENV_LOG_FORMAT) {
            config.log.json = match format.to_ascii_lowercase().as_str() {
                "json" => true,
                "text" | "pretty" => false,
                other => {
                    return Err(ConfigError::invalid(
                        ENV_LOG_FORMAT,
                        format!("expected 'json' or 'text', got '{other}'"),
                    ))
                }
            };
        }
        if let Some(filter) = get(ENV_RUST_LOG) {
            config.log.filter = filter;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks values serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_retry_after_ms == 0 {
            return Err(ConfigError::invalid("retry.max_retry_after_ms", "must be positive"));
        }
        self.groq.timeout()?;
        Ok(())
    }
}

fn parse_delays(raw: &str) -> Result<Vec<u64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| parse_number(ENV_RETRY_DELAYS_MS, part))
        .collect()
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.parse()
        .map_err(|_| ConfigError::invalid(key, format!("'{raw}' is not a valid number")))
}

/// Retry configuration for classifier calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Backoff delays in milliseconds, consumed in order.
    #[serde(default = "default_delays_ms")]
    pub delays_ms: Vec<u64>,
    /// Rate-limited retries allowed per run.
    #[serde(default = "default_max_rate_limit_retries")]
    pub max_rate_limit_retries: u32,
    /// Cap on a single retry-after wait, in milliseconds.
    #[serde(default = "default_max_retry_after_ms")]
    pub max_retry_after_ms: u64,
    /// Jitter applied to backoff delays.
    #[serde(default)]
    pub jitter: JitterStrategy,
}

fn default_delays_ms() -> Vec<u64> {
    vec![2_000, 4_000, 8_000]
}

fn default_max_rate_limit_retries() -> u32 {
    10
}

fn default_max_retry_after_ms() -> u64 {
    300_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            delays_ms: default_delays_ms(),
            max_rate_limit_retries: default_max_rate_limit_retries(),
            max_retry_after_ms: default_max_retry_after_ms(),
            jitter: JitterStrategy::default(),
        }
    }
}

impl RetryConfig {
    /// Builds the retry policy.
    #[must_use]
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.delays_ms.iter().copied().map(Duration::from_millis).collect())
            .with_max_rate_limit_retries(self.max_rate_limit_retries)
            .with_max_retry_after(Duration::from_millis(self.max_retry_after_ms))
            .with_jitter(self.jitter)
    }
}

/// Background run management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnerConfig {
    /// How long a finished run keeps its post claimed.
    #[serde(default = "default_retention_seconds")]
    pub retention_seconds: u64,
    /// How long shutdown waits for in-flight runs.
    #[serde(default = "default_shutdown_grace_seconds")]
    pub shutdown_grace_seconds: u64,
}

fn default_retention_seconds() -> u64 {
    3600
}

fn default_shutdown_grace_seconds() -> u64 {
    30
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        Self {
            retention_seconds: default_retention_seconds(),
            shutdown_grace_seconds: default_shutdown_grace_seconds(),
        }
    }
}

impl SpawnerConfig {
    /// Registry retention as a Duration.
    #[must_use]
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_seconds)
    }

    /// Shutdown grace as a Duration.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

/// Groq classifier client configuration.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct GroqConfig {
    /// API key. Moderation is disabled when empty.
    #[serde(default, skip_serializing)]
    pub api_key: String,
    /// OpenAI-compatible API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: f64,
}

fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_model() -> String {
    "openai/gpt-oss-safeguard-20b".to_string()
}

/// Upper bound on the Groq request timeout.
pub const MAX_TIMEOUT_SECONDS: f64 = 600.0;

fn default_timeout() -> f64 {
    10.0
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model: default_model(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl GroqConfig {
    /// Creates a configuration with the given key and defaults otherwise.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Returns true if an API key is present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Gets timeout as Duration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] unless the timeout is positive and at most
    /// [`MAX_TIMEOUT_SECONDS`].
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        let secs = self.timeout_seconds;
        if !(secs > 0.0 && secs <= MAX_TIMEOUT_SECONDS) {
            return Err(ConfigError::invalid(
                "groq.timeout_seconds",
                format!("must be between 0 and {MAX_TIMEOUT_SECONDS} seconds, got {secs}"),
            ));
        }
        Duration::try_from_secs_f64(secs)
            .map_err(|e| ConfigError::invalid("groq.timeout_seconds", e.to_string()))
    }
}

impl fmt::Debug for GroqConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroqConfig")
            .field("api_key", &if self.api_key.is_empty() { "" } else { "[redacted]" })
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directives.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

/// Default log filter.
#[must_use]
pub fn default_log_filter() -> String {
    "info,moderation_pipeline=debug".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

//! Configuration module for the LORIS crawler.
//!
//! Values come from defaults, then an optional `loris.toml`, then
//! environment variables prefixed with `LORIS_` (nested keys use `__`,
//! e.g. `LORIS_RETRY__MAX_RETRIES=5`).

use crate::loris::endpoints::DEFAULT_BASE_URL;
use crate::loris::reset::ResetMode;
use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use fundu::{DurationParser, TimeUnit};
use serde::{Deserialize, Deserializer};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Log level for the application; overridden by `RUST_LOG` when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Registration portal base URL; endpoint paths are resolved against it.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Raw `Cookie` header of an authenticated portal session.
    #[serde(default)]
    pub cookies: Option<String>,
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub request_timeout: Duration,
    /// Page size for catalog pagination.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Concurrent faculty lookups per course.
    #[serde(default = "default_instructor_concurrency")]
    pub instructor_concurrency: usize,
    #[serde(default)]
    pub reset_mode: ResetMode,
    /// Where the JSON file store is written.
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
}

/// Bounded retry of connection-reset failures.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(
        default = "default_initial_backoff",
        deserialize_with = "deserialize_duration"
    )]
    pub initial_backoff: Duration,
    #[serde(
        default = "default_max_backoff",
        deserialize_with = "deserialize_duration"
    )]
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
        }
    }
}

/// Outbound request throttling.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitingConfig {
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: NonZeroU32,
    #[serde(default = "default_burst")]
    pub burst: NonZeroU32,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            burst: default_burst(),
        }
    }
}

impl Config {
    /// The provider chain used by [`Config::load`].
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Toml::file("loris.toml"))
            .merge(Env::prefixed("LORIS_").split("__"))
    }

    /// Load and validate configuration from the default providers.
    pub fn load() -> Result<Self> {
        Self::from_figment(Self::figment())
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().context("Failed to load config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            anyhow::bail!("page_size must be greater than zero");
        }
        if self.instructor_concurrency == 0 {
            anyhow::bail!("instructor_concurrency must be greater than zero");
        }
        url::Url::parse(&self.base_url)
            .with_context(|| format!("base_url is not a valid URL: {}", self.base_url))?;
        Ok(())
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_page_size() -> u32 {
    500
}

fn default_instructor_concurrency() -> usize {
    4
}

fn default_output_path() -> PathBuf {
    PathBuf::from("loris.json")
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff() -> Duration {
    Duration::from_millis(500)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(10)
}

fn default_requests_per_second() -> NonZeroU32 {
    NonZeroU32::new(5).unwrap_or(NonZeroU32::MIN)
}

fn default_burst() -> NonZeroU32 {
    NonZeroU32::new(5).unwrap_or(NonZeroU32::MIN)
}

/// Accepts either a bare integer (milliseconds) or a human string such as
/// `"500ms"`, `"2s"` or `"1m"`.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Millis(ms) => Ok(Duration::from_millis(ms)),
        Raw::Text(text) => {
            let parser = DurationParser::with_time_units(&[
                TimeUnit::MilliSecond,
                TimeUnit::Second,
                TimeUnit::Minute,
            ]);
            let parsed = parser
                .parse(text.trim())
                .map_err(|e| D::Error::custom(format!("invalid duration '{text}': {e}")))?;
            Duration::try_from(parsed)
                .map_err(|e| D::Error::custom(format!("invalid duration '{text}': {e}")))
        }
    }
}

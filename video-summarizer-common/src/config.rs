//! Configuration module for loading environment variables and settings.

use std::fmt;
use std::time::Duration;

use crate::error::ConfigError;

/// Default Gemini model used by the analysis agent.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";

/// Default base URL of the Gemini Developer API.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Default interval between file status checks, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Default upper bound on waiting for server-side file processing, in seconds.
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 600;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8080;

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Gemini API key (required)
    pub api_key: String,
    /// Model identifier the agent is configured with
    pub model: String,
    /// Base URL for the Gemini API (overridable for testing)
    pub api_base: String,
    /// Interval between file status checks
    pub poll_interval_ms: u64,
    /// Maximum time to wait for a file to leave the processing state
    pub poll_timeout_secs: u64,
    /// HTTP server port
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables and .env file.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingEnvVar` if GOOGLE_API_KEY is not set, and
    /// `ConfigError::InvalidValue` if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// `from_env` delegates here; tests pass a map-backed closure instead of
    /// touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("GOOGLE_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::missing_env_var("GOOGLE_API_KEY"))?;

        let model = lookup("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let api_base = lookup("GEMINI_API_BASE")
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let poll_interval_ms = parse_or(&lookup, "POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;
        let poll_timeout_secs = parse_or(&lookup, "POLL_TIMEOUT_SECS", DEFAULT_POLL_TIMEOUT_SECS)?;
        let port = parse_or(&lookup, "PORT", DEFAULT_PORT)?;

        if poll_interval_ms == 0 {
            return Err(ConfigError::invalid_value(
                "POLL_INTERVAL_MS",
                "must be greater than zero",
            ));
        }

        Ok(Self {
            api_key,
            model,
            api_base,
            poll_interval_ms,
            poll_timeout_secs,
            port,
        })
    }

    /// Get the Gemini endpoint URL for a model method, e.g. `generateContent`.
    pub fn model_endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.api_base, model, method)
    }

    /// Poll interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Poll timeout as a `Duration`.
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("port", &self.port)
            .finish()
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid_value(name, e.to_string())),
        None => Ok(default),
    }
}

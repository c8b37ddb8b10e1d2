//! Errors shared by every stage of the analysis pipeline.
//!
//! [`Error::kind`] groups failures by who can fix them: bad input from the
//! user, a misbehaving remote service, a bounded wait that ran out, or a
//! local problem. Failing to delete a temporary file is not an error; it is
//! reported next to the result as a [`CleanupWarning`].

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A Gemini request failed. `status_code` is 0 when no response came back,
    /// and `endpoint` may be a file resource name rather than a URL.
    #[error("API error for {endpoint} (HTTP {status_code}): {message}")]
    Api {
        endpoint: String,
        status_code: u16,
        message: String,
    },

    #[error("Search error ({provider}): {message}")]
    Search { provider: String, message: String },

    /// Unusable user input: blank query, unsupported container, empty upload.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Remote processing was still running after this many seconds.
    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The user supplied something unusable; retrying will not help.
    UserInput,
    /// A remote service (Gemini, search) failed.
    ExternalService,
    /// Waiting on a remote service exceeded its bound.
    Timeout,
    /// Local failures: configuration, filesystem.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::UserInput => write!(f, "user_input"),
            ErrorKind::ExternalService => write!(f, "external_service"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

impl Error {
    /// Create a new API error with endpoint, status code, and message.
    ///
    /// # Example
    ///
    /// ```
    /// use video_summarizer_common::error::Error;
    ///
    /// let err = Error::api(
    ///     "https://generativelanguage.googleapis.com/v1beta/files",
    ///     503,
    ///     "Service unavailable"
    /// );
    /// assert!(err.to_string().contains("v1beta/files"));
    /// assert!(err.to_string().contains("503"));
    /// ```
    pub fn api(endpoint: impl Into<String>, status_code: u16, message: impl Into<String>) -> Self {
        Error::Api {
            endpoint: endpoint.into(),
            status_code,
            message: message.into(),
        }
    }

    pub fn search(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Search {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a new validation error.
    ///
    /// # Example
    ///
    /// ```
    /// use video_summarizer_common::error::Error;
    ///
    /// let err = Error::validation("query cannot be empty");
    /// assert!(err.to_string().contains("query cannot be empty"));
    /// ```
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn timeout(seconds: u64) -> Self {
        Error::Timeout(seconds)
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::UserInput,
            Error::Api { .. } | Error::Search { .. } => ErrorKind::ExternalService,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Config(_) | Error::Io(_) => ErrorKind::Internal,
        }
    }

    /// Whether a manual or automatic retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::ExternalService | ErrorKind::Timeout)
    }
}

/// Problems found while reading settings from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Required environment variable {0} is not set")]
    MissingEnvVar(String),

    /// Variable name and the reason its value was rejected
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl ConfigError {
    pub fn missing_env_var(name: impl Into<String>) -> Self {
        ConfigError::MissingEnvVar(name.into())
    }

    pub fn invalid_value(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue(name.into(), reason.into())
    }
}

/// A temporary file could not be removed.
///
/// Reported alongside a result instead of replacing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupWarning {
    /// The file that was left behind
    pub path: PathBuf,
    /// Why removal failed
    pub message: String,
}

impl fmt::Display for CleanupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to remove temporary file {}: {}",
            self.path.display(),
            self.message
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

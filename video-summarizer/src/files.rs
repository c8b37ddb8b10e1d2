//! Remote file processing.
//!
//! Videos are handed to the Gemini Files API, which ingests them
//! asynchronously. [`wait_until_ready`] polls a file until it leaves the
//! `PROCESSING` state, bounded by a [`PollPolicy`].

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, instrument};
use video_summarizer_common::config::Config;
use video_summarizer_common::error::Error;

/// Server-side ingestion state of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FileState {
    #[default]
    Unspecified,
    Processing,
    Active,
    Failed,
}

impl FileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileState::Unspecified => "STATE_UNSPECIFIED",
            FileState::Processing => "PROCESSING",
            FileState::Active => "ACTIVE",
            FileState::Failed => "FAILED",
        }
    }

    pub fn is_processing(&self) -> bool {
        matches!(self, FileState::Processing)
    }
}

impl From<String> for FileState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "PROCESSING" => FileState::Processing,
            "ACTIVE" => FileState::Active,
            "FAILED" => FileState::Failed,
            _ => FileState::Unspecified,
        }
    }
}

impl From<FileState> for String {
    fn from(value: FileState) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for FileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error details attached to a failed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileStatus {
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Handle to a file held by the processing service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    /// Resource name, e.g. `files/abc-123`
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Size as reported by the API (an int64 encoded as a string)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<String>,
    /// URI used to reference the file from a generation request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default)]
    pub state: FileState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FileStatus>,
}

/// A service that ingests uploaded files.
#[async_trait]
pub trait FileService: Send + Sync {
    /// Submit a local file for processing.
    async fn upload(&self, path: &Path, mime_type: &str, display_name: &str)
    -> Result<RemoteFile, Error>;

    /// Fetch the current state of a previously uploaded file.
    async fn get(&self, name: &str) -> Result<RemoteFile, Error>;
}

/// Gemini Files API client.
pub struct GeminiFilesClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct StartUploadRequest<'a> {
    file: StartUploadFile<'a>,
}

#[derive(Debug, Serialize)]
struct StartUploadFile<'a> {
    display_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: RemoteFile,
}

impl GeminiFilesClient {
    pub fn new(config: &Config) -> Self {
        Self::with_base_url(config.api_key.clone(), config.api_base.clone())
    }

    /// Create a client against a custom base URL (for testing).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    fn upload_endpoint(&self) -> String {
        format!("{}/upload/v1beta/files", self.base_url)
    }

    fn file_endpoint(&self, name: &str) -> String {
        format!("{}/v1beta/{}", self.base_url, name)
    }
}

/// Read a JSON body, mapping transport and status failures to `Error::Api`.
pub(crate) async fn read_json<T: DeserializeOwned>(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<T, Error> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::api(endpoint, status.as_u16(), body));
    }

    let text = response.text().await.map_err(|e| {
        Error::api(endpoint, status.as_u16(), format!("Failed to read response: {}", e))
    })?;

    serde_json::from_str(&text).map_err(|e| {
        Error::api(
            endpoint,
            status.as_u16(),
            format!(
                "Failed to parse response: {}. Raw: {}",
                e,
                text.chars().take(1000).collect::<String>()
            ),
        )
    })
}

#[async_trait]
impl FileService for GeminiFilesClient {
    /// Resumable upload: a `start` request returns a session URL, then the
    /// bytes are sent with `upload, finalize` in a single request.
    #[instrument(level = "info", name = "files_upload", skip(self, path), fields(mime_type = %mime_type))]
    async fn upload(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile, Error> {
        let data = tokio::fs::read(path).await?;
        let endpoint = self.upload_endpoint();
        debug!(endpoint = %endpoint, bytes = data.len(), "Starting resumable upload");

        let start = self
            .http
            .post(&endpoint)
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", data.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&StartUploadRequest {
                file: StartUploadFile { display_name },
            })
            .send()
            .await
            .map_err(|e| Error::api(&endpoint, 0, format!("Request failed: {}", e)))?;

        let status = start.status();
        if !status.is_success() {
            let body = start.text().await.unwrap_or_default();
            return Err(Error::api(&endpoint, status.as_u16(), body));
        }

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::api(&endpoint, status.as_u16(), "Response is missing x-goog-upload-url")
            })?;

        let response = self
            .http
            .post(&upload_url)
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(data)
            .send()
            .await
            .map_err(|e| Error::api(&endpoint, 0, format!("Upload failed: {}", e)))?;

        let uploaded: UploadResponse = read_json(&endpoint, response).await?;
        info!(name = %uploaded.file.name, state = %uploaded.file.state, "File uploaded");
        Ok(uploaded.file)
    }

    async fn get(&self, name: &str) -> Result<RemoteFile, Error> {
        let endpoint = self.file_endpoint(name);

        let response = self
            .http
            .get(&endpoint)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| Error::api(&endpoint, 0, format!("Request failed: {}", e)))?;

        read_json(&endpoint, response).await
    }
}

/// Largest backoff factor [`PollPolicy::with_backoff`] accepts.
pub const MAX_BACKOFF_MULTIPLIER: f64 = 10.0;

/// How long and how often to poll a file that is still processing.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Delay before the first re-query
    pub initial_interval: Duration,
    /// Factor applied to the delay after each re-query; 1.0 keeps it fixed
    pub backoff_multiplier: f64,
    /// Ceiling for the delay
    pub max_interval: Duration,
    /// Total time budget before giving up with `Error::Timeout`
    pub max_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            backoff_multiplier: 1.0,
            max_interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(600),
        }
    }
}

impl PollPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            initial_interval: config.poll_interval(),
            max_wait: config.poll_timeout(),
            ..Self::default()
        }
    }

    /// Switch to exponential backoff. The multiplier is clamped to
    /// `1.0..=MAX_BACKOFF_MULTIPLIER`.
    pub fn with_backoff(mut self, multiplier: f64, max_interval: Duration) -> Self {
        self.backoff_multiplier = if multiplier.is_nan() {
            1.0
        } else {
            multiplier.clamp(1.0, MAX_BACKOFF_MULTIPLIER)
        };
        self.max_interval = max_interval;
        self
    }

    /// Delay to use after `current`, never above the interval ceiling.
    /// A product that overflows `Duration` yields the ceiling.
    pub fn next_interval(&self, current: Duration) -> Duration {
        let ceiling = self.max_interval.max(self.initial_interval);
        let multiplier = self.backoff_multiplier.max(1.0);
        Duration::try_from_secs_f64(current.as_secs_f64() * multiplier)
            .map_or(ceiling, |next| next.min(ceiling))
    }

    fn timeout_seconds(&self) -> u64 {
        self.max_wait.as_secs_f64().ceil() as u64
    }
}

/// Poll `file` until its state is anything other than `PROCESSING`.
///
/// Returns the first non-processing handle observed, including `FAILED`
/// ones; deciding what a failed file means is up to the caller.
///
/// # Errors
/// `Error::Timeout` once `policy.max_wait` has elapsed with the file still
/// processing. Service errors propagate unchanged.
pub async fn wait_until_ready(
    service: &dyn FileService,
    file: RemoteFile,
    policy: &PollPolicy,
) -> Result<RemoteFile, Error> {
    let started = Instant::now();
    let mut file = file;
    let mut interval = policy.initial_interval;
    let mut attempts = 0u32;

    while file.state.is_processing() {
        let elapsed = started.elapsed();
        if elapsed >= policy.max_wait {
            return Err(Error::timeout(policy.timeout_seconds()));
        }

        tokio::time::sleep(interval.min(policy.max_wait - elapsed)).await;

        attempts += 1;
        file = service.get(&file.name).await?;
        debug!(name = %file.name, state = %file.state, attempt = attempts, "Polled file state");

        interval = policy.next_interval(interval);
    }

    info!(name = %file.name, state = %file.state, attempts, "File left processing state");
    Ok(file)
}

//! Per-client interaction state.
//!
//! A [`Session`] tracks one user's progress through upload, query and
//! analysis, and renders it as a [`SessionView`] with the banner and result
//! a client should show.
//!
//! ```text
//! Idle --load--> FileLoaded --begin(empty)--> QueryMissing
//!                    |                              |
//!                    +--begin(query)--> Processing <+
//!                                        |      |
//!                                    Success  Failed
//! ```
//!
//! Terminal states keep the loaded video, so the next `begin_analysis` or
//! `load_video` starts over from `FileLoaded`.

use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use video_summarizer_common::error::Error;

use crate::handler::{AnalysisHandler, AnalysisReport};
use crate::upload::VideoUpload;

pub const MSG_UPLOAD_PROMPT: &str = "Upload a video file to begin analysis.";
pub const MSG_QUERY_MISSING: &str = "Please enter a query before analyzing the video.";
pub const MSG_PROCESSING: &str = "Processing video and gathering insights....";
pub const MSG_SUCCESS: &str = "Video processed successfully!";
pub const MSG_ERROR_PREFIX: &str = "An error occurred during video analysis: ";

const MSG_CANCELLED: &str = "analysis was cancelled before it finished";

/// Where a session is in its interaction.
#[derive(Debug, Clone)]
pub enum SessionState {
    /// No video loaded
    Idle,
    FileLoaded,
    /// Last analyze request had an empty query
    QueryMissing,
    Processing,
    Success(Box<AnalysisReport>),
    /// Analysis failed with the given message
    Failed(String),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::FileLoaded => "file_loaded",
            SessionState::QueryMissing => "query_missing",
            SessionState::Processing => "processing",
            SessionState::Success(_) => "success",
            SessionState::Failed(_) => "error",
        }
    }

    pub fn is_processing(&self) -> bool {
        matches!(self, SessionState::Processing)
    }
}

/// Session transition errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("An analysis is already running in this session")]
    Busy,

    #[error("No video loaded. Upload a video file to begin analysis.")]
    NoVideo,

    #[error("No analysis is running in this session")]
    NotProcessing,
}

/// Result of asking a session to start an analysis.
#[derive(Debug)]
pub enum BeginOutcome {
    /// The query was empty; the session now shows a warning.
    QueryMissing,
    /// The session is processing; run this and report back with `finish`.
    Started(PendingAnalysis),
}

/// Work handed out by `begin_analysis`.
#[derive(Debug, Clone)]
pub struct PendingAnalysis {
    pub upload: VideoUpload,
    pub query: String,
}

#[derive(Debug)]
struct Inner {
    state: SessionState,
    video: Option<VideoUpload>,
}

/// One client's interaction state.
#[derive(Debug)]
pub struct Session {
    id: String,
    inner: Mutex<Inner>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inner: Mutex::new(Inner {
                state: SessionState::Idle,
                video: None,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    // Poisoning is ignored: every `Inner` value is a valid state.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> SessionState {
        self.lock().state.clone()
    }

    /// Replace the loaded video.
    ///
    /// # Errors
    /// `SessionError::Busy` while an analysis is running.
    pub fn load_video(&self, upload: VideoUpload) -> Result<(), SessionError> {
        let mut inner = self.lock();
        if inner.state.is_processing() {
            return Err(SessionError::Busy);
        }
        debug!(session = %self.id, file_name = %upload.file_name, bytes = upload.len(), "Video loaded");
        inner.video = Some(upload);
        inner.state = SessionState::FileLoaded;
        Ok(())
    }

    /// Handle an analyze request.
    ///
    /// # Errors
    /// - `SessionError::NoVideo` if nothing is loaded (state stays `Idle`)
    /// - `SessionError::Busy` while another analysis is running
    pub fn begin_analysis(&self, query: &str) -> Result<BeginOutcome, SessionError> {
        let mut inner = self.lock();
        if inner.state.is_processing() {
            return Err(SessionError::Busy);
        }
        let Some(upload) = inner.video.clone() else {
            return Err(SessionError::NoVideo);
        };

        if query.trim().is_empty() {
            inner.state = SessionState::QueryMissing;
            return Ok(BeginOutcome::QueryMissing);
        }

        inner.state = SessionState::Processing;
        Ok(BeginOutcome::Started(PendingAnalysis {
            upload,
            query: query.to_string(),
        }))
    }

    /// Record the outcome of the running analysis.
    ///
    /// # Errors
    /// `SessionError::NotProcessing` if no analysis was started.
    pub fn finish(&self, result: Result<AnalysisReport, Error>) -> Result<(), SessionError> {
        let mut inner = self.lock();
        if !inner.state.is_processing() {
            return Err(SessionError::NotProcessing);
        }
        inner.state = match result {
            Ok(report) => SessionState::Success(Box::new(report)),
            Err(e) => {
                warn!(session = %self.id, kind = %e.kind(), error = %e, "Video analysis failed");
                SessionState::Failed(e.to_string())
            }
        };
        Ok(())
    }

    /// Run one analyze request through `handler` and return the new view.
    ///
    /// If the returned future is dropped mid-analysis the session moves to
    /// `Failed` instead of staying stuck in `Processing`.
    pub async fn analyze(
        &self,
        handler: &AnalysisHandler,
        query: &str,
    ) -> Result<SessionView, SessionError> {
        let pending = match self.begin_analysis(query)? {
            BeginOutcome::QueryMissing => return Ok(self.view()),
            BeginOutcome::Started(pending) => pending,
        };

        let guard = ProcessingGuard {
            session: self,
            armed: true,
        };
        let result = handler.analyze(&pending.upload, &pending.query).await;
        guard.disarm();

        self.finish(result)?;
        Ok(self.view())
    }

    /// Render what a client should display.
    pub fn view(&self) -> SessionView {
        let inner = self.lock();
        let video = inner.video.as_ref().map(|v| VideoSummary {
            file_name: v.file_name.clone(),
            bytes: v.len(),
        });

        let (banner, result, cleanup_warning) = match &inner.state {
            SessionState::Idle => (Some(Banner::info(MSG_UPLOAD_PROMPT)), None, None),
            SessionState::FileLoaded => (None, None, None),
            SessionState::QueryMissing => (Some(Banner::warning(MSG_QUERY_MISSING)), None, None),
            SessionState::Processing => (Some(Banner::progress(MSG_PROCESSING)), None, None),
            SessionState::Success(report) => (
                Some(Banner::success(MSG_SUCCESS)),
                Some(report.response.content.clone()),
                report.cleanup_warning.as_ref().map(ToString::to_string),
            ),
            SessionState::Failed(message) => (
                Some(Banner::error(format!("{MSG_ERROR_PREFIX}{message}"))),
                None,
                None,
            ),
        };

        SessionView {
            session_id: self.id.clone(),
            status: inner.state.name(),
            video,
            banner,
            result,
            cleanup_warning,
        }
    }
}

/// Resets a session stuck in `Processing` when an analysis is abandoned.
struct ProcessingGuard<'a> {
    session: &'a Session,
    armed: bool,
}

impl ProcessingGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.session.lock();
        if inner.state.is_processing() {
            warn!(session = %self.session.id, "Analysis abandoned while processing");
            inner.state = SessionState::Failed(MSG_CANCELLED.to_string());
        }
    }
}

/// Banner severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BannerLevel {
    Info,
    Warning,
    Progress,
    Success,
    Error,
}

/// A status message for the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Banner {
    pub level: BannerLevel,
    pub message: String,
}

impl Banner {
    fn new(level: BannerLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(BannerLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(BannerLevel::Warning, message)
    }

    pub fn progress(message: impl Into<String>) -> Self {
        Self::new(BannerLevel::Progress, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(BannerLevel::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(BannerLevel::Error, message)
    }
}

/// The loaded video, without its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoSummary {
    pub file_name: String,
    pub bytes: usize,
}

/// Renderable session snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<Banner>,
    /// The analysis result text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup_warning: Option<String>,
}

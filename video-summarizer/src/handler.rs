//! Analysis pipeline for the video summarizer.
//!
//! [`AnalysisHandler::analyze`] runs one request end to end: validate the
//! query, write the upload to a scoped temporary file, hand it to the file
//! processing service, wait until it is ready, then ask the agent. The
//! temporary file is removed on every path out of `analyze`.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use video_summarizer_common::config::Config;
use video_summarizer_common::error::{CleanupWarning, Error};

use crate::agent::{AgentCell, AgentResponse, Analyzer, VideoAgent};
use crate::files::{FileService, FileState, GeminiFilesClient, PollPolicy, RemoteFile, wait_until_ready};
use crate::prompt::{AnalysisPrompt, compose_analysis_prompt, validate_query};
use crate::search::DuckDuckGoProvider;
use crate::upload::{MAX_UPLOAD_BYTES_HINT, ScopedVideoFile, VideoFormat, VideoUpload};

/// Builds the agent the first time a request needs it.
pub type AgentFactory = Arc<dyn Fn() -> Arc<dyn Analyzer> + Send + Sync>;

/// Outcome of a successful analysis.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// What the agent said
    pub response: AgentResponse,
    /// Prompt the agent was given
    #[serde(serialize_with = "serialize_prompt")]
    pub prompt: AnalysisPrompt,
    /// Processed file the answer is grounded on
    pub file: RemoteFile,
    /// Set when the temporary copy could not be removed
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_warning")]
    pub cleanup_warning: Option<CleanupWarning>,
}

fn serialize_prompt<S: serde::Serializer>(prompt: &AnalysisPrompt, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(prompt.as_str())
}

fn serialize_warning<S: serde::Serializer>(
    warning: &Option<CleanupWarning>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match warning {
        Some(w) => s.serialize_str(&w.to_string()),
        None => s.serialize_none(),
    }
}

/// Video analysis pipeline.
///
/// Shared by every session. The agent is built lazily and at most once.
pub struct AnalysisHandler {
    files: Arc<dyn FileService>,
    agent: AgentCell<dyn Analyzer>,
    agent_factory: AgentFactory,
    poll: PollPolicy,
    temp_dir: Option<PathBuf>,
}

impl AnalysisHandler {
    /// Create a handler talking to Gemini and DuckDuckGo.
    pub fn new(config: &Config) -> Self {
        let agent_config = config.clone();
        let factory: AgentFactory = Arc::new(move || {
            info!(model = %agent_config.model, "Initializing video agent");
            let search = Arc::new(DuckDuckGoProvider::new());
            Arc::new(VideoAgent::from_config(&agent_config, search)) as Arc<dyn Analyzer>
        });

        Self::with_deps(
            Arc::new(GeminiFilesClient::new(config)),
            factory,
            PollPolicy::from_config(config),
        )
    }

    /// Create a handler with provided dependencies.
    pub fn with_deps(files: Arc<dyn FileService>, agent_factory: AgentFactory, poll: PollPolicy) -> Self {
        Self {
            files,
            agent: AgentCell::new(),
            agent_factory,
            poll,
            temp_dir: None,
        }
    }

    /// Write scoped copies under `dir` instead of the system temp directory.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn poll_policy(&self) -> &PollPolicy {
        &self.poll
    }

    /// The shared agent, built on first call.
    pub fn agent(&self) -> Arc<dyn Analyzer> {
        self.agent.get_or_init(|| (self.agent_factory)())
    }

    pub fn agent_initialized(&self) -> bool {
        self.agent.is_initialized()
    }

    /// Analyze an uploaded video.
    ///
    /// # Errors
    /// - `Error::Validation` for an empty query or unsupported format; nothing
    ///   is written or sent in that case
    /// - `Error::Io` if the temporary copy cannot be written
    /// - `Error::Api` / `Error::Search` for service failures, including a file
    ///   the service failed to process
    /// - `Error::Timeout` if processing exceeds the poll policy
    #[instrument(level = "info", name = "video_analyze", skip(self, upload, query), fields(file_name = %upload.file_name, bytes = upload.len()))]
    pub async fn analyze(&self, upload: &VideoUpload, query: &str) -> Result<AnalysisReport, Error> {
        validate_query(query)?;
        let format = upload.format()?;
        if upload.exceeds_size_hint() {
            warn!(
                bytes = upload.len(),
                hint = MAX_UPLOAD_BYTES_HINT,
                "Upload is larger than the advisory size limit"
            );
        }

        let agent = self.agent();
        let scoped = ScopedVideoFile::create(upload, self.temp_dir.as_deref()).await?;

        let outcome = self
            .process(&scoped, upload, format, query, agent.as_ref())
            .await;
        let cleanup_warning = scoped.cleanup();

        match outcome {
            Ok((response, prompt, file)) => {
                info!(file = %file.name, searches = response.search_queries.len(), "Analysis complete");
                Ok(AnalysisReport {
                    response,
                    prompt,
                    file,
                    cleanup_warning,
                })
            }
            Err(e) => {
                if let Some(warning) = cleanup_warning {
                    warn!(%warning, "Temporary file left behind after failed analysis");
                }
                Err(e)
            }
        }
    }

    async fn process(
        &self,
        scoped: &ScopedVideoFile,
        upload: &VideoUpload,
        format: VideoFormat,
        query: &str,
        agent: &dyn Analyzer,
    ) -> Result<(AgentResponse, AnalysisPrompt, RemoteFile), Error> {
        let uploaded = self
            .files
            .upload(scoped.path(), format.mime_type(), &upload.file_name)
            .await?;
        debug!(name = %uploaded.name, state = %uploaded.state, "Waiting for file processing");

        let file = wait_until_ready(self.files.as_ref(), uploaded, &self.poll).await?;
        if file.state == FileState::Failed {
            let reason = file
                .error
                .as_ref()
                .and_then(|status| status.message.clone())
                .unwrap_or_else(|| "no details given".to_string());
            return Err(Error::api(
                &file.name,
                200,
                format!("Video processing failed: {}", reason),
            ));
        }

        let prompt = compose_analysis_prompt(query);
        let response = agent.analyze(&prompt, &file).await?;
        Ok((response, prompt, file))
    }
}

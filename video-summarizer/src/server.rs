//! MCP Server implementation for the video summarizer.
//!
//! This module provides the MCP server handler that exposes:
//! - `video_upload` tool to load a video into the session
//! - `video_analyze` tool to ask a question about the loaded video
//! - `video_session_status` tool to read the current session view
//! - `summarizer://formats` resource with the accepted formats

use crate::handler::AnalysisHandler;
use crate::resources;
use crate::session::{Session, SessionError, SessionView};
use crate::upload::{VideoFormat, VideoUpload};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    model::{
        CallToolResult, Content, ListResourcesResult, ReadResourceResult, ResourceContents,
        ServerCapabilities, ServerInfo, Tool,
    },
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use video_summarizer_common::error::{Error, ErrorKind};

/// MCP server for video analysis.
///
/// Cloning shares both the handler and the session. Use
/// [`VideoSummarizerServer::new_session`] to get a value with its own session.
#[derive(Clone)]
pub struct VideoSummarizerServer {
    /// Pipeline shared by every session
    handler: Arc<AnalysisHandler>,
    /// This client's interaction state
    session: Arc<Session>,
}

/// Tool parameters for video_upload.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct VideoUploadToolParams {
    /// Path to a local video file (mp4, mov or avi)
    #[serde(default)]
    pub video_path: Option<String>,
    /// Base64-encoded video bytes, as an alternative to video_path
    #[serde(default)]
    pub video_base64: Option<String>,
    /// File name used for format detection. Required with video_base64,
    /// defaults to the file name of video_path.
    #[serde(default)]
    pub file_name: Option<String>,
}

impl VideoUploadToolParams {
    /// Turn the parameters into an upload.
    ///
    /// # Errors
    /// `Error::Validation` for missing, conflicting or undecodable input or an
    /// unsupported format; `Error::Io` if the file cannot be read.
    pub async fn into_upload(self) -> Result<VideoUpload, Error> {
        let upload = match (self.video_path, self.video_base64) {
            (Some(_), Some(_)) => {
                return Err(Error::validation(
                    "Provide either video_path or video_base64, not both",
                ));
            }
            (None, None) => {
                return Err(Error::validation("Either video_path or video_base64 is required"));
            }
            (Some(path), None) => {
                let file_name = match self.file_name {
                    Some(name) => name,
                    None => Path::new(&path)
                        .file_name()
                        .and_then(|n| n.to_str())
                        .map(str::to_string)
                        .ok_or_else(|| Error::validation(format!("Invalid video path: {}", path)))?,
                };
                // Nothing is opened until the name passes the format check.
                VideoFormat::require(&file_name)?;

                let metadata = tokio::fs::metadata(&path).await?;
                if !metadata.is_file() {
                    return Err(Error::validation(format!(
                        "Video path is not a regular file: {}",
                        path
                    )));
                }
                let bytes = tokio::fs::read(&path).await?;
                VideoUpload::new(file_name, bytes)
            }
            (None, Some(data)) => {
                let file_name = self.file_name.ok_or_else(|| {
                    Error::validation("file_name is required when using video_base64")
                })?;
                VideoFormat::require(&file_name)?;
                let bytes = BASE64
                    .decode(data.trim())
                    .map_err(|e| Error::validation(format!("Invalid base64 video data: {}", e)))?;
                VideoUpload::new(file_name, bytes)
            }
        };

        if upload.is_empty() {
            return Err(Error::validation("Video file is empty"));
        }
        Ok(upload)
    }
}

/// Tool parameters for video_analyze.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct VideoAnalyzeToolParams {
    /// Question or instruction about the loaded video
    pub query: String,
}

fn to_mcp_error(err: Error) -> McpError {
    match err.kind() {
        ErrorKind::UserInput => McpError::invalid_params(err.to_string(), None),
        _ => McpError::internal_error(err.to_string(), None),
    }
}

fn session_error(err: SessionError) -> McpError {
    match err {
        SessionError::NoVideo => McpError::invalid_params(err.to_string(), None),
        SessionError::Busy | SessionError::NotProcessing => {
            McpError::invalid_request(err.to_string(), None)
        }
    }
}

fn view_json(view: &SessionView) -> Result<String, McpError> {
    serde_json::to_string_pretty(view)
        .map_err(|e| McpError::internal_error(format!("Failed to serialize session: {}", e), None))
}

fn object_schema<T: JsonSchema>() -> Arc<serde_json::Map<String, serde_json::Value>> {
    let schema = schemars::schema_for!(T);
    match serde_json::to_value(&schema).unwrap_or_default() {
        serde_json::Value::Object(map) => Arc::new(map),
        _ => Arc::new(serde_json::Map::new()),
    }
}

fn empty_object_schema() -> Arc<serde_json::Map<String, serde_json::Value>> {
    let mut map = serde_json::Map::new();
    map.insert("type".to_string(), serde_json::Value::String("object".to_string()));
    map.insert("properties".to_string(), serde_json::Value::Object(serde_json::Map::new()));
    Arc::new(map)
}

fn parse_params<T: serde::de::DeserializeOwned>(
    arguments: Option<serde_json::Map<String, serde_json::Value>>,
) -> Result<T, McpError> {
    arguments
        .map(|args| serde_json::from_value(serde_json::Value::Object(args)))
        .transpose()
        .map_err(|e| McpError::invalid_params(format!("Invalid parameters: {}", e), None))?
        .ok_or_else(|| McpError::invalid_params("Missing parameters", None))
}

/// Tools exposed by the server.
pub fn tool_definitions() -> Vec<Tool> {
    let tool = |name: &'static str, description: &'static str, schema| Tool {
        name: Cow::Borrowed(name),
        description: Some(Cow::Borrowed(description)),
        input_schema: schema,
        annotations: None,
        icons: None,
        meta: None,
        output_schema: None,
        title: None,
    };

    vec![
        tool(
            "video_upload",
            "Load a video into this session from a local path or base64 data. \
             Accepted formats: mp4, mov, avi.",
            object_schema::<VideoUploadToolParams>(),
        ),
        tool(
            "video_analyze",
            "Analyze the loaded video and answer the query using video insights \
             and supplementary web research. Returns the answer in markdown.",
            object_schema::<VideoAnalyzeToolParams>(),
        ),
        tool(
            "video_session_status",
            "Show the session status, banner message and last result.",
            empty_object_schema(),
        ),
    ]
}

impl VideoSummarizerServer {
    /// Create a server with a fresh session.
    pub fn new(handler: Arc<AnalysisHandler>) -> Self {
        Self {
            handler,
            session: Arc::new(Session::new()),
        }
    }

    /// Same handler, new session.
    pub fn new_session(&self) -> Self {
        Self::new(Arc::clone(&self.handler))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Load a video into the session.
    pub async fn upload_video(
        &self,
        params: VideoUploadToolParams,
    ) -> Result<CallToolResult, McpError> {
        let upload = params.into_upload().await.map_err(to_mcp_error)?;
        if upload.exceeds_size_hint() {
            warn!(bytes = upload.len(), "Uploaded video is larger than the advisory limit");
        }
        info!(session = %self.session.id(), file_name = %upload.file_name, bytes = upload.len(), "Loading video");

        self.session.load_video(upload).map_err(session_error)?;
        let view = self.session.view();
        Ok(CallToolResult::success(vec![Content::text(view_json(&view)?)]))
    }

    /// Analyze the loaded video.
    pub async fn analyze_video(
        &self,
        params: VideoAnalyzeToolParams,
    ) -> Result<CallToolResult, McpError> {
        info!(session = %self.session.id(), query_len = params.query.len(), "Analyzing video");

        let view = self
            .session
            .analyze(&self.handler, &params.query)
            .await
            .map_err(session_error)?;
        let json = view_json(&view)?;

        match (view.status, view.result.as_ref()) {
            ("success", Some(result)) => Ok(CallToolResult::success(vec![
                Content::text(result.clone()),
                Content::text(json),
            ])),
            ("error", _) => Ok(CallToolResult::error(vec![Content::text(json)])),
            _ => Ok(CallToolResult::success(vec![Content::text(json)])),
        }
    }

    /// Report the session view.
    pub async fn session_status(&self) -> Result<CallToolResult, McpError> {
        let view = self.session.view();
        Ok(CallToolResult::success(vec![Content::text(view_json(&view)?)]))
    }
}

impl ServerHandler for VideoSummarizerServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Video AI summarizer powered by Gemini with DuckDuckGo web search. \
                 Load a video (mp4, mov or avi) with video_upload, then ask about it \
                 with video_analyze. video_session_status shows the current state."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            ..Default::default()
        }
    }

    fn list_tools(
        &self,
        _params: Option<rmcp::model::PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<rmcp::model::ListToolsResult, McpError>> + Send + '_
    {
        async move {
            Ok(rmcp::model::ListToolsResult {
                tools: tool_definitions(),
                next_cursor: None,
                meta: None,
            })
        }
    }

    fn call_tool(
        &self,
        params: rmcp::model::CallToolRequestParams,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            match params.name.as_ref() {
                "video_upload" => self.upload_video(parse_params(params.arguments)?).await,
                "video_analyze" => self.analyze_video(parse_params(params.arguments)?).await,
                "video_session_status" => self.session_status().await,
                _ => Err(McpError::invalid_params(
                    format!("Unknown tool: {}", params.name),
                    None,
                )),
            }
        }
    }

    fn list_resources(
        &self,
        _params: Option<rmcp::model::PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        async move {
            debug!("Listing resources");

            let formats_resource = rmcp::model::Resource {
                raw: rmcp::model::RawResource {
                    uri: resources::FORMATS_URI.to_string(),
                    name: "Accepted Video Formats".to_string(),
                    title: None,
                    description: Some(
                        "Video formats accepted for analysis and the advisory size limit"
                            .to_string(),
                    ),
                    mime_type: Some("application/json".to_string()),
                    size: None,
                    icons: None,
                    meta: None,
                },
                annotations: None,
            };

            Ok(ListResourcesResult {
                resources: vec![formats_resource],
                next_cursor: None,
                meta: None,
            })
        }
    }

    fn read_resource(
        &self,
        params: rmcp::model::ReadResourceRequestParams,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        async move {
            let uri = &params.uri;
            debug!(uri = %uri, "Reading resource");

            let content = match uri.as_str() {
                resources::FORMATS_URI => resources::formats_resource_json(),
                _ => {
                    return Err(McpError::resource_not_found(
                        format!("Unknown resource: {}", uri),
                        None,
                    ));
                }
            };

            Ok(ReadResourceResult {
                contents: vec![ResourceContents::text(content, uri.clone())],
            })
        }
    }
}

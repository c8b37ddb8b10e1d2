//! Video analysis agent.
//!
//! [`VideoAgent`] answers a prompt about a processed video with Gemini. It can
//! call a web search tool while answering: when the model replies with a
//! function call, the search runs locally and its results go back to the
//! model, up to `max_tool_rounds` times.
//!
//! [`AgentCell`] builds the agent on first use and hands out the same
//! instance afterwards.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};
use video_summarizer_common::config::{Config, DEFAULT_MODEL};
use video_summarizer_common::error::Error;

use crate::files::{RemoteFile, read_json};
use crate::prompt::AnalysisPrompt;
use crate::search::{DEFAULT_MAX_RESULTS, SearchProvider, SearchResult};

/// Default agent name.
pub const DEFAULT_AGENT_NAME: &str = "Video AI summarizer";

/// Default number of search round trips before the model must answer.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 4;

/// Name of the search function exposed to the model.
pub const SEARCH_TOOL_NAME: &str = "duckduckgo_search";

const MARKDOWN_INSTRUCTION: &str = "Use markdown to format your answers.";

/// Static agent configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub name: String,
    pub model: String,
    /// Ask the model to answer in markdown
    pub markdown: bool,
    pub max_tool_rounds: usize,
    pub max_search_results: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_AGENT_NAME.to_string(),
            model: DEFAULT_MODEL.to_string(),
            markdown: true,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            max_search_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl AgentConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.model.clone(),
            ..Self::default()
        }
    }
}

/// What the agent produced for one prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentResponse {
    /// Generated answer text
    pub content: String,
    /// Model that produced it
    pub model: String,
    /// Queries the model sent to the search tool, in order
    pub search_queries: Vec<String>,
}

/// Anything that can answer an analysis prompt about a processed video.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, prompt: &AnalysisPrompt, video: &RemoteFile)
    -> Result<AgentResponse, Error>;
}

/// Gemini-backed agent with a web search tool.
pub struct VideoAgent {
    config: AgentConfig,
    search: Arc<dyn SearchProvider>,
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl VideoAgent {
    pub fn new(
        config: AgentConfig,
        search: Arc<dyn SearchProvider>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            config,
            search,
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    /// Build an agent from application configuration.
    pub fn from_config(config: &Config, search: Arc<dyn SearchProvider>) -> Self {
        Self::new(
            AgentConfig::from_config(config),
            search,
            config.api_key.clone(),
            config.api_base.clone(),
        )
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn generate_endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.config.model
        )
    }

    fn system_instruction(&self) -> Option<Content> {
        self.config.markdown.then(|| Content {
            role: None,
            parts: vec![Part::text(MARKDOWN_INSTRUCTION)],
        })
    }

    fn tool_declarations(&self) -> Vec<Tool> {
        vec![Tool {
            function_declarations: vec![FunctionDeclaration {
                name: SEARCH_TOOL_NAME.to_string(),
                description: "Search the web with DuckDuckGo. Use it to find supplementary \
                              context about what appears in the video."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "The search query."
                        },
                        "max_results": {
                            "type": "integer",
                            "description": "Maximum number of results to return."
                        }
                    },
                    "required": ["query"]
                }),
            }],
        }]
    }

    /// Run the agent on a prompt grounded on the given videos.
    ///
    /// # Errors
    /// Returns `Error::Api` when the model call fails, returns no candidate,
    /// or ends without any text. Search failures do not abort the run; the
    /// model is told the search failed.
    #[instrument(level = "info", name = "agent_run", skip(self, prompt, videos), fields(agent = %self.config.name, model = %self.config.model, videos = videos.len()))]
    pub async fn run(&self, prompt: &str, videos: &[RemoteFile]) -> Result<AgentResponse, Error> {
        let mut parts = Vec::with_capacity(videos.len() + 1);
        for video in videos {
            parts.push(Part::file(video)?);
        }
        parts.push(Part::text(prompt));

        let mut contents = vec![Content {
            role: Some("user".to_string()),
            parts,
        }];
        let mut search_queries = Vec::new();

        for round in 0..=self.config.max_tool_rounds {
            let allow_tools = round < self.config.max_tool_rounds;
            let response = self.generate(&contents, allow_tools).await?;
            let content = first_candidate_content(response, &self.generate_endpoint())?;

            let calls: Vec<FunctionCall> = content
                .parts
                .iter()
                .filter_map(|part| part.function_call.clone())
                .collect();

            if calls.is_empty() || !allow_tools {
                let text = content.text();
                if text.trim().is_empty() {
                    return Err(Error::api(
                        self.generate_endpoint(),
                        200,
                        "Model returned no text",
                    ));
                }
                info!(round, searches = search_queries.len(), "Agent produced a response");
                return Ok(AgentResponse {
                    content: text,
                    model: self.config.model.clone(),
                    search_queries,
                });
            }

            debug!(round, calls = calls.len(), "Model requested tool calls");
            contents.push(Content {
                role: Some("model".to_string()),
                parts: content.parts,
            });

            let mut responses = Vec::with_capacity(calls.len());
            for call in calls {
                if let Some(query) = call.args.get("query").and_then(Value::as_str) {
                    search_queries.push(query.to_string());
                }
                let result = self.execute_tool(&call).await;
                responses.push(Part::function_response(&call.name, result));
            }
            contents.push(Content {
                role: Some("user".to_string()),
                parts: responses,
            });
        }

        // The final round never offers tools, so the loop always returns.
        Err(Error::api(
            self.generate_endpoint(),
            200,
            "Agent exceeded its tool round limit",
        ))
    }

    async fn generate(
        &self,
        contents: &[Content],
        allow_tools: bool,
    ) -> Result<GenerateContentResponse, Error> {
        let request = GenerateContentRequest {
            contents,
            system_instruction: self.system_instruction(),
            tools: if allow_tools {
                self.tool_declarations()
            } else {
                Vec::new()
            },
        };

        let endpoint = self.generate_endpoint();
        debug!(endpoint = %endpoint, turns = contents.len(), "Calling Gemini generateContent");

        let response = self
            .http
            .post(&endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::api(&endpoint, 0, format!("Request failed: {}", e)))?;

        read_json(&endpoint, response).await
    }

    /// Execute one function call. Failures are reported to the model as data.
    async fn execute_tool(&self, call: &FunctionCall) -> Value {
        if call.name != SEARCH_TOOL_NAME {
            warn!(tool = %call.name, "Model called an unknown tool");
            return json!({ "error": format!("Unknown tool: {}", call.name) });
        }

        let Some(query) = call.args.get("query").and_then(Value::as_str) else {
            return json!({ "error": "Missing required argument: query" });
        };
        let max_results = call
            .args
            .get("max_results")
            .and_then(Value::as_u64)
            .map(|n| (n as usize).min(self.config.max_search_results).max(1))
            .unwrap_or(self.config.max_search_results);

        match self.search.search(query, max_results).await {
            Ok(results) => search_results_json(&results),
            Err(e) => {
                warn!(provider = %self.search.provider_name(), error = %e, "Web search failed");
                json!({ "error": e.to_string() })
            }
        }
    }
}

fn search_results_json(results: &[SearchResult]) -> Value {
    json!({ "results": results })
}

fn first_candidate_content(
    response: GenerateContentResponse,
    endpoint: &str,
) -> Result<Content, Error> {
    if let Some(content) = response
        .candidates
        .into_iter()
        .find_map(|candidate| candidate.content)
    {
        return Ok(content);
    }

    let reason = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
        .map(|reason| format!("Prompt blocked: {}", reason))
        .unwrap_or_else(|| "No candidates in response".to_string());
    Err(Error::api(endpoint, 200, reason))
}

#[async_trait]
impl Analyzer for VideoAgent {
    async fn analyze(
        &self,
        prompt: &AnalysisPrompt,
        video: &RemoteFile,
    ) -> Result<AgentResponse, Error> {
        self.run(prompt.as_str(), std::slice::from_ref(video)).await
    }
}

/// Lazily constructed, shared, read-only agent.
///
/// The first `get_or_init` runs the factory; every later call (from any
/// thread) returns a clone of the same `Arc`.
pub struct AgentCell<A: ?Sized> {
    cell: OnceLock<Arc<A>>,
}

impl<A: ?Sized> AgentCell<A> {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    pub fn get_or_init<F>(&self, init: F) -> Arc<A>
    where
        F: FnOnce() -> Arc<A>,
    {
        Arc::clone(self.cell.get_or_init(init))
    }

    /// The agent, if it has been built.
    pub fn get(&self) -> Option<Arc<A>> {
        self.cell.get().cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<A: ?Sized> Default for AgentCell<A> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// API Request/Response Types
// =============================================================================

/// Gemini generateContent request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest<'a> {
    pub contents: &'a [Content],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

/// One conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// Concatenated text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// A content part. Exactly one field is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_data: Option<FileData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Reference a processed file.
    ///
    /// # Errors
    /// Returns `Error::Api` if the file handle carries no URI.
    pub fn file(file: &RemoteFile) -> Result<Self, Error> {
        let file_uri = file.uri.clone().ok_or_else(|| {
            Error::api(&file.name, 200, "Processed file has no URI")
        })?;
        Ok(Self {
            file_data: Some(FileData {
                mime_type: file
                    .mime_type
                    .clone()
                    .unwrap_or_else(|| "video/mp4".to_string()),
                file_uri,
            }),
            ..Self::default()
        })
    }

    pub fn function_response(name: &str, response: Value) -> Self {
        Self {
            function_response: Some(FunctionResponse {
                name: name.to_string(),
                response,
            }),
            ..Self::default()
        }
    }
}

/// Reference to an uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub mime_type: String,
    pub file_uri: String,
}

/// Function call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// Result of a function call, sent back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
}

/// Tool declarations offered to the model.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Gemini generateContent response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

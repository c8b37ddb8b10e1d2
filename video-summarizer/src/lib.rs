//! Video Summarizer MCP Server Library
//!
//! Answers questions about uploaded videos. A video is processed by the
//! Gemini Files API, then a Gemini agent with DuckDuckGo web search answers
//! the user's query about it.
//!
//! The pipeline lives in [`handler::AnalysisHandler`]; [`server::VideoSummarizerServer`]
//! exposes it over MCP with one [`session::Session`] per client.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod agent;
pub mod files;
pub mod handler;
pub mod prompt;
pub mod resources;
pub mod search;
pub mod server;
pub mod session;
pub mod upload;

pub use agent::{AgentCell, AgentConfig, AgentResponse, Analyzer, VideoAgent};
pub use files::{FileService, FileState, GeminiFilesClient, PollPolicy, RemoteFile, wait_until_ready};
pub use handler::{AgentFactory, AnalysisHandler, AnalysisReport};
pub use prompt::{AnalysisPrompt, compose_analysis_prompt, validate_query};
pub use search::{DuckDuckGoProvider, SearchProvider, SearchResult};
pub use server::VideoSummarizerServer;
pub use session::{Session, SessionState, SessionView};
pub use upload::{ScopedVideoFile, VideoFormat, VideoUpload};

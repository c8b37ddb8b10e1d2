//! Workspace-level integration tests for the video summarizer.
//!
//! These tests verify:
//! - The server starts with a configuration and reports its capabilities
//! - Tool registration and schema generation
//! - Rejection of invalid tool input before any remote call
//! - Shape of successful tool output

pub mod input_validation;
pub mod output_format;
pub mod server_startup;
pub mod tool_schema;

use std::sync::Arc;

use video_summarizer::{AnalysisHandler, VideoSummarizerServer};
use video_summarizer_common::Config;

/// Configuration pointing at an unroutable API base, so nothing leaves the host.
pub fn test_config() -> Config {
    Config::from_lookup(|name| match name {
        "GOOGLE_API_KEY" => Some("test-key".to_string()),
        "GEMINI_API_BASE" => Some("http://127.0.0.1:9".to_string()),
        _ => None,
    })
    .unwrap_or_else(|e| panic!("test configuration must be valid: {}", e))
}

pub fn test_server() -> VideoSummarizerServer {
    VideoSummarizerServer::new(Arc::new(AnalysisHandler::new(&test_config())))
}

//! Video Summarizer MCP Server
//!
//! MCP server that analyzes videos with Gemini and DuckDuckGo web search.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use video_summarizer::{AnalysisHandler, VideoSummarizerServer};
use video_summarizer_common::{Config, McpServerBuilder, TransportArgs};

/// Command-line arguments for the video summarizer server.
#[derive(Parser, Debug)]
#[command(name = "video-summarizer")]
#[command(about = "MCP server that answers questions about uploaded videos")]
struct Args {
    /// Transport configuration
    #[command(flatten)]
    transport: TransportArgs,

    /// Directory for temporary video copies (default: system temp dir)
    #[arg(long, env = "VIDEO_TEMP_DIR")]
    temp_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    video_summarizer_common::tracing::init_tracing();

    tracing::info!("video-summarizer server starting...");

    let args = Args::parse();

    // Fail fast: nothing works without an API key
    let config = Config::from_env()?;
    tracing::info!(
        model = %config.model,
        endpoint = %config.model_endpoint(&config.model, "generateContent"),
        poll_interval_ms = config.poll_interval_ms,
        poll_timeout_secs = config.poll_timeout_secs,
        "Configuration loaded"
    );

    let mut handler = AnalysisHandler::new(&config);
    if let Some(dir) = args.temp_dir {
        tracing::info!(temp_dir = %dir.display(), "Using custom temp directory");
        handler = handler.with_temp_dir(dir);
    }
    let server = VideoSummarizerServer::new(Arc::new(handler));

    let transport = args.transport.into_transport();

    McpServerBuilder::new(move || server.new_session())
        .with_transport(transport)
        .run()
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

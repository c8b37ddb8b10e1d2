//! Video Summarizer Common Library
//!
//! Shared utilities for configuration, error handling, tracing and MCP
//! server plumbing used by the video summarizer server.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod error;
pub mod server;
pub mod tracing;
pub mod transport;


pub use config::Config;
pub use error::{CleanupWarning, ConfigError, Error, ErrorKind, Result};
pub use server::{McpServerBuilder, ServerError, shutdown_channel};
pub use transport::{Transport, TransportArgs, TransportMode};

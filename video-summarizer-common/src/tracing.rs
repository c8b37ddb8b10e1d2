//! Logging setup.
//!
//! `RUST_LOG` overrides the built-in filter, e.g.
//! `RUST_LOG=video_summarizer::files=debug` to watch upload polling or
//! `RUST_LOG=warn,video_summarizer::agent=trace` to follow tool rounds.
//!
//! Everything is written to stderr: over the stdio transport stdout is the
//! MCP channel and a stray log line there corrupts the protocol stream.

use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan, prelude::*};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Build the filter from `RUST_LOG`, falling back to `fallback`.
///
/// An unparsable `RUST_LOG` also falls back rather than silencing logs.
pub fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

fn install(fallback: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter(fallback))
        .with(stderr_layer)
        .try_init()
}

/// Install the global subscriber with [`DEFAULT_FILTER`].
///
/// Calling this twice is harmless: the second call leaves the first
/// subscriber in place.
pub fn init_tracing() {
    init_tracing_with_default(DEFAULT_FILTER);
}

/// Install the global subscriber with a custom fallback filter.
///
/// ```no_run
/// use video_summarizer_common::tracing::init_tracing_with_default;
///
/// init_tracing_with_default("debug");
/// tracing::debug!("verbose logging enabled");
/// ```
pub fn init_tracing_with_default(fallback: &str) {
    if install(fallback).is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Like [`init_tracing`], but reports whether this call installed the
/// subscriber.
pub fn try_init_tracing() -> bool {
    install(DEFAULT_FILTER).is_ok()
}

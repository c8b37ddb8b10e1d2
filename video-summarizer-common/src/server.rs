//! MCP server runner.
//!
//! Serves MCP over the configured transport until a shutdown signal
//! arrives. The runner takes a handler factory rather than a handler: each
//! streamable HTTP session calls it once and so gets its own analysis
//! session, while stdio serves a single client and calls it exactly once.
//!
//! ```ignore
//! use video_summarizer_common::server::McpServerBuilder;
//! use video_summarizer_common::transport::{DEFAULT_HOST, Transport};
//!
//! McpServerBuilder::new(move || server.new_session())
//!     .with_transport(Transport::http(DEFAULT_HOST, 8080))
//!     .run()
//!     .await?;
//! ```

use std::net::SocketAddr;

use crate::transport::{MCP_HTTP_PATH, Transport};
use rmcp::{ServerHandler, ServiceExt};
use thiserror::Error;
use tokio::sync::oneshot;

/// Errors that stop the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The HTTP listener could not be bound
    #[error("Failed to bind {addr}: {message}")]
    BindFailed { addr: SocketAddr, message: String },

    /// The MCP transport failed while serving
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configures and runs the MCP server.
pub struct McpServerBuilder<F> {
    factory: F,
    transport: Transport,
    shutdown_rx: Option<oneshot::Receiver<()>>,
}

impl<F, H> McpServerBuilder<F>
where
    F: Fn() -> H + Send + Sync + 'static,
    H: ServerHandler + Send + Sync + 'static,
{
    /// Start from a per-session handler factory, on stdio.
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            transport: Transport::default(),
            shutdown_rx: None,
        }
    }

    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// Stop when `shutdown_rx` resolves (a send or a dropped sender) instead
    /// of waiting for SIGINT/SIGTERM.
    pub fn with_shutdown(mut self, shutdown_rx: oneshot::Receiver<()>) -> Self {
        self.shutdown_rx = Some(shutdown_rx);
        self
    }

    /// Serve until shutdown.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!(transport = %self.transport, "Starting MCP server");

        let shutdown = shutdown_signal(self.shutdown_rx);
        match self.transport {
            Transport::Stdio => serve_stdio(self.factory, shutdown).await,
            Transport::Http(addr) => serve_http(self.factory, addr, shutdown).await,
        }
    }
}

async fn serve_stdio<F, H>(
    factory: F,
    shutdown: impl Future<Output = ()>,
) -> Result<(), ServerError>
where
    F: Fn() -> H,
    H: ServerHandler,
{
    let service = factory()
        .serve(rmcp::transport::io::stdio())
        .await
        .map_err(|e| ServerError::Transport(e.to_string()))?;

    tokio::select! {
        result = service.waiting() => {
            result.map_err(|e| ServerError::Transport(e.to_string()))?;
            tracing::info!("Client closed the stdio session");
        }
        _ = shutdown => tracing::info!("Shutting down stdio server"),
    }
    Ok(())
}

async fn serve_http<F, H>(
    factory: F,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError>
where
    F: Fn() -> H + Send + Sync + 'static,
    H: ServerHandler + Send + Sync + 'static,
{
    use rmcp::transport::streamable_http_server::{
        StreamableHttpService, session::local::LocalSessionManager,
    };

    let service = StreamableHttpService::new(
        move || Ok(factory()),
        LocalSessionManager::default().into(),
        Default::default(),
    );
    let router = axum::Router::new().nest_service(MCP_HTTP_PATH, service);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::BindFailed {
            addr,
            message: e.to_string(),
        })?;
    tracing::info!(%addr, path = MCP_HTTP_PATH, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServerError::Transport(e.to_string()))?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Resolves on the programmatic signal if one was given, else on SIGINT/SIGTERM.
pub(crate) async fn shutdown_signal(rx: Option<oneshot::Receiver<()>>) {
    match rx {
        Some(rx) => {
            let _ = rx.await;
        }
        None => wait_for_os_signal().await,
    }
}

async fn wait_for_os_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
                    _ = sigint.recv() => tracing::info!("Received SIGINT"),
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "Could not install unix signal handlers, using Ctrl+C");
            }
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl+C");
}

/// Sender/receiver pair for [`McpServerBuilder::with_shutdown`].
pub fn shutdown_channel() -> (oneshot::Sender<()>, oneshot::Receiver<()>) {
    oneshot::channel()
}

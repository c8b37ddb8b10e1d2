//! MCP transport selection.
//!
//! The server speaks MCP either over stdio, as a subprocess of a local
//! client, or over streamable HTTP, where every MCP session gets its own
//! analysis session.
//!
//! ```ignore
//! use video_summarizer_common::transport::TransportArgs;
//! use clap::Parser;
//!
//! #[derive(Parser)]
//! struct Args {
//!     #[command(flatten)]
//!     transport: TransportArgs,
//! }
//!
//! let transport = Args::parse().transport.into_transport();
//! ```

use clap::Args;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Address the HTTP transport binds when none is given.
pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Path the streamable HTTP service is mounted at.
pub const MCP_HTTP_PATH: &str = "/mcp";

/// How the server talks to its clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    #[default]
    Stdio,
    /// Streamable HTTP on the given socket address
    Http(SocketAddr),
}

impl Transport {
    /// HTTP on `host:port`.
    pub fn http(host: IpAddr, port: u16) -> Self {
        Transport::Http(SocketAddr::new(host, port))
    }

    pub fn is_stdio(&self) -> bool {
        matches!(self, Transport::Stdio)
    }

    /// Socket address to bind, for network transports.
    pub fn bind_addr(&self) -> Option<SocketAddr> {
        match self {
            Transport::Stdio => None,
            Transport::Http(addr) => Some(*addr),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Stdio => f.write_str("stdio"),
            Transport::Http(addr) => write!(f, "http://{}{}", addr, MCP_HTTP_PATH),
        }
    }
}

/// Transport flags shared by the server binary.
#[derive(Args, Debug, Clone)]
pub struct TransportArgs {
    /// Transport mode: stdio or http
    #[arg(long, default_value = "stdio", value_parser = parse_transport_mode)]
    pub transport: TransportMode,

    /// Address to bind with the HTTP transport
    #[arg(long, env = "HOST", default_value_t = DEFAULT_HOST)]
    pub host: IpAddr,

    /// Port for the HTTP transport
    #[arg(long, env = "PORT", default_value_t = crate::config::DEFAULT_PORT)]
    pub port: u16,
}

/// Transport mode as given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    #[default]
    Stdio,
    Http,
}

pub(crate) fn parse_transport_mode(s: &str) -> Result<TransportMode, String> {
    match s.to_ascii_lowercase().as_str() {
        "stdio" => Ok(TransportMode::Stdio),
        "http" => Ok(TransportMode::Http),
        _ => Err(format!("Unknown transport '{}'. Expected one of: stdio, http", s)),
    }
}

impl TransportArgs {
    /// Resolve the flags into a transport. Host and port only matter for HTTP.
    pub fn into_transport(self) -> Transport {
        match self.transport {
            TransportMode::Stdio => Transport::Stdio,
            TransportMode::Http => Transport::http(self.host, self.port),
        }
    }
}

impl Default for TransportArgs {
    fn default() -> Self {
        Self {
            transport: TransportMode::Stdio,
            host: DEFAULT_HOST,
            port: crate::config::DEFAULT_PORT,
        }
    }
}

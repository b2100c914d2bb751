//! Runtime configuration.
//!
//! Built from command-line flags, each of which can also come from a
//! `POCKETBASE_MCP_*` environment variable.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use crate::backend::{Backend, MemoryBackend, PocketBaseClient};

/// PocketBase address used when none is given.
pub const DEFAULT_POCKETBASE_URL: &str = "http://localhost:8090";

/// Port the gateway listens on by default.
pub const DEFAULT_PORT: u16 = 8093;

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `--memory` was combined with an option that only applies to PocketBase.
    #[error("--memory and --{0} are mutually exclusive")]
    Conflict(&'static str),

    /// The PocketBase URL could not be parsed.
    #[error("invalid PocketBase URL '{0}'")]
    InvalidUrl(String),

    /// The heartbeat interval was zero.
    #[error("--heartbeat-secs must be greater than zero")]
    InvalidHeartbeat,

    /// The data directory could not be created.
    #[error("failed to create data directory '{}': {}", .path.display(), .reason)]
    DataDir {
        /// Directory that was requested
        path: PathBuf,
        /// Underlying I/O error
        reason: String,
    },
}

/// MCP server for PocketBase.
///
/// Exposes PocketBase administration operations as MCP tools for AI agents,
/// over HTTP with a server-sent event stream.
#[derive(Debug, Parser)]
#[command(name = "pocketbase-mcp")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// PocketBase base URL.
    /// Mutually exclusive with --memory.
    #[arg(long, value_name = "URL", env = "POCKETBASE_MCP_URL")]
    pub url: Option<String>,

    /// Use an in-memory store instead of PocketBase.
    /// Data is not persisted.
    #[arg(long)]
    pub memory: bool,

    /// Token sent as the Authorization header on PocketBase requests.
    #[arg(long, value_name = "TOKEN", env = "POCKETBASE_MCP_ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,

    /// Address to listen on.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED), env = "POCKETBASE_MCP_BIND")]
    pub bind: IpAddr,

    /// Port to listen on.
    #[arg(long, short, default_value_t = DEFAULT_PORT, env = "POCKETBASE_MCP_PORT")]
    pub port: u16,

    /// Directory for PocketBase's persistent state. Created if missing.
    #[arg(long, value_name = "PATH", default_value = "pb_data", env = "POCKETBASE_MCP_DATA_DIR")]
    pub data_dir: PathBuf,

    /// Seconds between heartbeat events on each stream.
    #[arg(long, default_value_t = 30, env = "POCKETBASE_MCP_HEARTBEAT_SECS")]
    pub heartbeat_secs: u64,

    /// Path to a PocketBase executable to start alongside the gateway.
    #[arg(long, value_name = "PATH", env = "POCKETBASE_MCP_POCKETBASE_BIN")]
    pub pocketbase_bin: Option<PathBuf>,

    /// Create a demo `posts` collection with a few records on startup.
    #[arg(long)]
    pub seed_demo: bool,

    /// Enable debug logging to stderr.
    #[arg(long, short)]
    pub verbose: bool,
}

/// Which store the tools talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    /// [`MemoryBackend`]
    Memory,
    /// [`PocketBaseClient`]
    PocketBase,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address
    pub bind: IpAddr,
    /// Listen port
    pub port: u16,
    /// Store the tools use
    pub backend: BackendKind,
    /// PocketBase base URL, without a trailing slash
    pub pocketbase_url: String,
    /// Authorization token for PocketBase
    pub admin_token: Option<String>,
    /// PocketBase data directory
    pub data_dir: PathBuf,
    /// Interval between stream heartbeats
    pub heartbeat_interval: Duration,
    /// PocketBase executable to launch, if any
    pub pocketbase_bin: Option<PathBuf>,
    /// Whether to seed demo data
    pub seed_demo: bool,
}

impl Cli {
    /// Validate the flags and turn them into a [`Config`].
    pub fn into_config(self) -> Result<Config, ConfigError> {
        if self.memory {
            if self.url.is_some() {
                return Err(ConfigError::Conflict("url"));
            }
            if self.pocketbase_bin.is_some() {
                return Err(ConfigError::Conflict("pocketbase-bin"));
            }
        }
        if self.heartbeat_secs == 0 {
            return Err(ConfigError::InvalidHeartbeat);
        }

        let pocketbase_url = self
            .url
            .unwrap_or_else(|| DEFAULT_POCKETBASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        match reqwest::Url::parse(&pocketbase_url) {
            Ok(url) if url.host_str().is_some() => {}
            _ => return Err(ConfigError::InvalidUrl(pocketbase_url)),
        }

        Ok(Config {
            bind: self.bind,
            port: self.port,
            backend: if self.memory {
                BackendKind::Memory
            } else {
                BackendKind::PocketBase
            },
            pocketbase_url,
            admin_token: self.admin_token,
            data_dir: self.data_dir,
            heartbeat_interval: Duration::from_secs(self.heartbeat_secs),
            pocketbase_bin: self.pocketbase_bin,
            seed_demo: self.seed_demo,
        })
    }
}

impl Config {
    /// Address the gateway binds.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// `host:port` of the PocketBase URL, as PocketBase's `--http` flag wants it.
    pub fn pocketbase_http_addr(&self) -> Option<String> {
        let url = reqwest::Url::parse(&self.pocketbase_url).ok()?;
        let host = url.host_str()?.to_string();
        let port = url.port_or_known_default()?;
        Some(format!("{}:{}", host, port))
    }

    /// Create the data directory and any missing parents.
    pub async fn ensure_data_dir(&self) -> Result<(), ConfigError> {
        tokio::fs::create_dir_all(&self.data_dir)
            .await
            .map_err(|e| ConfigError::DataDir {
                path: self.data_dir.clone(),
                reason: e.to_string(),
            })
    }

    /// Construct the configured backend.
    pub fn build_backend(&self) -> Arc<dyn Backend> {
        match self.backend {
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
            BackendKind::PocketBase => Arc::new(PocketBaseClient::new(
                &self.pocketbase_url,
                self.admin_token.clone(),
            )),
        }
    }
}

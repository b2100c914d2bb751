//! MCP server for PocketBase.
//!
//! Run with `pocketbase-mcp --url http://localhost:8090` against a running
//! PocketBase, or `pocketbase-mcp --memory` for an in-memory store.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use clap::Parser;
use pocketbase_mcp::config::{Cli, Config};
use pocketbase_mcp::gateway::{self, AppState};
use pocketbase_mcp::{demo, McpServer, SessionManager, ToolContext, ToolRegistry};
use tokio::process::{Child, Command};
use tracing_subscriber::EnvFilter;

/// How long demo seeding waits for PocketBase to come up.
const SEED_READY_ATTEMPTS: usize = 20;
const SEED_READY_DELAY: Duration = Duration::from_millis(500);

fn fatal(message: impl std::fmt::Display) -> ! {
    tracing::error!("{}", message);
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn spawn_pocketbase(bin: &Path, config: &Config) -> std::io::Result<Child> {
    let mut command = Command::new(bin);
    command
        .arg("serve")
        .arg("--dir")
        .arg(&config.data_dir)
        .stdin(Stdio::null())
        .kill_on_drop(true);
    if let Some(addr) = config.pocketbase_http_addr() {
        command.arg("--http").arg(addr);
    }
    command.spawn()
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let directive = if cli.verbose {
        "pocketbase_mcp=debug"
    } else {
        "pocketbase_mcp=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = cli.into_config().unwrap_or_else(|e| fatal(e));

    if let Err(e) = config.ensure_data_dir().await {
        fatal(e);
    }

    // Start PocketBase next to the gateway when asked to
    if let Some(bin) = &config.pocketbase_bin {
        let mut child = spawn_pocketbase(bin, &config).unwrap_or_else(|e| {
            fatal(format!(
                "Failed to start PocketBase '{}': {}",
                bin.display(),
                e
            ))
        });
        tracing::info!(pid = ?child.id(), "Started PocketBase");
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => tracing::warn!(%status, "PocketBase exited"),
                Err(e) => tracing::warn!(error = %e, "Lost track of PocketBase process"),
            }
        });
    }
    tracing::info!("PocketBase admin UI: {}/_/", config.pocketbase_url);

    let backend = config.build_backend();

    if config.seed_demo {
        let backend = backend.clone();
        tokio::spawn(async move {
            if demo::wait_until_ready(backend.as_ref(), SEED_READY_ATTEMPTS, SEED_READY_DELAY).await
            {
                let report = demo::seed(backend.as_ref()).await;
                tracing::info!(?report, "Demo data seeded");
            }
        });
    }

    let ctx = ToolContext::new(backend, &config.pocketbase_url);
    let server = McpServer::new(ctx, ToolRegistry::with_default_tools());
    let state = AppState::new(server, SessionManager::new(config.heartbeat_interval));

    if let Err(e) = gateway::serve(config.socket_addr(), state).await {
        fatal(e);
    }
}

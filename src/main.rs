mod context;
mod handlers;
mod mcp;
mod parser;

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mcp::server::McpServer;

/// Load .env files with priority order:
/// 1. Current working directory (project-specific config)
/// 2. XDG config directory ~/.config/enclosing-context-mcp/.env (global default config)
///
/// Environment variables set directly in the shell always take highest priority.
fn load_env_files() {
    // Try current working directory first (project-specific)
    let cwd_env = std::env::current_dir().map(|p| p.join(".env")).ok();
    if let Some(path) = cwd_env {
        if path.exists() && dotenv::from_path(&path).is_ok() {
            tracing::debug!("Loaded .env from: {}", path.display());
            return;
        }
    }

    // Then the XDG config directory (global default)
    if let Some(config_dir) = get_xdg_config_dir() {
        let xdg_env = config_dir.join("enclosing-context-mcp").join(".env");
        if xdg_env.exists() && dotenv::from_path(&xdg_env).is_ok() {
            tracing::debug!("Loaded .env from: {}", xdg_env.display());
            return;
        }
    }

    tracing::debug!("No .env file found, using environment variables only");
}

/// Get XDG config directory, fallback to ~/.config
fn get_xdg_config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env_files();

    // Logs go to stderr; stdout carries the protocol.
    let env_filter =
        EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("error"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();

    tracing::info!("Starting enclosing context MCP server...");

    let server = McpServer::new()?;
    server.start().await?;

    Ok(())
}

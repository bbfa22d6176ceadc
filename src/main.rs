//! skald - a pattern-driven chat bot speaking line-oriented IRC.

mod chat;
mod config;
mod error;
mod irc;

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::chat::Handler;
use crate::config::Config;
use crate::irc::IrcClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        host = %config.irc.host,
        port = config.irc.effective_port(),
        nick = %config.irc.nick,
        tls = config.irc.tls.enabled,
        "Starting skald"
    );

    let client = Arc::new(IrcClient::new(config.irc)?);
    let mut handler = Handler::new(client.clone());
    irc::register_actions(&mut handler, client)?;

    handler.run().await?;
    info!("skald stopped");
    Ok(())
}

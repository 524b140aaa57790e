//! Log sharing
//!
//! Exposes the emulator log directory over HTTP: `/` lists the files and
//! `/<name>` returns one as plain text.

pub mod server;

pub use server::{build_router, LogServer, LogServerConfig};

use tracing::info;

use emuctl_core::{EmuError, Result, Settings};

/// Serve logs until Ctrl-C if sharing is enabled in settings
pub async fn share_logs(settings: &Settings) -> Result<()> {
    if !settings.web_log {
        info!("Shared log is disabled! nothing to do!");
        return Ok(());
    }

    let log_dir = settings
        .log_path
        .clone()
        .ok_or_else(|| EmuError::Settings("LOG_PATH is not set".into()))?;

    let server = LogServer::start(LogServerConfig::new(log_dir, settings.web_log_port)).await?;
    info!(
        "Shared log is enabled! all logs can be found on port '{}'",
        server.address().port()
    );

    tokio::signal::ctrl_c().await?;
    info!("Stopping log server");
    server.shutdown().await
}

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use livesync_client::{ClientConfig, SyncSession};
use livesync_core::SyncError;
use livesync_live::{ConferenceControl, RecordingCommand};

/// Stand-in conferencing collaborator for the watcher: logs the commands
/// a real widget would receive.
struct LoggingConference;

#[async_trait]
impl ConferenceControl for LoggingConference {
    async fn start_recording(&self, command: RecordingCommand) -> Result<(), SyncError> {
        info!(mode = %command.mode, stream_key = ?command.stream_key, "would start recording");
        Ok(())
    }

    async fn stop_recording(&self, mode: &str) -> Result<(), SyncError> {
        info!(mode, "would stop recording");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let api_base: Url = std::env::var("LIVESYNC_API_BASE")
        .context("LIVESYNC_API_BASE is required")?
        .parse()
        .context("LIVESYNC_API_BASE is not a valid URL")?;
    let video_id =
        std::env::var("LIVESYNC_VIDEO_ID").context("LIVESYNC_VIDEO_ID is required")?;

    let mut config = ClientConfig::new(api_base, video_id);
    if let Ok(jwt) = std::env::var("LIVESYNC_JWT") {
        config.jwt = Some(jwt);
    }
    if let Ok(ws_path) = std::env::var("LIVESYNC_WS_PATH") {
        config.ws_path = ws_path;
    }
    if let Ok(state_dir) = std::env::var("LIVESYNC_STATE_DIR") {
        config.state_dir = state_dir.into();
    }
    std::fs::create_dir_all(&config.state_dir).context("failed to create state dir")?;

    let session = Arc::new(
        SyncSession::new(config, Arc::new(LoggingConference))
            .context("failed to build session")?,
    );

    session.bootstrap().await.context("initial fetch failed")?;
    info!(state = %session.live_state(), "initial state loaded");

    session.connect();

    let cancel = CancellationToken::new();
    let driver = {
        let session = session.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { session.run(&cancel).await })
    };

    tokio::signal::ctrl_c().await.context("signal handler failed")?;
    info!("shutting down");
    cancel.cancel();
    session.disconnect();
    let _ = driver.await;

    Ok(())
}

//! One synchronized session around a live video.

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use livesync_api::{poll_until_ready, ApiClient, PollOutcome, DEFAULT_POLL_DELAY};
use livesync_channel::transport::ChannelTransport;
use livesync_channel::{manager::ws_base_for, ConnectionManager, WebSocketTransport};
use livesync_core::{LiveKind, LiveState, ResourceKind, SyncError, VideoSnapshot};
use livesync_live::{
    ConferenceControl, Effect, LiveAction, LiveEvent, LiveSession, RecordingCoordinator,
    RecordingStatus,
};
use livesync_store::{StoreEvent, StoreSet};

use crate::config::ClientConfig;
use crate::identity::SessionIdentity;

/// Composes the store, API client, push channel, state machine and
/// recording coordinator for one video.
pub struct SyncSession {
    video_id: String,
    stores: Arc<StoreSet>,
    api: Arc<ApiClient>,
    connections: Arc<ConnectionManager>,
    coordinator: Arc<RecordingCoordinator>,
    live: Mutex<LiveSession>,
    poll_cancel: Mutex<Option<CancellationToken>>,
}

impl SyncSession {
    pub fn new(
        config: ClientConfig,
        control: Arc<dyn ConferenceControl>,
    ) -> Result<Self, SyncError> {
        Self::with_transport(config, control, Arc::new(WebSocketTransport))
    }

    /// Same wiring with a caller-supplied transport; used by tests and
    /// local tooling.
    pub fn with_transport(
        config: ClientConfig,
        control: Arc<dyn ConferenceControl>,
        transport: Arc<dyn ChannelTransport>,
    ) -> Result<Self, SyncError> {
        let stores = Arc::new(StoreSet::new());
        let api = Arc::new(ApiClient::new(
            config.api_base.clone(),
            config.jwt.clone(),
            stores.clone(),
        ));
        let identity = Arc::new(SessionIdentity::new(config.jwt.clone(), &config.state_dir));
        let ws_base = ws_base_for(&config.api_base, &config.ws_path)?;
        let connections = Arc::new(ConnectionManager::new(
            ws_base,
            transport,
            api.clone(),
            stores.clone(),
            identity,
        ));
        let coordinator = Arc::new(RecordingCoordinator::new(control, config.recording_mode));

        Ok(Self {
            video_id: config.video_id.clone(),
            stores,
            api,
            connections,
            coordinator,
            live: Mutex::new(LiveSession::new(config.video_id, LiveState::Idle)),
            poll_cancel: Mutex::new(None),
        })
    }

    pub fn stores(&self) -> &Arc<StoreSet> {
        &self.stores
    }

    pub fn live_state(&self) -> LiveState {
        self.lock_live().state()
    }

    fn lock_live(&self) -> std::sync::MutexGuard<'_, LiveSession> {
        self.live.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Load initial canonical state. The push channel's first connection
    /// performs no catch-up because this has already run.
    pub async fn bootstrap(&self) -> Result<(), SyncError> {
        self.api
            .fetch_canonical(ResourceKind::Video, &self.video_id)
            .await
    }

    /// Open (or reuse) the push channel for the video.
    pub fn connect(&self) {
        self.connections.connect(ResourceKind::Video, &self.video_id);
    }

    pub fn disconnect(&self) {
        self.connections.disconnect(&self.video_id);
        if let Some(token) = self
            .poll_cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            token.cancel();
        }
    }

    /// Consume store change events and reconcile the live state machine
    /// until cancelled. Run this in its own task.
    pub async fn run(&self, cancel: &CancellationToken) {
        let mut events = self.stores.subscribe();
        // The store may already hold bootstrapped state.
        self.reconcile().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Ok(StoreEvent { kind: ResourceKind::Video, id }) if id == self.video_id => {
                        self.reconcile().await;
                    }
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "store event stream lagged, re-reading");
                        self.reconcile().await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    }

    /// Feed the latest authoritative snapshot into the state machine.
    async fn reconcile(&self) {
        let Some(video) = self.stores.videos().get(&self.video_id) else {
            return;
        };
        self.coordinator
            .set_stream_key(video.live_info.as_ref().and_then(|i| i.stream_key.clone()));

        let state = video.live_state.unwrap_or(LiveState::Idle);
        let effects = self.lock_live().apply(LiveEvent::ServerUpdate(state));
        self.dispatch(effects).await;
    }

    async fn dispatch(&self, effects: Vec<Effect>) {
        let state = self.live_state();
        for effect in effects {
            match effect {
                Effect::ArmPoller => self.arm_poller(),
                Effect::StartRecording | Effect::StopRecording => {
                    if let Err(e) = self.coordinator.observe(state).await {
                        warn!(error = %e, "recording command failed");
                    }
                }
            }
        }
    }

    /// Poll the video until it leaves Starting; covers the window where
    /// the push channel itself is still being established. Re-arming
    /// cancels any previous poll.
    fn arm_poller(&self) {
        let token = CancellationToken::new();
        {
            let mut guard = self.poll_cancel.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(previous) = guard.take() {
                previous.cancel();
            }
            *guard = Some(token.clone());
        }

        let api = self.api.clone();
        let stores = self.stores.clone();
        let id = self.video_id.clone();
        tokio::spawn(async move {
            let outcome = poll_until_ready(
                api.as_ref(),
                stores.videos(),
                &id,
                |v: &VideoSnapshot| v.live_state != Some(LiveState::Starting),
                DEFAULT_POLL_DELAY,
                &token,
            )
            .await;
            if let PollOutcome::Failed(e) = outcome {
                warn!(video_id = %id, error = %e, "live startup poll terminated");
            }
        });
    }

    async fn apply_action(&self, video: VideoSnapshot, action: LiveAction) {
        self.stores.videos().upsert(video);
        let effects = self.lock_live().apply(LiveEvent::ActionSucceeded(action));
        self.dispatch(effects).await;
    }

    // User actions. A rejected call surfaces its error unchanged and
    // advances nothing.

    pub async fn initiate_live(&self, kind: LiveKind) -> Result<(), SyncError> {
        let video = self.api.initiate_live(&self.video_id, kind).await?;
        info!(video_id = %self.video_id, kind = %kind, "live initiated");
        self.apply_action(video, LiveAction::Initiate(kind)).await;
        Ok(())
    }

    pub async fn start_live(&self) -> Result<(), SyncError> {
        let video = self.api.start_live(&self.video_id).await?;
        self.apply_action(video, LiveAction::Start).await;
        Ok(())
    }

    /// Resumable stop: the server keeps the broadcast harvestable and
    /// restartable.
    pub async fn pause_live(&self) -> Result<(), SyncError> {
        let video = self.api.stop_live(&self.video_id).await?;
        self.apply_action(video, LiveAction::Pause).await;
        Ok(())
    }

    /// Definitive teardown of the current broadcast attempt.
    pub async fn end_live(&self) -> Result<(), SyncError> {
        let video = self.api.end_live(&self.video_id).await?;
        self.apply_action(video, LiveAction::End).await;
        Ok(())
    }

    pub async fn harvest_live(&self) -> Result<(), SyncError> {
        let video = self.api.harvest_live(&self.video_id).await?;
        self.apply_action(video, LiveAction::Harvest).await;
        Ok(())
    }

    pub async fn update_video(&self, body: serde_json::Value) -> Result<(), SyncError> {
        let video = self.api.update_video(&self.video_id, body).await?;
        self.stores.videos().upsert(video);
        Ok(())
    }

    /// Forward an out-of-band recording fault from the conferencing
    /// collaborator.
    pub async fn recording_interrupted(&self, status: RecordingStatus) -> Result<(), SyncError> {
        self.coordinator.recording_interrupted(status).await
    }
}

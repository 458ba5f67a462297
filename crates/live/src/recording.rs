//! Drives the external conferencing collaborator's recording surface off
//! live state transitions, with at-most-one-active-recording-intent.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use livesync_core::{LiveState, SyncError};

/// Payload for a start command: where the collaborator should push the
/// recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingCommand {
    pub mode: String,
    pub stream_key: Option<String>,
}

/// Out-of-band notification from the collaborator that recording state
/// changed under us.
#[derive(Debug, Clone)]
pub struct RecordingStatus {
    pub on: bool,
    pub mode: String,
    pub error: Option<String>,
}

/// Command surface of the conferencing collaborator. Consumed, not
/// defined here.
#[async_trait]
pub trait ConferenceControl: Send + Sync {
    async fn start_recording(&self, command: RecordingCommand) -> Result<(), SyncError>;
    async fn stop_recording(&self, mode: &str) -> Result<(), SyncError>;
}

/// Wait before re-issuing a start after a reported interruption.
const REISSUE_DELAY: Duration = Duration::from_secs(1);

pub struct RecordingCoordinator {
    control: std::sync::Arc<dyn ConferenceControl>,
    mode: String,
    stream_key: Mutex<Option<String>>,
    /// Derived intent: true iff the live state was last observed Running.
    intent: Mutex<bool>,
}

impl RecordingCoordinator {
    pub fn new(control: std::sync::Arc<dyn ConferenceControl>, mode: impl Into<String>) -> Self {
        Self {
            control,
            mode: mode.into(),
            stream_key: Mutex::new(None),
            intent: Mutex::new(false),
        }
    }

    /// Target ingest key, refreshed from the video snapshot as it changes.
    pub fn set_stream_key(&self, key: Option<String>) {
        *self.stream_key.lock().unwrap_or_else(|e| e.into_inner()) = key;
    }

    pub fn intent(&self) -> bool {
        *self.intent.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn command(&self) -> RecordingCommand {
        RecordingCommand {
            mode: self.mode.clone(),
            stream_key: self
                .stream_key
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
        }
    }

    /// Observe a live state. Commands are issued only on intent edges:
    /// two consecutive Running observations emit nothing.
    pub async fn observe(&self, state: LiveState) -> Result<(), SyncError> {
        let want = state == LiveState::Running;
        {
            let mut intent = self.intent.lock().unwrap_or_else(|e| e.into_inner());
            if *intent == want {
                return Ok(());
            }
            *intent = want;
        }

        if want {
            info!(mode = %self.mode, "starting recording");
            self.control.start_recording(self.command()).await
        } else {
            info!(mode = %self.mode, "stopping recording");
            self.control.stop_recording(&self.mode).await
        }
    }

    /// The collaborator reported the recording dropped out-of-band. If we
    /// still intend to record, re-issue the start after a short delay —
    /// the one command not driven by a state transition, since the fault
    /// is in a side channel, not the live session.
    pub async fn recording_interrupted(&self, status: RecordingStatus) -> Result<(), SyncError> {
        if status.on {
            // Still recording; nothing to repair.
            return Ok(());
        }
        warn!(
            mode = %status.mode,
            error = status.error.as_deref().unwrap_or("none"),
            "recording interrupted"
        );
        if !self.intent() {
            return Ok(());
        }

        tokio::time::sleep(REISSUE_DELAY).await;
        if !self.intent() {
            // Intent flipped while we waited; the stop already went out.
            return Ok(());
        }

        info!(mode = %self.mode, "re-issuing start after interruption");
        self.control
            .start_recording(self.command())
            .await
            .map_err(|e| SyncError::Recording(format!("re-issue failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingSpy {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ConferenceControl for RecordingSpy {
        async fn start_recording(&self, command: RecordingCommand) -> Result<(), SyncError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("start:{}", command.stream_key.unwrap_or_default()));
            Ok(())
        }

        async fn stop_recording(&self, _mode: &str) -> Result<(), SyncError> {
            self.calls.lock().unwrap().push("stop".to_string());
            Ok(())
        }
    }

    fn setup() -> (Arc<RecordingSpy>, RecordingCoordinator) {
        let spy = Arc::new(RecordingSpy::default());
        let coordinator = RecordingCoordinator::new(spy.clone(), "cloud");
        (spy, coordinator)
    }

    #[tokio::test]
    async fn consecutive_running_observations_start_once() {
        let (spy, coordinator) = setup();
        coordinator.set_stream_key(Some("sk-1".into()));

        coordinator.observe(LiveState::Running).await.unwrap();
        coordinator.observe(LiveState::Running).await.unwrap();
        coordinator.observe(LiveState::Stopping).await.unwrap();
        coordinator.observe(LiveState::Stopped).await.unwrap();

        assert_eq!(*spy.calls.lock().unwrap(), vec!["start:sk-1", "stop"]);
    }

    #[tokio::test]
    async fn non_running_states_never_start() {
        let (spy, coordinator) = setup();
        for state in [
            LiveState::Idle,
            LiveState::Starting,
            LiveState::Paused,
            LiveState::Harvesting,
        ] {
            coordinator.observe(state).await.unwrap();
        }
        assert!(spy.calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn interruption_reissues_start_after_delay() {
        let (spy, coordinator) = setup();
        coordinator.observe(LiveState::Running).await.unwrap();

        coordinator
            .recording_interrupted(RecordingStatus {
                on: false,
                mode: "cloud".into(),
                error: Some("ingest dropped".into()),
            })
            .await
            .unwrap();

        assert_eq!(*spy.calls.lock().unwrap(), vec!["start:", "start:"]);
    }

    #[tokio::test]
    async fn no_reissue_while_collaborator_still_recording() {
        let (spy, coordinator) = setup();
        coordinator.observe(LiveState::Running).await.unwrap();

        coordinator
            .recording_interrupted(RecordingStatus {
                on: true,
                mode: "cloud".into(),
                error: None,
            })
            .await
            .unwrap();

        assert_eq!(*spy.calls.lock().unwrap(), vec!["start:"]);
    }

    #[tokio::test(start_paused = true)]
    async fn no_reissue_when_intent_already_false() {
        let (spy, coordinator) = setup();
        coordinator.observe(LiveState::Running).await.unwrap();
        coordinator.observe(LiveState::Stopped).await.unwrap();

        coordinator
            .recording_interrupted(RecordingStatus {
                on: false,
                mode: "cloud".into(),
                error: None,
            })
            .await
            .unwrap();

        assert_eq!(*spy.calls.lock().unwrap(), vec!["start:", "stop"]);
    }
}

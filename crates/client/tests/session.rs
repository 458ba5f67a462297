use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use url::Url;

use livesync_channel::MemoryTransport;
use livesync_client::{ClientConfig, SyncSession};
use livesync_core::{LiveState, SyncError};
use livesync_live::{ConferenceControl, RecordingCommand};

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

fn live_frame(id: &str, live_state: &str) -> String {
    format!(
        r#"{{"type":"videos","resource":{{"id":"{id}","upload_state":"pending","live_state":"{live_state}","live_info":{{"ingest_endpoints":[],"stream_key":"sk-7","paused_at":null}}}}}}"#
    )
}

async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

#[tokio::test]
async fn pushed_states_drive_exactly_one_recording_cycle() {
    let state_dir = std::env::temp_dir().join(format!("ls_session_{}", std::process::id()));
    std::fs::create_dir_all(&state_dir).unwrap();

    let mut config = ClientConfig::new(Url::parse("https://example.com/api/").unwrap(), "v1");
    config.state_dir = state_dir;

    let spy = Arc::new(RecordingSpy::default());
    let transport = Arc::new(MemoryTransport::new());
    let session = Arc::new(
        SyncSession::with_transport(config, spy.clone(), transport.clone()).unwrap(),
    );

    session.connect();
    let cancel = CancellationToken::new();
    let driver = {
        let session = session.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { session.run(&cancel).await })
    };

    wait_until("channel open", || transport.open_count() == 1).await;

    transport.push_frame(&live_frame("v1", "running")).await;
    wait_until("running", || session.live_state() == LiveState::Running).await;

    // A duplicate running notification must not re-issue the start.
    transport.push_frame(&live_frame("v1", "running")).await;
    transport.push_frame(&live_frame("v1", "stopping")).await;
    wait_until("stopping", || session.live_state() == LiveState::Stopping).await;
    transport.push_frame(&live_frame("v1", "stopped")).await;
    wait_until("stopped", || session.live_state() == LiveState::Stopped).await;

    assert_eq!(*spy.calls.lock().unwrap(), vec!["start:sk-7", "stop"]);

    cancel.cancel();
    session.disconnect();
    let _ = driver.await;
}

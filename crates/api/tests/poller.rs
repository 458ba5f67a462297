use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use livesync_api::{poll_until_ready, PollOutcome, ResourceFetcher};
use livesync_core::{ProcessingState, SyncError, VideoSnapshot};
use livesync_store::StoreSet;

fn video(id: &str, state: ProcessingState) -> VideoSnapshot {
    VideoSnapshot {
        id: id.to_string(),
        title: None,
        description: None,
        upload_state: state,
        live_state: None,
        live_info: None,
        is_ready_to_show: state == ProcessingState::Ready,
        active_stamp: None,
        urls: None,
    }
}

/// Replays a scripted sequence of fetch results and counts calls.
struct ScriptedFetcher {
    responses: Mutex<VecDeque<Result<VideoSnapshot, SyncError>>>,
    calls: AtomicUsize,
    cancel_on_call: Option<(usize, CancellationToken)>,
}

impl ScriptedFetcher {
    fn new(responses: Vec<Result<VideoSnapshot, SyncError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
            cancel_on_call: None,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceFetcher<VideoSnapshot> for ScriptedFetcher {
    async fn fetch(&self, id: &str) -> Result<VideoSnapshot, SyncError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((at, token)) = &self.cancel_on_call {
            if call == *at {
                token.cancel();
            }
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(video(id, ProcessingState::Processing)))
    }
}

#[tokio::test(start_paused = true)]
async fn linear_schedule_fetches_until_ready() {
    let stores = StoreSet::new();
    let fetcher = ScriptedFetcher::new(vec![
        Ok(video("v1", ProcessingState::Processing)),
        Ok(video("v1", ProcessingState::Processing)),
        Ok(video("v1", ProcessingState::Ready)),
    ]);
    let cancel = CancellationToken::new();

    let started = tokio::time::Instant::now();
    let outcome = poll_until_ready(
        &fetcher,
        stores.videos(),
        "v1",
        |v: &VideoSnapshot| v.upload_state.is_settled(),
        Duration::from_secs(15),
        &cancel,
    )
    .await;

    assert!(outcome.is_ready());
    assert_eq!(fetcher.calls(), 3);
    // Waits of 15s then 30s between the three fetches.
    assert_eq!(started.elapsed(), Duration::from_secs(45));
    assert_eq!(
        stores.videos().get("v1").unwrap().upload_state,
        ProcessingState::Ready
    );
}

#[tokio::test(start_paused = true)]
async fn fetch_failure_terminates_poll() {
    let stores = StoreSet::new();
    let fetcher = ScriptedFetcher::new(vec![
        Ok(video("v1", ProcessingState::Processing)),
        Err(SyncError::Network("connection reset".into())),
    ]);
    let cancel = CancellationToken::new();

    let outcome = poll_until_ready(
        &fetcher,
        stores.videos(),
        "v1",
        |v: &VideoSnapshot| v.upload_state.is_settled(),
        Duration::from_secs(15),
        &cancel,
    )
    .await;

    assert!(matches!(outcome, PollOutcome::Failed(SyncError::Network(_))));
    assert_eq!(fetcher.calls(), 2);
    // The first (successful) fetch still landed in the store.
    assert_eq!(
        stores.videos().get("v1").unwrap().upload_state,
        ProcessingState::Processing
    );
}

#[tokio::test]
async fn cancelled_token_stops_before_first_fetch() {
    let stores = StoreSet::new();
    let fetcher = ScriptedFetcher::new(vec![]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = poll_until_ready(
        &fetcher,
        stores.videos(),
        "v1",
        |_: &VideoSnapshot| true,
        Duration::from_secs(15),
        &cancel,
    )
    .await;

    assert!(matches!(outcome, PollOutcome::Cancelled));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn no_side_effects_after_cancellation() {
    let stores = StoreSet::new();
    let cancel = CancellationToken::new();
    let mut fetcher =
        ScriptedFetcher::new(vec![Ok(video("v1", ProcessingState::Processing))]);
    // Token is cancelled while the fetch is in flight; the result must be
    // discarded without touching the store.
    fetcher.cancel_on_call = Some((1, cancel.clone()));

    let outcome = poll_until_ready(
        &fetcher,
        stores.videos(),
        "v1",
        |_: &VideoSnapshot| false,
        Duration::from_secs(15),
        &cancel,
    )
    .await;

    assert!(matches!(outcome, PollOutcome::Cancelled));
    assert_eq!(fetcher.calls(), 1);
    assert!(stores.videos().get("v1").is_none());
}

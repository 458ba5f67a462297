//! Generic "poll until ready" loop with a linearly growing delay.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use livesync_core::resource::Resource;
use livesync_core::SyncError;
use livesync_store::ResourceStore;

use crate::ResourceFetcher;

pub const DEFAULT_POLL_DELAY: Duration = Duration::from_secs(15);

/// How a poll loop ended.
#[derive(Debug)]
pub enum PollOutcome {
    /// The readiness predicate passed; the store holds the final snapshot.
    Ready,
    /// A fetch failed. Polling is not retried across transport failures;
    /// re-initiating is the caller's responsibility.
    Failed(SyncError),
    /// The caller abandoned the poll; no further side effects occurred.
    Cancelled,
}

impl PollOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Repeatedly fetch a resource until `is_ready` passes, upserting every
/// fetched snapshot into the store.
///
/// The wait before attempt `n + 1` is `initial_delay * n` — linear growth,
/// unbounded and without jitter. There is no maximum attempt count; callers
/// that need an upper bound cancel through the token.
pub async fn poll_until_ready<R, F, P>(
    fetcher: &F,
    store: &ResourceStore<R>,
    id: &str,
    is_ready: P,
    initial_delay: Duration,
    cancel: &CancellationToken,
) -> PollOutcome
where
    R: Resource,
    F: ResourceFetcher<R> + ?Sized,
    P: Fn(&R) -> bool,
{
    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return PollOutcome::Cancelled;
        }

        let resource = match fetcher.fetch(id).await {
            Ok(resource) => resource,
            Err(e) => {
                warn!(kind = %R::KIND, id, error = %e, "poll fetch failed, terminating poll");
                return PollOutcome::Failed(e);
            }
        };

        // An abandoned poll must not write into the store.
        if cancel.is_cancelled() {
            return PollOutcome::Cancelled;
        }
        store.upsert(resource.clone());

        if is_ready(&resource) {
            debug!(kind = %R::KIND, id, attempt, "resource ready, poll complete");
            return PollOutcome::Ready;
        }

        attempt += 1;
        let delay = initial_delay * attempt;
        debug!(kind = %R::KIND, id, attempt, delay_secs = delay.as_secs(), "not ready, backing off");

        tokio::select! {
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

//! REST surface of the synchronization engine: canonical resource GETs,
//! live action POSTs, and the backoff poller built on top of them.

pub mod client;
pub mod poller;

use async_trait::async_trait;

use livesync_core::resource::Resource;
use livesync_core::{ResourceKind, SyncError};

/// Capability to fetch one canonical resource snapshot by id.
///
/// The poller depends on this seam rather than on the HTTP client so it
/// can be driven by fakes in tests.
#[async_trait]
pub trait ResourceFetcher<R: Resource>: Send + Sync {
    async fn fetch(&self, id: &str) -> Result<R, SyncError>;
}

/// Reconnect hook used by the connection manager: fetch canonical state
/// for one resource and force it into the store.
#[async_trait]
pub trait CatchUpFetch: Send + Sync {
    async fn catch_up(&self, kind: ResourceKind, id: &str) -> Result<(), SyncError>;
}

pub use client::ApiClient;
pub use poller::{poll_until_ready, PollOutcome, DEFAULT_POLL_DELAY};

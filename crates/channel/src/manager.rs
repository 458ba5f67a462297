//! Owns at most one live push connection per resource id, reconnects on
//! unexpected closure and repairs delivery gaps with a catch-up fetch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use livesync_api::CatchUpFetch;
use livesync_core::{PushMessage, ResourceKind, SyncError};
use livesync_store::StoreSet;

use crate::transport::ChannelTransport;
use crate::{Identity, IdentityProvider};

/// Reconnection attempts up to this count retry immediately; later ones
/// wait a fixed 500 ms. Quick recovery from blips, bounded retry cost
/// during longer outages.
const IMMEDIATE_RECONNECTS: u32 = 10;
const STEADY_RECONNECT_DELAY: Duration = Duration::from_millis(500);

fn reconnect_delay(attempt: u32) -> Duration {
    if attempt <= IMMEDIATE_RECONNECTS {
        Duration::ZERO
    } else {
        STEADY_RECONNECT_DELAY
    }
}

/// Derive the push-channel base from the API base: secure origin means a
/// secure channel scheme.
pub fn ws_base_for(api_base: &Url, base_path: &str) -> Result<Url, SyncError> {
    let mut base = api_base.clone();
    let scheme = if api_base.scheme() == "https" { "wss" } else { "ws" };
    base.set_scheme(scheme)
        .map_err(|_| SyncError::Malformed(format!("cannot derive ws scheme from {api_base}")))?;
    base.set_path(base_path);
    Ok(base)
}

fn channel_url(
    ws_base: &Url,
    kind: ResourceKind,
    id: &str,
    identity: &Identity,
) -> Result<Url, SyncError> {
    let mut url = ws_base.clone();
    url.path_segments_mut()
        .map_err(|_| SyncError::Malformed(format!("ws base cannot carry a path: {ws_base}")))?
        .pop_if_empty()
        .extend([kind.as_str(), id, ""]);
    match identity {
        Identity::Jwt(token) => {
            url.query_pairs_mut().append_pair("jwt", token);
        }
        Identity::Anonymous(anonymous_id) => {
            url.query_pairs_mut()
                .append_pair("anonymous_id", anonymous_id);
        }
    }
    Ok(url)
}

/// State of one managed connection. Shared between the manager and the
/// connection task.
pub struct ConnectionHandle {
    kind: ResourceKind,
    id: String,
    cancel: CancellationToken,
    reconnects: AtomicU32,
}

impl ConnectionHandle {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn resource_id(&self) -> &str {
        &self.id
    }

    /// Number of reconnection attempts so far (zero while the first
    /// connection is up).
    pub fn reconnects(&self) -> u32 {
        self.reconnects.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

pub struct ConnectionManager {
    ws_base: Url,
    transport: Arc<dyn ChannelTransport>,
    catch_up: Arc<dyn CatchUpFetch>,
    stores: Arc<StoreSet>,
    identity: Arc<dyn IdentityProvider>,
    connections: Mutex<HashMap<String, Arc<ConnectionHandle>>>,
}

impl ConnectionManager {
    pub fn new(
        ws_base: Url,
        transport: Arc<dyn ChannelTransport>,
        catch_up: Arc<dyn CatchUpFetch>,
        stores: Arc<StoreSet>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            ws_base,
            transport,
            catch_up,
            stores,
            identity,
            connections: Mutex::new(HashMap::new()),
        }
    }

    fn lock_connections(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<String, Arc<ConnectionHandle>>> {
        self.connections.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Subscribe to push updates for one resource. Idempotent: a second
    /// call for the same id returns the existing handle without opening
    /// another connection.
    pub fn connect(&self, kind: ResourceKind, id: &str) -> Arc<ConnectionHandle> {
        let mut connections = self.lock_connections();
        if let Some(handle) = connections.get(id) {
            if !handle.is_closed() {
                debug!(kind = %kind, id, "reusing existing push connection");
                return handle.clone();
            }
        }

        let handle = Arc::new(ConnectionHandle {
            kind,
            id: id.to_string(),
            cancel: CancellationToken::new(),
            reconnects: AtomicU32::new(0),
        });
        connections.insert(id.to_string(), handle.clone());

        let task_handle = handle.clone();
        let ws_base = self.ws_base.clone();
        let transport = self.transport.clone();
        let catch_up = self.catch_up.clone();
        let stores = self.stores.clone();
        let identity = self.identity.clone();
        tokio::spawn(async move {
            run_connection(task_handle, ws_base, transport, catch_up, stores, identity).await;
        });

        handle
    }

    /// Tear down the connection for one resource, if any.
    pub fn disconnect(&self, id: &str) {
        if let Some(handle) = self.lock_connections().remove(id) {
            info!(id, "closing push connection");
            handle.cancel.cancel();
        }
    }

    pub fn disconnect_all(&self) {
        for (_, handle) in self.lock_connections().drain() {
            handle.cancel.cancel();
        }
    }
}

async fn run_connection(
    handle: Arc<ConnectionHandle>,
    ws_base: Url,
    transport: Arc<dyn ChannelTransport>,
    catch_up: Arc<dyn CatchUpFetch>,
    stores: Arc<StoreSet>,
    identity: Arc<dyn IdentityProvider>,
) {
    let kind = handle.kind;
    let id = handle.id.clone();

    loop {
        if handle.cancel.is_cancelled() {
            return;
        }

        // Identity is resolved once per connection attempt.
        let url = match channel_url(&ws_base, kind, &id, &identity.identity()) {
            Ok(url) => url,
            Err(e) => {
                warn!(kind = %kind, id, error = %e, "cannot build channel url, giving up");
                // Mark the handle dead so a later connect() replaces it.
                handle.cancel.cancel();
                return;
            }
        };

        match transport.open(&url).await {
            Ok(mut frames) => {
                if handle.reconnects.load(Ordering::SeqCst) == 0 {
                    info!(kind = %kind, id, "push channel connected");
                } else {
                    // Any earlier attempt, whether it opened or not, may
                    // have left a gap. Force canonical state before
                    // pumping further messages.
                    info!(kind = %kind, id, "push channel reconnected, catching up");
                    if let Err(e) = catch_up.catch_up(kind, &id).await {
                        warn!(kind = %kind, id, error = %e, "catch-up fetch failed");
                    }
                }

                loop {
                    tokio::select! {
                        _ = handle.cancel.cancelled() => return,
                        frame = frames.recv() => match frame {
                            Some(frame) => apply_frame(&stores, kind, &id, &frame),
                            None => break,
                        },
                    }
                }
                debug!(kind = %kind, id, "push channel closed");
            }
            Err(e) => {
                warn!(kind = %kind, id, error = %e, "push channel open failed");
            }
        }

        if handle.cancel.is_cancelled() {
            return;
        }

        let attempt = handle.reconnects.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = reconnect_delay(attempt);
        if !delay.is_zero() {
            tokio::select! {
                _ = handle.cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Parse and apply one inbound frame. Anything that is not a well-formed
/// envelope about a tracked entity (or the connection's own subject) is
/// dropped silently.
fn apply_frame(stores: &StoreSet, subject_kind: ResourceKind, subject_id: &str, frame: &str) {
    let Some(message) = PushMessage::parse(frame) else {
        debug!("dropping unrecognized push frame");
        return;
    };
    let Some(resource_id) = message.resource_id() else {
        debug!(kind = %message.kind, "dropping push frame without resource id");
        return;
    };

    let is_subject = message.kind == subject_kind && resource_id == subject_id;
    if !is_subject && !stores.contains(message.kind, resource_id) {
        debug!(kind = %message.kind, id = resource_id, "dropping push frame for untracked resource");
        return;
    }

    stores.apply_message(&message);
}

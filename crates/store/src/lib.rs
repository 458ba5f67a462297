//! Keyed resource snapshot store.
//!
//! One typed map per resource kind, last-writer-wins by arrival order.
//! Every mutation emits a [`StoreEvent`] on a broadcast channel; events
//! carry identity only, subscribers re-read the store.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;
use tracing::debug;

use livesync_core::resource::{
    DocumentSnapshot, Resource, SharedLiveMediaSnapshot, ThumbnailSnapshot,
    TimedTextTrackSnapshot, VideoSnapshot,
};
use livesync_core::{PushMessage, ResourceKind};

/// Emitted on every store mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    pub kind: ResourceKind,
    pub id: String,
}

/// A keyed map of snapshots for one resource kind.
///
/// All operations are synchronous and total; an accepted update replaces
/// the whole snapshot for its id.
pub struct ResourceStore<R: Resource> {
    inner: Mutex<HashMap<String, R>>,
    events: broadcast::Sender<StoreEvent>,
}

impl<R: Resource> ResourceStore<R> {
    fn new(events: broadcast::Sender<StoreEvent>) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            events,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, R>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn upsert(&self, resource: R) {
        let id = resource.id().to_string();
        self.lock().insert(id.clone(), resource);
        let _ = self.events.send(StoreEvent { kind: R::KIND, id });
    }

    /// Batch upsert used by list loading and catch-up.
    pub fn upsert_many(&self, resources: Vec<R>) {
        let mut ids = Vec::with_capacity(resources.len());
        {
            let mut map = self.lock();
            for resource in resources {
                let id = resource.id().to_string();
                map.insert(id.clone(), resource);
                ids.push(id);
            }
        }
        for id in ids {
            let _ = self.events.send(StoreEvent { kind: R::KIND, id });
        }
    }

    pub fn remove(&self, id: &str) {
        if self.lock().remove(id).is_some() {
            let _ = self.events.send(StoreEvent {
                kind: R::KIND,
                id: id.to_string(),
            });
        }
    }

    pub fn get(&self, id: &str) -> Option<R> {
        self.lock().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }
}

/// The five typed stores plus the shared change feed.
pub struct StoreSet {
    videos: ResourceStore<VideoSnapshot>,
    documents: ResourceStore<DocumentSnapshot>,
    thumbnails: ResourceStore<ThumbnailSnapshot>,
    timed_text_tracks: ResourceStore<TimedTextTrackSnapshot>,
    shared_live_medias: ResourceStore<SharedLiveMediaSnapshot>,
    events: broadcast::Sender<StoreEvent>,
}

impl StoreSet {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            videos: ResourceStore::new(events.clone()),
            documents: ResourceStore::new(events.clone()),
            thumbnails: ResourceStore::new(events.clone()),
            timed_text_tracks: ResourceStore::new(events.clone()),
            shared_live_medias: ResourceStore::new(events.clone()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn videos(&self) -> &ResourceStore<VideoSnapshot> {
        &self.videos
    }

    pub fn documents(&self) -> &ResourceStore<DocumentSnapshot> {
        &self.documents
    }

    pub fn thumbnails(&self) -> &ResourceStore<ThumbnailSnapshot> {
        &self.thumbnails
    }

    pub fn timed_text_tracks(&self) -> &ResourceStore<TimedTextTrackSnapshot> {
        &self.timed_text_tracks
    }

    pub fn shared_live_medias(&self) -> &ResourceStore<SharedLiveMediaSnapshot> {
        &self.shared_live_medias
    }

    /// Whether a snapshot is currently tracked for `(kind, id)`.
    pub fn contains(&self, kind: ResourceKind, id: &str) -> bool {
        match kind {
            ResourceKind::Video => self.videos.contains(id),
            ResourceKind::Document => self.documents.contains(id),
            ResourceKind::Thumbnail => self.thumbnails.contains(id),
            ResourceKind::TimedTextTrack => self.timed_text_tracks.contains(id),
            ResourceKind::SharedLiveMedia => self.shared_live_medias.contains(id),
        }
    }

    /// Decode a push envelope's resource per its kind tag and upsert it.
    /// Returns whether the message was accepted; a payload that does not
    /// decode into the tagged kind is dropped.
    pub fn apply_message(&self, message: &PushMessage) -> bool {
        match message.kind {
            ResourceKind::Video => self.decode_upsert(&self.videos, message),
            ResourceKind::Document => self.decode_upsert(&self.documents, message),
            ResourceKind::Thumbnail => self.decode_upsert(&self.thumbnails, message),
            ResourceKind::TimedTextTrack => self.decode_upsert(&self.timed_text_tracks, message),
            ResourceKind::SharedLiveMedia => self.decode_upsert(&self.shared_live_medias, message),
        }
    }

    fn decode_upsert<R: Resource>(&self, store: &ResourceStore<R>, message: &PushMessage) -> bool {
        match serde_json::from_value::<R>(message.resource.clone()) {
            Ok(resource) => {
                store.upsert(resource);
                true
            }
            Err(e) => {
                debug!(kind = %message.kind, error = %e, "dropping undecodable push payload");
                false
            }
        }
    }
}

impl Default for StoreSet {
    fn default() -> Self {
        Self::new()
    }
}

//! Authenticated HTTP client for the resource API.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use livesync_core::resource::Resource;
use livesync_core::{LiveKind, ResourceKind, SyncError, VideoSnapshot};
use livesync_store::StoreSet;

use crate::{CatchUpFetch, ResourceFetcher};

/// Client for the resource REST API. One instance per session; cheap to
/// clone by wrapping in `Arc`.
pub struct ApiClient {
    base: Url,
    jwt: Option<String>,
    http: reqwest::Client,
    stores: Arc<StoreSet>,
}

impl ApiClient {
    pub fn new(base: Url, jwt: Option<String>, stores: Arc<StoreSet>) -> Self {
        Self {
            base,
            jwt,
            http: reqwest::Client::new(),
            stores,
        }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn stores(&self) -> &Arc<StoreSet> {
        &self.stores
    }

    fn resource_url(&self, kind: ResourceKind, id: &str) -> Result<Url, SyncError> {
        self.base
            .join(&format!("{}/{}/", kind.as_str(), id))
            .map_err(|e| SyncError::Malformed(format!("bad resource url: {e}")))
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.jwt {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn decode<R: Resource>(resp: reqwest::Response) -> Result<R, SyncError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        resp.json::<R>()
            .await
            .map_err(|e| SyncError::Malformed(format!("decode resource: {e}")))
    }

    /// One authenticated GET of the canonical snapshot. Does not touch
    /// the store; the poller and catch-up wrap this.
    pub async fn get_resource<R: Resource>(&self, id: &str) -> Result<R, SyncError> {
        let url = self.resource_url(R::KIND, id)?;
        debug!(kind = %R::KIND, id, "fetching canonical resource");

        let resp = self
            .authorize(self.http.get(url))
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        Self::decode(resp).await
    }

    /// POST one of the live actions on a video and return the updated
    /// snapshot. The caller upserts it and advances the state machine;
    /// a rejection advances nothing.
    async fn post_video_action(
        &self,
        id: &str,
        action: &str,
        body: Option<serde_json::Value>,
    ) -> Result<VideoSnapshot, SyncError> {
        let url = self
            .base
            .join(&format!("videos/{id}/{action}/"))
            .map_err(|e| SyncError::Malformed(format!("bad action url: {e}")))?;
        debug!(id, action, "posting live action");

        let mut req = self.authorize(self.http.post(url));
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        Self::decode(resp).await
    }

    pub async fn initiate_live(
        &self,
        id: &str,
        kind: LiveKind,
    ) -> Result<VideoSnapshot, SyncError> {
        self.post_video_action(id, "initiate-live", Some(serde_json::json!({ "type": kind })))
            .await
    }

    pub async fn start_live(&self, id: &str) -> Result<VideoSnapshot, SyncError> {
        self.post_video_action(id, "start-live", None).await
    }

    pub async fn stop_live(&self, id: &str) -> Result<VideoSnapshot, SyncError> {
        self.post_video_action(id, "stop-live", None).await
    }

    pub async fn end_live(&self, id: &str) -> Result<VideoSnapshot, SyncError> {
        self.post_video_action(id, "end-live", None).await
    }

    pub async fn harvest_live(&self, id: &str) -> Result<VideoSnapshot, SyncError> {
        self.post_video_action(id, "harvest", None).await
    }

    /// Update mutable video fields (title, description). PUT of the whole
    /// representation; the server echoes the updated snapshot.
    pub async fn update_video(
        &self,
        id: &str,
        body: serde_json::Value,
    ) -> Result<VideoSnapshot, SyncError> {
        let url = self.resource_url(ResourceKind::Video, id)?;
        let resp = self
            .authorize(self.http.put(url))
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;
        Self::decode(resp).await
    }

    /// Fetch canonical state and force it into the store, overwriting any
    /// snapshot built on stale pre-disconnect data. No internal retry: a
    /// failure leaves the store unchanged and the next reconnect cycle
    /// repairs it.
    pub async fn fetch_canonical(&self, kind: ResourceKind, id: &str) -> Result<(), SyncError> {
        match kind {
            ResourceKind::Video => {
                let r = self.get_resource(id).await?;
                self.stores.videos().upsert(r);
            }
            ResourceKind::Document => {
                let r = self.get_resource(id).await?;
                self.stores.documents().upsert(r);
            }
            ResourceKind::Thumbnail => {
                let r = self.get_resource(id).await?;
                self.stores.thumbnails().upsert(r);
            }
            ResourceKind::TimedTextTrack => {
                let r = self.get_resource(id).await?;
                self.stores.timed_text_tracks().upsert(r);
            }
            ResourceKind::SharedLiveMedia => {
                let r = self.get_resource(id).await?;
                self.stores.shared_live_medias().upsert(r);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<R: Resource> ResourceFetcher<R> for ApiClient {
    async fn fetch(&self, id: &str) -> Result<R, SyncError> {
        self.get_resource(id).await
    }
}

#[async_trait]
impl CatchUpFetch for ApiClient {
    async fn catch_up(&self, kind: ResourceKind, id: &str) -> Result<(), SyncError> {
        self.fetch_canonical(kind, id).await
    }
}

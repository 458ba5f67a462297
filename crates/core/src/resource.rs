use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::types::{LiveState, ProcessingState, ResourceKind};

/// A server-owned entity with a stable id, held in the store as a whole
/// snapshot. Accepted updates replace the snapshot entirely; fields are
/// never merged.
pub trait Resource: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: ResourceKind;

    fn id(&self) -> &str;
}

/// Ingest endpoints handed out by the server once a live session exists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveInfo {
    #[serde(default)]
    pub ingest_endpoints: Vec<String>,
    pub stream_key: Option<String>,
    pub paused_at: Option<String>,
}

/// The video resource, the principal subject of a live session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSnapshot {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub upload_state: ProcessingState,
    pub live_state: Option<LiveState>,
    pub live_info: Option<LiveInfo>,
    #[serde(default)]
    pub is_ready_to_show: bool,
    /// Server timestamp of the last accepted upload, used to tell apart
    /// successive versions of the same video object.
    pub active_stamp: Option<i64>,
    /// Playback manifests and renditions, opaque to the sync engine.
    pub urls: Option<serde_json::Value>,
}

impl Resource for VideoSnapshot {
    const KIND: ResourceKind = ResourceKind::Video;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub id: String,
    pub title: Option<String>,
    pub filename: Option<String>,
    pub upload_state: ProcessingState,
    pub url: Option<String>,
}

impl Resource for DocumentSnapshot {
    const KIND: ResourceKind = ResourceKind::Document;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailSnapshot {
    pub id: String,
    pub upload_state: ProcessingState,
    #[serde(default)]
    pub is_ready_to_show: bool,
    pub urls: Option<serde_json::Value>,
}

impl Resource for ThumbnailSnapshot {
    const KIND: ResourceKind = ResourceKind::Thumbnail;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedTextTrackSnapshot {
    pub id: String,
    pub language: Option<String>,
    /// Subtitle, transcript or closed-caption mode tag from the server.
    pub mode: Option<String>,
    pub upload_state: ProcessingState,
    #[serde(default)]
    pub is_ready_to_show: bool,
    pub url: Option<String>,
}

impl Resource for TimedTextTrackSnapshot {
    const KIND: ResourceKind = ResourceKind::TimedTextTrack;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedLiveMediaSnapshot {
    pub id: String,
    pub title: Option<String>,
    pub upload_state: ProcessingState,
    #[serde(default)]
    pub is_ready_to_show: bool,
    pub nb_pages: Option<i32>,
    pub urls: Option<serde_json::Value>,
}

impl Resource for SharedLiveMediaSnapshot {
    const KIND: ResourceKind = ResourceKind::SharedLiveMedia;

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_snapshot_decodes_wire_payload() {
        let video: VideoSnapshot = serde_json::from_value(serde_json::json!({
            "id": "v1",
            "title": "Lecture 3",
            "description": null,
            "upload_state": "pending",
            "live_state": "running",
            "live_info": {
                "ingest_endpoints": ["rtmp://ingest.example.com/app"],
                "stream_key": "sk-123",
                "paused_at": null
            },
            "is_ready_to_show": false,
            "active_stamp": null,
            "urls": null
        }))
        .unwrap();

        assert_eq!(video.id(), "v1");
        assert_eq!(video.live_state, Some(LiveState::Running));
        assert_eq!(
            video.live_info.unwrap().stream_key.as_deref(),
            Some("sk-123")
        );
    }

    #[test]
    fn missing_optional_fields_default() {
        let track: TimedTextTrackSnapshot = serde_json::from_value(serde_json::json!({
            "id": "t1",
            "language": "fr",
            "mode": "st",
            "upload_state": "ready",
            "url": "https://cdn.example.com/t1.vtt"
        }))
        .unwrap();
        assert!(!track.is_ready_to_show);
    }
}

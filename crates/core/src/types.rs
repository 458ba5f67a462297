use serde::{Deserialize, Serialize};

/// Closed set of server-owned resource kinds carried on the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Video,
    Document,
    Thumbnail,
    TimedTextTrack,
    SharedLiveMedia,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "videos",
            Self::Document => "documents",
            Self::Thumbnail => "thumbnails",
            Self::TimedTextTrack => "timedtexttracks",
            Self::SharedLiveMedia => "sharedlivemedias",
        }
    }

    /// Parse the wire tag used in push envelopes and URL paths.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "videos" => Some(Self::Video),
            "documents" => Some(Self::Document),
            "thumbnails" => Some(Self::Thumbnail),
            "timedtexttracks" => Some(Self::TimedTextTrack),
            "sharedlivemedias" => Some(Self::SharedLiveMedia),
            _ => None,
        }
    }

    pub const ALL: [ResourceKind; 5] = [
        Self::Video,
        Self::Document,
        Self::Thumbnail,
        Self::TimedTextTrack,
        Self::SharedLiveMedia,
    ];
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upload/processing pipeline state reported by the server per artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingState {
    Pending,
    Uploading,
    Processing,
    Ready,
    Error,
    Deleted,
}

impl ProcessingState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Error => "error",
            Self::Deleted => "deleted",
        }
    }

    /// Terminal states stop any poller watching the artifact.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Ready | Self::Error | Self::Deleted)
    }
}

impl std::fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a live broadcast attached to a video resource.
///
/// Owned by the video's `live_state` field and only ever advanced through
/// the live state machine's transition function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveState {
    Idle,
    Creating,
    Starting,
    Running,
    Stopping,
    Stopped,
    Paused,
    Harvesting,
    Harvested,
}

impl LiveState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Creating => "creating",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Paused => "paused",
            Self::Harvesting => "harvesting",
            Self::Harvested => "harvested",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "creating" => Some(Self::Creating),
            "starting" => Some(Self::Starting),
            "running" => Some(Self::Running),
            "stopping" => Some(Self::Stopping),
            "stopped" => Some(Self::Stopped),
            "paused" => Some(Self::Paused),
            "harvesting" => Some(Self::Harvesting),
            "harvested" => Some(Self::Harvested),
            _ => None,
        }
    }

    /// A harvested broadcast leaves the live domain once published.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Harvested)
    }
}

impl std::fmt::Display for LiveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broadcast flavor requested when initiating a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveKind {
    Raw,
    Jitsi,
}

impl LiveKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Jitsi => "jitsi",
        }
    }
}

impl std::fmt::Display for LiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_kind_round_trips_wire_tags() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(ResourceKind::from_str("playlists"), None);
    }

    #[test]
    fn settled_processing_states() {
        assert!(ProcessingState::Ready.is_settled());
        assert!(ProcessingState::Error.is_settled());
        assert!(ProcessingState::Deleted.is_settled());
        assert!(!ProcessingState::Processing.is_settled());
        assert!(!ProcessingState::Pending.is_settled());
    }

    #[test]
    fn live_state_parses_wire_values() {
        assert_eq!(LiveState::from_str("running"), Some(LiveState::Running));
        assert_eq!(LiveState::from_str("harvested"), Some(LiveState::Harvested));
        assert_eq!(LiveState::from_str("live"), None);
    }
}

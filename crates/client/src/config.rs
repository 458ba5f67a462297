use std::path::PathBuf;

use url::Url;

/// Session configuration, collected from `LIVESYNC_*` environment
/// variables by the binary and passed by value.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the resource API, trailing slash included.
    pub api_base: Url,
    /// Path of the push-channel endpoint on the same host.
    pub ws_path: String,
    /// Opaque token for authenticated contexts.
    pub jwt: Option<String>,
    /// The video this session follows.
    pub video_id: String,
    /// Directory holding the persisted anonymous id.
    pub state_dir: PathBuf,
    /// Recording mode forwarded to the conferencing collaborator.
    pub recording_mode: String,
}

impl ClientConfig {
    pub fn new(api_base: Url, video_id: impl Into<String>) -> Self {
        Self {
            api_base,
            ws_path: "/ws".to_string(),
            jwt: None,
            video_id: video_id.into(),
            state_dir: std::env::temp_dir(),
            recording_mode: "cloud".to_string(),
        }
    }
}

use thiserror::Error;

/// Unified error type for the synchronization engine.
///
/// Transport-level failures are recovered as low as possible (poller,
/// connection manager); only action rejections and unrecoverable fetch
/// failures are expected to reach user-facing code.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transient transport failure: terminates the current poll or
    /// catch-up attempt, never crashes the session.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-2xx status.
    #[error("request rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// A payload that could not be decoded. Surfaced internally so call
    /// sites can decide to drop; never fatal.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// The conferencing collaborator refused a recording command.
    #[error("recording command failed: {0}")]
    Recording(String),
}

impl SyncError {
    /// True for failures the engine recovers from on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}

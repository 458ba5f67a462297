pub mod error;
pub mod message;
pub mod resource;
pub mod types;

pub use error::SyncError;
pub use message::PushMessage;
pub use resource::{
    DocumentSnapshot, Resource, SharedLiveMediaSnapshot, ThumbnailSnapshot,
    TimedTextTrackSnapshot, VideoSnapshot,
};
pub use types::{LiveKind, LiveState, ProcessingState, ResourceKind};

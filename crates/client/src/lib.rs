//! Session wiring: composes the store, API client, push channel, live
//! state machine and recording coordinator into one synchronized view of
//! a live video.

pub mod config;
pub mod identity;
pub mod session;

pub use config::ClientConfig;
pub use identity::{decode_claims, AnonymousId, SessionIdentity, TokenClaims};
pub use session::SyncSession;

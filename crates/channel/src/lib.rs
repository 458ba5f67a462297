//! Push-channel client: one WebSocket per subscribed resource, automatic
//! reconnection with a catch-up fetch to repair missed updates.

pub mod manager;
pub mod memory;
pub mod transport;

pub use manager::{ConnectionHandle, ConnectionManager};
pub use memory::MemoryTransport;
pub use transport::{ChannelTransport, WebSocketTransport};

/// Who the connection speaks for. Authenticated contexts carry the raw
/// JWT; anonymous viewers carry a locally persisted id instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Jwt(String),
    Anonymous(String),
}

/// Collaborator supplying the identity for a connection attempt.
/// Invoked exactly once per attempt.
pub trait IdentityProvider: Send + Sync {
    fn identity(&self) -> Identity;
}

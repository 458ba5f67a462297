//! Transport seam between the connection manager and the wire.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use url::Url;

use livesync_core::SyncError;

/// Opens one connection and yields its inbound text frames. The receiver
/// closing means the connection closed, expectedly or not.
#[async_trait]
pub trait ChannelTransport: Send + Sync + 'static {
    async fn open(&self, url: &Url) -> Result<mpsc::Receiver<String>, SyncError>;
}

/// Production transport over tokio-tungstenite.
pub struct WebSocketTransport;

#[async_trait]
impl ChannelTransport for WebSocketTransport {
    async fn open(&self, url: &Url) -> Result<mpsc::Receiver<String>, SyncError> {
        debug!(host = ?url.host_str(), path = url.path(), "opening websocket");
        let (socket, _) = connect_async(url.as_str())
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let mut socket = socket;
            while let Some(frame) = socket.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if tx.send(text.to_string()).await.is_err() {
                            // Receiver dropped: the owner tore the connection down.
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "websocket read failed");
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }
}

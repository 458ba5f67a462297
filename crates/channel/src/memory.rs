//! In-memory transport used by tests and local tooling: every `open`
//! hands back a channel the test scripts frames into.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use livesync_core::SyncError;

use crate::transport::ChannelTransport;

pub struct MemoryTransport {
    opens: AtomicUsize,
    urls: Mutex<Vec<Url>>,
    senders: Mutex<Vec<mpsc::Sender<String>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            opens: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
            senders: Mutex::new(Vec::new()),
        }
    }

    /// How many connections have been opened so far.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// URLs of every open in order.
    pub fn opened_urls(&self) -> Vec<Url> {
        self.urls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Deliver a text frame on the most recent connection.
    pub async fn push_frame(&self, frame: &str) {
        let sender = self
            .senders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned();
        if let Some(sender) = sender {
            let _ = sender.send(frame.to_string()).await;
        }
    }

    /// Simulate an unexpected close of the most recent connection.
    pub fn close_current(&self) {
        let mut senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        senders.pop();
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelTransport for MemoryTransport {
    async fn open(&self, url: &Url) -> Result<mpsc::Receiver<String>, SyncError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.urls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(url.clone());

        let (tx, rx) = mpsc::channel(64);
        self.senders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        Ok(rx)
    }
}

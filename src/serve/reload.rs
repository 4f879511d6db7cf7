//! Live-reload notifications.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 16;

/// Message pushed to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReloadEvent {
    /// Reload the whole page
    Reload,
    /// Swap stylesheets matching `path` without reloading
    Css { path: String },
}

/// Cloneable sender side of the live-reload channel.
///
/// Events sent while no browser is connected are dropped.
#[derive(Debug, Clone)]
pub struct ReloadHandle {
    tx: broadcast::Sender<ReloadEvent>,
}

impl Default for ReloadHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadHandle {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Receive every event sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.tx.subscribe()
    }

    /// Ask every browser to reload the page.
    pub fn reload(&self) {
        self.send(ReloadEvent::Reload);
    }

    /// Ask every browser to refresh the stylesheet at `path`.
    pub fn stream_css(&self, path: impl Into<String>) {
        self.send(ReloadEvent::Css { path: path.into() });
    }

    fn send(&self, event: ReloadEvent) {
        match self.tx.send(event) {
            Ok(receivers) => tracing::debug!(receivers, "sent live-reload event"),
            Err(broadcast::error::SendError(event)) => {
                tracing::trace!(?event, "no live-reload clients connected")
            }
        }
    }
}

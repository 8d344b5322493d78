//! In-process stream transport used by tests and single-instance runs.

use futures::future::BoxFuture;
use tokio::sync::{Mutex, broadcast};
use tracing::warn;

use crate::stream::{EventPublisher, EventSource, SaveEvent, StreamEntry};

/// Broadcast-channel stand-in for the durable stream. Entries are ordered
/// and fan out to every subscribed source; there is no persistence, so it is
/// only suitable where crash recovery is not needed.
pub struct MemoryStream {
    tx: broadcast::Sender<SaveEvent>,
}

impl MemoryStream {
    /// New stream with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe a consumer-side source to this stream.
    pub fn source(&self) -> MemorySource {
        MemorySource {
            rx: Mutex::new(self.tx.subscribe()),
        }
    }
}

impl EventPublisher for MemoryStream {
    fn publish(&self, event: SaveEvent) -> BoxFuture<'static, ()> {
        // Send fails only when no consumer is subscribed, which is fine for
        // a single-instance run.
        let _ = self.tx.send(event);
        Box::pin(async {})
    }
}

/// Consumer half of [`MemoryStream`].
pub struct MemorySource {
    rx: Mutex<broadcast::Receiver<SaveEvent>>,
}

impl EventSource for MemorySource {
    fn poll(&self) -> BoxFuture<'_, Vec<StreamEntry>> {
        Box::pin(async move {
            let mut rx = self.rx.lock().await;
            match rx.recv().await {
                Ok(event) => vec![StreamEntry {
                    entry_id: event.correlation_id.to_string(),
                    event,
                }],
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "in-memory stream consumer lagged");
                    Vec::new()
                }
                Err(broadcast::error::RecvError::Closed) => Vec::new(),
            }
        })
    }

    fn ack(&self, _entry_ids: Vec<String>) -> BoxFuture<'_, ()> {
        // Broadcast channels have no acknowledgement.
        Box::pin(async {})
    }
}

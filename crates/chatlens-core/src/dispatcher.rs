//! Fire-and-forget event dispatch to downstream consumers.

use chatlens_types::CaptureEvent;
use tokio::sync::broadcast;
use tracing::trace;

/// Events queued per subscriber before the oldest are dropped. Slow
/// consumers must defer their own work; the decode loop never waits.
const CHANNEL_CAPACITY: usize = 256;

/// Broadcast channel carrying [`CaptureEvent`]s out of the capture core.
///
/// Cloning is cheap; every clone dispatches into the same channel.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    tx: broadcast::Sender<CaptureEvent>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Subscribe to all capture events.
    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.tx.subscribe()
    }

    /// Publish an event without blocking.
    ///
    /// Nobody listening is not an error; capture runs the same whether or
    /// not a consumer is attached.
    pub fn dispatch(&self, event: CaptureEvent) {
        if self.tx.send(event).is_err() {
            trace!(target: "chatlens::events", "No subscribers for capture event");
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

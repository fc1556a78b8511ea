//! Explicitly constructed dependencies for the capture core.

use std::sync::Arc;

use chatlens_types::CaptureEvent;
use tokio::sync::broadcast;

use crate::dispatcher::EventDispatcher;
use crate::host::{ComposerHost, NullHost};

/// Dependencies handed down to adapters instead of ambient singletons.
///
/// Construct one per content-script lifetime and drop it on teardown;
/// everything hanging off it (subscriptions, adapters) stops with it.
#[derive(Clone)]
pub struct CaptureContext {
    pub dispatcher: EventDispatcher,
    pub host: Arc<dyn ComposerHost>,
}

impl CaptureContext {
    pub fn new(host: Arc<dyn ComposerHost>) -> Self {
        Self {
            dispatcher: EventDispatcher::new(),
            host,
        }
    }

    /// Context with no page attached; DOM-dependent operations will fall
    /// back to their safe defaults.
    pub fn headless() -> Self {
        Self::new(Arc::new(NullHost))
    }

    /// Subscribe to all events the core publishes.
    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.dispatcher.subscribe()
    }
}

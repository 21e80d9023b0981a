//! Publish/subscribe registry for media transport events.
//!
//! The media engine fans its callbacks out to every registered observer in
//! registration order; the manager is always the first consumer and external
//! listeners (UI, diagnostics) hook in behind it.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::types::IceCandidate;

/// Events emitted by the live media session. All handlers default to no-ops
/// so implementors override only what they observe.
#[async_trait]
pub trait MediaObserver: Send + Sync {
    /// A local network candidate was discovered.
    async fn on_ice_candidate(&self, _candidate: IceCandidate) {}

    /// The remote media stream was attached.
    async fn on_stream_added(&self) {}

    /// A payload arrived on the in-band data channel.
    async fn on_data_channel_message(&self, _payload: Vec<u8>) {}

    /// The connection became established or was lost.
    async fn on_connection_change(&self, _connected: bool) {}
}

/// Registered observer handles, invoked in registration order.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Mutex<Vec<Arc<dyn MediaObserver>>>,
}

impl ObserverRegistry {
    pub fn register(&self, observer: Arc<dyn MediaObserver>) {
        self.observers.lock().unwrap().push(observer);
    }

    pub fn unregister(&self, observer: &Arc<dyn MediaObserver>) {
        self.observers
            .lock()
            .unwrap()
            .retain(|o| !Arc::ptr_eq(o, observer));
    }

    /// Snapshot of the current handles, in registration order.
    pub fn snapshot(&self) -> Vec<Arc<dyn MediaObserver>> {
        self.observers.lock().unwrap().clone()
    }
}

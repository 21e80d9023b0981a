//! FIFO queues for ICE candidates that cannot be acted on yet.
//!
//! Outgoing candidates wait for the batched send; incoming candidates wait
//! for the media session to become ready. Drains preserve arrival order
//! exactly; the queues never reorder or filter.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::types::IceCandidate;

#[derive(Default)]
struct Inner {
    outgoing: VecDeque<IceCandidate>,
    incoming: VecDeque<IceCandidate>,
}

#[derive(Default)]
pub struct PendingIceQueues {
    inner: Mutex<Inner>,
}

impl PendingIceQueues {
    pub fn push_outgoing(&self, candidate: IceCandidate) {
        self.inner.lock().unwrap().outgoing.push_back(candidate);
    }

    pub fn push_incoming(&self, candidates: impl IntoIterator<Item = IceCandidate>) {
        self.inner.lock().unwrap().incoming.extend(candidates);
    }

    /// Remove and return all queued outgoing candidates in arrival order.
    pub fn drain_outgoing(&self) -> Vec<IceCandidate> {
        self.inner.lock().unwrap().outgoing.drain(..).collect()
    }

    /// Remove and return all queued incoming candidates in arrival order.
    pub fn drain_incoming(&self) -> Vec<IceCandidate> {
        self.inner.lock().unwrap().incoming.drain(..).collect()
    }

    pub fn outgoing_len(&self) -> usize {
        self.inner.lock().unwrap().outgoing.len()
    }

    pub fn incoming_len(&self) -> usize {
        self.inner.lock().unwrap().incoming.len()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.outgoing.clear();
        inner.incoming.clear();
    }
}

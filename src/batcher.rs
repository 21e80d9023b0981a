//! Debounce timer coalescing bursts of local ICE candidates into one send.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::types::IceCandidate;

/// Quiet period after the last candidate before the batch is flushed.
pub const ICE_BATCH_QUIET_PERIOD: Duration = Duration::from_millis(200);

/// Restartable quiet-period timer. Each `schedule` call cancels a window
/// still sleeping and starts over; a window that has already expired is
/// committed, and its flush runs to completion even if another schedule or
/// a cancel lands while it is executing. No state survives process restart;
/// candidates are re-derived by the transport layer.
pub struct IceBatcher {
    quiet_period: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl IceBatcher {
    pub fn new() -> Self {
        Self::with_quiet_period(ICE_BATCH_QUIET_PERIOD)
    }

    pub fn with_quiet_period(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            pending: Mutex::new(None),
        }
    }

    /// Restart the window; `flush` runs when it expires without another
    /// schedule call.
    pub fn schedule<F>(&self, flush: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let quiet_period = self.quiet_period;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(quiet_period).await;
            // Detach the flush once the window expires: aborting this task
            // must only ever interrupt the sleep, never a drain in progress.
            tokio::spawn(flush);
        });
        if let Some(previous) = self.pending.lock().unwrap().replace(handle) {
            previous.abort();
        }
    }

    /// Drop a still-sleeping flush without running it. An expired window's
    /// flush is already detached and unaffected.
    pub fn cancel(&self) {
        if let Some(handle) = self.pending.lock().unwrap().take() {
            handle.abort();
        }
    }
}

impl Default for IceBatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IceBatcher {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Collapse candidates identical in content, keeping first-occurrence order.
pub fn dedup_candidates(candidates: Vec<IceCandidate>) -> Vec<IceCandidate> {
    let mut unique: Vec<IceCandidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !unique.contains(&candidate) {
            unique.push(candidate);
        }
    }
    unique
}

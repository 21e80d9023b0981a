//! The mutable call session aggregate, owned exclusively by the manager.

use std::sync::Arc;

use crate::media::MediaSession;
use crate::state::{CallState, InvalidTransition};
use crate::types::{CallId, CameraState, PendingOffer, Recipient};

/// Identity of the call currently in progress. Call id and recipient are one
/// value so they can never desynchronize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub call_id: CallId,
    pub recipient: Recipient,
}

impl ActiveSession {
    pub fn new(call_id: CallId, recipient: Recipient) -> Self {
        Self { call_id, recipient }
    }
}

/// All mutable per-call state. Created implicitly by the first pre-offer or
/// outgoing-call action, reset to defaults on call end. Mutated only behind
/// the manager's session lock.
#[derive(Default)]
pub struct CallSession {
    pub state: CallState,
    pub active: Option<ActiveSession>,
    pub pending_offer: Option<PendingOffer>,
    pub media: Option<Arc<dyn MediaSession>>,
    pub local_camera: CameraState,
}

impl CallSession {
    /// Whether the given correlation pair matches the session in progress.
    pub fn matches(&self, call_id: &CallId, recipient: &Recipient) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.call_id == *call_id && a.recipient == *recipient)
    }

    /// Whether the given call id belongs to the session in progress.
    pub fn matches_call_id(&self, call_id: &CallId) -> bool {
        self.active.as_ref().is_some_and(|a| a.call_id == *call_id)
    }

    /// Apply a validated state transition.
    pub fn transition(&mut self, next: CallState) -> Result<(), InvalidTransition> {
        self.state = self.state.transition_to(next)?;
        Ok(())
    }

    /// Tear the aggregate down to idle defaults, handing back the media
    /// session for disposal.
    pub fn reset(&mut self) -> Option<Arc<dyn MediaSession>> {
        self.state = CallState::Idle;
        self.active = None;
        self.pending_offer = None;
        self.local_camera = CameraState::UNKNOWN;
        self.media.take()
    }
}

//! Signaling message kinds and the outbound transport seam.
//!
//! Messages are addressed to a recipient identity and correlated by call id.
//! The transport is fire-and-forget and best-effort: a send either completes
//! or fails once, and the manager never retries internally.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::CallError;
use crate::types::{CallId, IceCandidate, Recipient};

/// An outbound call-control message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SignalingMessage {
    /// Lightweight message sent before the full offer, so the remote side
    /// can start ringing before codec negotiation completes.
    PreOffer { call_id: CallId },
    Offer { call_id: CallId, sdp: String },
    Answer { call_id: CallId, sdp: String },
    /// Batched ICE candidates as parallel arrays aligned by index.
    IceCandidates {
        call_id: CallId,
        sdps: Vec<String>,
        sdp_mline_indexes: Vec<u32>,
        sdp_mids: Vec<String>,
    },
    EndCall { call_id: CallId },
}

impl SignalingMessage {
    /// Build a batched candidates message, splitting the candidates into the
    /// wire format's parallel arrays.
    pub fn ice_candidates(call_id: CallId, candidates: &[IceCandidate]) -> Self {
        Self::IceCandidates {
            call_id,
            sdps: candidates.iter().map(|c| c.sdp.clone()).collect(),
            sdp_mline_indexes: candidates.iter().map(|c| c.sdp_mline_index).collect(),
            sdp_mids: candidates.iter().map(|c| c.sdp_mid.clone()).collect(),
        }
    }

    pub fn call_id(&self) -> &CallId {
        match self {
            Self::PreOffer { call_id }
            | Self::Offer { call_id, .. }
            | Self::Answer { call_id, .. }
            | Self::IceCandidates { call_id, .. }
            | Self::EndCall { call_id } => call_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::PreOffer { .. } => "pre-offer",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidates { .. } => "ice-candidates",
            Self::EndCall { .. } => "end-call",
        }
    }
}

/// Sends signaling payloads to a remote peer identity. Asynchronous and
/// best-effort; must never block the caller beyond the await.
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    async fn send(&self, to: &Recipient, message: SignalingMessage) -> Result<(), CallError>;
}

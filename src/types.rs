//! Core identifier and media-description types shared across the crate.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque unique identifier correlating all signaling messages of one call
/// attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(String);

impl CallId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random call id (32 uppercase hex chars).
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::rng().fill(&mut bytes);
        Self(hex::encode_upper(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of the remote party of a call, addressable by the signaling
/// transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Recipient {
    pub address: String,
}

impl Recipient {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

/// SDP description kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SdpType {
    Offer,
    Answer,
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offer => f.write_str("offer"),
            Self::Answer => f.write_str("answer"),
        }
    }
}

/// A session description exchanged as offer or answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub kind: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// A single ICE candidate as exchanged between peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub sdp: String,
    pub sdp_mline_index: u32,
    pub sdp_mid: String,
}

impl IceCandidate {
    pub fn new(sdp: impl Into<String>, sdp_mline_index: u32, sdp_mid: impl Into<String>) -> Self {
        Self {
            sdp: sdp.into(),
            sdp_mline_index,
            sdp_mid: sdp_mid.into(),
        }
    }
}

/// Which way the local camera faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraFacing {
    Unknown,
    Front,
    Back,
}

/// Last known enablement and facing of the local camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraState {
    pub facing: CameraFacing,
    pub enabled: bool,
}

impl CameraState {
    pub const UNKNOWN: CameraState = CameraState {
        facing: CameraFacing::Unknown,
        enabled: false,
    };
}

impl Default for CameraState {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

/// Audio output device as reported by the platform audio routing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AudioDevice {
    #[default]
    None,
    Earpiece,
    Speakerphone,
    WiredHeadset,
    Bluetooth,
}

/// A received offer awaiting user accept or reject.
#[derive(Debug, Clone)]
pub struct PendingOffer {
    pub sdp: String,
    pub received_at: DateTime<Utc>,
}

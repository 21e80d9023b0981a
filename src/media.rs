//! Seams to the media transport engine.
//!
//! The peer connection, codecs and capture pipeline live behind these traits;
//! the manager only drives describe/candidate operations and owns at most one
//! live session per call attempt.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::CallError;
use crate::observer::MediaObserver;
use crate::types::{CameraState, IceCandidate, SessionDescription};

/// One peer-to-peer media connection. Exclusively owned by the manager;
/// disposal must be idempotent.
#[async_trait]
pub trait MediaSession: Send + Sync {
    async fn create_offer(&self, ice_restart: bool) -> Result<SessionDescription, CallError>;

    async fn create_answer(&self, ice_restart: bool) -> Result<SessionDescription, CallError>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), CallError>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), CallError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), CallError>;

    /// Whether the session is ready to accept/emit ICE candidates.
    fn ready_for_ice(&self) -> bool;

    /// Open the in-band data channel used for auxiliary signaling.
    async fn register_data_channel(&self, label: &str) -> Result<(), CallError>;

    /// Send a payload over the data channel.
    async fn send_data(&self, payload: &[u8]) -> Result<(), CallError>;

    async fn set_audio_enabled(&self, enabled: bool);

    async fn set_video_enabled(&self, enabled: bool);

    /// Switch between front and back camera, returning the new state.
    async fn flip_camera(&self) -> CameraState;

    fn camera_state(&self) -> CameraState;

    /// Release the connection and its hardware bindings. Safe to call twice.
    async fn dispose(&self);
}

/// Creates media sessions wired to a renderer and an event observer.
#[async_trait]
pub trait MediaSessionFactory: Send + Sync {
    async fn create(
        &self,
        renderer: Arc<dyn VideoRenderer>,
        observer: Arc<dyn MediaObserver>,
    ) -> Result<Arc<dyn MediaSession>, CallError>;
}

/// Target surface for decoded video frames. Released when the call ends.
pub trait VideoRenderer: Send + Sync {
    fn release(&self);
}

//! Call-session coordination core for peer-to-peer calls.
//!
//! This crate owns the client-side call state machine and the signaling
//! choreography around it: offer/answer exchange, ICE candidate batching and
//! queueing, and replay-latest state channels for UI and audio collaborators.
//! The media engine, the network transport and the renderer are external
//! collaborators behind traits.
//!
//! # Architecture
//!
//! - [`CallState`] & [`CallSession`]: the state machine and its mutable
//!   aggregate, owned exclusively by the manager
//! - [`SignalingMessage`] & [`SignalingTransport`]: outbound wire messages
//! - [`MediaSession`] / [`MediaSessionFactory`]: the media transport seam
//! - [`IceBatcher`] & [`PendingIceQueues`]: candidate batching and queueing
//! - [`CallEvents`]: replay-latest state channels
//! - [`CallManager`]: orchestrates the call lifecycle

pub mod batcher;
pub mod error;
pub mod events;
pub mod manager;
pub mod media;
pub mod observer;
pub mod queues;
pub mod session;
pub mod signaling;
pub mod state;
pub mod types;

pub use batcher::{ICE_BATCH_QUIET_PERIOD, IceBatcher};
pub use error::CallError;
pub use events::{AudioDeviceUpdate, CallEvents};
pub use manager::CallManager;
pub use media::{MediaSession, MediaSessionFactory, VideoRenderer};
pub use observer::{MediaObserver, ObserverRegistry};
pub use queues::PendingIceQueues;
pub use session::{ActiveSession, CallSession};
pub use signaling::{SignalingMessage, SignalingTransport};
pub use state::{CallState, InvalidTransition};
pub use types::{
    AudioDevice, CallId, CameraFacing, CameraState, IceCandidate, PendingOffer, Recipient,
    SdpType, SessionDescription,
};

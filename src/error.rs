//! Call-related error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CallError {
    /// A required piece of session setup is absent. Names the missing
    /// requirement; no state was mutated.
    #[error("missing precondition: {0}")]
    MissingPrecondition(&'static str),

    #[error("invalid call state transition: {0}")]
    InvalidTransition(#[from] crate::state::InvalidTransition),

    /// Another call is already in progress.
    #[error("another call is in progress")]
    CallInProgress,

    /// Signaling send failed. Never retried internally.
    #[error("signaling transport error: {0}")]
    Transport(String),

    #[error("media session error: {0}")]
    Media(String),

    /// Internal inconsistency (e.g. a live state referencing a disposed
    /// media session). Fatal to the call, not the process.
    #[error("internal inconsistency: {0}")]
    Internal(&'static str),
}

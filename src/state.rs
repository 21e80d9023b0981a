//! Call state machine definitions.

use serde::Serialize;
use std::fmt;

/// Current state of the call session. Exactly one value is authoritative at
/// any time; it is owned by the manager and mirrored to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum CallState {
    /// No call in progress.
    #[default]
    Idle,
    /// A pre-offer has been received; the full offer has not arrived yet.
    PreOffer,
    /// Outgoing call: offer sent, waiting for the remote answer.
    Dialing,
    /// Incoming call: local user accepted, answer being produced/sent.
    Answering,
    /// Outgoing call: remote side is ringing.
    RemoteRinging,
    /// Incoming call: ringing locally, offer pending accept/reject.
    LocalRinging,
    /// Media session established, call active.
    Connected,
}

impl CallState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_pre_offer(&self) -> bool {
        matches!(self, Self::PreOffer)
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// States in which a connection attempt is underway but not yet
    /// established.
    pub fn is_pending_connection(&self) -> bool {
        matches!(
            self,
            Self::Dialing | Self::Answering | Self::LocalRinging | Self::RemoteRinging
        )
    }

    /// States reached on the caller side of a call.
    pub fn is_outgoing(&self) -> bool {
        matches!(self, Self::Dialing | Self::RemoteRinging | Self::Connected)
    }

    /// Whether `next` is a legal successor of the current state.
    pub fn can_transition_to(&self, next: CallState) -> bool {
        use CallState::*;
        match (self, next) {
            (Idle, PreOffer | Dialing) => true,
            (PreOffer, Idle | Answering | LocalRinging) => true,
            (Dialing, RemoteRinging | Connected | Idle) => true,
            (Answering, LocalRinging | Connected | Idle) => true,
            (RemoteRinging, Connected | Idle) => true,
            (LocalRinging, Answering | Connected | Idle) => true,
            (Connected, Idle) => true,
            _ => false,
        }
    }

    /// Validate and return the transition, or an error describing the
    /// rejected attempt.
    pub fn transition_to(self, next: CallState) -> Result<CallState, InvalidTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(InvalidTransition {
                current: self,
                attempted: next,
            })
        }
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::PreOffer => "pre-offer",
            Self::Dialing => "dialing",
            Self::Answering => "answering",
            Self::RemoteRinging => "remote-ringing",
            Self::LocalRinging => "local-ringing",
            Self::Connected => "connected",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub current: CallState,
    pub attempted: CallState,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot move from {} to {}",
            self.current, self.attempted
        )
    }
}

impl std::error::Error for InvalidTransition {}

#[cfg(test)]
mod tests {
    use super::*;

    /// Outgoing flow: Idle → Dialing → RemoteRinging → Connected → Idle.
    #[test]
    fn test_outgoing_flow_is_legal() {
        let s = CallState::Idle
            .transition_to(CallState::Dialing)
            .unwrap()
            .transition_to(CallState::RemoteRinging)
            .unwrap()
            .transition_to(CallState::Connected)
            .unwrap()
            .transition_to(CallState::Idle)
            .unwrap();
        assert!(s.is_idle());
    }

    /// Incoming flow: Idle → PreOffer → LocalRinging → Answering → Connected.
    #[test]
    fn test_incoming_flow_is_legal() {
        let s = CallState::Idle
            .transition_to(CallState::PreOffer)
            .unwrap()
            .transition_to(CallState::LocalRinging)
            .unwrap()
            .transition_to(CallState::Answering)
            .unwrap()
            .transition_to(CallState::Connected)
            .unwrap();
        assert!(s.is_connected());
    }

    #[test]
    fn test_every_state_can_return_to_idle() {
        for s in [
            CallState::PreOffer,
            CallState::Dialing,
            CallState::Answering,
            CallState::RemoteRinging,
            CallState::LocalRinging,
            CallState::Connected,
        ] {
            assert!(s.can_transition_to(CallState::Idle), "{s} cannot end");
        }
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        assert!(CallState::Idle.transition_to(CallState::Connected).is_err());
        assert!(
            CallState::Connected
                .transition_to(CallState::Dialing)
                .is_err()
        );
        assert!(
            CallState::Dialing
                .transition_to(CallState::LocalRinging)
                .is_err()
        );
        let err = CallState::Idle
            .transition_to(CallState::Answering)
            .unwrap_err();
        assert_eq!(err.current, CallState::Idle);
        assert_eq!(err.attempted, CallState::Answering);
    }

    #[test]
    fn test_state_groupings() {
        assert!(CallState::Dialing.is_pending_connection());
        assert!(CallState::LocalRinging.is_pending_connection());
        assert!(!CallState::Connected.is_pending_connection());
        assert!(CallState::RemoteRinging.is_outgoing());
        assert!(!CallState::Answering.is_outgoing());
    }
}

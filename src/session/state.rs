//! Recording-lifecycle state machine.
//!
//! Valid transitions:
//! - Idle -> Requesting (start: begin mic + channel acquisition)
//! - Requesting -> Recording (both resources ready)
//! - Requesting -> Idle (acquisition cancelled by stop)
//! - Requesting -> Error (acquisition failed or timed out)
//! - Recording -> Stopping (stop requested)
//! - Recording -> Error (channel failed mid-stream)
//! - Stopping -> Idle (cleanup complete)
//! - Error -> Idle (user acknowledged)

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;

/// Operational state of a dictation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session active. Ready to start.
    Idle,
    /// Awaiting microphone grant and channel handshake.
    Requesting,
    /// Live audio flowing to the transcription backend.
    Recording,
    /// Winding down: channel finishing, capture releasing.
    Stopping,
    /// A failure occurred; waiting for acknowledgement.
    Error,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Requesting => "requesting",
            SessionState::Recording => "recording",
            SessionState::Stopping => "stopping",
            SessionState::Error => "error",
        };
        write!(f, "{}", name)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Idle
    }
}

impl SessionState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &SessionState) -> bool {
        matches!(
            (self, target),
            (SessionState::Idle, SessionState::Requesting)
                | (SessionState::Requesting, SessionState::Recording)
                | (SessionState::Requesting, SessionState::Idle)
                | (SessionState::Requesting, SessionState::Error)
                | (SessionState::Recording, SessionState::Stopping)
                | (SessionState::Recording, SessionState::Error)
                | (SessionState::Stopping, SessionState::Idle)
                | (SessionState::Error, SessionState::Idle)
        )
    }
}

/// Shared state cell with transition validation.
///
/// Clones share the same underlying state. All mutation goes through
/// `try_transition`, which applies a transition only when the current state
/// matches the expected source, making races between concurrent start/stop
/// calls decidable by rule.
#[derive(Debug, Clone, Default)]
pub struct StateMachine {
    state: Arc<Mutex<SessionState>>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::Idle)),
        }
    }

    /// Returns the current state.
    pub fn current(&self) -> SessionState {
        *self.state.lock().expect("state mutex poisoned")
    }

    /// Apply `from -> to` only if the current state is `from` and the
    /// transition is valid. Returns whether the transition was applied.
    pub fn try_transition(&self, from: SessionState, to: SessionState) -> bool {
        let mut state = self.state.lock().expect("state mutex poisoned");
        if *state == from && state.can_transition_to(&to) {
            tracing::debug!("Session state: {} -> {}", *state, to);
            *state = to;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        assert!(SessionState::Idle.can_transition_to(&SessionState::Requesting));
        assert!(SessionState::Requesting.can_transition_to(&SessionState::Recording));
        assert!(SessionState::Requesting.can_transition_to(&SessionState::Idle));
        assert!(SessionState::Requesting.can_transition_to(&SessionState::Error));
        assert!(SessionState::Recording.can_transition_to(&SessionState::Stopping));
        assert!(SessionState::Recording.can_transition_to(&SessionState::Error));
        assert!(SessionState::Stopping.can_transition_to(&SessionState::Idle));
        assert!(SessionState::Error.can_transition_to(&SessionState::Idle));
    }

    #[test]
    fn invalid_transitions() {
        assert!(!SessionState::Idle.can_transition_to(&SessionState::Recording));
        assert!(!SessionState::Idle.can_transition_to(&SessionState::Stopping));
        assert!(!SessionState::Recording.can_transition_to(&SessionState::Requesting));
        assert!(!SessionState::Stopping.can_transition_to(&SessionState::Recording));
        assert!(!SessionState::Error.can_transition_to(&SessionState::Recording));
        assert!(!SessionState::Idle.can_transition_to(&SessionState::Idle));
    }

    #[test]
    fn try_transition_requires_matching_source() {
        let sm = StateMachine::new();
        assert!(!sm.try_transition(SessionState::Requesting, SessionState::Recording));
        assert_eq!(sm.current(), SessionState::Idle);

        assert!(sm.try_transition(SessionState::Idle, SessionState::Requesting));
        assert_eq!(sm.current(), SessionState::Requesting);
    }

    #[test]
    fn clones_share_state() {
        let a = StateMachine::new();
        let b = a.clone();
        a.try_transition(SessionState::Idle, SessionState::Requesting);
        assert_eq!(b.current(), SessionState::Requesting);
    }
}

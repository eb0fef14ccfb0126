use std::time::Duration;

/// Errors produced by the dictation core.
///
/// Every failure is caught at the boundary where it occurs and surfaced to the
/// caller; none of these are fatal to the host process.
#[derive(Debug, thiserror::Error)]
pub enum DictationError {
    /// Microphone access was refused by the OS. Terminal for the session.
    #[error("microphone access denied")]
    PermissionDenied,

    /// No usable capture device, or the device could not be opened.
    #[error("audio capture device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The transcription backend rejected our credentials at handshake.
    #[error("transcription backend rejected credentials: {0}")]
    Auth(String),

    /// Transport-level failure while connecting to the transcription backend.
    #[error("failed to reach transcription backend: {0}")]
    Network(String),

    /// The streaming channel failed mid-session.
    #[error("transcription channel error: {0}")]
    Channel(String),

    /// Microphone + channel acquisition did not complete in time.
    #[error("timed out acquiring microphone and transcription channel after {0:?}")]
    AcquireTimeout(Duration),

    /// Simulated-keystroke injection into the focused application failed.
    #[error("text injection failed: {0}")]
    Injection(String),

    /// Clipboard write failed.
    #[error("clipboard write failed: {0}")]
    Clipboard(String),

    /// An operation was requested in a session state that does not allow it.
    #[error("cannot {action} while session is {state}")]
    InvalidState { action: String, state: String },
}

impl DictationError {
    pub fn invalid_state(action: &str, state: impl std::fmt::Display) -> Self {
        Self::InvalidState {
            action: action.to_string(),
            state: state.to_string(),
        }
    }
}

//! Dictation session management
//!
//! This module provides the `DictationSessionManager` abstraction that manages:
//! - The recording lifecycle state machine
//! - Concurrent microphone + channel acquisition with cancellation
//! - Routing of transcript events into the buffer and interim preview
//! - Commit of the buffer to the text-injection sink or clipboard
//! - Session statistics for status queries

mod manager;
mod state;
mod stats;

pub use manager::{DictationSessionManager, SessionOptions};
pub use state::{SessionState, StateMachine};
pub use stats::SessionStats;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::state::SessionState;

/// Snapshot of the session manager for status queries.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    /// Current lifecycle state.
    pub state: SessionState,

    /// Identifier of the active session, if one exists.
    pub session_id: Option<Uuid>,

    /// When the active session started recording.
    pub started_at: Option<DateTime<Utc>>,

    /// Seconds since the active session started.
    pub duration_secs: Option<f64>,

    /// Audio chunks forwarded to the channel this session.
    pub chunks_forwarded: usize,

    /// Final transcript segments committed to the buffer.
    pub final_segments: usize,

    /// Characters currently in the transcript buffer.
    pub buffer_chars: usize,

    /// Ephemeral interim hypothesis, display-only.
    pub interim_preview: String,

    /// Most recent failure, present while in the error state.
    pub last_error: Option<String>,
}

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::state::AppState;
use crate::error::DictationError;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub state: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct BufferResponse {
    /// Committed transcript text (including user edits).
    pub text: String,
    /// Ephemeral interim hypothesis, display-only.
    pub interim: String,
}

#[derive(Debug, Deserialize)]
pub struct EditBufferRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Map a core error onto an HTTP status. Nothing here is fatal to the host;
/// every failure becomes a JSON error body.
fn error_response(err: DictationError) -> axum::response::Response {
    let status = match &err {
        DictationError::PermissionDenied => StatusCode::FORBIDDEN,
        DictationError::DeviceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        DictationError::Auth(_) => StatusCode::BAD_GATEWAY,
        DictationError::Network(_) | DictationError::Channel(_) => StatusCode::BAD_GATEWAY,
        DictationError::AcquireTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        DictationError::Injection(_) | DictationError::Clipboard(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        DictationError::InvalidState { .. } => StatusCode::CONFLICT,
    };

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /dictation/start
/// Begin a dictation session (no-op if one is already active)
pub async fn start_session(State(state): State<AppState>) -> impl IntoResponse {
    match state.manager.start().await {
        Ok(()) => (
            StatusCode::OK,
            Json(SessionResponse {
                state: state.manager.state().to_string(),
                message: "session started".to_string(),
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /dictation/stop
/// Stop the active session (no-op when idle)
pub async fn stop_session(State(state): State<AppState>) -> impl IntoResponse {
    match state.manager.stop().await {
        Ok(()) => (
            StatusCode::OK,
            Json(SessionResponse {
                state: state.manager.state().to_string(),
                message: "session stopped".to_string(),
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /dictation/acknowledge
/// Acknowledge an error and return to idle, preserving the buffer
pub async fn acknowledge_error(State(state): State<AppState>) -> impl IntoResponse {
    match state.manager.acknowledge_error().await {
        Ok(()) => (
            StatusCode::OK,
            Json(SessionResponse {
                state: state.manager.state().to_string(),
                message: "error acknowledged".to_string(),
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /dictation/status
/// Snapshot of session state, counters, and the interim preview
pub async fn session_status(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.manager.stats().await;
    (StatusCode::OK, Json(stats)).into_response()
}

/// GET /buffer
/// Current committed text plus the interim preview
pub async fn get_buffer(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(BufferResponse {
            text: state.manager.buffer_text(),
            interim: state.manager.interim_preview(),
        }),
    )
        .into_response()
}

/// PUT /buffer
/// Direct user edit: replaces the committed text wholesale
pub async fn edit_buffer(
    State(state): State<AppState>,
    Json(req): Json<EditBufferRequest>,
) -> impl IntoResponse {
    state.manager.edit_buffer(&req.text);
    (
        StatusCode::OK,
        Json(BufferResponse {
            text: state.manager.buffer_text(),
            interim: state.manager.interim_preview(),
        }),
    )
        .into_response()
}

/// DELETE /buffer
/// Clear the committed text and the interim preview
pub async fn clear_buffer(State(state): State<AppState>) -> impl IntoResponse {
    state.manager.clear_buffer();
    info!("Buffer cleared by user");
    StatusCode::NO_CONTENT.into_response()
}

/// POST /buffer/insert
/// Type the buffer into the focused application; clears it on success
pub async fn insert_buffer(State(state): State<AppState>) -> impl IntoResponse {
    match state.manager.insert().await {
        Ok(()) => (
            StatusCode::OK,
            Json(BufferResponse {
                text: state.manager.buffer_text(),
                interim: state.manager.interim_preview(),
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /buffer/copy
/// Copy the buffer to the clipboard; the buffer is left untouched
pub async fn copy_buffer(State(state): State<AppState>) -> impl IntoResponse {
    match state.manager.copy().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

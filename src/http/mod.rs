//! HTTP API server for external control (tray app, editor plugin)
//!
//! This module provides a REST API for driving the dictation core:
//! - POST /dictation/start - Begin a dictation session
//! - POST /dictation/stop - Stop the active session
//! - POST /dictation/acknowledge - Clear an error state
//! - GET  /dictation/status - Query session state and counters
//! - GET/PUT/DELETE /buffer - Read, edit, or clear the transcript buffer
//! - POST /buffer/insert - Type the buffer into the focused application
//! - POST /buffer/copy - Copy the buffer to the clipboard
//! - GET  /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session control
        .route("/dictation/start", post(handlers::start_session))
        .route("/dictation/stop", post(handlers::stop_session))
        .route("/dictation/acknowledge", post(handlers::acknowledge_error))
        .route("/dictation/status", get(handlers::session_status))
        // Buffer access
        .route(
            "/buffer",
            get(handlers::get_buffer)
                .put(handlers::edit_buffer)
                .delete(handlers::clear_buffer),
        )
        .route("/buffer/insert", post(handlers::insert_buffer))
        .route("/buffer/copy", post(handlers::copy_buffer))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

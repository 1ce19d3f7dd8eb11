use axum::{
    Router,
    routing::{get, post, put},
};
use util::state::AppState;

pub mod common;
pub mod get;
pub mod post;
pub mod put;

/// Faculty-facing session management, scoped to a section.
pub fn section_attendance_routes() -> Router<AppState> {
    Router::new().route(
        "/sessions",
        post(post::open_session).get(get::list_sessions),
    )
}

/// Token polling, student check-in, and record review.
pub fn attendance_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions/{session_id}/token", get(get::current_token))
        .route("/sessions/{session_id}/check-in", post(post::check_in))
        .route("/sessions/{session_id}/close", post(post::close_session))
        .route("/sessions/{session_id}/records", get(get::list_records))
        .route("/records/{record_id}/approve", put(put::approve_record))
        .route("/records/{record_id}/reject", put(put::reject_record))
}

//! HTTP route entry point for `/api/...`.
//!
//! Route groups:
//! - `/health` → liveness probe (public)
//! - `/sections/{section_id}/attendance` → faculty-facing session management
//! - `/attendance` → token polling, student check-in, and record review
//!
//! Caller identity (faculty, student, reviewer) arrives as opaque ids in the
//! request; account authentication is a collaborator concern outside this
//! service.

use axum::Router;
use util::state::AppState;

pub mod attendance;
pub mod health;

use attendance::{attendance_routes, section_attendance_routes};
use health::health_routes;

/// Builds the complete application router for all HTTP endpoints.
///
/// The returned router has its `AppState` applied and is ready to be nested
/// under `/api`.
pub fn routes(app_state: AppState) -> Router {
    Router::new()
        .nest("/health", health_routes())
        .nest("/sections/{section_id}/attendance", section_attendance_routes())
        .nest("/attendance", attendance_routes())
        .with_state(app_state)
}

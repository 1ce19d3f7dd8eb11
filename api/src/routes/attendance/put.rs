use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use services::review::ReviewService;
use util::state::AppState;

use super::common::{AttendanceRecordResponse, error_response};
use crate::response::ApiResponse;

/// Reviewer identity is recorded for the log only; authorizing the reviewer
/// is a collaborator concern outside this service.
#[derive(Debug, Deserialize)]
pub struct ReviewReq {
    pub reviewer_id: Option<i64>,
}

/// PUT /api/attendance/records/{record_id}/approve
pub async fn approve_record(
    State(state): State<AppState>,
    Path(record_id): Path<i64>,
    body: Option<Json<ReviewReq>>,
) -> Response {
    log_reviewer(record_id, "approve", &body);
    match ReviewService::approve(state.db(), record_id).await {
        Ok(record) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                AttendanceRecordResponse::from(record),
                "Attendance record approved",
            )),
        )
            .into_response(),
        Err(err) => error_response(err).into_response(),
    }
}

/// PUT /api/attendance/records/{record_id}/reject
pub async fn reject_record(
    State(state): State<AppState>,
    Path(record_id): Path<i64>,
    body: Option<Json<ReviewReq>>,
) -> Response {
    log_reviewer(record_id, "reject", &body);
    match ReviewService::reject(state.db(), record_id).await {
        Ok(record) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                AttendanceRecordResponse::from(record),
                "Attendance record rejected",
            )),
        )
            .into_response(),
        Err(err) => error_response(err).into_response(),
    }
}

fn log_reviewer(record_id: i64, action: &str, body: &Option<Json<ReviewReq>>) {
    let reviewer = body.as_ref().and_then(|b| b.reviewer_id);
    tracing::info!(record_id, action, reviewer_id = ?reviewer, "review action received");
}

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use services::checkin::{CheckInRequest, CheckInService};
use services::session::{AttendanceSessionService, OpenSession};
use util::{config, state::AppState};

use super::common::{
    AttendanceRecordResponse, AttendanceSessionResponse, CheckInReq, OpenSessionReq,
    OpenSessionResponse, error_response,
};
use crate::response::ApiResponse;

/// POST /api/sections/{section_id}/attendance/sessions
///
/// Opens a time-boxed session geofenced around the faculty device's location
/// and returns it together with the first rotating token.
pub async fn open_session(
    State(state): State<AppState>,
    Path(section_id): Path<i64>,
    Json(body): Json<OpenSessionReq>,
) -> Response {
    let params = OpenSession {
        section_id,
        faculty_id: body.faculty_id,
        center: body.center,
        radius_m: body.radius_m,
        duration_minutes: body.duration_minutes.unwrap_or(30),
    };

    match AttendanceSessionService::open(state.db(), state.rotation(), params).await {
        Ok(opened) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(
                OpenSessionResponse {
                    session: AttendanceSessionResponse::from(opened.session),
                    token: opened.token,
                    token_issued_at: opened.token_issued_at.to_rfc3339(),
                    rotation_seconds: config::rotation_seconds(),
                },
                "Attendance session opened",
            )),
        )
            .into_response(),
        Err(err) => error_response(err).into_response(),
    }
}

/// POST /api/attendance/sessions/{session_id}/check-in
///
/// The student-facing endpoint: validates token freshness, session liveness,
/// and physical proximity, then records presence or flags the record.
pub async fn check_in(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Json(body): Json<CheckInReq>,
) -> Response {
    let req = CheckInRequest {
        session_id,
        student_id: body.student_id,
        token: body.token,
        coordinate: body.coordinate,
        client_timestamp: body.client_timestamp,
    };

    match CheckInService::check_in(state.db(), state.rotation(), req).await {
        Ok(record) => {
            let message = if record.is_flagged {
                "Check-in flagged for review"
            } else {
                "Attendance recorded"
            };
            (
                StatusCode::OK,
                Json(ApiResponse::success(
                    AttendanceRecordResponse::from(record),
                    message,
                )),
            )
                .into_response()
        }
        Err(err) => error_response(err).into_response(),
    }
}

/// POST /api/attendance/sessions/{session_id}/close
pub async fn close_session(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> Response {
    match AttendanceSessionService::close(state.db(), state.rotation(), session_id).await {
        Ok(session) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                AttendanceSessionResponse::from(session),
                "Attendance session closed",
            )),
        )
            .into_response(),
        Err(err) => error_response(err).into_response(),
    }
}

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::EntityTrait;

use db::models::attendance_record::Model as RecordModel;
use db::models::attendance_session::Entity as SessionEntity;
use services::error::AttendanceError;
use services::session::AttendanceSessionService;
use util::{config, state::AppState};

use super::common::{
    AttendanceRecordResponse, AttendanceSessionResponse, ListRecordsResponse,
    ListSessionsQuery, ListSessionsResponse, TokenResponse, error_response,
};
use crate::response::ApiResponse;

/// GET /api/sections/{section_id}/attendance/sessions
///
/// Sessions for a section, newest first, with attended counts for the
/// report UI. `?status=active|closed|expired` filters by lifecycle state.
pub async fn list_sessions(
    State(state): State<AppState>,
    Path(section_id): Path<i64>,
    Query(query): Query<ListSessionsQuery>,
) -> Response {
    let db = state.db();
    let sessions =
        match AttendanceSessionService::list_for_section(db, section_id, query.status).await {
            Ok(sessions) => sessions,
            Err(err) => return error_response(err).into_response(),
        };

    let mut out = Vec::with_capacity(sessions.len());
    for session in sessions {
        let attended = RecordModel::count_for_session(db, session.id)
            .await
            .unwrap_or(0);
        out.push(AttendanceSessionResponse::from_with_count(session, attended));
    }

    let total = out.len();
    (
        StatusCode::OK,
        Json(ApiResponse::success(
            ListSessionsResponse {
                sessions: out,
                total,
            },
            "Attendance sessions retrieved",
        )),
    )
        .into_response()
}

/// GET /api/attendance/sessions/{session_id}/token
///
/// Polled by the display layer roughly once per rotation interval to refresh
/// the rendered QR code. Callers must not assume sub-interval freshness.
pub async fn current_token(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> Response {
    match AttendanceSessionService::current_token(state.db(), state.rotation(), session_id).await
    {
        Ok((token, issued_at)) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                TokenResponse {
                    token,
                    issued_at: issued_at.to_rfc3339(),
                    rotation_seconds: config::rotation_seconds(),
                },
                "Current token retrieved",
            )),
        )
            .into_response(),
        Err(err) => error_response(err).into_response(),
    }
}

/// GET /api/attendance/sessions/{session_id}/records
///
/// Read-only listing for the review/report UI, including resolved records.
pub async fn list_records(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> Response {
    let db = state.db();

    match SessionEntity::find_by_id(session_id).one(db).await {
        Ok(Some(_)) => {}
        Ok(None) => return error_response(AttendanceError::SessionNotFound).into_response(),
        Err(err) => return error_response(AttendanceError::Db(err)).into_response(),
    }

    match RecordModel::list_for_session(db, session_id).await {
        Ok(records) => {
            let records: Vec<AttendanceRecordResponse> =
                records.into_iter().map(Into::into).collect();
            let total = records.len();
            (
                StatusCode::OK,
                Json(ApiResponse::success(
                    ListRecordsResponse { records, total },
                    "Attendance records retrieved",
                )),
            )
                .into_response()
        }
        Err(err) => error_response(AttendanceError::Db(err)).into_response(),
    }
}

use axum::{Json, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use db::models::attendance_record::{Model as RecordModel, RecordStatus};
use db::models::attendance_session::{Model as SessionModel, SessionStatus};
use services::error::AttendanceError;
use services::geo::Coordinate;

use crate::response::ApiResponse;

#[derive(Debug, Deserialize)]
pub struct OpenSessionReq {
    pub faculty_id: i64,
    /// Geofence center, taken from the faculty device's geolocation.
    pub center: Coordinate,
    pub radius_m: Option<i32>,
    pub duration_minutes: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct CheckInReq {
    pub student_id: i64,
    pub token: String,
    pub coordinate: Coordinate,
    /// Advisory; the server clock is authoritative.
    #[serde(default)]
    pub client_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub status: Option<SessionStatus>,
}

#[derive(Debug, Serialize)]
pub struct AttendanceSessionResponse {
    pub id: i64,
    pub section_id: i64,
    pub faculty_id: i64,
    pub center: Coordinate,
    pub radius_m: i32,
    pub opened_at: String,
    pub duration_minutes: i32,
    pub expires_at: String,
    pub status: SessionStatus,
    /// Students who have a record for this session (report UI).
    pub attended_count: u64,
}

impl From<SessionModel> for AttendanceSessionResponse {
    fn from(m: SessionModel) -> Self {
        Self {
            id: m.id,
            section_id: m.section_id,
            faculty_id: m.faculty_id,
            center: Coordinate::new(m.center_lat, m.center_lng),
            radius_m: m.radius_m,
            opened_at: m.opened_at.to_rfc3339(),
            duration_minutes: m.duration_minutes,
            expires_at: m.expires_at.to_rfc3339(),
            status: m.status,
            attended_count: 0,
        }
    }
}

impl AttendanceSessionResponse {
    pub fn from_with_count(m: SessionModel, attended_count: u64) -> Self {
        let mut base = Self::from(m);
        base.attended_count = attended_count;
        base
    }
}

#[derive(Debug, Serialize)]
pub struct OpenSessionResponse {
    pub session: AttendanceSessionResponse,
    pub token: String,
    pub token_issued_at: String,
    pub rotation_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub issued_at: String,
    pub rotation_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct AttendanceRecordResponse {
    pub id: i64,
    pub session_id: i64,
    pub student_id: i64,
    pub checked_in_at: String,
    pub distance_m: f64,
    pub is_flagged: bool,
    pub flag_reason: Option<String>,
    pub status: RecordStatus,
}

impl From<RecordModel> for AttendanceRecordResponse {
    fn from(m: RecordModel) -> Self {
        Self {
            id: m.id,
            session_id: m.session_id,
            student_id: m.student_id,
            checked_in_at: m.checked_in_at.to_rfc3339(),
            distance_m: m.distance_m,
            is_flagged: m.is_flagged,
            flag_reason: m.flag_reason,
            status: m.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListSessionsResponse {
    pub sessions: Vec<AttendanceSessionResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ListRecordsResponse {
    pub records: Vec<AttendanceRecordResponse>,
    pub total: usize,
}

/// Maps a core validation failure onto an HTTP status. The boundary decides
/// presentation; the core only names the failure.
pub fn status_for(err: &AttendanceError) -> StatusCode {
    match err {
        AttendanceError::SessionNotFound | AttendanceError::RecordNotFound => {
            StatusCode::NOT_FOUND
        }
        AttendanceError::InvalidState => StatusCode::CONFLICT,
        AttendanceError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        AttendanceError::InvalidCoordinate { .. }
        | AttendanceError::SessionClosed
        | AttendanceError::StaleOrInvalidToken
        | AttendanceError::DuplicateCheckIn
        | AttendanceError::OutOfRange { .. }
        | AttendanceError::Validation(_) => StatusCode::BAD_REQUEST,
    }
}

pub fn error_response(err: AttendanceError) -> (StatusCode, Json<ApiResponse<()>>) {
    let status = status_for(&err);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "attendance request failed");
    }
    (status, Json(ApiResponse::error(err.to_string())))
}

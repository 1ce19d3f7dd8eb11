use sea_orm::DbErr;
use thiserror::Error;

/// Validation failures surfaced by the attendance core.
///
/// All of these are local decisions returned directly to the caller; none are
/// fatal to the process, none leave partial state behind, and the core never
/// retries on the caller's behalf.
#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("Invalid coordinate: latitude {lat}, longitude {lng}")]
    InvalidCoordinate { lat: f64, lng: f64 },

    #[error("Attendance session not found")]
    SessionNotFound,

    /// Covers both explicit close and automatic expiry.
    #[error("Attendance session is not accepting check-ins")]
    SessionClosed,

    #[error("Invalid or expired attendance token")]
    StaleOrInvalidToken,

    #[error("Attendance already recorded for this session")]
    DuplicateCheckIn,

    /// Far outside the geofence; almost certainly spoofed or erroneous
    /// location data, so the check-in is rejected rather than flagged.
    #[error("Check-in out of range: {distance_m:.0}m (limit {limit_m:.0}m)")]
    OutOfRange { distance_m: f64, limit_m: f64 },

    #[error("Attendance record not found")]
    RecordNotFound,

    /// Review action on a record that is not pending review.
    #[error("Attendance record is not pending review")]
    InvalidState,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Db(#[from] DbErr),
}

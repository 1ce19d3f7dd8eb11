//! The sole gatekeeper from a raw check-in request to an attendance record.
//!
//! Every step short-circuits; a failed check-in leaves session and record
//! state untouched, and no retry is performed here. A student whose request
//! fails for a transient reason (a momentarily stale token) resubmits.

use chrono::{DateTime, Utc};
use sea_orm::{DbConn, DbErr};
use serde::Deserialize;

use db::models::attendance_record::{Model as AttendanceRecord, RecordStatus};
use util::{config, rotation::RotationManager};

use crate::error::AttendanceError;
use crate::geo::{self, Coordinate};
use crate::session::AttendanceSessionService;

#[derive(Debug, Clone, Deserialize)]
pub struct CheckInRequest {
    pub session_id: i64,
    pub student_id: i64,
    pub token: String,
    pub coordinate: Coordinate,
    /// Advisory only; all authoritative timing uses the server clock.
    #[serde(default)]
    pub client_timestamp: Option<DateTime<Utc>>,
}

pub struct CheckInService;

impl CheckInService {
    pub async fn check_in(
        db: &DbConn,
        rotation: &RotationManager,
        req: CheckInRequest,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let now = Utc::now();

        // 1–2. Session lookup and liveness (expired-but-unpersisted counts
        // as closed).
        let session =
            AttendanceSessionService::require_live(db, rotation, req.session_id, now).await?;

        // 3. Token check against the two-generation window.
        let presented = req.token.trim();
        match rotation.verify(session.id, presented) {
            Some(true) => {}
            Some(false) => return Err(AttendanceError::StaleOrInvalidToken),
            None => {
                // Live session with no window means the process restarted
                // since the token was displayed; start a fresh window and
                // treat the presented token as stale.
                rotation.start(
                    session.id,
                    tokio::time::Duration::from_secs(config::rotation_seconds()),
                    session.expires_at,
                );
                return Err(AttendanceError::StaleOrInvalidToken);
            }
        }

        // 4. Duplicate check. The unique index backs this up under races.
        if AttendanceRecord::find_for(db, session.id, req.student_id)
            .await?
            .is_some()
        {
            return Err(AttendanceError::DuplicateCheckIn);
        }

        // 5. Distance from the session center.
        let center = Coordinate::new(session.center_lat, session.center_lng);
        let distance_m = geo::distance_meters(center, req.coordinate)?;

        // 6. Classification.
        let radius = f64::from(session.radius_m);
        let limit = radius * config::suspicious_multiplier();
        if distance_m > limit {
            return Err(AttendanceError::OutOfRange {
                distance_m,
                limit_m: limit,
            });
        }

        let (status, is_flagged, flag_reason) = if distance_m <= radius {
            (RecordStatus::Present, false, None)
        } else {
            (
                RecordStatus::PendingReview,
                true,
                Some(format!(
                    "outside geofence: {distance_m:.0}m (limit {}m)",
                    session.radius_m
                )),
            )
        };

        // 7. Persist. A unique violation here is a concurrent duplicate.
        let record = AttendanceRecord::create(
            db,
            session.id,
            req.student_id,
            now,
            distance_m,
            is_flagged,
            flag_reason,
            status,
        )
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                AttendanceError::DuplicateCheckIn
            } else {
                AttendanceError::Db(err)
            }
        })?;

        tracing::info!(
            session_id = session.id,
            student_id = req.student_id,
            distance_m,
            flagged = record.is_flagged,
            "check-in recorded"
        );
        Ok(record)
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err, DbErr::Exec(_) | DbErr::Query(_)) && err.to_string().contains("UNIQUE")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{AttendanceSessionService, OpenSession};
    use db::models::attendance_record::Entity as RecordEntity;
    use db::test_utils::setup_test_db;
    use sea_orm::{EntityTrait, PaginatorTrait};

    // ~1 degree of latitude in meters; good enough to place test points.
    const LAT_DEGREE_M: f64 = 111_194.93;

    fn north_of(center: Coordinate, meters: f64) -> Coordinate {
        Coordinate::new(center.lat + meters / LAT_DEGREE_M, center.lng)
    }

    async fn open_session(
        db: &DbConn,
        rotation: &RotationManager,
    ) -> (i64, Coordinate, String) {
        let center = Coordinate::new(39.0, 35.0);
        let opened = AttendanceSessionService::open(
            db,
            rotation,
            OpenSession {
                section_id: 301,
                faculty_id: 9,
                center,
                radius_m: Some(15),
                duration_minutes: 30,
            },
        )
        .await
        .unwrap();
        (opened.session.id, center, opened.token)
    }

    fn request(session_id: i64, student_id: i64, token: &str, coord: Coordinate) -> CheckInRequest {
        CheckInRequest {
            session_id,
            student_id,
            token: token.to_owned(),
            coordinate: coord,
            client_timestamp: None,
        }
    }

    #[tokio::test]
    async fn within_radius_is_present_and_unflagged() {
        let db = setup_test_db().await;
        let rotation = RotationManager::new();
        let (sid, center, token) = open_session(&db, &rotation).await;

        let rec = CheckInService::check_in(
            &db,
            &rotation,
            request(sid, 1001, &token, north_of(center, 10.0)),
        )
        .await
        .unwrap();

        assert_eq!(rec.status, RecordStatus::Present);
        assert!(!rec.is_flagged);
        assert!(rec.flag_reason.is_none());
        assert!((rec.distance_m - 10.0).abs() < 1.0);
    }

    #[tokio::test]
    async fn suspicious_band_is_flagged_for_review() {
        let db = setup_test_db().await;
        let rotation = RotationManager::new();
        let (sid, center, token) = open_session(&db, &rotation).await;

        let rec = CheckInService::check_in(
            &db,
            &rotation,
            request(sid, 1002, &token, north_of(center, 40.0)),
        )
        .await
        .unwrap();

        assert_eq!(rec.status, RecordStatus::PendingReview);
        assert!(rec.is_flagged);
        let reason = rec.flag_reason.unwrap();
        assert!(reason.contains("40m"), "reason was {reason}");
        assert!(reason.contains("15m"), "reason was {reason}");
    }

    #[tokio::test]
    async fn far_outside_is_rejected_with_no_record() {
        let db = setup_test_db().await;
        let rotation = RotationManager::new();
        let (sid, center, token) = open_session(&db, &rotation).await;

        let err = CheckInService::check_in(
            &db,
            &rotation,
            request(sid, 1003, &token, north_of(center, 60.0)),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AttendanceError::OutOfRange { .. }));
        let count = RecordEntity::find().count(&db).await.unwrap();
        assert_eq!(count, 0, "out-of-range check-ins persist nothing");
    }

    #[tokio::test]
    async fn second_check_in_is_a_duplicate_error() {
        let db = setup_test_db().await;
        let rotation = RotationManager::new();
        let (sid, center, token) = open_session(&db, &rotation).await;

        CheckInService::check_in(
            &db,
            &rotation,
            request(sid, 1004, &token, north_of(center, 10.0)),
        )
        .await
        .unwrap();

        let err = CheckInService::check_in(
            &db,
            &rotation,
            request(sid, 1004, &token, north_of(center, 10.0)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AttendanceError::DuplicateCheckIn));

        let count = RecordEntity::find().count(&db).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn wrong_token_is_rejected_before_any_record_is_written() {
        let db = setup_test_db().await;
        let rotation = RotationManager::new();
        let (sid, center, _) = open_session(&db, &rotation).await;

        let err = CheckInService::check_in(
            &db,
            &rotation,
            request(sid, 1005, "deadbeefdeadbeefdeadbeefdeadbeef", north_of(center, 5.0)),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AttendanceError::StaleOrInvalidToken));
        let count = RecordEntity::find().count(&db).await.unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn closed_session_rejects_even_a_valid_token_and_location() {
        let db = setup_test_db().await;
        let rotation = RotationManager::new();
        let (sid, center, token) = open_session(&db, &rotation).await;

        AttendanceSessionService::close(&db, &rotation, sid)
            .await
            .unwrap();

        let err = CheckInService::check_in(
            &db,
            &rotation,
            request(sid, 1006, &token, north_of(center, 5.0)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AttendanceError::SessionClosed));
    }

    #[tokio::test]
    async fn missing_session_is_not_found() {
        let db = setup_test_db().await;
        let rotation = RotationManager::new();

        let err = CheckInService::check_in(
            &db,
            &rotation,
            request(99, 1, "anything", Coordinate::new(0.0, 0.0)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AttendanceError::SessionNotFound));
    }

    #[tokio::test]
    async fn invalid_coordinate_is_rejected() {
        let db = setup_test_db().await;
        let rotation = RotationManager::new();
        let (sid, _, token) = open_session(&db, &rotation).await;

        let err = CheckInService::check_in(
            &db,
            &rotation,
            request(sid, 1007, &token, Coordinate::new(f64::NAN, 35.0)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AttendanceError::InvalidCoordinate { .. }));
    }
}

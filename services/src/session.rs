//! Attendance session lifecycle: open, close, token polling, and the
//! clock-driven expiry transition.

use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, DbConn, DbErr, EntityTrait, QueryFilter, QueryOrder};
use tokio::time::Duration;

use db::models::attendance_session::{Column, Entity, Model as AttendanceSession, SessionStatus};
use util::{config, rotation::RotationManager};

use crate::error::AttendanceError;
use crate::geo::Coordinate;

#[derive(Debug, Clone)]
pub struct OpenSession {
    pub section_id: i64,
    pub faculty_id: i64,
    pub center: Coordinate,
    pub radius_m: Option<i32>,
    pub duration_minutes: i32,
}

/// A freshly opened session together with its first token, so the faculty UI
/// can render the QR code without a second round trip.
#[derive(Debug, Clone)]
pub struct OpenedSession {
    pub session: AttendanceSession,
    pub token: String,
    pub token_issued_at: DateTime<Utc>,
}

pub struct AttendanceSessionService;

impl AttendanceSessionService {
    /// Opens a session at the faculty device's location and starts token
    /// rotation for it.
    pub async fn open(
        db: &DbConn,
        rotation: &RotationManager,
        params: OpenSession,
    ) -> Result<OpenedSession, AttendanceError> {
        params.center.validate()?;

        let radius_m = params.radius_m.unwrap_or_else(config::default_radius_m);
        if radius_m <= 0 {
            return Err(AttendanceError::Validation(
                "radius_m must be positive".into(),
            ));
        }
        if params.duration_minutes <= 0 {
            return Err(AttendanceError::Validation(
                "duration_minutes must be positive".into(),
            ));
        }
        let radius_m = radius_m.min(config::max_radius_m());
        let duration_minutes = params.duration_minutes.min(config::max_session_minutes());

        let session = AttendanceSession::create(
            db,
            params.section_id,
            params.faculty_id,
            params.center.lat,
            params.center.lng,
            radius_m,
            duration_minutes,
        )
        .await?;

        let (token, token_issued_at) =
            rotation.start(session.id, rotation_interval(), session.expires_at);

        tracing::info!(
            session_id = session.id,
            section_id = session.section_id,
            radius_m,
            duration_minutes,
            "attendance session opened"
        );

        Ok(OpenedSession {
            session,
            token,
            token_issued_at,
        })
    }

    /// Explicit faculty close. Only an Active, unexpired session may be
    /// closed; anything else is a state machine violation.
    pub async fn close(
        db: &DbConn,
        rotation: &RotationManager,
        session_id: i64,
    ) -> Result<AttendanceSession, AttendanceError> {
        let session = Entity::find_by_id(session_id)
            .one(db)
            .await?
            .ok_or(AttendanceError::SessionNotFound)?;

        if !session.is_live(Utc::now()) {
            Self::expire_if_due(db, rotation, &session).await?;
            return Err(AttendanceError::InvalidState);
        }

        rotation.stop(session_id);
        let closed = AttendanceSession::set_status(db, session_id, SessionStatus::Closed).await?;
        tracing::info!(session_id, "attendance session closed");
        Ok(closed)
    }

    /// The token currently rendered as the session's QR code.
    ///
    /// Polled by the display layer roughly once per rotation interval. If the
    /// session is live but no rotation is running (process restart), a fresh
    /// window is started on the spot.
    pub async fn current_token(
        db: &DbConn,
        rotation: &RotationManager,
        session_id: i64,
    ) -> Result<(String, DateTime<Utc>), AttendanceError> {
        let session = Self::require_live(db, rotation, session_id, Utc::now()).await?;

        match rotation.current(session.id) {
            Some(snapshot) => Ok(snapshot),
            None => Ok(rotation.start(session.id, rotation_interval(), session.expires_at)),
        }
    }

    /// Looks up a session and enforces liveness: missing rows are
    /// `SessionNotFound`; closed, expired, or expired-but-not-yet-persisted
    /// sessions are `SessionClosed`.
    pub async fn require_live(
        db: &DbConn,
        rotation: &RotationManager,
        session_id: i64,
        now: DateTime<Utc>,
    ) -> Result<AttendanceSession, AttendanceError> {
        let session = Entity::find_by_id(session_id)
            .one(db)
            .await?
            .ok_or(AttendanceError::SessionNotFound)?;

        if session.is_live(now) {
            return Ok(session);
        }

        Self::expire_if_due(db, rotation, &session).await?;
        Err(AttendanceError::SessionClosed)
    }

    /// Sessions for a section, newest first, optionally filtered by status.
    pub async fn list_for_section(
        db: &DbConn,
        section_id: i64,
        status: Option<SessionStatus>,
    ) -> Result<Vec<AttendanceSession>, AttendanceError> {
        let mut query = Entity::find()
            .filter(Column::SectionId.eq(section_id))
            .order_by_desc(Column::OpenedAt);
        if let Some(status) = status {
            query = query.filter(Column::Status.eq(status));
        }
        Ok(query.all(db).await?)
    }

    /// Restart recovery: resumes rotation for every still-live Active
    /// session and persists the Expired transition for the rest.
    pub async fn resume_rotations(
        db: &DbConn,
        rotation: &RotationManager,
    ) -> Result<usize, DbErr> {
        let now = Utc::now();
        let active = Entity::find()
            .filter(Column::Status.eq(SessionStatus::Active))
            .all(db)
            .await?;

        let mut resumed = 0;
        for session in active {
            if session.is_expired_at(now) {
                AttendanceSession::set_status(db, session.id, SessionStatus::Expired).await?;
            } else {
                rotation.start(session.id, rotation_interval(), session.expires_at);
                resumed += 1;
            }
        }

        tracing::info!(resumed, "resumed token rotation for live sessions");
        Ok(resumed)
    }

    /// Persists the Active -> Expired transition once the clock has passed
    /// `expires_at`, and stops any straggling rotation task.
    async fn expire_if_due(
        db: &DbConn,
        rotation: &RotationManager,
        session: &AttendanceSession,
    ) -> Result<(), AttendanceError> {
        if session.is_active() && session.is_expired_at(Utc::now()) {
            rotation.stop(session.id);
            AttendanceSession::set_status(db, session.id, SessionStatus::Expired).await?;
            tracing::info!(session_id = session.id, "attendance session expired");
        }
        Ok(())
    }
}

fn rotation_interval() -> Duration {
    Duration::from_secs(config::rotation_seconds())
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::test_utils::setup_test_db;

    fn open_params() -> OpenSession {
        OpenSession {
            section_id: 301,
            faculty_id: 9,
            center: Coordinate::new(39.0, 35.0),
            radius_m: Some(15),
            duration_minutes: 30,
        }
    }

    #[tokio::test]
    async fn open_starts_rotation_and_returns_first_token() {
        let db = setup_test_db().await;
        let rotation = RotationManager::new();

        let opened = AttendanceSessionService::open(&db, &rotation, open_params())
            .await
            .unwrap();

        assert_eq!(opened.session.status, SessionStatus::Active);
        assert!(opened.session.expires_at > opened.session.opened_at);
        assert!(rotation.is_rotating(opened.session.id));

        let (current, _) = rotation.current(opened.session.id).unwrap();
        assert_eq!(current, opened.token);

        let (polled, _) =
            AttendanceSessionService::current_token(&db, &rotation, opened.session.id)
                .await
                .unwrap();
        assert_eq!(polled, opened.token);
    }

    #[tokio::test]
    async fn open_rejects_bad_center_and_bad_radius() {
        let db = setup_test_db().await;
        let rotation = RotationManager::new();

        let mut params = open_params();
        params.center = Coordinate::new(95.0, 0.0);
        assert!(matches!(
            AttendanceSessionService::open(&db, &rotation, params).await,
            Err(AttendanceError::InvalidCoordinate { .. })
        ));

        let mut params = open_params();
        params.radius_m = Some(0);
        assert!(matches!(
            AttendanceSessionService::open(&db, &rotation, params).await,
            Err(AttendanceError::Validation(_))
        ));

        let mut params = open_params();
        params.duration_minutes = -5;
        assert!(matches!(
            AttendanceSessionService::open(&db, &rotation, params).await,
            Err(AttendanceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn close_stops_rotation_and_is_single_shot() {
        let db = setup_test_db().await;
        let rotation = RotationManager::new();
        let opened = AttendanceSessionService::open(&db, &rotation, open_params())
            .await
            .unwrap();
        let id = opened.session.id;

        let closed = AttendanceSessionService::close(&db, &rotation, id)
            .await
            .unwrap();
        assert_eq!(closed.status, SessionStatus::Closed);
        assert!(!rotation.is_rotating(id));

        // second close is an error, not a no-op
        assert!(matches!(
            AttendanceSessionService::close(&db, &rotation, id).await,
            Err(AttendanceError::InvalidState)
        ));

        // a closed session serves no token
        assert!(matches!(
            AttendanceSessionService::current_token(&db, &rotation, id).await,
            Err(AttendanceError::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn expiry_is_persisted_lazily_on_access() {
        use db::models::attendance_session::Model;

        let db = setup_test_db().await;
        let rotation = RotationManager::new();

        // duration 0 -> expires_at == opened_at, already past by access time
        let session = Model::create(&db, 301, 9, 39.0, 35.0, 15, 0).await.unwrap();
        assert_eq!(session.status, SessionStatus::Active);

        assert!(matches!(
            AttendanceSessionService::current_token(&db, &rotation, session.id).await,
            Err(AttendanceError::SessionClosed)
        ));

        let reloaded = Entity::find_by_id(session.id).one(&db).await.unwrap().unwrap();
        assert_eq!(reloaded.status, SessionStatus::Expired);
    }

    #[tokio::test]
    async fn token_polling_restarts_rotation_after_recovery() {
        let db = setup_test_db().await;
        let rotation = RotationManager::new();
        let opened = AttendanceSessionService::open(&db, &rotation, open_params())
            .await
            .unwrap();
        let id = opened.session.id;

        // simulate a process restart: rotation state is gone
        rotation.stop(id);
        assert!(!rotation.is_rotating(id));

        let (token, _) = AttendanceSessionService::current_token(&db, &rotation, id)
            .await
            .unwrap();
        assert!(rotation.is_rotating(id));
        assert_ne!(token, opened.token, "recovery mints a fresh window");
    }

    #[tokio::test]
    async fn resume_rotations_skips_expired_sessions() {
        use db::models::attendance_session::Model;

        let db = setup_test_db().await;
        let rotation = RotationManager::new();

        let live = Model::create(&db, 301, 9, 39.0, 35.0, 15, 30).await.unwrap();
        let dead = Model::create(&db, 301, 9, 39.0, 35.0, 15, 0).await.unwrap();

        let resumed = AttendanceSessionService::resume_rotations(&db, &rotation)
            .await
            .unwrap();
        assert_eq!(resumed, 1);
        assert!(rotation.is_rotating(live.id));
        assert!(!rotation.is_rotating(dead.id));

        let dead = Entity::find_by_id(dead.id).one(&db).await.unwrap().unwrap();
        assert_eq!(dead.status, SessionStatus::Expired);
    }
}

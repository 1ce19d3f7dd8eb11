//! Review workflow for flagged records.
//!
//! `PendingReview` is the only mutable state; each record can be resolved
//! exactly once, so review actions stay auditable single events. The flag
//! reason is retained after resolution for the audit trail.

use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DbConn, EntityTrait, QueryFilter};

use db::models::attendance_record::{Column, Entity, Model as AttendanceRecord, RecordStatus};

use crate::error::AttendanceError;

pub struct ReviewService;

impl ReviewService {
    /// Accepts a flagged record as attendance.
    pub async fn approve(db: &DbConn, record_id: i64) -> Result<AttendanceRecord, AttendanceError> {
        Self::resolve(db, record_id, RecordStatus::Approved).await
    }

    /// Removes the student's credit for the session; the record stays for
    /// the audit trail but no longer counts as attendance.
    pub async fn reject(db: &DbConn, record_id: i64) -> Result<AttendanceRecord, AttendanceError> {
        Self::resolve(db, record_id, RecordStatus::Rejected).await
    }

    async fn resolve(
        db: &DbConn,
        record_id: i64,
        to: RecordStatus,
    ) -> Result<AttendanceRecord, AttendanceError> {
        // Guarded update: the filter doubles as a compare-and-swap so two
        // racing reviewers cannot both resolve the same record.
        let result = Entity::update_many()
            .col_expr(Column::Status, Expr::value(to))
            .filter(Column::Id.eq(record_id))
            .filter(Column::Status.eq(RecordStatus::PendingReview))
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            return match Entity::find_by_id(record_id).one(db).await? {
                None => Err(AttendanceError::RecordNotFound),
                Some(_) => Err(AttendanceError::InvalidState),
            };
        }

        let record = Entity::find_by_id(record_id)
            .one(db)
            .await?
            .ok_or(AttendanceError::RecordNotFound)?;

        tracing::info!(record_id, status = %record.status, "attendance record resolved");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use db::models::attendance_record::Model;
    use db::models::attendance_session::Model as SessionModel;
    use db::test_utils::setup_test_db;

    async fn seed_record(db: &DbConn, student_id: i64, status: RecordStatus) -> Model {
        let session = SessionModel::create(db, 301, 9, 39.0, 35.0, 15, 30)
            .await
            .unwrap();
        Model::create(
            db,
            session.id,
            student_id,
            Utc::now(),
            40.0,
            status == RecordStatus::PendingReview,
            matches!(status, RecordStatus::PendingReview)
                .then(|| "outside geofence: 40m (limit 15m)".to_owned()),
            status,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn approve_resolves_once_and_keeps_flag_reason() {
        let db = setup_test_db().await;
        let rec = seed_record(&db, 1, RecordStatus::PendingReview).await;

        let approved = ReviewService::approve(&db, rec.id).await.unwrap();
        assert_eq!(approved.status, RecordStatus::Approved);
        assert!(approved.is_flagged);
        assert_eq!(approved.flag_reason, rec.flag_reason, "audit trail retained");

        // already resolved: an error, not a no-op
        assert!(matches!(
            ReviewService::approve(&db, rec.id).await,
            Err(AttendanceError::InvalidState)
        ));
        assert!(matches!(
            ReviewService::reject(&db, rec.id).await,
            Err(AttendanceError::InvalidState)
        ));
    }

    #[tokio::test]
    async fn reject_is_terminal() {
        let db = setup_test_db().await;
        let rec = seed_record(&db, 2, RecordStatus::PendingReview).await;

        let rejected = ReviewService::reject(&db, rec.id).await.unwrap();
        assert_eq!(rejected.status, RecordStatus::Rejected);

        assert!(matches!(
            ReviewService::approve(&db, rec.id).await,
            Err(AttendanceError::InvalidState)
        ));
    }

    #[tokio::test]
    async fn present_records_cannot_be_reviewed() {
        let db = setup_test_db().await;
        let rec = seed_record(&db, 3, RecordStatus::Present).await;

        assert!(matches!(
            ReviewService::approve(&db, rec.id).await,
            Err(AttendanceError::InvalidState)
        ));
        assert!(matches!(
            ReviewService::reject(&db, rec.id).await,
            Err(AttendanceError::InvalidState)
        ));
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let db = setup_test_db().await;
        assert!(matches!(
            ReviewService::approve(&db, 424242).await,
            Err(AttendanceError::RecordNotFound)
        ));
    }
}

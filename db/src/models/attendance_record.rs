use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::{ColumnTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// One student's presence decision for one session.
///
/// Written once by the check-in path, then only ever transitioned out of
/// `PendingReview` by the review workflow. The `(session_id, student_id)`
/// unique index enforces at most one record per student per session.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "attendance_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub session_id: i64,
    pub student_id: i64,

    /// Server clock at validation time; client timestamps are advisory only.
    pub checked_in_at: DateTime<Utc>,
    /// Distance from the session center, stored even when within radius.
    pub distance_m: f64,

    pub is_flagged: bool,
    pub flag_reason: Option<String>,
    pub status: RecordStatus,
}

/// Terminal state machine for a record.
///
/// `Present`, `Approved` and `Rejected` are terminal; `PendingReview` is
/// mutable only by the review workflow.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum RecordStatus {
    #[sea_orm(string_value = "present")]
    Present,
    #[sea_orm(string_value = "pending_review")]
    PendingReview,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::attendance_session::Entity",
        from = "Column::SessionId",
        to = "super::attendance_session::Column::Id",
        on_delete = "Cascade"
    )]
    Session,
}

impl Related<super::attendance_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        db: &DbConn,
        session_id: i64,
        student_id: i64,
        checked_in_at: DateTime<Utc>,
        distance_m: f64,
        is_flagged: bool,
        flag_reason: Option<String>,
        status: RecordStatus,
    ) -> Result<Model, DbErr> {
        let record = ActiveModel {
            session_id: Set(session_id),
            student_id: Set(student_id),
            checked_in_at: Set(checked_in_at),
            distance_m: Set(distance_m),
            is_flagged: Set(is_flagged),
            flag_reason: Set(flag_reason),
            status: Set(status),
            ..Default::default()
        };

        record.insert(db).await
    }

    pub async fn find_for(
        db: &DbConn,
        session_id: i64,
        student_id: i64,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .filter(Column::StudentId.eq(student_id))
            .one(db)
            .await
    }

    pub async fn list_for_session(db: &DbConn, session_id: i64) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .order_by_asc(Column::CheckedInAt)
            .all(db)
            .await
    }

    pub async fn count_for_session(db: &DbConn, session_id: i64) -> Result<u64, DbErr> {
        Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .count(db)
            .await
    }
}

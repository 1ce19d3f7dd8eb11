use chrono::{DateTime, Duration, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A time-boxed, geofenced attendance session opened by a faculty member.
///
/// The rotating check-in token is deliberately *not* a column here: token
/// state is an ephemeral in-memory window owned by `util::rotation` and is
/// re-derived whenever a live session is seen without one.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "attendance_sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Opaque references into the directory/enrollment collaborator.
    pub section_id: i64,
    pub faculty_id: i64,

    /// Geofence center, captured from the faculty device at open time.
    pub center_lat: f64,
    pub center_lng: f64,
    /// Geofence tolerance in meters, always positive.
    pub radius_m: i32,

    pub opened_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub expires_at: DateTime<Utc>,

    pub status: SessionStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Session lifecycle. `Active` is the only state accepting check-ins;
/// `Closed` is reached by explicit faculty action, `Expired` by the clock.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SessionStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "closed")]
    Closed,
    #[sea_orm(string_value = "expired")]
    Expired,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::attendance_record::Entity")]
    Records,
}

impl Related<super::attendance_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Records.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        db: &DbConn,
        section_id: i64,
        faculty_id: i64,
        center_lat: f64,
        center_lng: f64,
        radius_m: i32,
        duration_minutes: i32,
    ) -> Result<Model, DbErr> {
        let now = Utc::now();
        let session = ActiveModel {
            section_id: Set(section_id),
            faculty_id: Set(faculty_id),
            center_lat: Set(center_lat),
            center_lng: Set(center_lng),
            radius_m: Set(radius_m),
            opened_at: Set(now),
            duration_minutes: Set(duration_minutes),
            expires_at: Set(now + Duration::minutes(i64::from(duration_minutes))),
            status: Set(SessionStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        session.insert(db).await
    }

    pub async fn set_status(
        db: &DbConn,
        id: i64,
        status: SessionStatus,
    ) -> Result<Model, DbErr> {
        let session = ActiveModel {
            id: Set(id),
            status: Set(status),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };

        session.update(db).await
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Hard lifetime bound. An Active row past this instant is treated as
    /// already expired even before the status column catches up.
    #[inline]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// True iff the session currently accepts check-ins.
    #[inline]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && !self.is_expired_at(now)
    }
}

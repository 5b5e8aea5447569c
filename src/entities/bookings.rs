use sea_orm::entity::prelude::*;
use serde::Serialize;

use crate::domain::BookingStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Requesting user.
    pub user_id: i32,

    pub vehicle_id: i32,

    pub purpose: String,

    /// Half-open interval `[start_date, end_date)`.
    pub start_date: DateTimeUtc,

    pub end_date: DateTimeUtc,

    pub status: BookingStatus,

    pub passengers: Option<i32>,

    pub notes: Option<String>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::vehicles::Entity",
        from = "Column::VehicleId",
        to = "super::vehicles::Column::Id"
    )]
    Vehicle,

    #[sea_orm(has_many = "super::booking_approvals::Entity")]
    Approvals,
}

impl Related<super::vehicles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vehicle.def()
    }
}

impl Related<super::booking_approvals::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Approvals.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

use sea_orm::entity::prelude::*;
use serde::Serialize;

use crate::domain::VehicleStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "vehicles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub registration_no: String,

    pub vehicle_type_id: i32,

    pub location_id: i32,

    /// Cached current status. The booking workflow and maintenance
    /// service are the only writers outside manual admin overrides, and
    /// every write is a conditional update on the expected prior status.
    pub status: VehicleStatus,

    pub is_rented: bool,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::locations::Entity",
        from = "Column::LocationId",
        to = "super::locations::Column::Id"
    )]
    Location,

    #[sea_orm(
        belongs_to = "super::vehicle_types::Entity",
        from = "Column::VehicleTypeId",
        to = "super::vehicle_types::Column::Id"
    )]
    VehicleType,

    #[sea_orm(has_many = "super::bookings::Entity")]
    Bookings,

    #[sea_orm(has_many = "super::maintenance::Entity")]
    Maintenance,
}

impl Related<super::locations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Location.def()
    }
}

impl Related<super::vehicle_types::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VehicleType.def()
    }
}

impl Related<super::bookings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

impl Related<super::maintenance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Maintenance.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

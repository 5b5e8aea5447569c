use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::domain::{BookingInterval, BookingStatus, VehicleStatus};
use crate::entities::{bookings, vehicles};

/// Column values for a newly registered vehicle. New vehicles always
/// start out Available; status moves through the workflow afterwards.
#[derive(Debug, Clone)]
pub struct NewVehicle {
    pub registration_no: String,
    pub vehicle_type_id: i32,
    pub location_id: i32,
}

/// Field updates for an existing vehicle. Status is deliberately
/// absent; it only changes through the workflow or the admin override.
#[derive(Debug, Default, Clone)]
pub struct VehicleChanges {
    pub registration_no: Option<String>,
    pub vehicle_type_id: Option<i32>,
    pub location_id: Option<i32>,
    pub is_rented: Option<bool>,
}

pub struct VehicleRepository {
    conn: DatabaseConnection,
}

impl VehicleRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: i32) -> Result<Option<vehicles::Model>> {
        vehicles::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query vehicle")
    }

    pub async fn get_by_registration(&self, registration_no: &str) -> Result<Option<vehicles::Model>> {
        vehicles::Entity::find()
            .filter(vehicles::Column::RegistrationNo.eq(registration_no))
            .one(&self.conn)
            .await
            .context("Failed to query vehicle by registration")
    }

    pub async fn insert(&self, row: NewVehicle) -> Result<vehicles::Model> {
        let now = chrono::Utc::now();

        vehicles::ActiveModel {
            registration_no: Set(row.registration_no),
            vehicle_type_id: Set(row.vehicle_type_id),
            location_id: Set(row.location_id),
            status: Set(VehicleStatus::Available),
            is_rented: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert vehicle")
    }

    pub async fn update(
        &self,
        id: i32,
        changes: VehicleChanges,
    ) -> Result<Option<vehicles::Model>> {
        let Some(vehicle) = self.get(id).await? else {
            return Ok(None);
        };

        let mut active: vehicles::ActiveModel = vehicle.into();
        if let Some(registration_no) = changes.registration_no {
            active.registration_no = Set(registration_no);
        }
        if let Some(vehicle_type_id) = changes.vehicle_type_id {
            active.vehicle_type_id = Set(vehicle_type_id);
        }
        if let Some(location_id) = changes.location_id {
            active.location_id = Set(location_id);
        }
        if let Some(is_rented) = changes.is_rented {
            active.is_rented = Set(is_rented);
        }
        active.updated_at = Set(chrono::Utc::now());

        let updated = active
            .update(&self.conn)
            .await
            .context("Failed to update vehicle")?;

        Ok(Some(updated))
    }

    pub async fn list(
        &self,
        location_id: Option<i32>,
        vehicle_type_id: Option<i32>,
        status: Option<VehicleStatus>,
    ) -> Result<Vec<vehicles::Model>> {
        let mut query = vehicles::Entity::find();

        if let Some(location_id) = location_id {
            query = query.filter(vehicles::Column::LocationId.eq(location_id));
        }
        if let Some(vehicle_type_id) = vehicle_type_id {
            query = query.filter(vehicles::Column::VehicleTypeId.eq(vehicle_type_id));
        }
        if let Some(status) = status {
            query = query.filter(vehicles::Column::Status.eq(status));
        }

        query
            .order_by_asc(vehicles::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list vehicles")
    }

    /// Vehicles free for `[start, end)`: status Available and no active
    /// booking overlapping the interval. Mirrors the overlap predicate
    /// used by the workflow's conflict check.
    pub async fn find_available(
        &self,
        interval: BookingInterval,
        location_id: Option<i32>,
        vehicle_type_id: Option<i32>,
    ) -> Result<Vec<vehicles::Model>> {
        let blocked: Vec<i32> = bookings::Entity::find()
            .filter(bookings::Column::Status.is_in(BookingStatus::ACTIVE))
            .filter(bookings::Column::EndDate.gt(interval.start))
            .filter(bookings::Column::StartDate.lt(interval.end))
            .all(&self.conn)
            .await
            .context("Failed to query overlapping bookings")?
            .into_iter()
            .map(|b| b.vehicle_id)
            .collect();

        let mut query = vehicles::Entity::find()
            .filter(vehicles::Column::Status.eq(VehicleStatus::Available));

        if !blocked.is_empty() {
            query = query.filter(vehicles::Column::Id.is_not_in(blocked));
        }
        if let Some(location_id) = location_id {
            query = query.filter(vehicles::Column::LocationId.eq(location_id));
        }
        if let Some(vehicle_type_id) = vehicle_type_id {
            query = query.filter(vehicles::Column::VehicleTypeId.eq(vehicle_type_id));
        }

        query
            .order_by_asc(vehicles::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list available vehicles")
    }

    pub async fn set_status_if(
        &self,
        vehicle_id: i32,
        expected: &[VehicleStatus],
        to: VehicleStatus,
    ) -> Result<bool> {
        set_status_if(&self.conn, vehicle_id, expected, to).await
    }
}

/// Compare-and-swap on the cached vehicle status: the write only lands
/// when the row is still in one of the expected states, which is what
/// keeps concurrent create/decide/cancel calls from overwriting each
/// other. Returns false when the row was not in an expected state.
pub async fn set_status_if<C: ConnectionTrait>(
    conn: &C,
    vehicle_id: i32,
    expected: &[VehicleStatus],
    to: VehicleStatus,
) -> Result<bool> {
    let result = vehicles::Entity::update_many()
        .set(vehicles::ActiveModel {
            status: Set(to),
            updated_at: Set(chrono::Utc::now()),
            ..Default::default()
        })
        .filter(vehicles::Column::Id.eq(vehicle_id))
        .filter(vehicles::Column::Status.is_in(expected.iter().copied()))
        .exec(conn)
        .await
        .context("Failed to update vehicle status")?;

    Ok(result.rows_affected > 0)
}

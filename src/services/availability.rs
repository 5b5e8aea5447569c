//! Vehicle availability queries.
//!
//! Read-only: answers "is this vehicle free for that window" and "which
//! vehicles are free for that window". The authoritative check at
//! booking time is re-run inside the workflow transaction; results here
//! are advisory and may be stale by the time a booking is submitted.

use anyhow::Result;

use crate::db::Store;
use crate::domain::{BookingInterval, VehicleStatus};
use crate::entities::vehicles;

pub struct AvailabilityService {
    store: Store,
}

impl AvailabilityService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Whether the vehicle could take a booking for `interval` right
    /// now. Anything other than Available already means a booking would
    /// bounce, since the workflow's claim requires that exact status;
    /// the overlap check covers active bookings in other windows.
    pub async fn is_available(&self, vehicle_id: i32, interval: BookingInterval) -> Result<bool> {
        let Some(vehicle) = self.store.get_vehicle(vehicle_id).await? else {
            return Ok(false);
        };

        if vehicle.status != VehicleStatus::Available {
            return Ok(false);
        }

        let overlapping = self
            .store
            .booking_overlap_exists(vehicle_id, interval, None)
            .await?;

        Ok(!overlapping)
    }

    /// All vehicles free for `interval`, optionally narrowed by location
    /// and type. Vehicles under maintenance are excluded.
    pub async fn find_available(
        &self,
        interval: BookingInterval,
        location_id: Option<i32>,
        vehicle_type_id: Option<i32>,
    ) -> Result<Vec<vehicles::Model>> {
        self.store
            .find_available_vehicles(interval, location_id, vehicle_type_id)
            .await
    }
}

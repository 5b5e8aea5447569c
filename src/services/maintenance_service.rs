//! Maintenance windows and their effect on vehicle status.
//!
//! Opening a window takes the vehicle out of circulation; closing it
//! returns the vehicle to Available, or back to Booked when an active
//! booking still claims it.

use metrics::counter;
use sea_orm::TransactionTrait;
use tracing::info;

use crate::db::repositories::{booking, maintenance, vehicle};
use crate::db::Store;
use crate::domain::VehicleStatus;
use crate::entities::maintenance as maintenance_entity;
use crate::services::booking_workflow::WorkflowError;

pub struct MaintenanceService {
    store: Store,
}

impl MaintenanceService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Opens a maintenance window and moves the vehicle to Maintenance.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Conflict`] when the vehicle has an
    /// active booking or an open window already, and
    /// [`WorkflowError::NotFound`] for an unknown vehicle.
    pub async fn open(
        &self,
        vehicle_id: i32,
        description: String,
    ) -> Result<maintenance_entity::Model, WorkflowError> {
        self.store.get_vehicle(vehicle_id).await?.ok_or_else(|| {
            WorkflowError::NotFound(format!("Vehicle {vehicle_id} not found"))
        })?;

        let txn = self.store.conn.begin().await?;

        if booking::active_exists(&txn, vehicle_id, None).await? {
            return Err(WorkflowError::Conflict(format!(
                "Vehicle {vehicle_id} has active bookings"
            )));
        }

        if maintenance::open_exists(&txn, vehicle_id, None).await? {
            return Err(WorkflowError::Conflict(format!(
                "Vehicle {vehicle_id} already has an open maintenance window"
            )));
        }

        let moved = vehicle::set_status_if(
            &txn,
            vehicle_id,
            &[VehicleStatus::Available],
            VehicleStatus::Maintenance,
        )
        .await?;

        if !moved {
            return Err(WorkflowError::Conflict(format!(
                "Vehicle {vehicle_id} is not available for maintenance"
            )));
        }

        let record = maintenance::insert(&txn, vehicle_id, description, chrono::Utc::now()).await?;

        txn.commit().await?;

        info!(vehicle_id, maintenance_id = record.id, "Maintenance window opened");
        counter!("fleetd_maintenance_opened_total").increment(1);

        Ok(record)
    }

    /// Closes an open maintenance window and returns the vehicle to
    /// circulation. The post-close vehicle status is Booked when an
    /// active booking still claims it, Available otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidState`] when the window is
    /// already closed.
    pub async fn close(
        &self,
        maintenance_id: i32,
        cost: Option<f64>,
    ) -> Result<maintenance_entity::Model, WorkflowError> {
        let record = self
            .store
            .get_maintenance(maintenance_id)
            .await?
            .ok_or_else(|| {
                WorkflowError::NotFound(format!("Maintenance record {maintenance_id} not found"))
            })?;

        let txn = self.store.conn.begin().await?;

        let closed = maintenance::close_if_open(&txn, maintenance_id, cost).await?;
        if !closed {
            return Err(WorkflowError::InvalidState(format!(
                "Maintenance record {maintenance_id} is already closed"
            )));
        }

        // Another window on the same vehicle keeps it in Maintenance.
        if !maintenance::open_exists(&txn, record.vehicle_id, Some(maintenance_id)).await? {
            let next = if booking::active_exists(&txn, record.vehicle_id, None).await? {
                VehicleStatus::Booked
            } else {
                VehicleStatus::Available
            };

            vehicle::set_status_if(
                &txn,
                record.vehicle_id,
                &[VehicleStatus::Maintenance],
                next,
            )
            .await?;
        }

        txn.commit().await?;

        info!(
            vehicle_id = record.vehicle_id,
            maintenance_id, "Maintenance window closed"
        );
        counter!("fleetd_maintenance_closed_total").increment(1);

        let record = maintenance::get(&self.store.conn, maintenance_id)
            .await?
            .ok_or_else(|| {
                WorkflowError::NotFound(format!("Maintenance record {maintenance_id} not found"))
            })?;

        Ok(record)
    }
}

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::CurrentUser;
use super::{ApiError, ApiResponse, AppState, VehicleDto};
use crate::db::{NewVehicle, VehicleChanges};
use crate::domain::{BookingInterval, VehicleStatus};

#[derive(Deserialize)]
pub struct ListVehiclesQuery {
    pub location_id: Option<i32>,
    pub vehicle_type_id: Option<i32>,
    pub status: Option<VehicleStatus>,
}

#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub location_id: Option<i32>,
    pub vehicle_type_id: Option<i32>,
}

#[derive(Deserialize)]
pub struct SetStatusRequest {
    pub status: VehicleStatus,
}

#[derive(Deserialize)]
pub struct CreateVehicleRequest {
    pub registration_no: String,
    pub vehicle_type_id: i32,
    pub location_id: i32,
}

#[derive(Deserialize)]
pub struct UpdateVehicleRequest {
    pub registration_no: Option<String>,
    pub vehicle_type_id: Option<i32>,
    pub location_id: Option<i32>,
    pub is_rented: Option<bool>,
}

#[derive(Serialize)]
pub struct AvailabilityDto {
    pub vehicle_id: i32,
    pub available: bool,
}

/// GET /vehicles
pub async fn list_vehicles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListVehiclesQuery>,
) -> Result<Json<ApiResponse<Vec<VehicleDto>>>, ApiError> {
    let vehicles = state
        .store()
        .list_vehicles(query.location_id, query.vehicle_type_id, query.status)
        .await?;

    Ok(Json(ApiResponse::success(
        vehicles.into_iter().map(Into::into).collect(),
    )))
}

/// GET /vehicles/{id}
pub async fn get_vehicle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<VehicleDto>>, ApiError> {
    let vehicle = state
        .store()
        .get_vehicle(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Vehicle", id))?;

    Ok(Json(ApiResponse::success(vehicle.into())))
}

/// POST /vehicles
///
/// Registers a vehicle in the fleet. New vehicles start Available.
pub async fn create_vehicle(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<CreateVehicleRequest>,
) -> Result<Json<ApiResponse<VehicleDto>>, ApiError> {
    if !current.is_admin() {
        return Err(ApiError::Forbidden(
            "Only administrators may register vehicles".to_string(),
        ));
    }

    let registration_no = payload.registration_no.trim().to_string();
    if registration_no.is_empty() {
        return Err(ApiError::validation("registration_no is required"));
    }

    if state
        .store()
        .get_vehicle_by_registration(&registration_no)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(format!(
            "Vehicle {registration_no} is already registered"
        )));
    }

    let vehicle = state
        .store()
        .create_vehicle(NewVehicle {
            registration_no,
            vehicle_type_id: payload.vehicle_type_id,
            location_id: payload.location_id,
        })
        .await?;

    tracing::info!(
        vehicle_id = vehicle.id,
        registration_no = %vehicle.registration_no,
        "Vehicle registered"
    );

    Ok(Json(ApiResponse::success(vehicle.into())))
}

/// PUT /vehicles/{id}
///
/// Edits a vehicle's registration, type, location or rental flag. Status
/// is not touched here; it has its own override endpoint.
pub async fn update_vehicle(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateVehicleRequest>,
) -> Result<Json<ApiResponse<VehicleDto>>, ApiError> {
    if !current.is_admin() {
        return Err(ApiError::Forbidden(
            "Only administrators may edit vehicles".to_string(),
        ));
    }

    let registration_no = match payload.registration_no {
        Some(raw) => {
            let trimmed = raw.trim().to_string();
            if trimmed.is_empty() {
                return Err(ApiError::validation("registration_no must not be blank"));
            }
            let existing = state.store().get_vehicle_by_registration(&trimmed).await?;
            if existing.is_some_and(|v| v.id != id) {
                return Err(ApiError::Conflict(format!(
                    "Vehicle {trimmed} is already registered"
                )));
            }
            Some(trimmed)
        }
        None => None,
    };

    let vehicle = state
        .store()
        .update_vehicle(
            id,
            VehicleChanges {
                registration_no,
                vehicle_type_id: payload.vehicle_type_id,
                location_id: payload.location_id,
                is_rented: payload.is_rented,
            },
        )
        .await?
        .ok_or_else(|| ApiError::not_found("Vehicle", id))?;

    Ok(Json(ApiResponse::success(vehicle.into())))
}

/// GET /vehicles/available
pub async fn find_available(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<ApiResponse<Vec<VehicleDto>>>, ApiError> {
    let interval = BookingInterval::new(query.start_date, query.end_date)
        .map_err(|_| ApiError::validation("start_date must be before end_date"))?;

    let vehicles = state
        .availability()
        .find_available(interval, query.location_id, query.vehicle_type_id)
        .await?;

    Ok(Json(ApiResponse::success(
        vehicles.into_iter().map(Into::into).collect(),
    )))
}

/// GET /vehicles/{id}/availability
///
/// Advisory check for one vehicle and window; the workflow re-runs the
/// authoritative version inside the booking transaction.
pub async fn check_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<ApiResponse<AvailabilityDto>>, ApiError> {
    let interval = BookingInterval::new(query.start_date, query.end_date)
        .map_err(|_| ApiError::validation("start_date must be before end_date"))?;

    state
        .store()
        .get_vehicle(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Vehicle", id))?;

    let available = state.availability().is_available(id, interval).await?;

    Ok(Json(ApiResponse::success(AvailabilityDto {
        vehicle_id: id,
        available,
    })))
}

/// PUT /vehicles/{id}/status
///
/// Administrative override; bypasses the workflow transitions.
pub async fn set_status(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<SetStatusRequest>,
) -> Result<Json<ApiResponse<VehicleDto>>, ApiError> {
    if !current.is_admin() {
        return Err(ApiError::Forbidden(
            "Only administrators may override vehicle status".to_string(),
        ));
    }

    let changed = state
        .store()
        .set_vehicle_status_if(
            id,
            &[
                VehicleStatus::Available,
                VehicleStatus::Booked,
                VehicleStatus::Maintenance,
            ],
            payload.status,
        )
        .await?;

    if !changed {
        return Err(ApiError::not_found("Vehicle", id));
    }

    let vehicle = state
        .store()
        .get_vehicle(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Vehicle", id))?;

    tracing::info!(vehicle_id = id, status = ?vehicle.status, "Vehicle status overridden");

    Ok(Json(ApiResponse::success(vehicle.into())))
}

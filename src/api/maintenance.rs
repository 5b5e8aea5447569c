use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::{ApiError, ApiResponse, AppState, MaintenanceDto};

#[derive(Deserialize)]
pub struct ListMaintenanceQuery {
    pub vehicle_id: Option<i32>,
}

#[derive(Deserialize)]
pub struct OpenMaintenanceRequest {
    pub vehicle_id: i32,
    pub description: String,
}

#[derive(Deserialize)]
pub struct CloseMaintenanceRequest {
    pub cost: Option<f64>,
}

/// GET /maintenance
pub async fn list_maintenance(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListMaintenanceQuery>,
) -> Result<Json<ApiResponse<Vec<MaintenanceDto>>>, ApiError> {
    let records = state.store().list_maintenance(query.vehicle_id).await?;

    Ok(Json(ApiResponse::success(
        records.into_iter().map(Into::into).collect(),
    )))
}

/// POST /maintenance
pub async fn open_maintenance(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<OpenMaintenanceRequest>,
) -> Result<Json<ApiResponse<MaintenanceDto>>, ApiError> {
    if !current.is_admin() {
        return Err(ApiError::Forbidden(
            "Only administrators may open maintenance windows".to_string(),
        ));
    }
    if payload.description.trim().is_empty() {
        return Err(ApiError::validation("Description is required"));
    }

    let record = state
        .maintenance()
        .open(payload.vehicle_id, payload.description)
        .await?;

    Ok(Json(ApiResponse::success(record.into())))
}

/// POST /maintenance/{id}/close
pub async fn close_maintenance(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<CloseMaintenanceRequest>,
) -> Result<Json<ApiResponse<MaintenanceDto>>, ApiError> {
    if !current.is_admin() {
        return Err(ApiError::Forbidden(
            "Only administrators may close maintenance windows".to_string(),
        ));
    }

    let record = state.maintenance().close(id, payload.cost).await?;

    Ok(Json(ApiResponse::success(record.into())))
}

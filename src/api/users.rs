use axum::{Extension, Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::{ApiError, ApiResponse, AppState};
use crate::domain::Role;

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub department: Option<String>,
    pub supervisor_id: Option<i32>,
}

/// GET /users
///
/// Directory listing for administrators, mainly to put names to the
/// approver ids on a booking.
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<UserDto>>>, ApiError> {
    if !current.is_admin() {
        return Err(ApiError::Forbidden(
            "Only administrators may list users".to_string(),
        ));
    }

    let users = state.store().list_users().await?;

    Ok(Json(ApiResponse::success(
        users
            .into_iter()
            .map(|u| UserDto {
                id: u.id,
                name: u.name,
                email: u.email,
                role: u.role,
                department: u.department,
                supervisor_id: u.supervisor_id,
            })
            .collect(),
    )))
}

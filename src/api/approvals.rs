use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::{ApiError, ApiResponse, AppState, ApprovalDto};

#[derive(Deserialize)]
pub struct ListApprovalsQuery {
    #[serde(default)]
    pub pending_only: bool,
}

/// GET /approvals
///
/// Administrators see every assignment; everyone else their own queue.
/// `pending_only` narrows either view to undecided assignments.
pub async fn list_approvals(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<ListApprovalsQuery>,
) -> Result<Json<ApiResponse<Vec<ApprovalDto>>>, ApiError> {
    let approvals = if current.is_admin() {
        state.store().list_all_approvals(query.pending_only).await?
    } else {
        state
            .store()
            .list_approvals_for_approver(current.id, query.pending_only)
            .await?
    };

    Ok(Json(ApiResponse::success(
        approvals.into_iter().map(Into::into).collect(),
    )))
}

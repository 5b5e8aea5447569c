use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::{ApiError, ApiResponse, AppState, BookingDetailDto, BookingDto};
use crate::db::BookingListFilter;
use crate::domain::{BookingInterval, BookingStatus, Decision};
use crate::services::{BookingChanges, CreateBooking};

#[derive(Deserialize)]
pub struct ListBookingsQuery {
    pub status: Option<BookingStatus>,
    pub vehicle_id: Option<i32>,
    pub user_id: Option<i32>,
}

#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub vehicle_id: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub purpose: String,
    pub passengers: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateBookingRequest {
    pub vehicle_id: Option<i32>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub purpose: Option<String>,
    pub passengers: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct DecisionRequest {
    pub comments: Option<String>,
}

fn parse_interval(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<BookingInterval, ApiError> {
    BookingInterval::new(start, end)
        .map_err(|_| ApiError::validation("start_date must be before end_date"))
}

/// GET /bookings
///
/// Administrators see everything; everyone else only their own bookings
/// and the ones assigned to them for approval.
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<ApiResponse<Vec<BookingDto>>>, ApiError> {
    let filter = BookingListFilter {
        status: query.status,
        vehicle_id: query.vehicle_id,
        user_id: query.user_id,
        visible_to: if current.is_admin() {
            None
        } else {
            Some(current.id)
        },
    };

    let bookings = state.store().list_bookings(&filter).await?;

    Ok(Json(ApiResponse::success(
        bookings.into_iter().map(Into::into).collect(),
    )))
}

/// POST /bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<CreateBookingRequest>,
) -> Result<Json<ApiResponse<BookingDetailDto>>, ApiError> {
    if payload.purpose.trim().is_empty() {
        return Err(ApiError::validation("Purpose is required"));
    }

    let interval = parse_interval(payload.start_date, payload.end_date)?;

    let aggregate = state
        .workflow()
        .create(CreateBooking {
            requester_id: current.id,
            vehicle_id: payload.vehicle_id,
            interval,
            purpose: payload.purpose,
            passengers: payload.passengers,
            notes: payload.notes,
        })
        .await?;

    Ok(Json(ApiResponse::success(aggregate.into())))
}

/// GET /bookings/{id}
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<BookingDetailDto>>, ApiError> {
    let (booking, approvals) = state
        .store()
        .get_booking_with_approvals(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Booking", id))?;

    let assigned = approvals.iter().any(|a| a.approver_id == current.id);
    if !current.is_admin() && booking.user_id != current.id && !assigned {
        return Err(ApiError::Forbidden(
            "Not allowed to view this booking".to_string(),
        ));
    }

    Ok(Json(ApiResponse::success(BookingDetailDto {
        booking: booking.into(),
        approvals: approvals.into_iter().map(Into::into).collect(),
    })))
}

/// PUT /bookings/{id}
pub async fn update_booking(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateBookingRequest>,
) -> Result<Json<ApiResponse<BookingDetailDto>>, ApiError> {
    let interval = match (payload.start_date, payload.end_date) {
        (Some(start), Some(end)) => Some(parse_interval(start, end)?),
        (None, None) => None,
        _ => {
            return Err(ApiError::validation(
                "start_date and end_date must be changed together",
            ));
        }
    };

    let aggregate = state
        .workflow()
        .update(
            id,
            current.id,
            BookingChanges {
                vehicle_id: payload.vehicle_id,
                interval,
                purpose: payload.purpose,
                passengers: payload.passengers,
                notes: payload.notes,
            },
        )
        .await?;

    Ok(Json(ApiResponse::success(aggregate.into())))
}

/// POST /bookings/{id}/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<BookingDetailDto>>, ApiError> {
    let aggregate = state.workflow().cancel(id, current.id).await?;
    Ok(Json(ApiResponse::success(aggregate.into())))
}

/// POST /bookings/{id}/complete
pub async fn complete_booking(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<BookingDetailDto>>, ApiError> {
    let aggregate = state.workflow().complete(id, current.id).await?;
    Ok(Json(ApiResponse::success(aggregate.into())))
}

/// POST /approvals/{id}/approve
pub async fn approve(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<DecisionRequest>,
) -> Result<Json<ApiResponse<BookingDetailDto>>, ApiError> {
    let aggregate = state
        .workflow()
        .decide(id, Decision::Approve, current.id, payload.comments)
        .await?;

    Ok(Json(ApiResponse::success(aggregate.into())))
}

/// POST /approvals/{id}/reject
pub async fn reject(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<DecisionRequest>,
) -> Result<Json<ApiResponse<BookingDetailDto>>, ApiError> {
    let aggregate = state
        .workflow()
        .decide(id, Decision::Reject, current.id, payload.comments)
        .await?;

    Ok(Json(ApiResponse::success(aggregate.into())))
}

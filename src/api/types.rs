use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{ApprovalStatus, BookingStatus, VehicleStatus};
use crate::entities::{booking_approvals, bookings, maintenance, vehicles};
use crate::services::BookingAggregate;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BookingDto {
    pub id: i32,
    pub user_id: i32,
    pub vehicle_id: i32,
    pub purpose: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: BookingStatus,
    pub passengers: Option<i32>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<bookings::Model> for BookingDto {
    fn from(m: bookings::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            vehicle_id: m.vehicle_id,
            purpose: m.purpose,
            start_date: m.start_date,
            end_date: m.end_date,
            status: m.status,
            passengers: m.passengers,
            notes: m.notes,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApprovalDto {
    pub id: i32,
    pub booking_id: i32,
    pub approver_id: i32,
    pub level: i32,
    pub status: ApprovalStatus,
    pub comments: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<booking_approvals::Model> for ApprovalDto {
    fn from(m: booking_approvals::Model) -> Self {
        Self {
            id: m.id,
            booking_id: m.booking_id,
            approver_id: m.approver_id,
            level: m.level,
            status: m.status,
            comments: m.comments,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BookingDetailDto {
    #[serde(flatten)]
    pub booking: BookingDto,
    pub approvals: Vec<ApprovalDto>,
}

impl From<BookingAggregate> for BookingDetailDto {
    fn from(aggregate: BookingAggregate) -> Self {
        Self {
            booking: aggregate.booking.into(),
            approvals: aggregate.approvals.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VehicleDto {
    pub id: i32,
    pub registration_no: String,
    pub vehicle_type_id: i32,
    pub location_id: i32,
    pub status: VehicleStatus,
    pub is_rented: bool,
}

impl From<vehicles::Model> for VehicleDto {
    fn from(m: vehicles::Model) -> Self {
        Self {
            id: m.id,
            registration_no: m.registration_no,
            vehicle_type_id: m.vehicle_type_id,
            location_id: m.location_id,
            status: m.status,
            is_rented: m.is_rented,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MaintenanceDto {
    pub id: i32,
    pub vehicle_id: i32,
    pub description: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cost: Option<f64>,
}

impl From<maintenance::Model> for MaintenanceDto {
    fn from(m: maintenance::Model) -> Self {
        Self {
            id: m.id,
            vehicle_id: m.vehicle_id,
            description: m.description,
            started_at: m.started_at,
            completed_at: m.completed_at,
            cost: m.cost,
        }
    }
}

//! Booking lifecycle state machine: contract and error taxonomy.
//!
//! States: `Pending -> {Approved, Rejected, Cancelled}` and
//! `Approved -> {Completed, Cancelled}`. All guard failures surface as
//! typed errors; nothing is retried internally.

use serde::Serialize;
use thiserror::Error;

use crate::domain::{BookingInterval, Decision};
use crate::entities::{booking_approvals, bookings};

/// Errors surfaced by workflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Vehicle unavailable for the requested interval.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Operation not legal in the current status, including a second
    /// decision on the same approval.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Actor lacks permission for the action.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Referenced booking/approval/vehicle/user absent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Persistence-layer failure, opaque cause.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<sea_orm::DbErr> for WorkflowError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<anyhow::Error> for WorkflowError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<sea_orm::TransactionError<Self>> for WorkflowError {
    fn from(err: sea_orm::TransactionError<Self>) -> Self {
        match err {
            sea_orm::TransactionError::Connection(e) => Self::from(e),
            sea_orm::TransactionError::Transaction(e) => e,
        }
    }
}

/// Inputs for a new booking.
#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub requester_id: i32,
    pub vehicle_id: i32,
    pub interval: BookingInterval,
    pub purpose: String,
    pub passengers: Option<i32>,
    pub notes: Option<String>,
}

/// Partial update of a Pending booking; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct BookingChanges {
    pub vehicle_id: Option<i32>,
    pub interval: Option<BookingInterval>,
    pub purpose: Option<String>,
    pub passengers: Option<i32>,
    pub notes: Option<String>,
}

/// A booking with its full approval set, as returned by every operation.
#[derive(Debug, Clone, Serialize)]
pub struct BookingAggregate {
    pub booking: bookings::Model,
    pub approvals: Vec<booking_approvals::Model>,
}

/// The booking lifecycle state machine.
///
/// Implementations must make the availability check plus booking and
/// approval-chain insert one atomicity unit, and serialize concurrent
/// decisions on the same approval so exactly one succeeds.
#[async_trait::async_trait]
pub trait BookingWorkflow: Send + Sync {
    /// Creates a Pending booking with its approval chain, or
    /// auto-approves when no approver exists.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Conflict`] when the vehicle is not free
    /// for the interval.
    async fn create(&self, input: CreateBooking) -> Result<BookingAggregate, WorkflowError>;

    /// Applies an approve/reject decision to one approval assignment.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidState`] on a second decision for
    /// the same approval (idempotency guard), [`WorkflowError::Forbidden`]
    /// when the actor is neither the assigned approver nor an
    /// Administrator.
    async fn decide(
        &self,
        approval_id: i32,
        decision: Decision,
        actor_id: i32,
        comments: Option<String>,
    ) -> Result<BookingAggregate, WorkflowError>;

    /// Cancels a booking; requesters may cancel their own Pending or
    /// Approved bookings, Administrators any booking.
    async fn cancel(&self, booking_id: i32, actor_id: i32)
        -> Result<BookingAggregate, WorkflowError>;

    /// Force-completes a booking (no prior-status guard) and releases
    /// the vehicle.
    async fn complete(
        &self,
        booking_id: i32,
        actor_id: i32,
    ) -> Result<BookingAggregate, WorkflowError>;

    /// Updates a Pending booking; a vehicle change rebuilds the whole
    /// approval chain and resynchronizes both vehicle statuses.
    async fn update(
        &self,
        booking_id: i32,
        actor_id: i32,
        changes: BookingChanges,
    ) -> Result<BookingAggregate, WorkflowError>;
}

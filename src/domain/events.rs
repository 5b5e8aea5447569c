//! Domain events emitted by the booking workflow.
//!
//! Events are published on a broadcast channel after the corresponding
//! state change has been committed. Delivery is fire-and-forget: a slow or
//! absent consumer can never roll back or block a workflow transition, and
//! at-least-once (or zero) delivery is acceptable for notifications.

use serde::Serialize;

/// Post-commit notifications for booking lifecycle transitions.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum NotificationEvent {
    /// A booking entered the approval workflow. Fans out to every
    /// approver in the chain.
    BookingCreated {
        booking_id: i32,
        requester_id: i32,
        vehicle_id: i32,
        approver_ids: Vec<i32>,
    },

    /// All approval levels cleared (or the chain was empty and the
    /// booking auto-approved).
    BookingApproved {
        booking_id: i32,
        requester_id: i32,
    },

    /// An approver rejected the booking; remaining levels are moot.
    BookingRejected {
        booking_id: i32,
        requester_id: i32,
        approval_id: i32,
    },
}

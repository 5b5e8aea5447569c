//! Core domain types shared across entities, services and the API layer.
//!
//! Statuses are closed enumerations persisted as strings (sea-orm
//! `ActiveEnum`), so an unknown status in the database is a decode error
//! rather than a silently accepted value.

pub mod events;

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Organizational role of a user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum Role {
    #[sea_orm(string_value = "Administrator")]
    Administrator,
    #[sea_orm(string_value = "Approver")]
    Approver,
    #[sea_orm(string_value = "User")]
    User,
}

impl Role {
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Administrator)
    }
}

/// Current status of a vehicle. A single mutable field, kept in sync with
/// active bookings and maintenance by the workflow; every write goes
/// through a conditional update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum VehicleStatus {
    #[sea_orm(string_value = "Available")]
    Available,
    #[sea_orm(string_value = "Booked")]
    Booked,
    #[sea_orm(string_value = "Maintenance")]
    Maintenance,
}

/// Lifecycle status of a booking.
///
/// Transitions: `Pending -> {Approved, Rejected, Cancelled}` and
/// `Approved -> {Completed, Cancelled}`. Rejected, Completed and Cancelled
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum BookingStatus {
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Approved")]
    Approved,
    #[sea_orm(string_value = "Rejected")]
    Rejected,
    #[sea_orm(string_value = "Completed")]
    Completed,
    #[sea_orm(string_value = "Cancelled")]
    Cancelled,
}

impl BookingStatus {
    /// Statuses that provisionally or definitively hold a vehicle. A
    /// Pending booking already blocks the vehicle; there is no waitlist.
    pub const ACTIVE: [Self; 2] = [Self::Pending, Self::Approved];

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Completed | Self::Cancelled)
    }
}

/// Status of a single approval assignment, independent per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ApprovalStatus {
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Approved")]
    Approved,
    #[sea_orm(string_value = "Rejected")]
    Rejected,
}

/// Outcome requested by an approver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Approve,
    Reject,
}

/// Half-open time interval `[start, end)` of a booking or maintenance
/// window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BookingInterval {
    /// Builds an interval, rejecting empty or inverted ranges.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> anyhow::Result<Self> {
        anyhow::ensure!(start < end, "interval start must precede end");
        Ok(Self { start, end })
    }

    /// True when two half-open intervals share any instant. Touching
    /// intervals (`a.end == b.start`) do not conflict.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        !(other.end <= self.start || other.start >= self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, h, 0, 0).unwrap()
    }

    fn iv(s: u32, e: u32) -> BookingInterval {
        BookingInterval::new(at(s), at(e)).unwrap()
    }

    #[test]
    fn rejects_inverted_interval() {
        assert!(BookingInterval::new(at(10), at(9)).is_err());
        assert!(BookingInterval::new(at(10), at(10)).is_err());
    }

    #[test]
    fn overlap_covers_all_crossings() {
        let base = iv(10, 14);
        // contained, containing, crossing either edge, identical
        assert!(base.overlaps(&iv(11, 12)));
        assert!(base.overlaps(&iv(9, 15)));
        assert!(base.overlaps(&iv(9, 11)));
        assert!(base.overlaps(&iv(13, 16)));
        assert!(base.overlaps(&iv(10, 14)));
    }

    #[test]
    fn touching_intervals_do_not_conflict() {
        let base = iv(10, 14);
        assert!(!base.overlaps(&iv(8, 10)));
        assert!(!base.overlaps(&iv(14, 16)));
    }

    #[test]
    fn terminal_statuses() {
        assert!(BookingStatus::Rejected.is_terminal());
        assert!(BookingStatus::Completed.is_terminal());
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(!BookingStatus::Pending.is_terminal());
        assert!(!BookingStatus::Approved.is_terminal());
    }
}

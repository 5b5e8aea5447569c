use anyhow::{Context, Result};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};

use crate::domain::{BookingInterval, BookingStatus};
use crate::entities::{booking_approvals, bookings};

/// Listing filter; `visible_to` scopes results to rows the given
/// non-admin user may see (own bookings or ones they approve).
#[derive(Debug, Default, Clone)]
pub struct BookingListFilter {
    pub status: Option<BookingStatus>,
    pub vehicle_id: Option<i32>,
    pub user_id: Option<i32>,
    pub visible_to: Option<i32>,
}

/// Column values for a new booking row.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: i32,
    pub vehicle_id: i32,
    pub purpose: String,
    pub interval: BookingInterval,
    pub status: BookingStatus,
    pub passengers: Option<i32>,
    pub notes: Option<String>,
}

pub struct BookingRepository {
    conn: DatabaseConnection,
}

impl BookingRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: i32) -> Result<Option<bookings::Model>> {
        bookings::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query booking")
    }

    pub async fn get_with_approvals(
        &self,
        id: i32,
    ) -> Result<Option<(bookings::Model, Vec<booking_approvals::Model>)>> {
        let Some(booking) = self.get(id).await? else {
            return Ok(None);
        };

        let approvals = booking_approvals::Entity::find()
            .filter(booking_approvals::Column::BookingId.eq(id))
            .order_by_asc(booking_approvals::Column::Level)
            .all(&self.conn)
            .await
            .context("Failed to query booking approvals")?;

        Ok(Some((booking, approvals)))
    }

    pub async fn list(&self, filter: &BookingListFilter) -> Result<Vec<bookings::Model>> {
        let mut query = bookings::Entity::find();

        if let Some(status) = filter.status {
            query = query.filter(bookings::Column::Status.eq(status));
        }
        if let Some(vehicle_id) = filter.vehicle_id {
            query = query.filter(bookings::Column::VehicleId.eq(vehicle_id));
        }
        if let Some(user_id) = filter.user_id {
            query = query.filter(bookings::Column::UserId.eq(user_id));
        }

        if let Some(viewer) = filter.visible_to {
            let assigned: Vec<i32> = booking_approvals::Entity::find()
                .filter(booking_approvals::Column::ApproverId.eq(viewer))
                .all(&self.conn)
                .await
                .context("Failed to query approval assignments")?
                .into_iter()
                .map(|a| a.booking_id)
                .collect();

            query = query.filter(
                Condition::any()
                    .add(bookings::Column::UserId.eq(viewer))
                    .add(bookings::Column::Id.is_in(assigned)),
            );
        }

        query
            .order_by_desc(bookings::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list bookings")
    }
}

/// Any booking in an active status (Pending or Approved) overlapping
/// `[start, end)` on the vehicle. Two half-open intervals overlap when
/// neither ends before the other starts.
pub async fn overlap_exists<C: ConnectionTrait>(
    conn: &C,
    vehicle_id: i32,
    interval: BookingInterval,
    exclude_booking: Option<i32>,
) -> Result<bool> {
    let mut query = bookings::Entity::find()
        .filter(bookings::Column::VehicleId.eq(vehicle_id))
        .filter(bookings::Column::Status.is_in(BookingStatus::ACTIVE))
        .filter(bookings::Column::EndDate.gt(interval.start))
        .filter(bookings::Column::StartDate.lt(interval.end));

    if let Some(id) = exclude_booking {
        query = query.filter(bookings::Column::Id.ne(id));
    }

    let count = query
        .count(conn)
        .await
        .context("Failed to count overlapping bookings")?;

    Ok(count > 0)
}

/// Any active booking on the vehicle at all, used before releasing a
/// vehicle back to Available.
pub async fn active_exists<C: ConnectionTrait>(
    conn: &C,
    vehicle_id: i32,
    exclude_booking: Option<i32>,
) -> Result<bool> {
    let mut query = bookings::Entity::find()
        .filter(bookings::Column::VehicleId.eq(vehicle_id))
        .filter(bookings::Column::Status.is_in(BookingStatus::ACTIVE));

    if let Some(id) = exclude_booking {
        query = query.filter(bookings::Column::Id.ne(id));
    }

    let count = query
        .count(conn)
        .await
        .context("Failed to count active bookings")?;

    Ok(count > 0)
}

pub async fn insert<C: ConnectionTrait>(conn: &C, row: NewBooking) -> Result<bookings::Model> {
    let now = chrono::Utc::now();

    let insert = bookings::Entity::insert(bookings::ActiveModel {
        user_id: Set(row.user_id),
        vehicle_id: Set(row.vehicle_id),
        purpose: Set(row.purpose),
        start_date: Set(row.interval.start),
        end_date: Set(row.interval.end),
        status: Set(row.status),
        passengers: Set(row.passengers),
        notes: Set(row.notes),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    })
    .exec(conn)
    .await
    .context("Failed to insert booking")?;

    bookings::Entity::find_by_id(insert.last_insert_id)
        .one(conn)
        .await
        .context("Failed to re-read inserted booking")?
        .ok_or_else(|| anyhow::anyhow!("Inserted booking vanished"))
}

/// Conditional status transition; returns false when the row is no
/// longer in one of the expected states (lost the race or already
/// transitioned).
pub async fn set_status_if<C: ConnectionTrait>(
    conn: &C,
    booking_id: i32,
    expected: &[BookingStatus],
    to: BookingStatus,
) -> Result<bool> {
    let result = bookings::Entity::update_many()
        .set(bookings::ActiveModel {
            status: Set(to),
            updated_at: Set(chrono::Utc::now()),
            ..Default::default()
        })
        .filter(bookings::Column::Id.eq(booking_id))
        .filter(bookings::Column::Status.is_in(expected.iter().copied()))
        .exec(conn)
        .await
        .context("Failed to update booking status")?;

    Ok(result.rows_affected > 0)
}

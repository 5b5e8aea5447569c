use anyhow::{Context, Result};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::domain::ApprovalStatus;
use crate::entities::booking_approvals;
use crate::services::approval_chain::ChainAssignment;

pub struct ApprovalRepository {
    conn: DatabaseConnection,
}

impl ApprovalRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: i32) -> Result<Option<booking_approvals::Model>> {
        booking_approvals::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query approval")
    }

    pub async fn list_for_approver(
        &self,
        approver_id: i32,
        only_pending: bool,
    ) -> Result<Vec<booking_approvals::Model>> {
        let mut query = booking_approvals::Entity::find()
            .filter(booking_approvals::Column::ApproverId.eq(approver_id));

        if only_pending {
            query = query.filter(booking_approvals::Column::Status.eq(ApprovalStatus::Pending));
        }

        query
            .order_by_desc(booking_approvals::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list approvals for approver")
    }

    pub async fn list_all(&self, only_pending: bool) -> Result<Vec<booking_approvals::Model>> {
        let mut query = booking_approvals::Entity::find();

        if only_pending {
            query = query.filter(booking_approvals::Column::Status.eq(ApprovalStatus::Pending));
        }

        query
            .order_by_desc(booking_approvals::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list approvals")
    }
}

/// Persist a whole approval chain for a booking. Always called inside the
/// transaction that created (or re-targeted) the booking, so a partial
/// chain can never be observed.
pub async fn insert_chain<C: ConnectionTrait>(
    conn: &C,
    booking_id: i32,
    chain: &[ChainAssignment],
) -> Result<()> {
    if chain.is_empty() {
        return Ok(());
    }

    let now = chrono::Utc::now();
    let rows: Vec<booking_approvals::ActiveModel> = chain
        .iter()
        .map(|assignment| booking_approvals::ActiveModel {
            booking_id: Set(booking_id),
            approver_id: Set(assignment.approver_id),
            level: Set(assignment.level),
            status: Set(ApprovalStatus::Pending),
            comments: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        })
        .collect();

    booking_approvals::Entity::insert_many(rows)
        .exec(conn)
        .await
        .context("Failed to insert approval chain")?;

    Ok(())
}

pub async fn delete_for_booking<C: ConnectionTrait>(conn: &C, booking_id: i32) -> Result<()> {
    booking_approvals::Entity::delete_many()
        .filter(booking_approvals::Column::BookingId.eq(booking_id))
        .exec(conn)
        .await
        .context("Failed to delete approvals for booking")?;

    Ok(())
}

/// Atomic conditional decision: flips a Pending approval to the given
/// outcome. Exactly one of two racing decide calls observes Pending; the
/// loser gets false and must surface InvalidState.
pub async fn decide_if_pending<C: ConnectionTrait>(
    conn: &C,
    approval_id: i32,
    to: ApprovalStatus,
    comments: Option<String>,
) -> Result<bool> {
    let result = booking_approvals::Entity::update_many()
        .set(booking_approvals::ActiveModel {
            status: Set(to),
            comments: Set(comments),
            updated_at: Set(chrono::Utc::now()),
            ..Default::default()
        })
        .filter(booking_approvals::Column::Id.eq(approval_id))
        .filter(booking_approvals::Column::Status.eq(ApprovalStatus::Pending))
        .exec(conn)
        .await
        .context("Failed to update approval status")?;

    Ok(result.rows_affected > 0)
}

/// Remaining Pending approvals for the booking; zero means the last
/// level just cleared.
pub async fn pending_count<C: ConnectionTrait>(conn: &C, booking_id: i32) -> Result<u64> {
    booking_approvals::Entity::find()
        .filter(booking_approvals::Column::BookingId.eq(booking_id))
        .filter(booking_approvals::Column::Status.eq(ApprovalStatus::Pending))
        .count(conn)
        .await
        .context("Failed to count pending approvals")
}

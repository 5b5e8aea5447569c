//! `SeaORM` implementation of the [`BookingWorkflow`] trait.
//!
//! Every multi-step transition runs inside one transaction so the
//! availability check, booking row and approval chain commit or roll
//! back together. Vehicle status writes are conditional updates; the
//! compare-and-swap inside the create transaction is what stops two
//! overlapping create calls from both succeeding.

use async_trait::async_trait;
use metrics::counter;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::db::repositories::{approval, booking, maintenance, vehicle};
use crate::db::{NewBooking, Store};
use crate::domain::events::NotificationEvent;
use crate::domain::{ApprovalStatus, BookingStatus, Decision, Role, VehicleStatus};
use crate::entities::bookings;
use crate::services::approval_chain::ApprovalChainBuilder;
use crate::services::booking_workflow::{
    BookingAggregate, BookingChanges, BookingWorkflow, CreateBooking, WorkflowError,
};

pub struct SeaOrmBookingWorkflow {
    store: Store,
    chain_builder: ApprovalChainBuilder,
    events: broadcast::Sender<NotificationEvent>,
}

impl SeaOrmBookingWorkflow {
    #[must_use]
    pub const fn new(
        store: Store,
        chain_builder: ApprovalChainBuilder,
        events: broadcast::Sender<NotificationEvent>,
    ) -> Self {
        Self {
            store,
            chain_builder,
            events,
        }
    }

    async fn load_aggregate(&self, booking_id: i32) -> Result<BookingAggregate, WorkflowError> {
        let (booking, approvals) = self
            .store
            .get_booking_with_approvals(booking_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("Booking {booking_id} not found")))?;

        Ok(BookingAggregate { booking, approvals })
    }

    async fn require_actor(&self, actor_id: i32) -> Result<crate::entities::users::Model, WorkflowError> {
        self.store
            .get_user(actor_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("User {actor_id} not found")))
    }

    /// Releases a vehicle back to Available unless another active
    /// booking or an open maintenance window still claims it. Only a
    /// Booked vehicle is touched, so a Maintenance status is never
    /// clobbered.
    async fn release_vehicle_if_unclaimed<C: sea_orm::ConnectionTrait>(
        conn: &C,
        vehicle_id: i32,
        exclude_booking: Option<i32>,
    ) -> Result<(), WorkflowError> {
        let still_claimed = booking::active_exists(conn, vehicle_id, exclude_booking).await?
            || maintenance::open_exists(conn, vehicle_id, None).await?;

        if !still_claimed {
            vehicle::set_status_if(
                conn,
                vehicle_id,
                &[VehicleStatus::Booked],
                VehicleStatus::Available,
            )
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl BookingWorkflow for SeaOrmBookingWorkflow {
    async fn create(&self, input: CreateBooking) -> Result<BookingAggregate, WorkflowError> {
        let requester = self.require_actor(input.requester_id).await?;

        self.store
            .get_vehicle(input.vehicle_id)
            .await?
            .ok_or_else(|| {
                WorkflowError::NotFound(format!("Vehicle {} not found", input.vehicle_id))
            })?;

        // Directory reads are non-transactional; the chain is a pure
        // function of the snapshot taken here.
        let chain = self.chain_builder.build(requester.id).await?;
        let auto_approved = chain.is_empty();

        let txn = self.store.conn.begin().await?;

        if booking::overlap_exists(&txn, input.vehicle_id, input.interval, None).await? {
            return Err(WorkflowError::Conflict(format!(
                "Vehicle {} already has an active booking overlapping the requested interval",
                input.vehicle_id
            )));
        }

        // Serialization point: only one concurrent create can move the
        // vehicle out of Available.
        let claimed = vehicle::set_status_if(
            &txn,
            input.vehicle_id,
            &[VehicleStatus::Available],
            VehicleStatus::Booked,
        )
        .await?;

        if !claimed {
            return Err(WorkflowError::Conflict(format!(
                "Vehicle {} is not available",
                input.vehicle_id
            )));
        }

        let status = if auto_approved {
            BookingStatus::Approved
        } else {
            BookingStatus::Pending
        };

        let created = booking::insert(
            &txn,
            NewBooking {
                user_id: requester.id,
                vehicle_id: input.vehicle_id,
                purpose: input.purpose,
                interval: input.interval,
                status,
                passengers: input.passengers,
                notes: input.notes,
            },
        )
        .await?;

        approval::insert_chain(&txn, created.id, &chain).await?;

        txn.commit().await?;

        counter!("fleetd_bookings_created_total").increment(1);

        if auto_approved {
            // Silently granting approval is worth shouting about.
            warn!(
                booking_id = created.id,
                requester_id = requester.id,
                "No approvers available; booking auto-approved"
            );
            counter!("fleetd_bookings_auto_approved_total").increment(1);

            let _ = self.events.send(NotificationEvent::BookingApproved {
                booking_id: created.id,
                requester_id: requester.id,
            });
        } else {
            let _ = self.events.send(NotificationEvent::BookingCreated {
                booking_id: created.id,
                requester_id: requester.id,
                vehicle_id: created.vehicle_id,
                approver_ids: chain.iter().map(|a| a.approver_id).collect(),
            });
        }

        self.load_aggregate(created.id).await
    }

    async fn decide(
        &self,
        approval_id: i32,
        decision: Decision,
        actor_id: i32,
        comments: Option<String>,
    ) -> Result<BookingAggregate, WorkflowError> {
        let approval = self
            .store
            .get_approval(approval_id)
            .await?
            .ok_or_else(|| {
                WorkflowError::NotFound(format!("Approval {approval_id} not found"))
            })?;

        let booking = self
            .store
            .get_booking(approval.booking_id)
            .await?
            .ok_or_else(|| {
                WorkflowError::NotFound(format!("Booking {} not found", approval.booking_id))
            })?;

        let actor = self.require_actor(actor_id).await?;

        if actor.id != approval.approver_id && !actor.role.is_admin() {
            return Err(WorkflowError::Forbidden(format!(
                "User {actor_id} is not the assigned approver for approval {approval_id}"
            )));
        }

        // Once the booking has left Pending, decisions on its approval
        // set are meaningless.
        if booking.status != BookingStatus::Pending {
            return Err(WorkflowError::InvalidState(format!(
                "Booking {} is no longer pending",
                booking.id
            )));
        }

        let to = match decision {
            Decision::Approve => ApprovalStatus::Approved,
            Decision::Reject => ApprovalStatus::Rejected,
        };

        let txn = self.store.conn.begin().await?;

        // At-most-once guard: the conditional update only lands while
        // the approval is still Pending.
        let decided = approval::decide_if_pending(&txn, approval_id, to, comments).await?;
        if !decided {
            return Err(WorkflowError::InvalidState(format!(
                "Approval {approval_id} has already been decided"
            )));
        }

        let mut event = None;

        match decision {
            Decision::Reject => {
                // First rejection wins: the booking is rejected outright
                // and sibling approvals are left Pending.
                let transitioned = booking::set_status_if(
                    &txn,
                    booking.id,
                    &[BookingStatus::Pending],
                    BookingStatus::Rejected,
                )
                .await?;

                if transitioned {
                    vehicle::set_status_if(
                        &txn,
                        booking.vehicle_id,
                        &[VehicleStatus::Booked],
                        VehicleStatus::Available,
                    )
                    .await?;

                    event = Some(NotificationEvent::BookingRejected {
                        booking_id: booking.id,
                        requester_id: booking.user_id,
                        approval_id,
                    });
                }
            }
            Decision::Approve => {
                let remaining = approval::pending_count(&txn, booking.id).await?;

                if remaining == 0 {
                    let transitioned = booking::set_status_if(
                        &txn,
                        booking.id,
                        &[BookingStatus::Pending],
                        BookingStatus::Approved,
                    )
                    .await?;

                    if transitioned {
                        event = Some(NotificationEvent::BookingApproved {
                            booking_id: booking.id,
                            requester_id: booking.user_id,
                        });
                    }
                }
            }
        }

        txn.commit().await?;

        match &event {
            Some(NotificationEvent::BookingApproved { .. }) => {
                info!(booking_id = booking.id, "Booking fully approved");
                counter!("fleetd_bookings_approved_total").increment(1);
            }
            Some(NotificationEvent::BookingRejected { .. }) => {
                info!(booking_id = booking.id, approval_id, "Booking rejected");
                counter!("fleetd_bookings_rejected_total").increment(1);
            }
            _ => {}
        }

        if let Some(event) = event {
            let _ = self.events.send(event);
        }

        self.load_aggregate(booking.id).await
    }

    async fn cancel(
        &self,
        booking_id: i32,
        actor_id: i32,
    ) -> Result<BookingAggregate, WorkflowError> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("Booking {booking_id} not found")))?;

        let actor = self.require_actor(actor_id).await?;
        let is_admin = actor.role.is_admin();

        if !is_admin {
            if actor.id != booking.user_id {
                return Err(WorkflowError::Forbidden(format!(
                    "User {actor_id} may not cancel booking {booking_id}"
                )));
            }
            if booking.status.is_terminal() {
                return Err(WorkflowError::InvalidState(format!(
                    "Booking {booking_id} can no longer be cancelled"
                )));
            }
        }

        // Administrators may cancel regardless of status; everyone else
        // only out of Pending/Approved.
        let expected: &[BookingStatus] = if is_admin {
            &[
                BookingStatus::Pending,
                BookingStatus::Approved,
                BookingStatus::Rejected,
                BookingStatus::Completed,
            ]
        } else {
            &BookingStatus::ACTIVE
        };

        let txn = self.store.conn.begin().await?;

        let transitioned =
            booking::set_status_if(&txn, booking_id, expected, BookingStatus::Cancelled).await?;

        if !transitioned {
            return Err(WorkflowError::InvalidState(format!(
                "Booking {booking_id} is already cancelled or changed concurrently"
            )));
        }

        Self::release_vehicle_if_unclaimed(&txn, booking.vehicle_id, Some(booking_id)).await?;

        txn.commit().await?;

        info!(booking_id, actor_id, "Booking cancelled");
        counter!("fleetd_bookings_cancelled_total").increment(1);

        self.load_aggregate(booking_id).await
    }

    async fn complete(
        &self,
        booking_id: i32,
        actor_id: i32,
    ) -> Result<BookingAggregate, WorkflowError> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("Booking {booking_id} not found")))?;

        let actor = self.require_actor(actor_id).await?;

        if actor.id != booking.user_id && !actor.role.is_admin() {
            return Err(WorkflowError::Forbidden(format!(
                "User {actor_id} may not complete booking {booking_id}"
            )));
        }

        let txn = self.store.conn.begin().await?;

        // Force-complete: any pre-state except Completed itself.
        let transitioned = booking::set_status_if(
            &txn,
            booking_id,
            &[
                BookingStatus::Pending,
                BookingStatus::Approved,
                BookingStatus::Rejected,
                BookingStatus::Cancelled,
            ],
            BookingStatus::Completed,
        )
        .await?;

        if !transitioned {
            return Err(WorkflowError::InvalidState(format!(
                "Booking {booking_id} is already completed"
            )));
        }

        vehicle::set_status_if(
            &txn,
            booking.vehicle_id,
            &[VehicleStatus::Booked],
            VehicleStatus::Available,
        )
        .await?;

        txn.commit().await?;

        info!(booking_id, actor_id, "Booking completed");
        counter!("fleetd_bookings_completed_total").increment(1);

        self.load_aggregate(booking_id).await
    }

    async fn update(
        &self,
        booking_id: i32,
        actor_id: i32,
        changes: BookingChanges,
    ) -> Result<BookingAggregate, WorkflowError> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("Booking {booking_id} not found")))?;

        let actor = self.require_actor(actor_id).await?;

        if booking.status.is_terminal() {
            return Err(WorkflowError::InvalidState(format!(
                "Booking {booking_id} can no longer be updated"
            )));
        }

        if actor.role != Role::Administrator {
            if actor.id != booking.user_id {
                return Err(WorkflowError::Forbidden(format!(
                    "User {actor_id} may not update booking {booking_id}"
                )));
            }
            if booking.status != BookingStatus::Pending {
                return Err(WorkflowError::InvalidState(format!(
                    "Booking {booking_id} is not pending"
                )));
            }
        }

        let old_vehicle_id = booking.vehicle_id;
        let target_vehicle_id = changes.vehicle_id.unwrap_or(old_vehicle_id);
        let vehicle_changed = target_vehicle_id != old_vehicle_id;

        let current_interval = crate::domain::BookingInterval {
            start: booking.start_date,
            end: booking.end_date,
        };
        let target_interval = changes.interval.unwrap_or(current_interval);
        let interval_changed = target_interval != current_interval;

        if vehicle_changed {
            self.store
                .get_vehicle(target_vehicle_id)
                .await?
                .ok_or_else(|| {
                    WorkflowError::NotFound(format!("Vehicle {target_vehicle_id} not found"))
                })?;
        }

        // The rebuilt chain targets the current directory snapshot, not
        // the one the booking was created against.
        let rebuilt_chain = if vehicle_changed {
            Some(self.chain_builder.build(booking.user_id).await?)
        } else {
            None
        };

        let txn = self.store.conn.begin().await?;

        if (vehicle_changed || interval_changed)
            && booking::overlap_exists(&txn, target_vehicle_id, target_interval, Some(booking_id))
                .await?
        {
            return Err(WorkflowError::Conflict(format!(
                "Vehicle {target_vehicle_id} already has an active booking overlapping the requested interval"
            )));
        }

        let mut active: bookings::ActiveModel = booking.clone().into();
        if let Some(purpose) = changes.purpose {
            active.purpose = Set(purpose);
        }
        if let Some(passengers) = changes.passengers {
            active.passengers = Set(Some(passengers));
        }
        if let Some(notes) = changes.notes {
            active.notes = Set(Some(notes));
        }
        active.start_date = Set(target_interval.start);
        active.end_date = Set(target_interval.end);
        active.vehicle_id = Set(target_vehicle_id);
        active.updated_at = Set(chrono::Utc::now());

        let mut auto_approved = false;

        if vehicle_changed {
            let chain = rebuilt_chain.as_deref().unwrap_or(&[]);

            // A fresh chain re-gates the booking even if it was already
            // approved; an empty one auto-approves as at creation.
            if chain.is_empty() {
                auto_approved = booking.status == BookingStatus::Pending;
                active.status = Set(BookingStatus::Approved);
            } else {
                active.status = Set(BookingStatus::Pending);
            }

            // The whole approval set is replaced; it is never amended
            // in place.
            approval::delete_for_booking(&txn, booking_id).await?;
            approval::insert_chain(&txn, booking_id, chain).await?;

            let claimed = vehicle::set_status_if(
                &txn,
                target_vehicle_id,
                &[VehicleStatus::Available],
                VehicleStatus::Booked,
            )
            .await?;

            if !claimed {
                return Err(WorkflowError::Conflict(format!(
                    "Vehicle {target_vehicle_id} is not available"
                )));
            }

            Self::release_vehicle_if_unclaimed(&txn, old_vehicle_id, Some(booking_id)).await?;
        }

        let updated = active.update(&txn).await?;

        txn.commit().await?;

        if auto_approved {
            warn!(
                booking_id,
                "No approvers available after vehicle change; booking auto-approved"
            );
            counter!("fleetd_bookings_auto_approved_total").increment(1);

            let _ = self.events.send(NotificationEvent::BookingApproved {
                booking_id,
                requester_id: updated.user_id,
            });
        } else if let Some(chain) = rebuilt_chain.filter(|c| !c.is_empty()) {
            let _ = self.events.send(NotificationEvent::BookingCreated {
                booking_id,
                requester_id: updated.user_id,
                vehicle_id: updated.vehicle_id,
                approver_ids: chain.iter().map(|a| a.approver_id).collect(),
            });
        }

        self.load_aggregate(booking_id).await
    }
}

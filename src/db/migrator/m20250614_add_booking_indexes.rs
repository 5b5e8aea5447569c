use crate::entities::{booking_approvals, bookings};
use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Overlap queries filter bookings by vehicle + status on every create;
/// approval lookups filter by booking and by approver. Index both paths.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_bookings_vehicle_status")
                    .table(Bookings)
                    .col(bookings::Column::VehicleId)
                    .col(bookings::Column::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_approvals_booking")
                    .table(BookingApprovals)
                    .col(booking_approvals::Column::BookingId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_approvals_approver_status")
                    .table(BookingApprovals)
                    .col(booking_approvals::Column::ApproverId)
                    .col(booking_approvals::Column::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_bookings_vehicle_status")
                    .table(Bookings)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_approvals_booking")
                    .table(BookingApprovals)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_approvals_approver_status")
                    .table(BookingApprovals)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

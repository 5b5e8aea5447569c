use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::domain::{BookingInterval, Role, VehicleStatus};
use crate::entities::{booking_approvals, bookings, maintenance, users, vehicles};

pub mod migrator;
pub mod repositories;

pub use repositories::booking::{BookingListFilter, NewBooking};
pub use repositories::vehicle::{NewVehicle, VehicleChanges};

/// Connection handle plus typed accessors for every aggregate. The
/// transactional multi-step writes live in the workflow services, which
/// call the connection-generic functions in `repositories` against an
/// open transaction.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn vehicle_repo(&self) -> repositories::vehicle::VehicleRepository {
        repositories::vehicle::VehicleRepository::new(self.conn.clone())
    }

    fn booking_repo(&self) -> repositories::booking::BookingRepository {
        repositories::booking::BookingRepository::new(self.conn.clone())
    }

    fn approval_repo(&self) -> repositories::approval::ApprovalRepository {
        repositories::approval::ApprovalRepository::new(self.conn.clone())
    }

    fn maintenance_repo(&self) -> repositories::maintenance::MaintenanceRepository {
        repositories::maintenance::MaintenanceRepository::new(self.conn.clone())
    }

    // -- users ----------------------------------------------------------

    pub async fn get_user(&self, id: i32) -> Result<Option<users::Model>> {
        self.user_repo().get(id).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<users::Model>> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn find_first_by_role(
        &self,
        role: Role,
        exclude: Option<i32>,
    ) -> Result<Option<users::Model>> {
        self.user_repo().find_first_by_role(role, exclude).await
    }

    pub async fn list_users(&self) -> Result<Vec<users::Model>> {
        self.user_repo().list().await
    }

    pub async fn verify_user_password(&self, email: &str, password: &str) -> Result<bool> {
        self.user_repo().verify_password(email, password).await
    }

    pub async fn set_user_password(
        &self,
        user_id: i32,
        new_password: &str,
        params: argon2::Params,
    ) -> Result<()> {
        self.user_repo()
            .set_password(user_id, new_password, params)
            .await
    }

    pub async fn verify_api_key(&self, api_key: &str) -> Result<Option<users::Model>> {
        self.user_repo().verify_api_key(api_key).await
    }

    pub async fn regenerate_api_key(&self, user_id: i32) -> Result<String> {
        self.user_repo().regenerate_api_key(user_id).await
    }

    // -- vehicles -------------------------------------------------------

    pub async fn get_vehicle(&self, id: i32) -> Result<Option<vehicles::Model>> {
        self.vehicle_repo().get(id).await
    }

    pub async fn get_vehicle_by_registration(
        &self,
        registration_no: &str,
    ) -> Result<Option<vehicles::Model>> {
        self.vehicle_repo().get_by_registration(registration_no).await
    }

    pub async fn create_vehicle(&self, row: NewVehicle) -> Result<vehicles::Model> {
        self.vehicle_repo().insert(row).await
    }

    pub async fn update_vehicle(
        &self,
        id: i32,
        changes: VehicleChanges,
    ) -> Result<Option<vehicles::Model>> {
        self.vehicle_repo().update(id, changes).await
    }

    pub async fn list_vehicles(
        &self,
        location_id: Option<i32>,
        vehicle_type_id: Option<i32>,
        status: Option<VehicleStatus>,
    ) -> Result<Vec<vehicles::Model>> {
        self.vehicle_repo()
            .list(location_id, vehicle_type_id, status)
            .await
    }

    pub async fn find_available_vehicles(
        &self,
        interval: BookingInterval,
        location_id: Option<i32>,
        vehicle_type_id: Option<i32>,
    ) -> Result<Vec<vehicles::Model>> {
        self.vehicle_repo()
            .find_available(interval, location_id, vehicle_type_id)
            .await
    }

    pub async fn set_vehicle_status_if(
        &self,
        vehicle_id: i32,
        expected: &[VehicleStatus],
        to: VehicleStatus,
    ) -> Result<bool> {
        self.vehicle_repo()
            .set_status_if(vehicle_id, expected, to)
            .await
    }

    // -- bookings -------------------------------------------------------

    pub async fn get_booking(&self, id: i32) -> Result<Option<bookings::Model>> {
        self.booking_repo().get(id).await
    }

    pub async fn get_booking_with_approvals(
        &self,
        id: i32,
    ) -> Result<Option<(bookings::Model, Vec<booking_approvals::Model>)>> {
        self.booking_repo().get_with_approvals(id).await
    }

    pub async fn list_bookings(&self, filter: &BookingListFilter) -> Result<Vec<bookings::Model>> {
        self.booking_repo().list(filter).await
    }

    pub async fn booking_overlap_exists(
        &self,
        vehicle_id: i32,
        interval: BookingInterval,
        exclude_booking: Option<i32>,
    ) -> Result<bool> {
        repositories::booking::overlap_exists(&self.conn, vehicle_id, interval, exclude_booking)
            .await
    }

    // -- approvals ------------------------------------------------------

    pub async fn get_approval(&self, id: i32) -> Result<Option<booking_approvals::Model>> {
        self.approval_repo().get(id).await
    }

    pub async fn list_approvals_for_approver(
        &self,
        approver_id: i32,
        only_pending: bool,
    ) -> Result<Vec<booking_approvals::Model>> {
        self.approval_repo()
            .list_for_approver(approver_id, only_pending)
            .await
    }

    pub async fn list_all_approvals(
        &self,
        only_pending: bool,
    ) -> Result<Vec<booking_approvals::Model>> {
        self.approval_repo().list_all(only_pending).await
    }

    // -- maintenance ----------------------------------------------------

    pub async fn get_maintenance(&self, id: i32) -> Result<Option<maintenance::Model>> {
        self.maintenance_repo().get(id).await
    }

    pub async fn list_maintenance(
        &self,
        vehicle_id: Option<i32>,
    ) -> Result<Vec<maintenance::Model>> {
        self.maintenance_repo().list(vehicle_id).await
    }
}

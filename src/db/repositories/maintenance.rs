use anyhow::{Context, Result};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::entities::maintenance;

pub struct MaintenanceRepository {
    conn: DatabaseConnection,
}

impl MaintenanceRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: i32) -> Result<Option<maintenance::Model>> {
        maintenance::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query maintenance record")
    }

    pub async fn list(&self, vehicle_id: Option<i32>) -> Result<Vec<maintenance::Model>> {
        let mut query = maintenance::Entity::find();

        if let Some(vehicle_id) = vehicle_id {
            query = query.filter(maintenance::Column::VehicleId.eq(vehicle_id));
        }

        query
            .order_by_desc(maintenance::Column::StartedAt)
            .all(&self.conn)
            .await
            .context("Failed to list maintenance records")
    }
}

pub async fn insert<C: ConnectionTrait>(
    conn: &C,
    vehicle_id: i32,
    description: String,
    started_at: chrono::DateTime<chrono::Utc>,
) -> Result<maintenance::Model> {
    let result = maintenance::Entity::insert(maintenance::ActiveModel {
        vehicle_id: Set(vehicle_id),
        description: Set(description),
        started_at: Set(started_at),
        completed_at: Set(None),
        cost: Set(None),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    })
    .exec(conn)
    .await
    .context("Failed to insert maintenance record")?;

    maintenance::Entity::find_by_id(result.last_insert_id)
        .one(conn)
        .await
        .context("Failed to re-read maintenance record")?
        .ok_or_else(|| anyhow::anyhow!("Inserted maintenance record vanished"))
}

pub async fn get<C: ConnectionTrait>(conn: &C, id: i32) -> Result<Option<maintenance::Model>> {
    maintenance::Entity::find_by_id(id)
        .one(conn)
        .await
        .context("Failed to query maintenance record")
}

/// Closes an open window; returns false when it was already closed.
pub async fn close_if_open<C: ConnectionTrait>(
    conn: &C,
    id: i32,
    cost: Option<f64>,
) -> Result<bool> {
    let result = maintenance::Entity::update_many()
        .set(maintenance::ActiveModel {
            completed_at: Set(Some(chrono::Utc::now())),
            cost: Set(cost),
            ..Default::default()
        })
        .filter(maintenance::Column::Id.eq(id))
        .filter(maintenance::Column::CompletedAt.is_null())
        .exec(conn)
        .await
        .context("Failed to close maintenance record")?;

    Ok(result.rows_affected > 0)
}

pub async fn open_exists<C: ConnectionTrait>(
    conn: &C,
    vehicle_id: i32,
    exclude: Option<i32>,
) -> Result<bool> {
    let mut query = maintenance::Entity::find()
        .filter(maintenance::Column::VehicleId.eq(vehicle_id))
        .filter(maintenance::Column::CompletedAt.is_null());

    if let Some(id) = exclude {
        query = query.filter(maintenance::Column::Id.ne(id));
    }

    let count = query
        .count(conn)
        .await
        .context("Failed to count open maintenance windows")?;

    Ok(count > 0)
}

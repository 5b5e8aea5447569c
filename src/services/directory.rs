//! Read-only view of the organizational hierarchy.
//!
//! The approval chain builder only needs supervisor links and roles, so
//! it consumes this narrow trait instead of the full user store. Tests
//! substitute an in-memory directory.

use anyhow::Result;
use async_trait::async_trait;

use crate::db::Store;
use crate::domain::Role;

/// Minimal projection of a user for approver resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryUser {
    pub id: i32,
    pub role: Role,
    pub supervisor_id: Option<i32>,
}

#[async_trait]
pub trait Directory: Send + Sync {
    async fn get_user(&self, id: i32) -> Result<Option<DirectoryUser>>;

    /// First user with the given role, lowest id first; `exclude` skips
    /// one specific user id.
    async fn find_first_by_role(
        &self,
        role: Role,
        exclude: Option<i32>,
    ) -> Result<Option<DirectoryUser>>;
}

/// `SeaORM`-backed directory over the users table.
pub struct SeaOrmDirectory {
    store: Store,
}

impl SeaOrmDirectory {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Directory for SeaOrmDirectory {
    async fn get_user(&self, id: i32) -> Result<Option<DirectoryUser>> {
        let user = self.store.get_user(id).await?;
        Ok(user.map(|u| DirectoryUser {
            id: u.id,
            role: u.role,
            supervisor_id: u.supervisor_id,
        }))
    }

    async fn find_first_by_role(
        &self,
        role: Role,
        exclude: Option<i32>,
    ) -> Result<Option<DirectoryUser>> {
        let user = self.store.find_first_by_role(role, exclude).await?;
        Ok(user.map(|u| DirectoryUser {
            id: u.id,
            role: u.role,
            supervisor_id: u.supervisor_id,
        }))
    }
}

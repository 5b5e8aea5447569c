use anyhow::{Context, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordVerifier},
};
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tokio::task;

use crate::domain::Role;
use crate::entities::users;

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: i32) -> Result<Option<users::Model>> {
        users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by id")
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query user by email")
    }

    /// First user with the given role, lowest id wins. `exclude` skips a
    /// specific user, used when the chain must not assign the same
    /// approver twice.
    pub async fn find_first_by_role(
        &self,
        role: Role,
        exclude: Option<i32>,
    ) -> Result<Option<users::Model>> {
        let mut query = users::Entity::find().filter(users::Column::Role.eq(role));

        if let Some(id) = exclude {
            query = query.filter(users::Column::Id.ne(id));
        }

        query
            .order_by_asc(users::Column::Id)
            .one(&self.conn)
            .await
            .context("Failed to query user by role")
    }

    pub async fn list(&self) -> Result<Vec<users::Model>> {
        users::Entity::find()
            .order_by_asc(users::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list users")
    }

    /// Verify password for a user.
    /// Note: this uses `spawn_blocking` because Argon2 verification is
    /// CPU-intensive and would block the async runtime if run directly.
    pub async fn verify_password(&self, email: &str, password: &str) -> Result<bool> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query user for password verification")?;

        let Some(user) = user else {
            return Ok(false);
        };

        let password_hash = user.password_hash;
        let password = password.to_string();

        let is_valid = task::spawn_blocking(move || {
            let parsed_hash = PasswordHash::new(&password_hash)
                .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

            let argon2 = Argon2::default();
            Ok::<bool, anyhow::Error>(
                argon2
                    .verify_password(password.as_bytes(), &parsed_hash)
                    .is_ok(),
            )
        })
        .await
        .context("Password verification task panicked")??;

        Ok(is_valid)
    }

    /// Re-hash and store a new password. Hashing runs on the blocking
    /// pool for the same reason verification does.
    pub async fn set_password(
        &self,
        user_id: i32,
        new_password: &str,
        params: argon2::Params,
    ) -> Result<()> {
        let user = users::Entity::find_by_id(user_id)
            .one(&self.conn)
            .await
            .context("Failed to query user for password change")?
            .ok_or_else(|| anyhow::anyhow!("User {user_id} not found"))?;

        let password = new_password.to_string();

        let hash = task::spawn_blocking(move || {
            use argon2::password_hash::{PasswordHasher, SaltString, rand_core::OsRng};

            let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(password.as_bytes(), &salt)
                .map(|h| h.to_string())
                .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))
        })
        .await
        .context("Password hashing task panicked")??;

        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(hash);
        active.updated_at = Set(chrono::Utc::now());
        active
            .update(&self.conn)
            .await
            .context("Failed to store new password hash")?;

        Ok(())
    }

    pub async fn verify_api_key(&self, api_key: &str) -> Result<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::ApiKey.eq(api_key))
            .one(&self.conn)
            .await
            .context("Failed to query user by API key")
    }

    pub async fn regenerate_api_key(&self, user_id: i32) -> Result<String> {
        let user = users::Entity::find_by_id(user_id)
            .one(&self.conn)
            .await
            .context("Failed to query user for API key rotation")?
            .ok_or_else(|| anyhow::anyhow!("User {user_id} not found"))?;

        let new_key = generate_api_key();

        let mut active: users::ActiveModel = user.into();
        active.api_key = Set(new_key.clone());
        active.updated_at = Set(chrono::Utc::now());
        active
            .update(&self.conn)
            .await
            .context("Failed to store new API key")?;

        Ok(new_key)
    }
}

/// Random 64-char hex API key.
fn generate_api_key() -> String {
    let mut rng = rand::rng();
    (0..32)
        .map(|_| format!("{:02x}", rng.random::<u8>()))
        .collect()
}

use sea_orm::entity::prelude::*;
use serde::Serialize;

use crate::domain::Role;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,

    #[sea_orm(unique)]
    pub email: String,

    /// Argon2id password hash
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Random API key (64-char hex string)
    #[serde(skip_serializing)]
    #[sea_orm(unique)]
    pub api_key: String,

    pub role: Role,

    pub department: Option<String>,

    pub location_id: Option<i32>,

    /// Direct supervisor; forms a forest rooted at users without one.
    /// Cycles are a data-integrity bug, not a supported case.
    pub supervisor_id: Option<i32>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

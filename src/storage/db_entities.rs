//! SeaORM entity model used by the SQLite session index.
//!
//! Maps to the `session_index` table created by `database_storage`.

use sea_orm::entity::prelude::*;

/// One row per session id; the row is overwritten whenever the session rotates.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "session_index")]
pub struct Model {
    /// Session identifier as supplied by the agent
    #[sea_orm(primary_key, auto_increment = false)]
    pub session_id: String,
    /// Name of the segment currently receiving writes
    pub segment_name: String,
    /// RFC3339 creation time of that segment
    pub segment_created: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! Storage subsystem
//!
//! This module provides the collaborators the rotation engine persists through.
//!
//! Components:
//! - `storage_trait`: the `SessionIndex` and `SegmentStore` traits.
//! - `types`: `SessionState`, the per-session routing record.
//! - `file_storage`: directory-backed segment store and session index.
//! - `database_storage`: SQLite session index using SeaORM.
//! - `memory_storage`: in-process implementations of both traits.
//! - `db_entities`: SeaORM entity model for the database backend.

pub mod database_storage;
pub mod db_entities;
pub mod file_storage;
pub mod memory_storage;
pub mod storage_trait;
pub mod types;

pub use database_storage::SqliteSessionIndex;
pub use file_storage::{FileSegmentStore, FileSessionIndex};
pub use memory_storage::{MemorySegmentStore, MemorySessionIndex};
pub use storage_trait::{SegmentStore, SessionIndex};
pub use types::SessionState;

//! Storage Traits
//!
//! This module defines the two collaborators the rotation engine writes
//! through:
//! - `SessionIndex`: a key-value store holding one `SessionState` per session id
//! - `SegmentStore`: an append-only object store holding the log segments
//!
//! Neither trait offers transactions; each call may fail independently.
//! All methods return a `Result` to handle potential storage errors.

use crate::error_handling::types::StorageError;
use crate::storage::types::SessionState;

/// The `SessionIndex` trait defines the interface for session routing state backends.
///
/// Implementors must keep at most one current state per session id, with
/// last-write-wins semantics on `put`.
pub trait SessionIndex: Send + Sync {
    /// Provisions the backing table/directory. Idempotent.
    fn ensure_exists(&self) -> Result<(), StorageError>;

    /// Returns the current state for `session_id`, if any.
    fn get(&self, session_id: &str) -> Result<Option<SessionState>, StorageError>;

    /// Replaces (or creates) the state for `state.session_id`.
    fn put(&self, state: &SessionState) -> Result<(), StorageError>;
}

/// The `SegmentStore` trait defines the interface for append-only segment backends.
pub trait SegmentStore: Send + Sync {
    /// Provisions the container holding the segments. Idempotent.
    fn ensure_container_exists(&self) -> Result<(), StorageError>;

    fn exists(&self, name: &str) -> Result<bool, StorageError>;

    /// Creates an empty segment, replacing any existing one with that name.
    ///
    /// Callers check `exists` first so content is never discarded in the
    /// normal write path.
    fn create(&self, name: &str) -> Result<(), StorageError>;

    /// Appends `text` verbatim to the end of the segment.
    fn append_text(&self, name: &str, text: &str) -> Result<(), StorageError>;
}

//! In-process backends.
//!
//! Both stores keep everything in a `Mutex<HashMap>`. They back the `memory`
//! index option and the engine tests; `MemorySegmentStore` also counts how
//! often each segment was created.

use std::collections::HashMap;
use std::sync::Mutex;

use log::{debug, error};

use crate::error_handling::types::StorageError;
use crate::storage::storage_trait::{SegmentStore, SessionIndex};
use crate::storage::types::SessionState;

#[derive(Default)]
pub struct MemorySessionIndex {
    states: Mutex<HashMap<String, SessionState>>,
}

impl MemorySessionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionIndex for MemorySessionIndex {
    fn ensure_exists(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn get(&self, session_id: &str) -> Result<Option<SessionState>, StorageError> {
        let states = self.states.lock().map_err(|_| {
            error!("Session index lock poisoned");
            StorageError::ReadFailed
        })?;
        Ok(states.get(session_id).cloned())
    }

    fn put(&self, state: &SessionState) -> Result<(), StorageError> {
        let mut states = self.states.lock().map_err(|_| {
            error!("Session index lock poisoned");
            StorageError::WriteFailed
        })?;
        states.insert(state.session_id.clone(), state.clone());
        debug!("Session {} -> {}", state.session_id, state.segment_name);
        Ok(())
    }
}

#[derive(Default)]
struct Segments {
    content: HashMap<String, String>,
    creates: HashMap<String, usize>,
}

#[derive(Default)]
pub struct MemorySegmentStore {
    inner: Mutex<Segments>,
}

impl MemorySegmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content of `name`, or `None` if it was never created.
    pub fn contents(&self, name: &str) -> Option<String> {
        self.inner
            .lock()
            .ok()
            .and_then(|s| s.content.get(name).cloned())
    }

    /// Number of times `create` was called for `name`.
    pub fn create_count(&self, name: &str) -> usize {
        self.inner
            .lock()
            .ok()
            .and_then(|s| s.creates.get(name).copied())
            .unwrap_or(0)
    }

    /// Sorted names of all existing segments.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .lock()
            .map(|s| s.content.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl SegmentStore for MemorySegmentStore {
    fn ensure_container_exists(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn exists(&self, name: &str) -> Result<bool, StorageError> {
        let inner = self.inner.lock().map_err(|_| StorageError::ReadFailed)?;
        Ok(inner.content.contains_key(name))
    }

    fn create(&self, name: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().map_err(|_| StorageError::WriteFailed)?;
        inner.content.insert(name.to_string(), String::new());
        *inner.creates.entry(name.to_string()).or_insert(0) += 1;
        Ok(())
    }

    fn append_text(&self, name: &str, text: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().map_err(|_| StorageError::WriteFailed)?;
        match inner.content.get_mut(name) {
            Some(segment) => {
                segment.push_str(text);
                Ok(())
            }
            None => {
                error!("Append to missing segment {}", name);
                Err(StorageError::WriteFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn segment_store_counts_creates() {
        let store = MemorySegmentStore::new();
        assert!(!store.exists("a").unwrap());
        assert!(store.append_text("a", "x").is_err());
        store.create("a").unwrap();
        store.append_text("a", "x\n").unwrap();
        assert_eq!(store.contents("a").as_deref(), Some("x\n"));
        assert_eq!(store.create_count("a"), 1);
        assert_eq!(store.names(), vec!["a".to_string()]);
    }

    #[test]
    fn session_index_last_write_wins() {
        let index = MemorySessionIndex::new();
        let now = Utc::now();
        index.put(&SessionState::new("s", "one", now)).unwrap();
        index.put(&SessionState::new("s", "two", now)).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("s").unwrap().unwrap().segment_name, "two");
    }
}

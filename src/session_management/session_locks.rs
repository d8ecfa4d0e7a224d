//! In-process single-flight guard keyed by session id.
//!
//! Serializes the read-decide-write sequence of concurrent writers for the
//! same session inside one process. Writers in other processes still race.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the mutex for `session_id`, creating it on first use.
    pub fn handle(&self, session_id: &str) -> Arc<Mutex<()>> {
        Arc::clone(
            self.map()
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Drops the entry for `session_id` once the caller's handle is the last one out.
    pub fn release(&self, session_id: &str, handle: Arc<Mutex<()>>) {
        let mut map = self.map();
        // map entry + `handle`
        if Arc::strong_count(&handle) <= 2 {
            map.remove(session_id);
        }
    }

    /// Number of sessions currently holding an entry.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_session_shares_a_mutex() {
        let locks = SessionLocks::new();
        let a = locks.handle("s1");
        let b = locks.handle("s1");
        let c = locks.handle("s2");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(locks.len(), 2);
    }

    #[test]
    fn release_keeps_entry_while_shared() {
        let locks = SessionLocks::new();
        let a = locks.handle("s1");
        let b = locks.handle("s1");
        locks.release("s1", a);
        assert_eq!(locks.len(), 1);
        locks.release("s1", b);
        assert!(locks.is_empty());
    }
}

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, error, info};

use crate::error_handling::types::StorageError;
use crate::storage::storage_trait::{SegmentStore, SessionIndex};
use crate::storage::types::SessionState;

/// Environment variable supplying the segment directory when `--segment-dir` is absent.
pub const SEGMENT_DIR_ENV: &str = "APITRAIL_SEGMENT_DIR";

/// Rejects keys that would escape the base directory or break the text format.
fn check_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty()
        || key == "."
        || key.contains("..")
        || key.contains('/')
        || key.contains('\\')
        || key.contains('\n')
        || key.contains('\r')
    {
        error!("Refusing unsafe storage key {:?}", key);
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Segment store backed by a local directory; one file per segment.
pub struct FileSegmentStore {
    base_path: PathBuf,
}

impl FileSegmentStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn segment_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        check_key(name)?;
        Ok(self.base_path.join(name))
    }

    /// Reads a whole segment back. Inspection helper, not part of the write path.
    pub fn read_segment(&self, name: &str) -> Result<String, StorageError> {
        let path = self.segment_path(name)?;
        let mut content = String::new();
        File::open(&path)
            .and_then(|mut f| f.read_to_string(&mut content))
            .map_err(|e| {
                error!("Read failed {}: {}", path.display(), e);
                StorageError::ReadFailed
            })?;
        Ok(content)
    }
}

impl SegmentStore for FileSegmentStore {
    fn ensure_container_exists(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.base_path).map_err(|e| {
            error!("Failed to create segment dir {}: {}", self.base_path.display(), e);
            StorageError::WriteFailed
        })
    }

    fn exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.segment_path(name)?.is_file())
    }

    fn create(&self, name: &str) -> Result<(), StorageError> {
        let path = self.segment_path(name)?;
        File::create(&path).map_err(|e| {
            error!("Failed to create segment {}: {}", path.display(), e);
            StorageError::WriteFailed
        })?;
        info!("Created segment {}", path.display());
        Ok(())
    }

    fn append_text(&self, name: &str, text: &str) -> Result<(), StorageError> {
        let path = self.segment_path(name)?;
        let mut f = OpenOptions::new().append(true).open(&path).map_err(|e| {
            error!("Open append failed {}: {}", path.display(), e);
            StorageError::WriteFailed
        })?;
        f.write_all(text.as_bytes()).map_err(|e| {
            error!("Write failed {}: {}", path.display(), e);
            StorageError::WriteFailed
        })?;
        debug!("Appended {} byte(s) to {}", text.len(), path.display());
        Ok(())
    }
}

/// Session index keeping one `<session_id>.session` text file per session.
pub struct FileSessionIndex {
    base_path: PathBuf,
}

impl FileSessionIndex {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn state_file_path(&self, session_id: &str) -> Result<PathBuf, StorageError> {
        check_key(session_id)?;
        Ok(self.base_path.join(format!("{}.session", session_id)))
    }

    fn parse_state_file(&self, path: &Path) -> Result<SessionState, StorageError> {
        let mut content = String::new();
        File::open(path)
            .and_then(|mut f| f.read_to_string(&mut content))
            .map_err(|e| {
                error!("Failed to read session file {}: {}", path.display(), e);
                StorageError::ReadFailed
            })?;
        let mut map: HashMap<String, String> = HashMap::new();
        for line in content.lines() {
            if let Some((k, v)) = line.split_once(": ") {
                map.insert(k.trim().to_string(), v.to_string());
            }
        }
        let session_id = map.remove("session_id").ok_or_else(|| {
            error!("Missing session_id in {}", path.display());
            StorageError::ReadFailed
        })?;
        let segment_name = map.remove("segment_name").ok_or_else(|| {
            error!("Missing segment_name in {}", path.display());
            StorageError::ReadFailed
        })?;
        let segment_created = map
            .remove("segment_created")
            .ok_or_else(|| {
                error!("Missing segment_created in {}", path.display());
                StorageError::ReadFailed
            })
            .and_then(|s| {
                DateTime::parse_from_rfc3339(s.trim())
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| {
                        error!("Invalid segment_created in {}: {}", path.display(), e);
                        StorageError::ReadFailed
                    })
            })?;
        Ok(SessionState {
            session_id,
            segment_name,
            segment_created,
        })
    }
}

impl SessionIndex for FileSessionIndex {
    fn ensure_exists(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.base_path).map_err(|e| {
            error!("Failed to create session index dir {}: {}", self.base_path.display(), e);
            StorageError::WriteFailed
        })
    }

    fn get(&self, session_id: &str) -> Result<Option<SessionState>, StorageError> {
        let path = self.state_file_path(session_id)?;
        if !path.is_file() {
            return Ok(None);
        }
        let state = self.parse_state_file(&path)?;
        debug!("Loaded session state {} from {}", session_id, path.display());
        Ok(Some(state))
    }

    fn put(&self, state: &SessionState) -> Result<(), StorageError> {
        let path = self.state_file_path(&state.session_id)?;
        let body = format!(
            "session_id: {}\nsegment_name: {}\nsegment_created: {}\n",
            state.session_id,
            state.segment_name,
            state.segment_created.to_rfc3339()
        );
        // full replace: readers see either the old file or the new one
        let tmp = path.with_extension("session.tmp");
        let mut f = File::create(&tmp).map_err(|e| {
            error!("Failed to create session file {}: {}", tmp.display(), e);
            StorageError::WriteFailed
        })?;
        f.write_all(body.as_bytes()).map_err(|e| {
            error!("Failed to write session file {}: {}", tmp.display(), e);
            StorageError::WriteFailed
        })?;
        fs::rename(&tmp, &path).map_err(|e| {
            error!("Failed to replace session file {}: {}", path.display(), e);
            StorageError::WriteFailed
        })?;
        info!("Saved session state {} -> {}", state.session_id, state.segment_name);
        Ok(())
    }
}

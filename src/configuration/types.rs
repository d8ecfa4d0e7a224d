use std::path::PathBuf;

use serde::Deserialize;

/// Which backend holds the session index.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    #[default]
    Sqlite,
    File,
    Memory,
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: String::from("127.0.0.1"),
            port: 8080,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory used as the segment container
    pub segment_dir: PathBuf,
    pub index_backend: IndexBackend,
    /// SQLite file, or directory for the file backend; unused for memory
    pub index_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            segment_dir: PathBuf::from("segments"),
            index_backend: IndexBackend::Sqlite,
            index_path: PathBuf::from("apitrail-sessions.sqlite3"),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Fixed offset of the logical day, e.g. `-08:00`
    pub utc_offset: String,
    /// `HH:MM:SS` in the logical timezone
    pub rotation_time: String,
    pub marker: String,
    pub per_session_lock: bool,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            utc_offset: String::from("-08:00"),
            rotation_time: String::from("00:00:00"),
            marker: String::from("reconnect"),
            per_session_lock: false,
        }
    }
}

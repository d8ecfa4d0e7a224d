use super::types::*;
use crate::error_handling::types::ConfigError;
use crate::session_management::cutoff::RotationSettings;
use crate::storage::file_storage::SEGMENT_DIR_ENV;
use chrono::{FixedOffset, NaiveTime};
use clap::Parser;
use log::info;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Application configuration structure that defines all runtime parameters.
///
/// Loaded from a TOML file with `Config::from_file`; every section and field
/// may be omitted and falls back to its default. Command-line flags from
/// [`CliArgs`] are layered on top with [`Config::apply_args`].
///
/// ```toml
/// [server]
/// bind_address = "0.0.0.0"
/// port = 8080
///
/// [storage]
/// segment_dir = "/var/lib/apitrail/segments"
/// index_backend = "sqlite"
/// index_path = "/var/lib/apitrail/sessions.sqlite3"
///
/// [rotation]
/// utc_offset = "-08:00"
/// rotation_time = "00:00:00"
/// marker = "reconnect"
/// per_session_lock = false
/// ```
#[derive(Debug, PartialEq, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub rotation: RotationConfig,
}

/// Command-line arguments.
///
/// Every flag overrides the matching configuration file value.
#[derive(Parser, Debug, Clone)]
#[command(name = "apitrail")]
#[command(version)]
#[command(about = "Appends captured API traffic to per-session rotating log segments")]
pub struct CliArgs {
    /// Path of the TOML configuration file
    pub config_file: Option<PathBuf>,

    /// Address the ingest server binds to
    #[arg(long)]
    pub bind_address: Option<String>,

    /// Port the ingest server listens on
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory holding the log segments
    #[arg(long, env = SEGMENT_DIR_ENV)]
    pub segment_dir: Option<PathBuf>,
}

impl Config {
    /// Reads and validates a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file named in `args` (defaults when absent) and applies the flag overrides.
    pub fn from_args(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config = match &args.config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_args(&mut self, args: &CliArgs) {
        if let Some(addr) = &args.bind_address {
            self.server.bind_address = addr.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(dir) = &args.segment_dir {
            self.storage.segment_dir = dir.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port != 0 && self.server.port < 1024 {
            return Err(ConfigError::BadPortsRange(format!(
                "port {} is reserved, use 1024-65535",
                self.server.port
            )));
        }
        if self.storage.segment_dir.as_os_str().is_empty() {
            return Err(ConfigError::DirectoryDoesNotExist(
                "segment_dir must not be empty".to_string(),
            ));
        }
        if self.storage.index_backend != IndexBackend::Memory
            && self.storage.index_path.as_os_str().is_empty()
        {
            return Err(ConfigError::DirectoryDoesNotExist(
                "index_path must not be empty".to_string(),
            ));
        }
        self.rotation_settings().map(|_| ())
    }

    /// Parses the `[rotation]` section into engine settings.
    pub fn rotation_settings(&self) -> Result<RotationSettings, ConfigError> {
        let utc_offset = self
            .rotation
            .utc_offset
            .trim()
            .parse::<FixedOffset>()
            .map_err(|e| {
                ConfigError::InvalidOffset(format!("{:?}: {}", self.rotation.utc_offset, e))
            })?;
        let rotation_time = NaiveTime::parse_from_str(self.rotation.rotation_time.trim(), "%H:%M:%S")
            .map_err(|e| {
                ConfigError::InvalidTime(format!("{:?}: {}", self.rotation.rotation_time, e))
            })?;
        if self.rotation.marker.is_empty() {
            return Err(ConfigError::EmptyMarker);
        }
        Ok(RotationSettings {
            utc_offset,
            rotation_time,
            marker: self.rotation.marker.clone(),
        })
    }
}

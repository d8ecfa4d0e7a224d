use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    InvalidOffset(String),
    InvalidTime(String),
    EmptyMarker,
    BadPortsRange(String),
    DirectoryDoesNotExist(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::InvalidOffset(e) => write!(f, "UTC offset error: {}", e),
            ConfigError::InvalidTime(e) => write!(f, "Rotation time error: {}", e),
            ConfigError::EmptyMarker => write!(f, "Rotation marker must not be empty"),
            ConfigError::BadPortsRange(e) => write!(f, "Port range error: {}", e),
            ConfigError::DirectoryDoesNotExist(e) => write!(f, "Directory error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    ConnectionFailed,
    WriteFailed,
    ReadFailed,
    InvalidKey(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed => write!(f, "Storage connection failed"),
            StorageError::WriteFailed => write!(f, "Storage write failed"),
            StorageError::ReadFailed => write!(f, "Storage read failed"),
            StorageError::InvalidKey(k) => write!(f, "Invalid storage key: {}", k),
        }
    }
}

impl std::error::Error for StorageError {}

/// Failure of a single `RotationEngine::write` call.
///
/// `Index` and `Segment` carry the collaborator error unchanged. A
/// `PartialRotation` means `completed_segment` already holds the pre-marker
/// lines of this batch while the switch to the new segment did not finish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    InvalidArgument(String),
    Index(StorageError),
    Segment(StorageError),
    PartialRotation {
        completed_segment: String,
        source: Box<IngestError>,
    },
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::InvalidArgument(e) => write!(f, "Invalid argument: {}", e),
            IngestError::Index(e) => write!(f, "Session index error: {}", e),
            IngestError::Segment(e) => write!(f, "Segment store error: {}", e),
            IngestError::PartialRotation {
                completed_segment,
                source,
            } => write!(
                f,
                "Rotation incomplete after appending to {}: {}",
                completed_segment, source
            ),
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IngestError::Index(e) | IngestError::Segment(e) => Some(e),
            IngestError::PartialRotation { source, .. } => Some(source.as_ref()),
            IngestError::InvalidArgument(_) => None,
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    BindFailed(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::BindFailed(e) => write!(f, "Web server bind failed: {}", e),
        }
    }
}

impl std::error::Error for WebError {}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    StorageError(StorageError),
    WebError(WebError),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::StorageError(e) => write!(f, "Storage error: {}", e),
            ControllerError::WebError(e) => write!(f, "Web error: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}

impl From<StorageError> for ControllerError {
    fn from(err: StorageError) -> Self {
        ControllerError::StorageError(err)
    }
}

impl From<WebError> for ControllerError {
    fn from(err: WebError) -> Self {
        ControllerError::WebError(err)
    }
}

pub mod configuration;
pub mod controller;
pub mod data_capture;
pub mod error_handling;
pub mod session_management;
pub mod storage;
pub mod web_interface;

pub use data_capture::TransactionRecord;
pub use error_handling::types::{IngestError, StorageError};
pub use session_management::{RotationEngine, RotationSettings, WriteReport};
pub use storage::{SegmentStore, SessionIndex, SessionState};

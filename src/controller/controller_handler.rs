use std::sync::Arc;

use log::info;

use crate::configuration::config::Config;
use crate::configuration::types::{IndexBackend, StorageConfig};
use crate::error_handling::types::ControllerError;
use crate::session_management::rotation::RotationEngine;
use crate::storage::database_storage::SqliteSessionIndex;
use crate::storage::file_storage::{FileSegmentStore, FileSessionIndex};
use crate::storage::memory_storage::MemorySessionIndex;
use crate::storage::storage_trait::{SegmentStore, SessionIndex};
use crate::web_interface::web_server::WebServer;

/// Wires configuration, storage backends, the rotation engine and the web server.
pub struct Controller {
    pub config: Config,
    engine: Arc<RotationEngine>,
}

fn build_index(storage: &StorageConfig) -> Result<Arc<dyn SessionIndex>, ControllerError> {
    let index: Arc<dyn SessionIndex> = match storage.index_backend {
        IndexBackend::Sqlite => Arc::new(SqliteSessionIndex::new_file(&storage.index_path)?),
        IndexBackend::File => Arc::new(FileSessionIndex::new(&storage.index_path)),
        IndexBackend::Memory => Arc::new(MemorySessionIndex::new()),
    };
    info!("Session index backend: {:?}", storage.index_backend);
    Ok(index)
}

impl Controller {
    /// Builds every component from `config`.
    ///
    /// Must run outside an async context: the SQLite index drives its own runtime.
    pub fn new(config: Config) -> Result<Self, ControllerError> {
        let settings = config.rotation_settings()?;
        let index = build_index(&config.storage)?;
        let segments: Arc<dyn SegmentStore> =
            Arc::new(FileSegmentStore::new(&config.storage.segment_dir));
        info!("Segments stored under {}", config.storage.segment_dir.display());

        let mut engine = RotationEngine::new(index, segments, settings);
        if config.rotation.per_session_lock {
            info!("Per-session write lock enabled");
            engine = engine.with_session_locks();
        }
        Ok(Self {
            config,
            engine: Arc::new(engine),
        })
    }

    pub fn engine(&self) -> Arc<RotationEngine> {
        self.engine.clone()
    }

    pub async fn run(&self) -> Result<(), ControllerError> {
        info!("Starting ingest server");
        WebServer::new(self.engine())
            .start(&self.config.server.bind_address, self.config.server.port)
            .await?;
        Ok(())
    }
}

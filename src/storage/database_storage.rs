use std::path::Path;

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue::Set, ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};

use crate::error_handling::types::StorageError;
use crate::storage::db_entities as session_index;
use crate::storage::storage_trait::SessionIndex;
use crate::storage::types::SessionState;

impl session_index::Model {
    fn into_state(self) -> Result<SessionState, StorageError> {
        let segment_created = DateTime::parse_from_rfc3339(&self.segment_created)
            .map_err(|e| {
                error!("Invalid segment_created for {}: {}", self.session_id, e);
                StorageError::ReadFailed
            })?
            .with_timezone(&Utc);
        Ok(SessionState {
            session_id: self.session_id,
            segment_name: self.segment_name,
            segment_created,
        })
    }
}

/// Session index stored in a SQLite file.
///
/// Exposes a blocking API by driving its own current-thread runtime, so it
/// must not be called from inside an async task; use `spawn_blocking`.
pub struct SqliteSessionIndex {
    rt: tokio::runtime::Runtime,
    db: DatabaseConnection,
}

impl SqliteSessionIndex {
    /// Creates or opens the database at `path`, creating parent directories.
    pub fn new_file<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                error!("Failed to build sqlite runtime: {}", e);
                StorageError::ConnectionFailed
            })?;
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                error!("Failed to create index dir {}: {}", parent.display(), e);
                StorageError::WriteFailed
            })?;
        }
        let url = format!("sqlite://{}?mode=rwc", path.display());
        let db = rt.block_on(Database::connect(url)).map_err(|e| {
            error!("Failed to open session index {}: {}", path.display(), e);
            StorageError::ConnectionFailed
        })?;
        info!("SqliteSessionIndex opened at {}", path.display());
        Ok(Self { rt, db })
    }
}

impl SessionIndex for SqliteSessionIndex {
    fn ensure_exists(&self) -> Result<(), StorageError> {
        self.rt.block_on(async {
            let backend = self.db.get_database_backend();
            let schema = Schema::new(backend);
            let mut stmt = schema.create_table_from_entity(session_index::Entity);
            stmt.if_not_exists();
            self.db.execute(backend.build(&stmt)).await.map_err(|e| {
                error!("Failed to create session_index table: {}", e);
                StorageError::WriteFailed
            })?;
            Ok(())
        })
    }

    fn get(&self, session_id: &str) -> Result<Option<SessionState>, StorageError> {
        self.rt.block_on(async {
            let row = session_index::Entity::find_by_id(session_id.to_string())
                .one(&self.db)
                .await
                .map_err(|e| {
                    error!("Failed to read session state {}: {}", session_id, e);
                    StorageError::ReadFailed
                })?;
            debug!("Session index lookup {} -> found={}", session_id, row.is_some());
            row.map(session_index::Model::into_state).transpose()
        })
    }

    fn put(&self, state: &SessionState) -> Result<(), StorageError> {
        self.rt.block_on(async {
            let row = session_index::ActiveModel {
                session_id: Set(state.session_id.clone()),
                segment_name: Set(state.segment_name.clone()),
                segment_created: Set(state.segment_created.to_rfc3339()),
            };
            session_index::Entity::insert(row)
                .on_conflict(
                    OnConflict::column(session_index::Column::SessionId)
                        .update_columns([
                            session_index::Column::SegmentName,
                            session_index::Column::SegmentCreated,
                        ])
                        .to_owned(),
                )
                .exec_without_returning(&self.db)
                .await
                .map_err(|e| {
                    error!("Failed to save session state {}: {}", state.session_id, e);
                    StorageError::WriteFailed
                })?;
            Ok(())
        })
    }
}

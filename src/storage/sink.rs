//! Result sink: the authoritative deduplication guard
//!
//! Every accepted record goes through [`ResultSink::try_accept`], which
//! performs the existence check and the write as one atomic step.

use crate::record::{CourseRecord, UniqueKey};
use crate::storage::{InsertOutcome, SqliteStorage, Storage, StorageError};
use async_trait::async_trait;
use rusqlite::ErrorCode;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors that can occur while persisting a record
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PersistenceError {
    /// Another writer stored the same key first
    #[error("unique key '{0}' is already stored")]
    Conflict(UniqueKey),

    /// The store cannot take writes at all; later writes would fail too
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// This particular write failed
    #[error("write failed: {0}")]
    Write(String),
}

impl PersistenceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Conflict(_) => "conflict",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::Write(_) => "write",
        }
    }
}

/// Destination for accepted records
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Stores `record` unless its unique key is already present
    ///
    /// Returns [`PersistenceError::Conflict`] when the key exists. Concurrent
    /// calls with the same key result in exactly one successful write.
    async fn try_accept(&self, record: &CourseRecord) -> Result<(), PersistenceError>;

    /// Records accepted by this sink, in acceptance order
    async fn accepted(&self) -> Result<Vec<CourseRecord>, PersistenceError>;
}

/// [`ResultSink`] writing into a shared [`SqliteStorage`] under one run id
///
/// Every task shares the one connection; it is locked for a single
/// statement at a time and never held across a fetch. Writes run on the
/// blocking thread pool, so a slow disk stalls only the task that is writing.
#[derive(Clone)]
pub struct SqliteSink {
    storage: Arc<Mutex<SqliteStorage>>,
    run_id: i64,
}

impl SqliteSink {
    pub fn new(storage: Arc<Mutex<SqliteStorage>>, run_id: i64) -> Self {
        Self { storage, run_id }
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Runs `op` against the storage on the blocking pool
    async fn with_storage<T, F>(&self, op: F) -> Result<T, PersistenceError>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteStorage) -> Result<T, StorageError> + Send + 'static,
    {
        let storage = Arc::clone(&self.storage);

        tokio::task::spawn_blocking(move || {
            let mut guard = storage.lock().map_err(|_| {
                PersistenceError::StorageUnavailable("storage lock poisoned".to_string())
            })?;
            op(&mut guard).map_err(classify_storage_error)
        })
        .await
        .map_err(|e| PersistenceError::StorageUnavailable(format!("storage task failed: {}", e)))?
    }
}

#[async_trait]
impl ResultSink for SqliteSink {
    async fn try_accept(&self, record: &CourseRecord) -> Result<(), PersistenceError> {
        let run_id = self.run_id;
        let owned = record.clone();

        let outcome = self
            .with_storage(move |storage| storage.insert_course(&owned, run_id))
            .await?;

        match outcome {
            InsertOutcome::Inserted => Ok(()),
            InsertOutcome::AlreadyExists => Err(PersistenceError::Conflict(record.key.clone())),
        }
    }

    async fn accepted(&self) -> Result<Vec<CourseRecord>, PersistenceError> {
        let run_id = self.run_id;
        self.with_storage(move |storage| storage.get_courses_for_run(run_id))
            .await
    }
}

/// Separates "the store is gone" from "this one write failed"
fn classify_storage_error(error: StorageError) -> PersistenceError {
    match &error {
        StorageError::Io(_) => PersistenceError::StorageUnavailable(error.to_string()),
        StorageError::Sqlite(rusqlite::Error::SqliteFailure(failure, _)) => match failure.code {
            ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::CannotOpen
            | ErrorCode::SystemIoFailure
            | ErrorCode::DiskFull
            | ErrorCode::ReadOnly
            | ErrorCode::NotADatabase
            | ErrorCode::DatabaseCorrupt => {
                PersistenceError::StorageUnavailable(error.to_string())
            }
            _ => PersistenceError::Write(error.to_string()),
        },
        _ => PersistenceError::Write(error.to_string()),
    }
}

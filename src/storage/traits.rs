//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::record::{CourseRecord, UniqueKey};
use crate::state::OutcomeCounts;
use crate::storage::{FailureRecord, InsertOutcome, RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the harvester.
/// Implementations are used behind a mutex; see `SqliteSink`.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new harvest run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Marks a run as finished with its final status and outcome counts
    fn complete_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        counts: &OutcomeCounts,
    ) -> StorageResult<()>;

    /// Counts all runs ever started
    fn count_runs(&self) -> StorageResult<u64>;

    // ===== Courses =====

    /// Lists the unique key of every stored course
    ///
    /// Used once per run to build the deduplication snapshot.
    fn list_unique_keys(&self) -> StorageResult<Vec<UniqueKey>>;

    /// Inserts a course unless its unique key is already stored
    ///
    /// The existence check and the write happen in one statement, so two
    /// concurrent callers with the same key cannot both insert.
    fn insert_course(&mut self, record: &CourseRecord, run_id: i64)
        -> StorageResult<InsertOutcome>;

    /// Gets the courses accepted by one run, in insertion order
    fn get_courses_for_run(&self, run_id: i64) -> StorageResult<Vec<CourseRecord>>;

    /// Gets every stored course, in insertion order
    fn get_all_courses(&self) -> StorageResult<Vec<CourseRecord>>;

    /// Gets total course count
    fn count_courses(&self) -> StorageResult<u64>;

    /// Gets course counts per search term, most frequent first
    fn count_courses_by_search_term(&self) -> StorageResult<Vec<(String, u64)>>;

    // ===== Failures =====

    /// Records a link that failed, or was never started, during a run
    fn record_failure(&mut self, run_id: i64, failure: &FailureRecord) -> StorageResult<()>;

    /// Gets the failures recorded for a run
    fn get_failures_for_run(&self, run_id: i64) -> StorageResult<Vec<FailureRecord>>;

    /// Records a listing page that yielded no links; `link` holds its URL
    fn record_listing_failure(
        &mut self,
        run_id: i64,
        failure: &FailureRecord,
    ) -> StorageResult<()>;

    /// Gets the listing failures recorded for a run
    fn get_listing_failures_for_run(&self, run_id: i64) -> StorageResult<Vec<FailureRecord>>;
}

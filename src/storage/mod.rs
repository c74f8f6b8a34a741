//! Storage module for persisting harvest data
//!
//! This module handles all durable state for the harvester, including:
//! - SQLite database initialization and schema management
//! - Run tracking
//! - Atomic check-then-insert of accepted courses
//! - Failed-link bookkeeping for targeted re-runs
//! - The run-start snapshot of known keys and the result sink

mod dedup;
mod schema;
mod sink;
mod sqlite;
mod traits;

pub use dedup::DedupIndex;
pub use sink::{PersistenceError, ResultSink, SqliteSink};
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::HarvestError;

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// Outcome of an atomic check-then-insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record was written
    Inserted,
    /// A record with the same unique key already existed; nothing was written
    AlreadyExists,
}

/// Represents a harvest run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub done_count: u64,
    pub skipped_count: u64,
    pub failed_count: u64,
}

/// A link or listing page a run did not finish
///
/// `error_kind` is `not_attempted` (with zero attempts) for entries the run
/// stopped before starting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub link: String,
    pub search_term: Option<String>,
    pub error_kind: String,
    pub message: String,
    pub attempts: u32,
}

/// Status of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

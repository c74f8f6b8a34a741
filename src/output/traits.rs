//! Output traits and types
//!
//! This module defines the exporter interface and the run summary that the
//! markdown report and the console output are rendered from.

use crate::record::CourseRecord;
use crate::state::RunReport;
use crate::storage::{FailureRecord, RunRecord};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Writes accepted records to a flat file
pub trait Exporter {
    /// File extension of the format, without the dot
    fn extension(&self) -> &'static str;

    /// Writes `records` to `path`, replacing any existing file
    fn export(&self, records: &[CourseRecord], path: &Path) -> OutputResult<()>;
}

/// Summary of one harvest run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    // Run metadata
    pub run_id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub duration_seconds: Option<u64>,
    pub status: String,
    pub config_hash: String,
    pub termination: String,

    // Discovery
    pub listing_pages: usize,
    pub discovered: usize,

    // Outcome counts
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
    pub not_attempted: usize,

    /// Failed links with reasons
    pub failures: Vec<FailureRecord>,

    /// Links the run stopped before starting
    pub not_attempted_links: Vec<String>,

    /// Listing pages that yielded no links, with the reason
    pub listing_failures: Vec<(String, String)>,

    /// Files written by the exporters
    pub exported_files: Vec<PathBuf>,
}

impl RunSummary {
    /// Creates a new empty run summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the summary of a finished run
    pub fn from_report(run: &RunRecord, report: &RunReport, listing_pages: usize) -> Self {
        let counts = report.counts();

        let duration_seconds = match (
            run.started_at.parse::<chrono::DateTime<chrono::Utc>>(),
            run.finished_at
                .as_deref()
                .map(|f| f.parse::<chrono::DateTime<chrono::Utc>>()),
        ) {
            (Ok(started), Some(Ok(finished))) => {
                Some((finished - started).num_seconds().max(0) as u64)
            }
            _ => None,
        };

        Self {
            run_id: run.id,
            started_at: run.started_at.clone(),
            finished_at: run.finished_at.clone(),
            duration_seconds,
            status: run.status.to_db_string().to_string(),
            config_hash: run.config_hash.clone(),
            termination: report.termination.as_str().to_string(),
            listing_pages,
            discovered: report.discovered(),
            done: counts.done,
            skipped: counts.skipped,
            failed: counts.failed,
            not_attempted: report.not_attempted.len(),
            failures: report
                .failures()
                .filter_map(|outcome| outcome.to_failure_record())
                .collect(),
            not_attempted_links: report
                .not_attempted
                .iter()
                .map(|link| link.url.to_string())
                .collect(),
            listing_failures: report
                .listing_failures
                .iter()
                .map(|f| (f.url.clone(), f.message()))
                .collect(),
            exported_files: Vec::new(),
        }
    }

    /// Returns the number of links that reached a terminal state
    pub fn total_terminal(&self) -> usize {
        self.done + self.skipped + self.failed
    }

    /// Returns the share of terminal links that did not fail, as a percentage
    pub fn success_rate(&self) -> f64 {
        let terminal = self.total_terminal();
        if terminal == 0 {
            return 0.0;
        }
        ((self.done + self.skipped) as f64 / terminal as f64) * 100.0
    }
}

//! Per-link task outcomes and the run report
//!
//! Each admitted link produces exactly one [`TaskOutcome`]. Tasks append
//! their outcome to a shared [`OutcomeLog`]; when the run ends the log is
//! drained into a [`RunReport`].

use crate::crawler::{FetchError, ParseError};
use crate::record::{CourseRecord, DetailLink, UniqueKey};
use crate::state::TaskState;
use crate::storage::{FailureRecord, PersistenceError};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use url::Url;

/// Why a task ended in the Failed state
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The task stopped without reporting (panic or runtime shutdown)
    #[error("task aborted: {0}")]
    TaskAborted(String),
}

impl TaskError {
    /// Short machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch(e) => e.kind(),
            Self::Parse(e) => e.kind(),
            Self::Persistence(e) => e.kind(),
            Self::TaskAborted(_) => "task_aborted",
        }
    }
}

/// Why a task ended in the Skipped state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The key was in the run-start snapshot; nothing was written
    KnownBeforeRun,
    /// The sink's atomic insert found the key already stored
    ConflictOnWrite,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KnownBeforeRun => "known before run",
            Self::ConflictOnWrite => "conflict on write",
        }
    }
}

/// Error kind stored for links and listing pages a run never started
pub const NOT_ATTEMPTED: &str = "not_attempted";

/// Final result of one detail-link task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Accepted {
        link: DetailLink,
        record: CourseRecord,
    },
    SkippedDuplicate {
        link: DetailLink,
        key: UniqueKey,
        reason: SkipReason,
    },
    Failed {
        link: DetailLink,
        error: TaskError,
        /// Fetch attempts made before giving up (0 if the task never fetched)
        attempts: u32,
    },
}

impl TaskOutcome {
    pub fn link(&self) -> &DetailLink {
        match self {
            Self::Accepted { link, .. }
            | Self::SkippedDuplicate { link, .. }
            | Self::Failed { link, .. } => link,
        }
    }

    /// Terminal state this outcome corresponds to
    pub fn state(&self) -> TaskState {
        match self {
            Self::Accepted { .. } => TaskState::Done,
            Self::SkippedDuplicate { .. } => TaskState::Skipped,
            Self::Failed { .. } => TaskState::Failed,
        }
    }

    /// Builds the stored form of a Failed outcome
    pub fn to_failure_record(&self) -> Option<FailureRecord> {
        match self {
            Self::Failed {
                link,
                error,
                attempts,
            } => Some(FailureRecord {
                link: link.url.to_string(),
                search_term: link.search_term.clone(),
                error_kind: error.kind().to_string(),
                message: error.to_string(),
                attempts: *attempts,
            }),
            _ => None,
        }
    }
}

/// Append-only, concurrency-safe collection of outcomes for one run
#[derive(Debug, Clone, Default)]
pub struct OutcomeLog {
    entries: Arc<Mutex<Vec<TaskOutcome>>>,
}

impl OutcomeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, outcome: TaskOutcome) {
        // A poisoned lock still holds every outcome pushed so far
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.push(outcome);
    }

    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes every outcome recorded so far, leaving the log empty
    pub fn drain(&self) -> Vec<TaskOutcome> {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::take(&mut *entries)
    }
}

/// Counts of terminal states in a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl OutcomeCounts {
    pub fn from_outcomes(outcomes: &[TaskOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut counts, outcome| {
            match outcome.state() {
                TaskState::Done => counts.done += 1,
                TaskState::Skipped => counts.skipped += 1,
                _ => counts.failed += 1,
            }
            counts
        })
    }

    pub fn total(&self) -> usize {
        self.done + self.skipped + self.failed
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunTermination {
    /// Every discovered link reached a terminal state
    Completed,
    /// The run was cancelled before every link was admitted
    Cancelled,
    /// The store stopped accepting writes and admission was halted
    StorageUnavailable(String),
}

impl RunTermination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::StorageUnavailable(_) => "storage unavailable",
        }
    }
}

/// A listing page that yielded no links
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingFailure {
    pub url: String,
    /// `None` when the run stopped before the page was fetched
    pub error: Option<FetchError>,
    pub attempts: u32,
}

impl ListingFailure {
    /// A listing page left behind by cancellation
    pub fn not_attempted(url: &Url) -> Self {
        Self {
            url: url.to_string(),
            error: None,
            attempts: 0,
        }
    }

    pub fn kind(&self) -> &'static str {
        match &self.error {
            Some(error) => error.kind(),
            None => NOT_ATTEMPTED,
        }
    }

    pub fn message(&self) -> String {
        match &self.error {
            Some(error) => error.to_string(),
            None => "run stopped before the page was fetched".to_string(),
        }
    }

    /// Builds the stored form of the failure
    pub fn to_failure_record(&self) -> FailureRecord {
        FailureRecord {
            link: self.url.clone(),
            search_term: None,
            error_kind: self.kind().to_string(),
            message: self.message(),
            attempts: self.attempts,
        }
    }
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    /// One outcome per admitted link, in completion order
    pub outcomes: Vec<TaskOutcome>,
    pub listing_failures: Vec<ListingFailure>,
    /// Links discovered but never admitted because the run stopped early
    pub not_attempted: Vec<DetailLink>,
    pub termination: RunTermination,
}

impl RunReport {
    pub fn counts(&self) -> OutcomeCounts {
        OutcomeCounts::from_outcomes(&self.outcomes)
    }

    /// Number of distinct links discovered for the run
    pub fn discovered(&self) -> usize {
        self.outcomes.len() + self.not_attempted.len()
    }

    pub fn accepted(&self) -> impl Iterator<Item = &CourseRecord> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            TaskOutcome::Accepted { record, .. } => Some(record),
            _ => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, TaskOutcome::Failed { .. }))
    }

    /// Stored form of every link that was never started
    pub fn not_attempted_records(&self) -> impl Iterator<Item = FailureRecord> + '_ {
        self.not_attempted.iter().map(|link| FailureRecord {
            link: link.url.to_string(),
            search_term: link.search_term.clone(),
            error_kind: NOT_ATTEMPTED.to_string(),
            message: "run stopped before the link was started".to_string(),
            attempts: 0,
        })
    }

    /// Every link a targeted re-run should pick up: failures, then links
    /// that were never started
    pub fn unfinished_records(&self) -> Vec<FailureRecord> {
        self.failures()
            .filter_map(|outcome| outcome.to_failure_record())
            .chain(self.not_attempted_records())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.termination == RunTermination::Completed
    }
}

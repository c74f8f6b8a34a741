/// Task state definitions for tracking one detail link through a run
///
/// Every discovered link starts as `Pending` and ends in exactly one of the
/// terminal states `Done`, `Skipped` or `Failed`.
use std::fmt;

/// Represents the current state of a detail-link task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    // ===== Waiting =====
    /// Link discovered, waiting for a concurrency permit
    Pending,

    // ===== Active States (hold a permit) =====
    /// Detail page is being fetched (including retries)
    Fetching,

    /// Detail page HTML is being parsed
    Parsing,

    /// Unique key derived and checked against the known-key snapshot
    Deduping,

    /// Optional instructor profile is being fetched
    Enriching,

    /// Record is being written to the result sink
    Persisting,

    // ===== Terminal States =====
    /// Record was accepted by the sink
    Done,

    /// Record was already known, either from the snapshot or on write
    Skipped,

    /// Fetching, parsing or persisting failed
    Failed,
}

impl TaskState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Skipped | Self::Failed)
    }

    /// Returns true if a task in this state counts against the concurrency cap
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Fetching | Self::Parsing | Self::Deduping | Self::Enriching | Self::Persisting
        )
    }

    /// Returns true if the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;

        if self.is_active() && next == Failed {
            return true;
        }

        matches!(
            (self, next),
            (Pending, Fetching)
                | (Fetching, Parsing)
                | (Parsing, Deduping)
                | (Deduping, Skipped)
                | (Deduping, Enriching)
                | (Deduping, Persisting)
                | (Enriching, Persisting)
                | (Persisting, Done)
                | (Persisting, Skipped)
        )
    }

    /// Short lowercase name used in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Parsing => "parsing",
            Self::Deduping => "deduping",
            Self::Enriching => "enriching",
            Self::Persisting => "persisting",
            Self::Done => "done",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }

    /// Returns all possible task states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::Fetching,
            Self::Parsing,
            Self::Deduping,
            Self::Enriching,
            Self::Persisting,
            Self::Done,
            Self::Skipped,
            Self::Failed,
        ]
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

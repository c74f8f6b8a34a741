//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `TaskState`: the per-link state machine (pending, fetching, parsing, ...)
//! - `TaskOutcome`: the single terminal result of each link task
//! - `OutcomeLog`: append-only outcome collection shared by all tasks of a run
//! - `RunReport`: what a run hands back once it is over

mod outcome;
mod task_state;

// Re-export main types
pub use outcome::{
    ListingFailure, OutcomeCounts, OutcomeLog, RunReport, RunTermination, SkipReason, TaskError,
    TaskOutcome, NOT_ATTEMPTED,
};
pub use task_state::TaskState;

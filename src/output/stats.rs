//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::storage::{RunRecord, Storage};
use crate::HarvestError;

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Number of runs recorded
    pub total_runs: u64,

    /// Number of courses stored across all runs
    pub total_courses: u64,

    /// Stored courses per search term, largest first
    pub courses_by_search_term: Vec<(String, u64)>,

    /// The most recent run, if any
    pub latest_run: Option<RunRecord>,

    /// Failed links recorded for the most recent run
    pub latest_failures: u64,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<HarvestStatistics, HarvestError> {
    let total_runs = storage.count_runs()?;
    let total_courses = storage.count_courses()?;

    let mut courses_by_search_term = storage.count_courses_by_search_term()?;
    courses_by_search_term.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let latest_run = storage.get_latest_run()?;
    let latest_failures = match &latest_run {
        Some(run) => storage.get_failures_for_run(run.id)?.len() as u64,
        None => 0,
    };

    Ok(HarvestStatistics {
        total_runs,
        total_courses,
        courses_by_search_term,
        latest_run,
        latest_failures,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Runs recorded: {}", stats.total_runs);
    println!("  Courses stored: {}", stats.total_courses);
    println!();

    if !stats.courses_by_search_term.is_empty() {
        println!("Courses by Search Term:");
        for (term, count) in &stats.courses_by_search_term {
            let percentage = if stats.total_courses > 0 {
                (*count as f64 / stats.total_courses as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", term, count, percentage);
        }
        println!();
    }

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run (#{}):", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!(
                "  Done: {}  Skipped: {}  Failed: {}",
                run.done_count, run.skipped_count, run.failed_count
            );
            if stats.latest_failures > 0 {
                println!(
                    "  {} failed links recorded (use --retry-failed to re-run them)",
                    stats.latest_failures
                );
            }
        }
        None => println!("No runs recorded yet."),
    }
}

//! Output module for run summaries and dataset exports
//!
//! This module handles:
//! - Exporting accepted courses to CSV, XLSX and JSON
//! - Exporting unfinished links for targeted re-runs
//! - Generating markdown summaries of a run
//! - Printing database statistics

mod export;
mod markdown;
pub mod stats;
mod traits;

pub use export::{
    export_failures, export_file_name, export_run, CsvExporter, JsonExporter, XlsxExporter,
    COURSE_COLUMNS,
};
pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::{load_statistics, print_statistics, HarvestStatistics};
pub use traits::{Exporter, OutputError, OutputResult, RunSummary};

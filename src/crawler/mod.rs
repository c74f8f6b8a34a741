//! Crawler module for catalog fetching and processing
//!
//! This module contains the core harvesting logic, including:
//! - Page fetching behind the `PageFetcher` seam
//! - Listing and detail page parsing
//! - Retry with exponential backoff
//! - Bounded-concurrency task scheduling
//! - Overall run coordination

mod coordinator;
mod fetcher;
mod parser;
mod retry;
mod scheduler;

pub use coordinator::{run_harvest, run_status, Coordinator, HarvestOutcome};
pub use fetcher::{build_http_client, user_agent_string, FetchError, HttpFetcher, PageFetcher};
pub use parser::{CatalogParser, ListingPage, ParseError, RecordParser};
pub use retry::{fetch_with_retry, guarded_fetch, Backoff, FetchAttempt, RetryPolicy, FETCH_GRACE};
pub use scheduler::{ConcurrencyScheduler, RunConfiguration};

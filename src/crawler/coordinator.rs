//! Harvest coordinator - run orchestration
//!
//! This module ties the pieces of a run together:
//! - Opening storage and registering the run
//! - Capturing the known-key snapshot
//! - Running the scheduler with the HTTP fetcher and the SQLite sink
//! - Recording failures and the final run status
//! - Exporting the accepted courses and writing the run summary

use crate::config::Config;
use crate::crawler::fetcher::{HttpFetcher, PageFetcher};
use crate::crawler::parser::{CatalogParser, RecordParser};
use crate::crawler::scheduler::{ConcurrencyScheduler, RunConfiguration};
use crate::output::{export_run, generate_markdown_summary, RunSummary};
use crate::record::{CourseRecord, DetailLink};
use crate::state::{RunReport, RunTermination};
use crate::storage::{
    open_storage, DedupIndex, FailureRecord, ResultSink, RunRecord, RunStatus, SqliteSink,
    SqliteStorage, Storage,
};
use crate::HarvestError;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use url::Url;

/// What a finished harvest hands back to the caller
#[derive(Debug)]
pub struct HarvestOutcome {
    pub run_id: i64,
    pub report: RunReport,
    pub summary: RunSummary,
}

/// Work a run is given
enum Workload {
    /// Discover links from the configured listing pages
    Full,
    /// Revisit what an earlier run left unfinished
    Retry {
        listing_urls: Vec<Url>,
        links: Vec<DetailLink>,
    },
}

/// Main harvest coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    config_hash: String,
    storage: Arc<Mutex<SqliteStorage>>,
    fetcher: Arc<dyn PageFetcher>,
    parser: Arc<dyn RecordParser>,
}

impl Coordinator {
    /// Creates a coordinator that fetches over HTTP
    ///
    /// # Arguments
    ///
    /// * `config` - The harvest configuration
    /// * `config_hash` - Hash of the config file, recorded with each run
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - Failed to open storage or build the client
    pub fn new(config: Config, config_hash: String) -> Result<Self, HarvestError> {
        let fetcher = HttpFetcher::from_config(&config.user_agent)?;
        Self::with_fetcher(config, config_hash, Arc::new(fetcher))
    }

    /// Creates a coordinator with a caller-supplied fetcher
    pub fn with_fetcher(
        config: Config,
        config_hash: String,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Result<Self, HarvestError> {
        let storage = open_storage(Path::new(&config.output.database_path))?;

        Ok(Self {
            config: Arc::new(config),
            config_hash,
            storage: Arc::new(Mutex::new(storage)),
            fetcher,
            parser: Arc::new(CatalogParser::new()),
        })
    }

    fn storage(&self) -> Result<MutexGuard<'_, SqliteStorage>, HarvestError> {
        self.storage
            .lock()
            .map_err(|_| HarvestError::Storage("storage lock poisoned".to_string()))
    }

    /// Runs a full harvest: discovery from the listing pages, then every link
    pub async fn run(&self, cancel: CancellationToken) -> Result<HarvestOutcome, HarvestError> {
        self.execute(Workload::Full, cancel).await
    }

    /// Re-runs only what the most recent run did not finish
    ///
    /// That is every failed or never-started link, plus every listing page
    /// that yielded no links. Links that have since been stored by another
    /// run are skipped as duplicates as usual.
    pub async fn retry_failed(
        &self,
        cancel: CancellationToken,
    ) -> Result<HarvestOutcome, HarvestError> {
        let workload = {
            let storage = self.storage()?;
            let latest = storage
                .get_latest_run()?
                .ok_or_else(|| HarvestError::Storage("no previous run to retry".to_string()))?;
            let failures = storage.get_failures_for_run(latest.id)?;
            let listing_failures = storage.get_listing_failures_for_run(latest.id)?;
            tracing::info!(
                "Retrying {} links and {} listing pages from run {}",
                failures.len(),
                listing_failures.len(),
                latest.id
            );

            let links = failures
                .into_iter()
                .filter_map(|failure| match Url::parse(&failure.link) {
                    Ok(url) => Some(DetailLink::new(url).with_search_term(failure.search_term)),
                    Err(e) => {
                        tracing::warn!("Skipping stored link {}: {}", failure.link, e);
                        None
                    }
                })
                .collect();
            let listing_urls = listing_failures
                .into_iter()
                .filter_map(|failure| match Url::parse(&failure.link) {
                    Ok(url) => Some(url),
                    Err(e) => {
                        tracing::warn!("Skipping stored listing page {}: {}", failure.link, e);
                        None
                    }
                })
                .collect();

            Workload::Retry {
                listing_urls,
                links,
            }
        };

        self.execute(workload, cancel).await
    }

    async fn execute(
        &self,
        workload: Workload,
        cancel: CancellationToken,
    ) -> Result<HarvestOutcome, HarvestError> {
        let mut run_config = RunConfiguration::from_config(&self.config)?;
        let links = match workload {
            Workload::Full => Vec::new(),
            Workload::Retry {
                listing_urls,
                links,
            } => {
                run_config.listing_urls = listing_urls;
                links
            }
        };
        let listing_pages = run_config.listing_urls.len();

        let (run_id, index) = {
            let mut storage = self.storage()?;
            let run_id = storage.create_run(&self.config_hash)?;
            let index = DedupIndex::snapshot(&*storage)?;
            (run_id, index)
        };
        tracing::info!(
            "Starting harvest run {} ({} keys already stored)",
            run_id,
            index.len()
        );

        let sink = SqliteSink::new(Arc::clone(&self.storage), run_id);
        let scheduler = ConcurrencyScheduler::new(
            run_config,
            Arc::clone(&self.fetcher),
            Arc::clone(&self.parser),
            Arc::new(sink.clone()),
            index,
        );

        let report = scheduler.run_with_links(links, cancel).await;

        let counts = report.counts();
        tracing::info!(
            "Run {} {}: {} done, {} skipped, {} failed, {} not attempted",
            run_id,
            report.termination.as_str(),
            counts.done,
            counts.skipped,
            counts.failed,
            report.not_attempted.len()
        );

        let unfinished = report.unfinished_records();
        let run = self.finalize_run(run_id, &report, &unfinished);

        let accepted = match sink.accepted().await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Could not read back accepted courses: {}", e);
                report.accepted().cloned().collect()
            }
        };

        let mut summary = RunSummary::from_report(&run, &report, listing_pages);
        summary.exported_files = export_run(
            &accepted,
            &unfinished,
            Path::new(&self.config.output.export_dir),
            &self.config.search.expression,
            &format!("run{}", run_id),
        )?;
        generate_markdown_summary(&summary, Path::new(&self.config.output.summary_path))?;
        tracing::info!("Summary written to {}", self.config.output.summary_path);

        Ok(HarvestOutcome {
            run_id,
            report,
            summary,
        })
    }

    /// Stores the run's unfinished links, listing failures and final status
    ///
    /// Storage may be the reason the run stopped, so errors here are logged
    /// and the run record is rebuilt from the report instead.
    fn finalize_run(
        &self,
        run_id: i64,
        report: &RunReport,
        unfinished: &[FailureRecord],
    ) -> RunRecord {
        let status = run_status(&report.termination);
        let counts = report.counts();

        let stored = self.storage().and_then(|mut storage| {
            for failure in unfinished {
                storage.record_failure(run_id, failure)?;
            }
            for failure in &report.listing_failures {
                storage.record_listing_failure(run_id, &failure.to_failure_record())?;
            }
            storage.complete_run(run_id, status, &counts)?;
            Ok(storage.get_run(run_id)?)
        });

        match stored {
            Ok(run) => run,
            Err(e) => {
                tracing::error!("Failed to finalize run {}: {}", run_id, e);
                let now = chrono::Utc::now().to_rfc3339();
                RunRecord {
                    id: run_id,
                    started_at: now.clone(),
                    finished_at: Some(now),
                    config_hash: self.config_hash.clone(),
                    status,
                    done_count: counts.done as u64,
                    skipped_count: counts.skipped as u64,
                    failed_count: counts.failed as u64,
                }
            }
        }
    }

    /// Exports every stored course without running a harvest
    pub fn export_stored(&self) -> Result<Vec<PathBuf>, HarvestError> {
        let records: Vec<CourseRecord> = self.storage()?.get_all_courses()?;
        tracing::info!("Exporting {} stored courses", records.len());

        Ok(export_run(
            &records,
            &[],
            Path::new(&self.config.output.export_dir),
            &self.config.search.expression,
            "all",
        )?)
    }
}

/// Maps how a run ended onto the status stored for it
pub fn run_status(termination: &RunTermination) -> RunStatus {
    match termination {
        RunTermination::Completed => RunStatus::Completed,
        RunTermination::Cancelled => RunStatus::Interrupted,
        RunTermination::StorageUnavailable(_) => RunStatus::Failed,
    }
}

/// Runs a complete harvest operation
///
/// This is the main entry point for a harvest. It will:
/// 1. Open the storage and register a new run
/// 2. Snapshot the keys already stored
/// 3. Discover detail links from the listing pages
/// 4. Fetch, parse and deduplicate every link under the concurrency cap
/// 5. Record failures and the run status
/// 6. Export the accepted courses and write the summary
///
/// # Example
///
/// ```no_run
/// use course_harvest::config::load_config_with_hash;
/// use course_harvest::crawler::run_harvest;
/// use std::path::Path;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("harvest.toml"))?;
/// let outcome = run_harvest(config, hash, CancellationToken::new()).await?;
/// println!("{} new courses", outcome.report.counts().done);
/// # Ok(())
/// # }
/// ```
pub async fn run_harvest(
    config: Config,
    config_hash: String,
    cancel: CancellationToken,
) -> Result<HarvestOutcome, HarvestError> {
    let coordinator = Coordinator::new(config, config_hash)?;
    coordinator.run(cancel).await
}

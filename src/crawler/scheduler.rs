//! Bounded-concurrency scheduler for link tasks
//!
//! This module handles:
//! - Discovering detail links from the listing pages
//! - Global concurrency limiting via a semaphore
//! - Driving each link through fetch, parse, dedup and persist
//! - Stopping admission on cancellation or when storage goes away

use crate::config::Config;
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::parser::RecordParser;
use crate::crawler::retry::{fetch_with_retry, RetryPolicy};
use crate::record::{CourseRecord, DetailLink, KeyStrategy};
use crate::state::{
    ListingFailure, OutcomeLog, RunReport, RunTermination, SkipReason, TaskError, TaskOutcome,
    TaskState,
};
use crate::storage::{DedupIndex, PersistenceError, ResultSink};
use crate::url::{build_listing_urls, normalize_url};
use crate::HarvestError;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Settings a single run is executed with
#[derive(Debug, Clone)]
pub struct RunConfiguration {
    /// Listing pages to discover detail links from
    pub listing_urls: Vec<Url>,

    /// Maximum number of tasks in an active state at once
    pub max_concurrent_tasks: usize,

    /// Per-fetch timeout
    pub timeout: Duration,

    pub retry: RetryPolicy,

    pub key_strategy: KeyStrategy,

    /// Fetch the instructor profile of every new course
    pub fetch_instructor_profiles: bool,
}

impl RunConfiguration {
    /// Builds the run settings from a loaded configuration
    ///
    /// Explicit `listing-urls` replace the search template.
    pub fn from_config(config: &Config) -> Result<Self, HarvestError> {
        let listing_urls = if config.search.listing_urls.is_empty() {
            build_listing_urls(
                &config.catalog.base_url,
                &config.search.expression,
                config.search.start_page,
                config.search.end_page,
            )?
        } else {
            config
                .search
                .listing_urls
                .iter()
                .map(|url| normalize_url(url))
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(Self {
            listing_urls,
            max_concurrent_tasks: config.run.max_concurrent_tasks as usize,
            timeout: Duration::from_millis(config.run.timeout_ms),
            retry: RetryPolicy::from_settings(&config.run),
            key_strategy: config.catalog.unique_key,
            fetch_instructor_profiles: config.run.fetch_instructor_profiles,
        })
    }
}

/// Runs link tasks under a global concurrency cap
///
/// The scheduler coordinates:
/// - Listing discovery and link deduplication
/// - Admission of tasks through a counting semaphore
/// - The per-task state machine
/// - Collecting exactly one outcome per admitted link
pub struct ConcurrencyScheduler {
    config: Arc<RunConfiguration>,
    fetcher: Arc<dyn PageFetcher>,
    parser: Arc<dyn RecordParser>,
    sink: Arc<dyn ResultSink>,
    index: DedupIndex,
}

impl ConcurrencyScheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `config` - Settings of the run
    /// * `fetcher` - Source of page bodies
    /// * `parser` - Extracts links and records from page bodies
    /// * `sink` - Destination of accepted records
    /// * `index` - Keys already persisted when the run starts
    pub fn new(
        config: RunConfiguration,
        fetcher: Arc<dyn PageFetcher>,
        parser: Arc<dyn RecordParser>,
        sink: Arc<dyn ResultSink>,
        index: DedupIndex,
    ) -> Self {
        Self {
            config: Arc::new(config),
            fetcher,
            parser,
            sink,
            index,
        }
    }

    fn semaphore(&self) -> Arc<Semaphore> {
        Arc::new(Semaphore::new(self.config.max_concurrent_tasks.max(1)))
    }

    /// Discovers links from every listing page, then processes them
    pub async fn run(&self, cancel: CancellationToken) -> RunReport {
        self.run_with_links(Vec::new(), cancel).await
    }

    /// Discovers links from the listing pages and processes them after `links`
    ///
    /// A discovered URL that is already in `links` is processed once.
    pub async fn run_with_links(
        &self,
        links: Vec<DetailLink>,
        cancel: CancellationToken,
    ) -> RunReport {
        let (discovered, listing_failures) = self.discover_links(&cancel).await;

        let links = links.into_iter().chain(discovered).collect();
        let mut report = self.run_links(links, cancel).await;
        report.listing_failures = listing_failures;
        report
    }

    /// Fetches every listing page and unions the links they contain
    ///
    /// Links keep the order of the listing pages they were found on; a URL
    /// found on several pages is kept once, at its first occurrence. Pages
    /// left unfetched by cancellation are reported as failures with no error.
    pub async fn discover_links(
        &self,
        cancel: &CancellationToken,
    ) -> (Vec<DetailLink>, Vec<ListingFailure>) {
        let semaphore = self.semaphore();
        let mut tasks = JoinSet::new();
        let mut failures = Vec::new();
        let mut pending = self.config.listing_urls.iter().cloned().enumerate();

        while let Some((idx, url)) = pending.next() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let permit = match permit {
                Some(permit) => permit,
                None => {
                    tracing::info!("Listing discovery stopped before {}", url);
                    failures.push(ListingFailure::not_attempted(&url));
                    failures.extend(
                        pending
                            .by_ref()
                            .map(|(_, url)| ListingFailure::not_attempted(&url)),
                    );
                    break;
                }
            };

            let config = Arc::clone(&self.config);
            let fetcher = Arc::clone(&self.fetcher);
            let parser = Arc::clone(&self.parser);

            tasks.spawn(async move {
                let _permit = permit;
                let attempt =
                    fetch_with_retry(fetcher.as_ref(), &url, config.timeout, &config.retry).await;

                let page = match attempt.result {
                    Ok(html) => Ok(parser.extract_links(&html, &url)),
                    Err(error) => Err(ListingFailure {
                        url: url.to_string(),
                        error: Some(error),
                        attempts: attempt.attempts,
                    }),
                };
                (idx, page)
            });
        }

        let mut pages = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, Ok(page))) => {
                    tracing::debug!("Listing {} yielded {} links", page.url, page.links.len());
                    pages.push((idx, page));
                }
                Ok((_, Err(failure))) => {
                    tracing::warn!(
                        "Listing {} failed after {} attempts: {}",
                        failure.url,
                        failure.attempts,
                        failure.message()
                    );
                    failures.push(failure);
                }
                Err(e) => tracing::error!("Listing task aborted: {}", e),
            }
        }

        pages.sort_by_key(|(idx, _)| *idx);
        let links = coalesce_links(pages.into_iter().flat_map(|(_, page)| page.links));

        tracing::info!(
            "Discovered {} unique detail links from {} listing pages",
            links.len(),
            self.config.listing_urls.len()
        );

        (links, failures)
    }

    /// Processes the given links until each admitted one is terminal
    ///
    /// Duplicate URLs in `links` are processed once. On cancellation, or once
    /// the sink reports that storage is unavailable, no further links are
    /// admitted; tasks already running finish and the rest are reported as
    /// not attempted.
    pub async fn run_links(&self, links: Vec<DetailLink>, cancel: CancellationToken) -> RunReport {
        let links = coalesce_links(links);
        let semaphore = self.semaphore();
        let log = OutcomeLog::new();
        let halt = cancel.child_token();
        let storage_failure: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

        let mut tasks = JoinSet::new();
        let mut admitted = Vec::with_capacity(links.len());
        let mut not_attempted = Vec::new();
        let mut pending = links.into_iter();

        while let Some(link) = pending.next() {
            let permit = tokio::select! {
                biased;
                _ = halt.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let permit = match permit {
                Some(permit) => permit,
                None => {
                    not_attempted.push(link);
                    not_attempted.extend(pending.by_ref());
                    break;
                }
            };

            admitted.push(link.clone());
            let task = LinkTask {
                config: Arc::clone(&self.config),
                fetcher: Arc::clone(&self.fetcher),
                parser: Arc::clone(&self.parser),
                sink: Arc::clone(&self.sink),
                index: self.index.clone(),
            };
            let log = log.clone();
            let halt = halt.clone();
            let storage_failure = Arc::clone(&storage_failure);

            tasks.spawn(async move {
                let _permit = permit;
                let outcome = task.process(link).await;

                if let TaskOutcome::Failed {
                    error: TaskError::Persistence(PersistenceError::StorageUnavailable(reason)),
                    ..
                } = &outcome
                {
                    let mut slot = match storage_failure.lock() {
                        Ok(guard) => guard,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    if slot.is_none() {
                        tracing::error!("Storage unavailable, halting admission: {}", reason);
                        *slot = Some(reason.clone());
                    }
                    halt.cancel();
                }

                log.push(outcome);
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Link task aborted: {}", e);
            }
        }

        let mut outcomes = log.drain();
        let reported: HashSet<Url> = outcomes.iter().map(|o| o.link().url.clone()).collect();
        for link in admitted {
            if !reported.contains(&link.url) {
                outcomes.push(TaskOutcome::Failed {
                    link,
                    error: TaskError::TaskAborted("task stopped without an outcome".to_string()),
                    attempts: 0,
                });
            }
        }

        let storage_failure = match storage_failure.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let termination = match storage_failure {
            Some(reason) => RunTermination::StorageUnavailable(reason),
            None if cancel.is_cancelled() => RunTermination::Cancelled,
            None => RunTermination::Completed,
        };

        if !not_attempted.is_empty() {
            tracing::warn!(
                "{} links were not attempted ({})",
                not_attempted.len(),
                termination.as_str()
            );
        }

        RunReport {
            outcomes,
            listing_failures: Vec::new(),
            not_attempted,
            termination,
        }
    }
}

/// Drops links whose URL was already seen, keeping first occurrences
fn coalesce_links(links: impl IntoIterator<Item = DetailLink>) -> Vec<DetailLink> {
    let mut seen = HashSet::new();
    links
        .into_iter()
        .filter(|link| seen.insert(link.url.clone()))
        .collect()
}

/// Current state of one task, with checked transitions
struct StateTracker {
    url: String,
    state: TaskState,
}

impl StateTracker {
    fn new(link: &DetailLink) -> Self {
        Self {
            url: link.url.to_string(),
            state: TaskState::Pending,
        }
    }

    fn advance(&mut self, next: TaskState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {} -> {}",
            self.state,
            next
        );
        tracing::trace!("{}: {} -> {}", self.url, self.state, next);
        self.state = next;
    }
}

/// Everything one link task needs, owned so it can be spawned
struct LinkTask {
    config: Arc<RunConfiguration>,
    fetcher: Arc<dyn PageFetcher>,
    parser: Arc<dyn RecordParser>,
    sink: Arc<dyn ResultSink>,
    index: DedupIndex,
}

impl LinkTask {
    async fn process(&self, link: DetailLink) -> TaskOutcome {
        let mut tracker = StateTracker::new(&link);

        tracker.advance(TaskState::Fetching);
        let attempt = fetch_with_retry(
            self.fetcher.as_ref(),
            &link.url,
            self.config.timeout,
            &self.config.retry,
        )
        .await;
        let attempts = attempt.attempts;
        let html = match attempt.result {
            Ok(html) => html,
            Err(error) => return self.fail(&mut tracker, link, error.into(), attempts),
        };

        tracker.advance(TaskState::Parsing);
        let course = match self.parser.extract_record(&html) {
            Ok(course) => course,
            Err(error) => return self.fail(&mut tracker, link, error.into(), attempts),
        };

        tracker.advance(TaskState::Deduping);
        let key = self.config.key_strategy.derive(&link, &course);
        if self.index.exists(&key) {
            tracker.advance(TaskState::Skipped);
            tracing::debug!("{}: key '{}' already stored", link, key);
            return TaskOutcome::SkippedDuplicate {
                link,
                key,
                reason: SkipReason::KnownBeforeRun,
            };
        }

        let mut record = CourseRecord::new(key, &link, course);

        if self.config.fetch_instructor_profiles {
            if let Some(profile_url) = record.course.instructor.profile_url.clone() {
                tracker.advance(TaskState::Enriching);
                self.enrich(&mut record, &profile_url).await;
            }
        }

        tracker.advance(TaskState::Persisting);
        match self.sink.try_accept(&record).await {
            Ok(()) => {
                tracker.advance(TaskState::Done);
                tracing::debug!("{}: accepted as '{}'", link, record.key);
                TaskOutcome::Accepted { link, record }
            }
            Err(PersistenceError::Conflict(key)) => {
                tracker.advance(TaskState::Skipped);
                tracing::debug!("{}: key '{}' stored concurrently", link, key);
                TaskOutcome::SkippedDuplicate {
                    link,
                    key,
                    reason: SkipReason::ConflictOnWrite,
                }
            }
            Err(error) => self.fail(&mut tracker, link, error.into(), attempts),
        }
    }

    /// Attaches the instructor profile; failures leave the record unchanged
    async fn enrich(&self, record: &mut CourseRecord, profile_url: &str) {
        let url = match Url::parse(profile_url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Skipping instructor profile {}: {}", profile_url, e);
                return;
            }
        };

        let attempt = fetch_with_retry(
            self.fetcher.as_ref(),
            &url,
            self.config.timeout,
            &self.config.retry,
        )
        .await;

        match attempt.result {
            Ok(html) => {
                let profile = self.parser.extract_instructor(&html, &url);
                if !profile.is_empty() {
                    record.instructor_profile = Some(profile);
                }
            }
            Err(e) => tracing::warn!("Instructor profile {} unavailable: {}", url, e),
        }
    }

    fn fail(
        &self,
        tracker: &mut StateTracker,
        link: DetailLink,
        error: TaskError,
        attempts: u32,
    ) -> TaskOutcome {
        tracker.advance(TaskState::Failed);
        tracing::warn!("{} failed: {}", link, error);
        TaskOutcome::Failed {
            link,
            error,
            attempts,
        }
    }
}

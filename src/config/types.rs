use crate::record::KeyStrategy;
use serde::Deserialize;

/// Main configuration structure for course-harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub run: RunSettings,
    pub search: SearchConfig,
    pub catalog: CatalogConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Scheduler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RunSettings {
    /// Maximum number of tasks in flight at once
    #[serde(rename = "max-concurrent-tasks")]
    pub max_concurrent_tasks: u32,

    /// Per-fetch deadline (milliseconds)
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Total fetch attempts per page, including the first one
    #[serde(rename = "retry-attempts")]
    pub retry_attempts: u32,

    /// Delay policy between fetch attempts
    #[serde(rename = "retry-backoff", default)]
    pub retry_backoff: BackoffConfig,

    /// Whether to follow each course's instructor link for profile details
    #[serde(rename = "fetch-instructor-profiles", default)]
    pub fetch_instructor_profiles: bool,
}

/// Exponential backoff between fetch attempts
#[derive(Debug, Clone, Deserialize)]
pub struct BackoffConfig {
    #[serde(rename = "initial-delay-ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            multiplier: default_multiplier(),
            max_delay_ms: 10_000,
        }
    }
}

/// Search term and page range used to build listing URLs
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// The search expression, e.g. "ChatGPT" or "rust programming"
    pub expression: String,

    #[serde(rename = "start-page", default = "default_page")]
    pub start_page: u32,

    #[serde(rename = "end-page", default = "default_page")]
    pub end_page: u32,

    /// Explicit listing URLs; when non-empty they replace the search template
    #[serde(rename = "listing-urls", default)]
    pub listing_urls: Vec<String>,
}

fn default_page() -> u32 {
    1
}

/// Target catalog configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Base URL of the catalog, e.g. "https://www.udemy.com"
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// How a course's unique key is derived for deduplication
    #[serde(rename = "unique-key", default)]
    pub unique_key: KeyStrategy,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    #[serde(rename = "contact-url")]
    pub contact_url: String,

    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory receiving the CSV/JSON exports
    #[serde(rename = "export-dir")]
    pub export_dir: String,

    /// Path to the markdown run summary
    #[serde(rename = "summary-path")]
    pub summary_path: String,
}

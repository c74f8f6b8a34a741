//! Full harvest runs against a mock catalog

use course_harvest::config::{
    BackoffConfig, CatalogConfig, Config, OutputConfig, RunSettings, SearchConfig,
    UserAgentConfig,
};
use course_harvest::crawler::Coordinator;
use course_harvest::record::KeyStrategy;
use course_harvest::state::RunTermination;
use course_harvest::storage::{RunStatus, SqliteStorage, Storage};
use std::path::Path;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock catalog
fn create_test_config(base_url: &str, dir: &TempDir, end_page: u32) -> Config {
    let file = |name: &str| dir.path().join(name).to_string_lossy().into_owned();

    Config {
        run: RunSettings {
            max_concurrent_tasks: 4,
            timeout_ms: 2000,
            retry_attempts: 3,
            retry_backoff: BackoffConfig {
                initial_delay_ms: 10,
                multiplier: 2.0,
                max_delay_ms: 50,
            },
            fetch_instructor_profiles: false,
        },
        search: SearchConfig {
            expression: "rust".to_string(),
            start_page: 1,
            end_page,
            listing_urls: vec![],
        },
        catalog: CatalogConfig {
            base_url: base_url.to_string(),
            unique_key: KeyStrategy::Slug,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestHarvester".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: file("courses.db"),
            export_dir: file("dataset"),
            summary_path: file("summary.md"),
        },
    }
}

fn listing_html(slugs: &[&str]) -> String {
    let cards: String = slugs
        .iter()
        .map(|slug| {
            format!(
                r#"<div class="course-card"><h3 data-purpose="course-title-url">
                <a href="/course/{}/?couponCode=X">{}</a></h3></div>"#,
                slug, slug
            )
        })
        .collect();
    format!(
        r#"<html><body><h1 class="search--header-title">{} results for “rust”</h1>{}</body></html>"#,
        slugs.len(),
        cards
    )
}

fn detail_html(base_url: &str, slug: &str, title: &str) -> String {
    format!(
        r#"<html><head>
        <meta property="og:url" content="{}/course/{}/" />
        </head><body>
        <h1 class="clp-lead__title">{}</h1>
        <div class="clp-lead__headline">Learn {} from scratch</div>
        <span data-purpose="rating-number">4.7</span>
        </body></html>"#,
        base_url, slug, title, title
    )
}

async fn mount_listing(server: &MockServer, page: u32, slugs: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/courses/search/"))
        .and(query_param("p", page.to_string().as_str()))
        .and(query_param("q", "rust"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_html(slugs))
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

async fn mount_detail(server: &MockServer, slug: &str, body: String, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/course/{}", slug)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn open(config: &Config) -> SqliteStorage {
    SqliteStorage::new(Path::new(&config.output.database_path)).expect("Failed to open DB")
}

#[tokio::test]
async fn test_full_harvest_deduplicates_links() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    // Both listing pages link the same three courses
    mount_listing(&mock_server, 1, &["alpha", "beta", "gamma"]).await;
    mount_listing(&mock_server, 2, &["gamma", "alpha", "beta"]).await;
    for slug in ["alpha", "beta", "gamma"] {
        mount_detail(&mock_server, slug, detail_html(&base_url, slug, slug), 1).await;
    }

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&base_url, &dir, 2);
    let coordinator = Coordinator::new(config.clone(), "hash".to_string())
        .expect("Failed to create coordinator");

    let outcome = coordinator
        .run(CancellationToken::new())
        .await
        .expect("Harvest failed");

    assert_eq!(outcome.report.outcomes.len(), 3);
    assert_eq!(outcome.report.counts().done, 3);
    assert_eq!(outcome.report.termination, RunTermination::Completed);
    assert_eq!(outcome.summary.listing_pages, 2);

    let storage = open(&config);
    assert_eq!(storage.count_courses().unwrap(), 3);
    let stored = storage.get_courses_for_run(outcome.run_id).unwrap();
    assert!(stored
        .iter()
        .all(|r| r.search_term.as_deref() == Some("rust")));
    let alpha = stored.iter().find(|r| r.key.as_str() == "alpha").unwrap();
    assert_eq!(alpha.course.subtitle.as_deref(), Some("Learn alpha from scratch"));
    assert_eq!(alpha.course.rating.as_deref(), Some("4.7"));

    let run = storage.get_run(outcome.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.done_count, 3);

    assert_eq!(outcome.summary.exported_files.len(), 3);
    for file in &outcome.summary.exported_files {
        assert!(file.exists(), "missing export {}", file.display());
    }
    let summary = std::fs::read_to_string(&config.output.summary_path).unwrap();
    assert!(summary.contains("| Done | 3 |"));
}

#[tokio::test]
async fn test_rerun_stores_nothing_new() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_listing(&mock_server, 1, &["alpha", "beta"]).await;
    for slug in ["alpha", "beta"] {
        mount_detail(&mock_server, slug, detail_html(&base_url, slug, slug), 2).await;
    }

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&base_url, &dir, 1);
    let coordinator = Coordinator::new(config.clone(), "hash".to_string())
        .expect("Failed to create coordinator");

    let first = coordinator.run(CancellationToken::new()).await.unwrap();
    let second = coordinator.run(CancellationToken::new()).await.unwrap();

    assert_eq!(first.report.counts().done, 2);
    assert_eq!(second.report.counts().done, 0);
    assert_eq!(second.report.counts().skipped, 2);
    assert_eq!(open(&config).count_courses().unwrap(), 2);
    assert_eq!(open(&config).count_runs().unwrap(), 2);
}

#[tokio::test]
async fn test_missing_title_is_recorded_as_failure() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_listing(&mock_server, 1, &["alpha", "untitled"]).await;
    mount_detail(&mock_server, "alpha", detail_html(&base_url, "alpha", "Alpha"), 1).await;
    mount_detail(
        &mock_server,
        "untitled",
        format!(
            r#"<html><head><meta property="og:url" content="{}/course/untitled/" /></head>
            <body><p>No heading here</p></body></html>"#,
            base_url
        ),
        1,
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&base_url, &dir, 1);
    let coordinator = Coordinator::new(config.clone(), "hash".to_string()).unwrap();

    let outcome = coordinator.run(CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.report.counts().done, 1);
    assert_eq!(outcome.report.counts().failed, 1);

    let failures = open(&config).get_failures_for_run(outcome.run_id).unwrap();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].link.ends_with("/course/untitled"));
    assert_eq!(failures[0].error_kind, "missing_field");
    assert_eq!(failures[0].attempts, 1);

    // Failures file is exported next to the course files
    assert_eq!(outcome.summary.exported_files.len(), 4);
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_listing(&mock_server, 1, &["flaky"]).await;

    // First two requests fail, the third succeeds
    Mock::given(method("GET"))
        .and(path("/course/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;
    mount_detail(&mock_server, "flaky", detail_html(&base_url, "flaky", "Flaky"), 1).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&base_url, &dir, 1);
    let coordinator = Coordinator::new(config, "hash".to_string()).unwrap();

    let outcome = coordinator.run(CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.report.counts().done, 1);
    assert_eq!(outcome.report.counts().failed, 0);
}

#[tokio::test]
async fn test_retry_failed_picks_up_fixed_pages() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_listing(&mock_server, 1, &["alpha", "later"]).await;
    mount_detail(&mock_server, "alpha", detail_html(&base_url, "alpha", "Alpha"), 1).await;

    // Unavailable for the whole first run (three attempts), then fixed
    Mock::given(method("GET"))
        .and(path("/course/later"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(3)
        .mount(&mock_server)
        .await;
    mount_detail(&mock_server, "later", detail_html(&base_url, "later", "Later"), 1).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&base_url, &dir, 1);
    let coordinator = Coordinator::new(config.clone(), "hash".to_string()).unwrap();

    let first = coordinator.run(CancellationToken::new()).await.unwrap();
    assert_eq!(first.report.counts().failed, 1);

    let retry = coordinator
        .retry_failed(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(retry.report.outcomes.len(), 1);
    assert_eq!(retry.report.counts().done, 1);
    assert_eq!(open(&config).count_courses().unwrap(), 2);
}

#[tokio::test]
async fn test_explicit_listing_urls_replace_search() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/topic/rust"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(&["alpha"])))
        .mount(&mock_server)
        .await;
    mount_detail(&mock_server, "alpha", detail_html(&base_url, "alpha", "Alpha"), 1).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&base_url, &dir, 1);
    config.search.listing_urls = vec![format!("{}/topic/rust", base_url)];
    let coordinator = Coordinator::new(config, "hash".to_string()).unwrap();

    let outcome = coordinator.run(CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.report.counts().done, 1);
    assert!(outcome.report.listing_failures.is_empty());
}

#[tokio::test]
async fn test_cancelled_run_is_interrupted_and_recoverable() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_listing(&mock_server, 1, &["alpha"]).await;
    mount_detail(&mock_server, "alpha", detail_html(&base_url, "alpha", "Alpha"), 1).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&base_url, &dir, 1);
    let coordinator = Coordinator::new(config.clone(), "hash".to_string()).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = coordinator.run(cancel).await.unwrap();

    assert!(outcome.report.outcomes.is_empty());
    assert_eq!(outcome.report.termination, RunTermination::Cancelled);
    assert_eq!(outcome.report.listing_failures.len(), 1);
    let storage = open(&config);
    assert_eq!(
        storage.get_run(outcome.run_id).unwrap().status,
        RunStatus::Interrupted
    );
    let unfetched = storage.get_listing_failures_for_run(outcome.run_id).unwrap();
    assert_eq!(unfetched.len(), 1);
    assert_eq!(unfetched[0].error_kind, "not_attempted");

    // The unfetched listing page is picked up again
    let retry = coordinator
        .retry_failed(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(retry.report.counts().done, 1);
    assert_eq!(open(&config).count_courses().unwrap(), 1);
}

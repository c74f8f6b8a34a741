//! HttpFetcher against a mock server

use course_harvest::config::UserAgentConfig;
use course_harvest::crawler::{user_agent_string, FetchError, HttpFetcher, PageFetcher};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestHarvester".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

fn fetcher() -> HttpFetcher {
    HttpFetcher::from_config(&user_agent()).expect("Failed to build client")
}

fn url(server: &MockServer, route: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), route)).expect("Failed to parse URL")
}

#[tokio::test]
async fn test_fetch_returns_body_and_sends_user_agent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/course/rust"))
        .and(header("user-agent", user_agent_string(&user_agent()).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>rust</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let body = fetcher()
        .fetch(&url(&mock_server, "/course/rust"), Duration::from_secs(5))
        .await
        .expect("Fetch failed");

    assert_eq!(body, "<html>rust</html>");
}

#[tokio::test]
async fn test_fetch_reports_http_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/course/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let error = fetcher()
        .fetch(&url(&mock_server, "/course/gone"), Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(matches!(error, FetchError::HttpStatus { status: 404, .. }));
    assert!(!error.is_retryable());
}

#[tokio::test]
async fn test_fetch_times_out_slow_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/course/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("too late")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let started = std::time::Instant::now();
    let error = fetcher()
        .fetch(&url(&mock_server, "/course/slow"), Duration::from_millis(200))
        .await
        .unwrap_err();

    assert!(matches!(error, FetchError::Timeout { .. }));
    assert!(error.is_retryable());
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_fetch_follows_redirects() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/course/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("location", "/course/new"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/course/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved here"))
        .mount(&mock_server)
        .await;

    let body = fetcher()
        .fetch(&url(&mock_server, "/course/old"), Duration::from_secs(5))
        .await
        .expect("Fetch failed");

    assert_eq!(body, "moved here");
}

#[tokio::test]
async fn test_fetch_connection_refused_is_network_error() {
    let unreachable = Url::parse("http://127.0.0.1:1/course/x").unwrap();

    let error = fetcher()
        .fetch(&unreachable, Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(matches!(error, FetchError::Network { .. }));
}

//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use polite_crawler::config::Config;
use polite_crawler::crawler::{CrawlEngine, RateSource, RejectReason};
use polite_crawler::output::{CrawlEvent, MemorySink};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a fast test configuration seeded at the mock server root
fn create_test_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.crawler.seed = Some(format!("{}/", base_url));
    config.crawler.user_agent = "TestBot/1.0".to_string();
    config.crawler.tasks_per = 100;
    config.crawler.per_unit = 0.01;
    config.fetch.timeout_secs = 5;
    config
}

async fn mount_robots(server: &MockServer, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(body, "text/html"),
        )
        .mount(server)
        .await;
}

fn anchors(hrefs: &[&str]) -> String {
    let links: String = hrefs
        .iter()
        .map(|href| format!(r#"<a href="{}">link</a>"#, href))
        .collect();
    format!("<html><body>{}</body></html>", links)
}

#[tokio::test]
async fn test_full_crawl_single_domain() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_robots(&mock_server, 200, "User-agent: *\nAllow: /").await;
    mount_page(
        &mock_server,
        "/",
        anchors(&[&format!("{}/page1", base_url), "/page2", "page2#section"]),
    )
    .await;
    mount_page(&mock_server, "/page1", anchors(&["/", "/page2/", "/page3"])).await;
    mount_page(&mock_server, "/page2", anchors(&["/page1"])).await;
    mount_page(&mock_server, "/page3", "<p>leaf</p>".to_string()).await;

    let config = create_test_config(&base_url);
    let sink = Arc::new(MemorySink::new());
    let engine = CrawlEngine::from_config(&config, sink.clone())
        .await
        .expect("Failed to create engine");
    let report = engine.run().await.expect("Crawl failed");

    assert_eq!(
        report.visited,
        vec![
            base_url.clone(),
            format!("{}/page1", base_url),
            format!("{}/page2", base_url),
            format!("{}/page3", base_url),
        ]
    );
    assert_eq!(report.stats.pages_fetched, 4);
    assert_eq!(report.stats.pages_failed, 0);
    assert!(!report.interrupted);
    assert!(report.stats.rejections.get(&RejectReason::Duplicate).copied().unwrap_or(0) >= 3);

    let events = sink.events();
    assert!(matches!(events.first(), Some(CrawlEvent::CrawlStarted { .. })));
    assert!(matches!(
        events.last(),
        Some(CrawlEvent::CrawlFinished { visited: 4, .. })
    ));
}

#[tokio::test]
async fn test_robots_txt_respect() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_robots(
        &mock_server,
        200,
        "User-agent: *\nDisallow: /private\n\nUser-agent: TestBot\nDisallow: /admin",
    )
    .await;
    mount_page(&mock_server, "/", anchors(&["/admin/panel", "/private", "/public"])).await;
    mount_page(&mock_server, "/public", String::new()).await;
    Mock::given(method("GET"))
        .and(path("/admin/panel"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&base_url);
    let sink = Arc::new(MemorySink::new());
    let report = CrawlEngine::from_config(&config, sink.clone())
        .await
        .unwrap()
        .run()
        .await
        .unwrap();

    // The TestBot group replaces the `*` group, so /private is allowed
    assert_eq!(
        report.visited,
        vec![
            base_url.clone(),
            format!("{}/private", base_url),
            format!("{}/public", base_url),
        ]
    );
    assert_eq!(
        sink.rejections(),
        vec![(format!("{}/admin/panel", base_url), RejectReason::PolicyDenied)]
    );
}

#[tokio::test]
async fn test_out_of_scope_links_ignored() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        anchors(&[
            "http://other.test/page",
            "https://elsewhere.example/",
            "mailto:someone@other.test",
            "/inside",
        ]),
    )
    .await;
    mount_page(&mock_server, "/inside", String::new()).await;

    let config = create_test_config(&base_url);
    let sink = Arc::new(MemorySink::new());
    let report = CrawlEngine::from_config(&config, sink.clone())
        .await
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.visited, vec![base_url.clone(), format!("{}/inside", base_url)]);
    assert_eq!(report.stats.rejections.get(&RejectReason::OutOfScope), Some(&2));
}

#[tokio::test]
async fn test_http_error_does_not_abort_crawl() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", anchors(&["/broken", "/missing", "/ok"])).await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/ok", String::new()).await;

    let config = create_test_config(&base_url);
    let sink = Arc::new(MemorySink::new());
    let report = CrawlEngine::from_config(&config, sink.clone())
        .await
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.visited.len(), 4);
    assert_eq!(report.stats.pages_fetched, 2);
    assert_eq!(report.stats.pages_failed, 2);
    assert_eq!(report.stats.retries, 0);

    let failures: Vec<Option<u16>> = sink
        .events()
        .iter()
        .filter_map(|event| match event {
            CrawlEvent::FetchFailed { status, .. } => Some(*status),
            _ => None,
        })
        .collect();
    assert_eq!(failures, vec![Some(500), Some(404)]);
}

#[tokio::test]
async fn test_transient_failure_retried_once() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", anchors(&["/flaky", "/down"])).await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/flaky", String::new()).await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&base_url);
    config.crawler.retry_transient = true;
    let report = CrawlEngine::from_config(&config, Arc::new(MemorySink::new()))
        .await
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.visited.len(), 3);
    assert_eq!(report.stats.pages_fetched, 2);
    assert_eq!(report.stats.pages_failed, 3);
    assert_eq!(report.stats.retries, 2);
}

#[tokio::test]
async fn test_rate_limit_paces_requests() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", anchors(&["/a", "/b", "/c"])).await;
    for route in ["/a", "/b", "/c"] {
        mount_page(&mock_server, route, String::new()).await;
    }

    let mut config = create_test_config(&base_url);
    config.crawler.tasks_per = 1;
    config.crawler.per_unit = 0.2;
    config.crawler.workers = 3;

    let start = Instant::now();
    let report = CrawlEngine::from_config(&config, Arc::new(MemorySink::new()))
        .await
        .unwrap()
        .run()
        .await
        .unwrap();

    // Four starts at one per 200ms need at least three full windows
    assert!(start.elapsed() >= Duration::from_millis(600));
    assert_eq!(report.stats.pages_fetched, 4);
    assert_eq!(report.stats.rate_waits, 3);
}

#[tokio::test]
async fn test_robots_rates_override_defaults() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_robots(&mock_server, 200, "User-agent: *\nCrawl-delay: 0.5").await;
    mount_page(&mock_server, "/", String::new()).await;

    let config = create_test_config(&base_url);
    let engine = CrawlEngine::from_config(&config, Arc::new(MemorySink::new()))
        .await
        .unwrap();

    assert_eq!(engine.policy().rate_source, RateSource::CrawlDelay);
    assert_eq!(engine.policy().tasks_per, 1);
    assert_eq!(engine.policy().per_unit, Duration::from_millis(500));
}

#[tokio::test]
async fn test_forbidden_robots_disallows_everything() {
    for status in [401, 403] {
        let mock_server = MockServer::start().await;
        let base_url = mock_server.uri();

        mount_robots(&mock_server, status, "").await;
        mount_page(&mock_server, "/", anchors(&["/a", "/b"])).await;

        let config = create_test_config(&base_url);
        let sink = Arc::new(MemorySink::new());
        let report = CrawlEngine::from_config(&config, sink.clone())
            .await
            .unwrap()
            .run()
            .await
            .unwrap();

        // The seed itself is always fetched
        assert_eq!(report.visited, vec![base_url.clone()]);
        assert_eq!(report.stats.pages_fetched, 1);
        assert_eq!(
            report.stats.rejections.get(&RejectReason::PolicyDenied),
            Some(&2),
            "robots status {}",
            status
        );
    }
}

#[tokio::test]
async fn test_missing_robots_allows_everything() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_robots(&mock_server, 404, "").await;
    mount_page(&mock_server, "/", anchors(&["/a"])).await;
    mount_page(&mock_server, "/a", String::new()).await;

    let config = create_test_config(&base_url);
    let sink = Arc::new(MemorySink::new());
    let report = CrawlEngine::from_config(&config, sink.clone())
        .await
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.visited.len(), 2);
    assert!(sink
        .events()
        .iter()
        .any(|event| matches!(event, CrawlEvent::PolicyUnavailable { .. })));
}

#[tokio::test]
async fn test_no_robots_skips_robots_fetch() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /"))
        .expect(0)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/", anchors(&["/a"])).await;
    mount_page(&mock_server, "/a", String::new()).await;

    let mut config = create_test_config(&base_url);
    config.crawler.robots_file.clear();
    let report = CrawlEngine::from_config(&config, Arc::new(MemorySink::new()))
        .await
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.visited.len(), 2);
}

#[tokio::test]
async fn test_ignore_queries_collapses_variants() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", anchors(&["/list?page=1", "/list?page=2", "/list"])).await;
    mount_page(&mock_server, "/list", String::new()).await;

    let mut config = create_test_config(&base_url);
    config.crawler.ignore_queries = true;
    let report = CrawlEngine::from_config(&config, Arc::new(MemorySink::new()))
        .await
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.visited, vec![base_url.clone(), format!("{}/list", base_url)]);

    let mut config = create_test_config(&base_url);
    config.crawler.ignore_queries = false;
    let report = CrawlEngine::from_config(&config, Arc::new(MemorySink::new()))
        .await
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.visited.len(), 4);
}

#[tokio::test]
async fn test_non_html_yields_no_links() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", anchors(&["/report.txt"])).await;
    Mock::given(method("GET"))
        .and(path("/report.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"<a href="/hidden">not followed</a>"#, "text/plain"),
        )
        .mount(&mock_server)
        .await;

    let config = create_test_config(&base_url);
    let report = CrawlEngine::from_config(&config, Arc::new(MemorySink::new()))
        .await
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.visited.len(), 2);
    assert_eq!(report.stats.pages_not_html, 1);
}

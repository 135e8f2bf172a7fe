mod common;

use advisory_digest::fetcher::Fetcher;
use advisory_digest::types::ReleaseType;
use common::{fast_retry, feed_config, rss_feed, rss_item, utc};
use std::time::Instant;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn feed_response(xml: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(xml, "application/rss+xml")
}

#[tokio::test]
async fn filters_by_date_and_keywords_dedupes_and_extracts_firmware() {
    let server = MockServer::start().await;

    let xml = rss_feed(
        "Fortinet PSIRT",
        &[
            rss_item(
                "FortiGate 7.4.2 release notes",
                "https://example.com/a",
                Some(utc(2026, 2, 10, 10)),
                "critical security fix",
            ),
            rss_item(
                "FortiGate 7.4.2 release notes",
                "https://example.com/a",
                Some(utc(2026, 2, 10, 10)),
                "critical security fix",
            ),
            rss_item(
                "FortiGate 7.4.4 release notes",
                "https://example.com/b",
                Some(utc(2026, 2, 12, 10)),
                "critical patch release",
            ),
            rss_item(
                "FortiAnalyzer 7.0.0 release notes",
                "https://example.com/c",
                Some(utc(2026, 1, 1, 10)),
                "critical but too old",
            ),
            rss_item(
                "General advisory",
                "https://example.com/d",
                Some(utc(2026, 2, 11, 10)),
                "informational only",
            ),
        ],
    );

    Mock::given(method("GET"))
        .and(path("/rss.xml"))
        .respond_with(feed_response(xml))
        .mount(&server)
        .await;

    let mut feed = feed_config("fortinet", "Fortinet", &format!("{}/rss.xml", server.uri()));
    feed.keywords = vec!["critical".to_string()];
    feed.docs_url_template = Some("https://docs.example.com/{product}/{version}".to_string());

    let fetcher = Fetcher::new();
    let result = fetcher
        .fetch_feed(&feed, utc(2026, 2, 1, 0), utc(2026, 3, 1, 0), Some(&fast_retry(0)))
        .await
        .expect("fetch should succeed");

    let links: Vec<&str> = result.items.iter().map(|i| i.link.as_str()).collect();
    assert_eq!(links, vec!["https://example.com/a", "https://example.com/b"]);

    assert_eq!(result.items[0].product.as_deref(), Some("fortigate"));
    assert_eq!(result.items[0].version.as_deref(), Some("7.4.2"));
    assert_eq!(result.items[0].feed_id, "fortinet");
    assert_eq!(result.items[0].feed_name, "Fortinet");

    assert_eq!(result.firmware.len(), 2);
    assert_eq!(result.firmware[0].product, "FORTIGATE");
    assert_eq!(result.firmware[0].version, "7.4.2");
    assert_eq!(result.firmware[0].release_type, ReleaseType::Patch);
    assert_eq!(
        result.firmware[0].docs_url.as_deref(),
        Some("https://docs.example.com/fortigate/7.4.2")
    );
    assert_eq!(result.firmware[1].version, "7.4.4");
    assert_eq!(
        result.firmware[1].docs_url.as_deref(),
        Some("https://docs.example.com/fortigate/7.4.4")
    );
}

#[tokio::test]
async fn empty_feed_yields_empty_results() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/empty.xml"))
        .respond_with(feed_response(rss_feed("Empty", &[])))
        .mount(&server)
        .await;

    let feed = feed_config("empty", "Empty Feed", &format!("{}/empty.xml", server.uri()));
    let fetcher = Fetcher::new();
    let result = fetcher
        .fetch_feed(&feed, utc(2026, 2, 1, 0), utc(2026, 3, 1, 0), Some(&fast_retry(0)))
        .await
        .expect("fetch should succeed");

    assert!(result.items.is_empty());
    assert!(result.firmware.is_empty());
}

#[tokio::test]
async fn entries_without_timestamp_are_treated_as_out_of_window() {
    let server = MockServer::start().await;

    let xml = rss_feed(
        "Feed",
        &[
            rss_item("No date advisory", "https://example.com/1", None, "details"),
            rss_item(
                "Dated advisory",
                "https://example.com/2",
                Some(utc(2026, 2, 10, 10)),
                "details",
            ),
        ],
    );

    Mock::given(method("GET"))
        .and(path("/rss.xml"))
        .respond_with(feed_response(xml))
        .mount(&server)
        .await;

    let feed = feed_config("test", "Test Feed", &format!("{}/rss.xml", server.uri()));
    let fetcher = Fetcher::new();
    let result = fetcher
        .fetch_feed(&feed, utc(2026, 2, 1, 0), utc(2026, 3, 1, 0), Some(&fast_retry(0)))
        .await
        .expect("fetch should succeed");

    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].link, "https://example.com/2");
}

#[tokio::test]
async fn retries_on_failure_and_succeeds_on_a_later_attempt() {
    let server = MockServer::start().await;

    let xml = rss_feed(
        "Feed",
        &[rss_item(
            "Item 1",
            "https://example.com/1",
            Some(utc(2026, 2, 10, 10)),
            "test",
        )],
    );

    Mock::given(method("GET"))
        .and(path("/rss.xml"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rss.xml"))
        .respond_with(feed_response(xml))
        .mount(&server)
        .await;

    let feed = feed_config("test", "Test Feed", &format!("{}/rss.xml", server.uri()));
    let fetcher = Fetcher::new();
    let result = fetcher
        .fetch_feed(&feed, utc(2026, 2, 1, 0), utc(2026, 3, 1, 0), Some(&fast_retry(3)))
        .await
        .expect("fetch should succeed after retries");

    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].title, "Item 1");
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn fails_after_exhausting_retries_with_original_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rss.xml"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let feed = feed_config("test", "Test Feed", &format!("{}/rss.xml", server.uri()));
    let fetcher = Fetcher::new();
    let error = fetcher
        .fetch_feed(&feed, utc(2026, 2, 1, 0), utc(2026, 3, 1, 0), Some(&fast_retry(2)))
        .await
        .expect_err("fetch should fail");

    assert!(error.to_string().contains("HTTP 500"), "got: {}", error);
    // initial attempt + 2 retries
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn max_retries_zero_means_exactly_one_attempt_without_delay() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rss.xml"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut retry = fast_retry(0);
    retry.initial_delay_ms = 60_000;

    let feed = feed_config("test", "Test Feed", &format!("{}/rss.xml", server.uri()));
    let fetcher = Fetcher::new();

    let started = Instant::now();
    let error = fetcher
        .fetch_feed(&feed, utc(2026, 2, 1, 0), utc(2026, 3, 1, 0), Some(&retry))
        .await
        .expect_err("fetch should fail immediately");

    assert!(error.to_string().contains("HTTP 500"));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    assert!(
        started.elapsed().as_secs() < 5,
        "no backoff delay may be incurred when max_retries is 0"
    );
}

#[tokio::test]
async fn immediate_success_uses_a_single_attempt_with_default_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rss.xml"))
        .respond_with(feed_response(rss_feed("Feed", &[])))
        .mount(&server)
        .await;

    let feed = feed_config("test", "Test Feed", &format!("{}/rss.xml", server.uri()));
    let fetcher = Fetcher::new();
    let result = fetcher
        .fetch_feed(&feed, utc(2026, 2, 1, 0), utc(2026, 3, 1, 0), None)
        .await
        .expect("fetch should succeed");

    assert!(result.items.is_empty());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn unparseable_body_is_retried_like_any_other_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rss.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("not a feed", "text/plain"))
        .mount(&server)
        .await;

    let feed = feed_config("test", "Test Feed", &format!("{}/rss.xml", server.uri()));
    let fetcher = Fetcher::new();
    let error = fetcher
        .fetch_feed(&feed, utc(2026, 2, 1, 0), utc(2026, 3, 1, 0), Some(&fast_retry(1)))
        .await
        .expect_err("parse failure should propagate");

    assert!(error.to_string().contains("parse"), "got: {}", error);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

//! End-to-end runs against a mock regulator page.
//!
//! Each test serves HTML from its own wiremock server and drives
//! `run_target` with a fetcher tuned for fast retries, so the whole
//! fetch → extract → build path is exercised without touching the network.

use chrono::{TimeZone, Utc};
use pagefeed::config::Target;
use pagefeed::feed::{snapshot_hash, verify, FeedKind, Fetcher, RetryPolicy, ERROR_ITEM_TITLE};
use pagefeed::pipeline::{run_target, write_feed};
use pretty_assertions::assert_eq;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE: &str = r##"<html><body>
  <div id="nav"><a href="/opencms/en/Committees/SEC/minutes-nav.pdf">Minutes in the nav</a></div>
  <div id="content">
    <table>
      <tr><td>15/03/2024 <a href="/opencms/resources/UploadCommitteeFiles/sec-minutes-march.pdf">SEC minutes March</a></td></tr>
      <tr><td><a href="newsdetails?id=7">Notice &amp; recall</a></td></tr>
      <tr><td><a href="javascript:void(0)">Print</a></td></tr>
      <tr><td><a href="#top">Top</a></td></tr>
      <tr><td><a href="/home">Home</a></td></tr>
    </table>
  </div>
</body></html>"##;

fn test_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn test_target(server_uri: &str) -> Target {
    Target {
        name: "mock-sec".to_string(),
        url: format!("{}/opencms/en/Committees/SEC/", server_uri),
        base_url: Some(server_uri.to_string()),
        output: std::env::temp_dir().join("pagefeed_pipeline_unused.xml"),
        ..Target::default()
    }
}

fn fast_fetcher(max_attempts: u32) -> Fetcher {
    Fetcher::with_client(
        reqwest::Client::new(),
        RetryPolicy {
            max_attempts,
            attempt_timeout: Duration::from_millis(500),
            connect_backoff: Duration::from_millis(10),
            timeout_backoff: Duration::from_millis(10),
            max_page_bytes: 1024 * 1024,
        },
    )
}

async fn serve(page: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/opencms/en/Committees/SEC/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;
    server
}

fn parse(xml: &str) -> feed_rs::model::Feed {
    feed_rs::parser::parse(xml.as_bytes()).unwrap()
}

// ============================================================================
// Items Feed Tests
// ============================================================================

#[tokio::test]
async fn test_page_with_documents_becomes_items_feed() {
    let server = serve(PAGE).await;
    let target = test_target(&server.uri());

    let report = run_target(&fast_fetcher(1), &target, test_now()).await.unwrap();

    assert_eq!(report.kind, FeedKind::Items);
    assert_eq!(report.items, 2);
    assert_eq!(report.target, "mock-sec");

    let feed = parse(&report.xml);
    let titles: Vec<_> = feed
        .entries
        .iter()
        .map(|e| e.title.as_ref().unwrap().content.clone())
        .collect();
    assert_eq!(titles, vec!["SEC minutes March", "Notice & recall"]);

    let links: Vec<_> = feed.entries.iter().map(|e| e.links[0].href.clone()).collect();
    assert_eq!(
        links,
        vec![
            format!(
                "{}/opencms/resources/UploadCommitteeFiles/sec-minutes-march.pdf",
                server.uri()
            ),
            format!("{}/newsdetails?id=7", server.uri()),
        ]
    );
}

#[tokio::test]
async fn test_items_feed_channel_metadata() {
    let server = serve(PAGE).await;
    let target = test_target(&server.uri());

    let report = run_target(&fast_fetcher(1), &target, test_now()).await.unwrap();

    assert!(report.xml.starts_with(r#"<?xml version="1.0" encoding="utf-8"?>"#));
    assert!(report.xml.contains(r#"<rss version="2.0">"#));
    assert!(report.xml.contains("<title>CDSCO - SEC (auto)</title>"));
    assert!(report.xml.contains("<language>en-IN</language>"));
    assert!(report
        .xml
        .contains("<lastBuildDate>Sun, 1 Jun 2025 12:00:00 +0000</lastBuildDate>"));
}

#[tokio::test]
async fn test_items_feed_dates_from_row_and_fallback() {
    let server = serve(PAGE).await;
    let target = test_target(&server.uri());

    let report = run_target(&fast_fetcher(1), &target, test_now()).await.unwrap();

    let feed = parse(&report.xml);
    let dates: Vec<_> = feed
        .entries
        .iter()
        .map(|e| e.published.unwrap().to_rfc3339())
        .collect();
    // First row carries a date; the second falls back to the run time.
    assert_eq!(
        dates,
        vec!["2024-03-15T00:00:00+00:00", "2025-06-01T12:00:00+00:00"]
    );
}

// ============================================================================
// Snapshot Placeholder Tests
// ============================================================================

#[tokio::test]
async fn test_page_without_documents_becomes_snapshot() {
    let page = concat!(
        r#"<html><body><div id="content">"#,
        r#"<a href="/home">Home</a><p>Nothing yet</p></div></body></html>"#
    );
    let server = serve(page).await;
    let target = test_target(&server.uri());

    let report = run_target(&fast_fetcher(1), &target, test_now()).await.unwrap();

    assert_eq!(report.kind, FeedKind::Snapshot);
    assert_eq!(report.items, 0);

    let hash = snapshot_hash(page);
    assert!(report
        .xml
        .contains(&format!(r#"<guid isPermaLink="false">{}</guid>"#, hash)));
    assert!(report
        .xml
        .contains("<title>Page snapshot changed at 2025-06-01 12:00:00 UTC</title>"));

    let feed = parse(&report.xml);
    assert_eq!(feed.entries.len(), 1);
    assert_eq!(feed.entries[0].links[0].href, target.url);
}

#[tokio::test]
async fn test_snapshot_guid_tracks_page_content() {
    let first = "<html><body><div id=\"content\">v1</div></body></html>";
    let second = "<html><body><div id=\"content\">v2</div></body></html>";

    let server_a = serve(first).await;
    let server_b = serve(second).await;
    let fetcher = fast_fetcher(1);

    let a = run_target(&fetcher, &test_target(&server_a.uri()), test_now())
        .await
        .unwrap();
    let b = run_target(&fetcher, &test_target(&server_b.uri()), test_now())
        .await
        .unwrap();

    assert!(a.xml.contains(&snapshot_hash(first)));
    assert!(b.xml.contains(&snapshot_hash(second)));
    assert_ne!(snapshot_hash(first), snapshot_hash(second));
}

// ============================================================================
// Error Feed Tests
// ============================================================================

#[tokio::test]
async fn test_http_error_becomes_error_feed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    let target = test_target(&server.uri());

    let report = run_target(&fast_fetcher(3), &target, test_now()).await.unwrap();

    assert_eq!(report.kind, FeedKind::Error);
    assert_eq!(report.items, 0);

    let feed = parse(&report.xml);
    assert_eq!(feed.entries.len(), 1);
    assert_eq!(
        feed.entries[0].title.as_ref().unwrap().content,
        ERROR_ITEM_TITLE
    );
    assert!(report.xml.contains("404"));
    let guid = format!(
        r#"<guid isPermaLink="false">error-{}</guid>"#,
        test_now().timestamp()
    );
    assert!(report.xml.contains(&guid));
}

#[tokio::test]
async fn test_unreachable_host_becomes_error_feed() {
    // Bind then drop to get a port nothing listens on
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let uri = format!("http://127.0.0.1:{}", port);
    let target = test_target(&uri);

    let report = run_target(&fast_fetcher(2), &target, test_now()).await.unwrap();

    assert_eq!(report.kind, FeedKind::Error);
    assert!(report.xml.contains("Gave up after 2 attempts"));
    assert_eq!(verify(&report.xml).unwrap(), 1);
}

#[tokio::test]
async fn test_error_feed_escapes_message_markup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let mut target = test_target(&server.uri());
    target.title = "Notices <R&D>".to_string();

    let report = run_target(&fast_fetcher(1), &target, test_now()).await.unwrap();

    assert!(report.xml.contains("<title>Notices &lt;R&amp;D&gt;</title>"));
    assert_eq!(
        parse(&report.xml).title.unwrap().content,
        "Notices <R&D>"
    );
}

// ============================================================================
// Output Tests
// ============================================================================

#[tokio::test]
async fn test_written_feed_is_readable() {
    let server = serve(PAGE).await;
    let target = test_target(&server.uri());
    let report = run_target(&fast_fetcher(1), &target, test_now()).await.unwrap();

    let dir = std::env::temp_dir().join("pagefeed_pipeline_test_written");
    std::fs::remove_dir_all(&dir).ok();
    let out = dir.join("sec-rss.xml");

    write_feed(&out, &report.xml).unwrap();

    let bytes = std::fs::read(&out).unwrap();
    let feed = feed_rs::parser::parse(&bytes[..]).unwrap();
    assert_eq!(feed.entries.len(), 2);

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_failed_run_replaces_previous_feed() {
    let dir = std::env::temp_dir().join("pagefeed_pipeline_test_replace");
    std::fs::remove_dir_all(&dir).ok();
    let out = dir.join("feed.xml");

    let good = serve(PAGE).await;
    let report = run_target(&fast_fetcher(1), &test_target(&good.uri()), test_now())
        .await
        .unwrap();
    write_feed(&out, &report.xml).unwrap();

    let bad = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&bad)
        .await;
    let report = run_target(&fast_fetcher(1), &test_target(&bad.uri()), test_now())
        .await
        .unwrap();
    write_feed(&out, &report.xml).unwrap();

    let written = std::fs::read_to_string(&out).unwrap();
    assert!(written.contains(ERROR_ITEM_TITLE));
    assert!(!written.contains("SEC minutes March"));

    std::fs::remove_dir_all(&dir).ok();
}

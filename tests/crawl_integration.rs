//! End-to-end pipeline tests against a mock forum.
//!
//! Each test stands up a wiremock server serving thread pages in the forum's
//! markup, runs a full crawl into a temp directory, and asserts on the
//! returned outcome and the artifacts on disk.

use std::io::Cursor;
use std::path::Path;

use threadcrawl::{
    CrawlConfig, CrawlError, DedupStore, ImageRecord, LinkRecord, IMAGES_ARTIFACT, LINKS_ARTIFACT,
    REPORT_ARTIFACT, crawl,
};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pagination_control(last_page: u32) -> String {
    pagination_control_text(&format!("Page 1 of {last_page}"))
}

fn pagination_control_text(text: &str) -> String {
    format!(
        r#"<div class="neo_column main"><table><tbody>
             <tr><td class="vbmenu_control">{text}</td></tr>
           </tbody></table></div>"#
    )
}

fn post(index: u32, message: &str) -> String {
    format!(
        r#"<table class="tborder voz-postbit"><tbody>
             <tr><td><div><a name="{index}"></a></div></td></tr>
             <tr><td><div class="voz-post-message">{message}</div></td></tr>
           </tbody></table>"#
    )
}

fn page(header: &str, posts: &[String]) -> String {
    format!(
        "<html><body>{header}{}</body></html>",
        posts.join("\n")
    )
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgba8(image::RgbaImage::new(width, height));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

async fn mount_base(server: &MockServer, body: String) {
    Mock::given(method("GET"))
        .and(path("/thread"))
        .and(query_param("t", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .with_priority(3)
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, number: u32, body: String) {
    Mock::given(method("GET"))
        .and(path("/thread"))
        .and(query_param("page", number.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .with_priority(1)
        .mount(server)
        .await;
}

fn config_for(server: &MockServer, dest: &Path) -> CrawlConfig {
    let mut config = CrawlConfig {
        thread_url: format!("{}/thread?t=42", server.uri()),
        workers: 1,
        crawl_links: true,
        crawl_images: false,
        dest_path: dest.to_path_buf(),
        retries: 1,
        pages: vec![],
        from_page: 0,
        to_page: 0,
    };
    config.validate().unwrap();
    config
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> T {
    let raw = std::fs::read(path).unwrap();
    serde_json::from_slice(&raw).unwrap()
}

#[tokio::test]
async fn test_two_page_crawl_exports_all_artifacts() {
    let server = MockServer::start().await;
    let dest = tempfile::tempdir().unwrap();
    let uri = server.uri();

    mount_base(&server, page(&pagination_control(2), &[])).await;
    mount_page(
        &server,
        1,
        page(
            &pagination_control(2),
            &[post(
                1,
                &format!(
                    r#"<a href="/redirect/index.php?link=https%3A%2F%2Fexample.com%2Ftarget">Example</a>
                       <a href="/members/alice.7">alice</a>
                       <img src="{uri}/img/smile.png"/>
                       <img src="{uri}/img/photo.png"/>"#
                ),
            )],
        ),
    )
    .await;
    mount_page(
        &server,
        2,
        page(
            &pagination_control(2),
            &[post(
                2,
                &format!(
                    r#"<a href="https://example.com/target">Example again</a>
                       <img src="{uri}/img/smile.png"/>"#
                ),
            )],
        ),
    )
    .await;

    // The small image must be downloaded exactly once despite two sightings.
    Mock::given(method("GET"))
        .and(path("/img/smile.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png(64, 64)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/photo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png(400, 300)))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server, dest.path());
    config.crawl_images = true;

    let outcome = crawl(&config, CancellationToken::new()).await.unwrap();

    assert!(!outcome.cancelled);
    assert_eq!(outcome.success_pages, vec![1, 2]);
    assert!(outcome.failed_pages.is_empty());
    assert_eq!(outcome.links_found, 2);
    assert_eq!(outcome.images_found, 2);

    // Image routing: 64x64 is an emoticon, 400x300 is not.
    assert!(dest.path().join("img/emoticons/smile.png").exists());
    assert!(dest.path().join("img/photo.png").exists());

    let links: Vec<LinkRecord> = read_json(&dest.path().join(LINKS_ARTIFACT));
    let target = links
        .iter()
        .find(|record| record.url == "https://example.com/target")
        .unwrap();
    assert_eq!(target.seen_count, 2);
    assert_eq!(target.post_indices, vec![1, 2]);
    assert_eq!(target.text, "Example");
    let member = links
        .iter()
        .find(|record| record.url == format!("{uri}/members/alice.7"))
        .unwrap();
    assert_eq!(member.seen_count, 1);

    // Records are sorted ascending by occurrence count.
    assert!(links[0].seen_count <= links[1].seen_count);

    let images: Vec<ImageRecord> = read_json(&dest.path().join(IMAGES_ARTIFACT));
    let smile = images
        .iter()
        .find(|record| record.filename == "smile.png")
        .unwrap();
    assert_eq!(smile.seen_count, 2);
    assert_eq!(smile.post_indices, vec![1, 2]);

    let report: serde_json::Value = read_json(&dest.path().join(REPORT_ARTIFACT));
    assert_eq!(report["success_pages"], serde_json::json!([1, 2]));
    assert_eq!(report["failed_pages"], serde_json::json!([]));
    assert_eq!(report["config"]["thread_url"], config.thread_url);
}

#[tokio::test]
async fn test_failed_page_is_recorded_and_sets_stay_disjoint() {
    let server = MockServer::start().await;
    let dest = tempfile::tempdir().unwrap();

    mount_base(&server, page(&pagination_control(2), &[])).await;
    mount_page(&server, 1, page(&pagination_control(2), &[post(1, "")])).await;
    Mock::given(method("GET"))
        .and(path("/thread"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .with_priority(1)
        .mount(&server)
        .await;

    let config = config_for(&server, dest.path());
    let outcome = crawl(&config, CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.success_pages, vec![1]);
    assert_eq!(outcome.failed_pages, vec![2]);

    let report: serde_json::Value = read_json(&dest.path().join(REPORT_ARTIFACT));
    assert_eq!(report["failed_pages"], serde_json::json!([2]));
}

#[tokio::test]
async fn test_transient_page_failure_is_retried_until_success() {
    let server = MockServer::start().await;
    let dest = tempfile::tempdir().unwrap();

    // No pagination control: a single-page thread.
    mount_base(&server, page("", &[])).await;
    Mock::given(method("GET"))
        .and(path("/thread"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_page(
        &server,
        1,
        page("", &[post(1, r#"<a href="https://example.com/a">a</a>"#)]),
    )
    .await;

    let mut config = config_for(&server, dest.path());
    config.retries = 3;

    let outcome = crawl(&config, CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.success_pages, vec![1]);
    assert!(outcome.failed_pages.is_empty());
    assert_eq!(outcome.links_found, 1);
}

#[tokio::test]
async fn test_single_page_thread_without_pagination_control() {
    let server = MockServer::start().await;
    let dest = tempfile::tempdir().unwrap();

    mount_base(&server, page("", &[])).await;
    mount_page(
        &server,
        1,
        page("", &[post(3, r#"<a href="https://example.com/x">x</a>"#)]),
    )
    .await;

    let config = config_for(&server, dest.path());
    let outcome = crawl(&config, CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.success_pages, vec![1]);
    let links: Vec<LinkRecord> = read_json(&dest.path().join(LINKS_ARTIFACT));
    assert_eq!(links[0].post_indices, vec![3]);
}

#[tokio::test]
async fn test_explicit_page_list_crawls_only_existing_pages() {
    let server = MockServer::start().await;
    let dest = tempfile::tempdir().unwrap();

    mount_base(&server, page(&pagination_control(3), &[])).await;
    mount_page(&server, 2, page(&pagination_control(3), &[post(2, "")])).await;

    let mut config = config_for(&server, dest.path());
    config.pages = vec![2, 5];

    let outcome = crawl(&config, CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.success_pages, vec![2]);
    assert!(outcome.failed_pages.is_empty());
}

#[tokio::test]
async fn test_unreachable_thread_is_fatal() {
    let server = MockServer::start().await;
    let dest = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = config_for(&server, dest.path());
    let result = crawl(&config, CancellationToken::new()).await;

    assert!(matches!(
        result,
        Err(CrawlError::ThreadUnreachable { .. })
    ));
    assert!(!dest.path().join(REPORT_ARTIFACT).exists());
}

#[tokio::test]
async fn test_malformed_pagination_is_fatal() {
    let server = MockServer::start().await;
    let dest = tempfile::tempdir().unwrap();

    mount_base(&server, page(&pagination_control_text("Page 1 of soon"), &[])).await;

    let config = config_for(&server, dest.path());
    let result = crawl(&config, CancellationToken::new()).await;

    assert!(matches!(
        result,
        Err(CrawlError::MalformedPagination { .. })
    ));
}

#[tokio::test]
async fn test_cancelled_crawl_skips_export_and_reports_cancellation() {
    let server = MockServer::start().await;
    let dest = tempfile::tempdir().unwrap();

    mount_base(&server, page(&pagination_control(2), &[])).await;
    mount_page(&server, 1, page(&pagination_control(2), &[post(1, "")])).await;
    mount_page(&server, 2, page(&pagination_control(2), &[post(2, "")])).await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let config = config_for(&server, dest.path());
    let outcome = crawl(&config, cancel).await.unwrap();

    assert!(outcome.cancelled);
    assert!(outcome.success_pages.is_empty());
    assert!(outcome.failed_pages.is_empty());
    assert!(!dest.path().join(REPORT_ARTIFACT).exists());
    assert!(!dest.path().join(LINKS_ARTIFACT).exists());
}

#[tokio::test]
async fn test_extraction_store_is_isolated_per_crawl() {
    // Two crawls over the same thread use fresh stores; counts never leak.
    let server = MockServer::start().await;
    let body = page("", &[post(1, r#"<a href="https://example.com/a">a</a>"#)]);
    mount_base(&server, page("", &[])).await;
    mount_page(&server, 1, body).await;

    for _ in 0..2 {
        let dest = tempfile::tempdir().unwrap();
        let config = config_for(&server, dest.path());
        let outcome = crawl(&config, CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.links_found, 1);

        let links: Vec<LinkRecord> = read_json(&dest.path().join(LINKS_ARTIFACT));
        assert_eq!(links[0].seen_count, 1);
    }

    // The injected store abstraction behaves the same when driven directly.
    let store = DedupStore::new();
    store.record_link("https://example.com/a", "a", 1);
    assert_eq!(store.link_count(), 1);
}

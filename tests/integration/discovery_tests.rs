use crate::common::{create_context, create_test_config};
use forum_mirror::crawler::DiscoveryWorker;
use forum_mirror::UrlStatus;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_discovery_follows_internal_links_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<a href="/f17-something">Board</a> <a href="https://other.example.org/f1-x">Elsewhere</a>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/f17-something"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>no links here</p>"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let ctx = create_context(create_test_config(&server.uri(), dir.path()));
    assert_eq!(ctx.enqueue(["/"]).unwrap(), 1);

    let report = DiscoveryWorker::new(1, ctx.clone()).run().await;
    assert_eq!(report.completed, 2);
    assert_eq!(report.failed, 0);

    let records = ctx.store.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records["/"].status, UrlStatus::Discovered);
    assert_eq!(records["/f17-something"].status, UrlStatus::Discovered);
    assert_eq!(records["/f17-something"].local_path, "forums/f17-something.html");

    let raw = std::fs::read_to_string(dir.path().join("index.html")).unwrap();
    assert!(raw.contains("https://other.example.org/f1-x"));
}

#[tokio::test]
async fn test_moved_page_becomes_redirect_source() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"<a href="/t1-old">Old topic</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/t1-old"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/t1-new"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/t1-new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>moved here</p>"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let ctx = create_context(create_test_config(&server.uri(), dir.path()));
    ctx.enqueue(["/"]).unwrap();

    let report = DiscoveryWorker::new(1, ctx.clone()).run().await;
    assert_eq!(report.redirected, 1);

    assert_eq!(ctx.redirects.get("/t1-old").as_deref(), Some("/t1-new"));
    let source = ctx.store.get("/t1-old").unwrap();
    assert!(source.is_redirect_source);
    assert_eq!(source.status, UrlStatus::Failed);
    assert_eq!(ctx.store.get("/t1-new").unwrap().status, UrlStatus::Discovered);
    assert!(!dir.path().join(&source.local_path).is_file());
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let ctx = create_context(create_test_config(&server.uri(), dir.path()));
    ctx.enqueue(["/"]).unwrap();

    let report = DiscoveryWorker::new(1, ctx.clone()).run().await;
    assert_eq!(report.failed, 3);

    let record = ctx.store.get("/").unwrap();
    assert_eq!(record.status, UrlStatus::Failed);
    assert_eq!(record.retry_count, 3);
    assert_eq!(record.last_error.as_deref(), Some("HTTP 503"));
    assert_eq!(ctx.fetcher.throttle().worker_target(), 1);
}

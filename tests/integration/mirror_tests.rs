use crate::common::{create_context, create_test_config};
use forum_mirror::adblock::AdBlocklist;
use forum_mirror::config::AdSource;
use forum_mirror::crawler::{run_mirror, AssetKind, AssetManager, IMAGE_DIR};
use forum_mirror::output::load_statistics;
use forum_mirror::storage::{AssetCache, FINAL_STATE_FILE};
use forum_mirror::UrlStatus;
use std::sync::Arc;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

async fn mount_forum(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head>
<script src="http://ads.example.net/track.js"></script>
<link rel="stylesheet" href="/style.css">
</head><body>
<img src="/logo.png">
<a href="/t1-old">Old topic</a>
<a href="https://elsewhere.example.org/">Elsewhere</a>
</body></html>"#,
        ))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/t1-old"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/t2-new"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/t2-new"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"<img src="/logo.png"><a href="/">Index</a>"#),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/style.css"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/css")
                .set_body_string("body { color: #333 }"),
        )
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "image/png")
                .set_body_bytes(PNG),
        )
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/hosts.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("0.0.0.0 ads.example.net\n"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_mirror_is_browsable_offline() {
    let server = MockServer::start().await;
    mount_forum(&server).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server.uri(), dir.path());
    config.assets.ad_sources = vec![AdSource {
        url: format!("{}/hosts.txt", server.uri()),
        cache_days: 7,
    }];

    let summary = run_mirror(config, &dir.path().join("cookies.json")).await.unwrap();
    assert!(!summary.logged_in);
    assert_eq!(summary.discovery.redirected, 1);
    assert_eq!(summary.counts.get(&UrlStatus::Downloaded), Some(&2));
    assert_eq!(summary.counts.get(&UrlStatus::Failed), Some(&1));

    let index = std::fs::read_to_string(dir.path().join("index.html")).unwrap();
    assert!(index.contains(r#"href="topics/t2-new.html""#));
    assert!(index.contains(r#"href="https://elsewhere.example.org/""#));
    assert!(!index.contains("ads.example.net"));
    assert!(!index.contains("/logo.png"));
    assert!(index.contains(IMAGE_DIR));

    let topic = std::fs::read_to_string(dir.path().join("topics/t2-new.html")).unwrap();
    assert!(topic.contains(r#"href="../""#));
    assert!(topic.contains(&format!("../{}", IMAGE_DIR)));

    assert!(dir.path().join(FINAL_STATE_FILE).is_file());
    assert!(!dir.path().join("topics/t1-old.html").exists());

    let stats = load_statistics(dir.path()).unwrap();
    assert_eq!(stats.total_pages, 3);
    assert_eq!(stats.redirect_sources, 1);
    assert_eq!(stats.redirects, 1);
    assert_eq!(stats.assets, 2);
}

#[tokio::test]
async fn test_asset_requested_twice_is_fetched_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "image/png")
                .set_body_bytes(PNG),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());
    let ctx = create_context(config.clone());
    let manager = AssetManager::new(
        &config,
        Arc::clone(&ctx.fetcher),
        Arc::new(AssetCache::in_root(dir.path()).unwrap()),
        Arc::new(AdBlocklist::default()),
    );

    let url = Url::parse(&format!("{}/logo.png", server.uri())).unwrap();
    let first = manager.fetch(&url, AssetKind::Image).await.unwrap();
    let second = manager.fetch(&url, AssetKind::Image).await.unwrap();

    assert_eq!(first, second);
    assert!(first.starts_with(IMAGE_DIR));
    assert!(first.ends_with(".png"));
    assert_eq!(std::fs::read(dir.path().join(&first)).unwrap(), PNG);
}

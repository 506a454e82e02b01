use forum_mirror::storage::{AssetCache, CrawlStateStore, PersistentStore, RedirectMap};
use forum_mirror::{Phase, UrlStatus};
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_store_survives_restart() {
    let dir = TempDir::new().unwrap();
    {
        let store = CrawlStateStore::in_root(dir.path(), 3).unwrap();
        assert!(store.add_url("/", "index.html").unwrap());
        assert!(!store.add_url("/", "index-dup1.html").unwrap());
        store.add_url("/f1-news", "forums/f1-news.html").unwrap();
        store.reserve_next(Phase::Discovery).unwrap();
    }

    let reopened = CrawlStateStore::in_root(dir.path(), 3).unwrap();
    assert_eq!(reopened.len(), 2);
    assert_eq!(reopened.get("/").unwrap().local_path, "index.html");
    assert_eq!(reopened.get("/").unwrap().status, UrlStatus::Queued);

    let first = reopened.reserve_next(Phase::Discovery).unwrap();
    let second = reopened.reserve_next(Phase::Discovery).unwrap();
    let mut reserved = vec![first.unwrap(), second.unwrap()];
    reserved.sort();
    assert_eq!(reserved, vec!["/".to_string(), "/f1-news".to_string()]);
}

#[test]
fn test_concurrent_reservations_are_unique() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(CrawlStateStore::in_root(dir.path(), 3).unwrap());
    for i in 0..40 {
        store
            .add_url(&format!("/t{}-topic", i), &format!("topics/t{}-topic.html", i))
            .unwrap();
    }

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                let mut taken = Vec::new();
                while let Some(path) = store.reserve_next(Phase::Discovery).unwrap() {
                    taken.push(path);
                }
                taken
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for path in handle.join().unwrap() {
            assert!(seen.insert(path), "path reserved twice");
        }
    }
    assert_eq!(seen.len(), 40);
    assert_eq!(
        store.counts_by_status().get(&UrlStatus::Discovering),
        Some(&40)
    );
}

#[test]
fn test_redirect_chains_resolve_after_reload() {
    let dir = TempDir::new().unwrap();
    {
        let redirects = RedirectMap::in_root(dir.path()).unwrap();
        redirects.record("/a", "/b").unwrap();
        redirects.record("/b", "/c").unwrap();
        redirects.record("/x", "/y").unwrap();
        redirects.record("/y", "/x").unwrap();
    }

    let redirects = RedirectMap::in_root(dir.path()).unwrap();
    assert_eq!(redirects.len(), 4);
    assert_eq!(redirects.resolve("/a"), "/c");
    assert_eq!(redirects.resolve("/c"), "/c");

    let cycle_end = redirects.resolve("/x");
    assert!(cycle_end == "/x" || cycle_end == "/y");
}

#[test]
fn test_asset_cache_keeps_first_path() {
    let dir = TempDir::new().unwrap();
    {
        let cache = AssetCache::in_root(dir.path()).unwrap();
        let url = "https://forum.example.com/logo.png";
        assert_eq!(cache.insert(url, "assets/images/internal/aa.png").unwrap(), "assets/images/internal/aa.png");
        assert_eq!(cache.insert(url, "assets/images/internal/bb.png").unwrap(), "assets/images/internal/aa.png");
    }

    let cache = AssetCache::in_root(dir.path()).unwrap();
    assert_eq!(
        cache.lookup("https://forum.example.com/logo.png").as_deref(),
        Some("assets/images/internal/aa.png")
    );
}

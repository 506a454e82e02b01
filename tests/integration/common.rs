use forum_mirror::config::{Config, ThrottleConfig};
use forum_mirror::crawler::{CrawlContext, Fetcher};
use forum_mirror::storage::{CrawlStateStore, RedirectMap};
use forum_mirror::url::{LinkFilter, SlugPathMapper};
use forum_mirror::{Site, ThrottleController};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Default configuration with pacing disabled and short idle timeouts
pub fn create_test_config(base_url: &str, root: &Path) -> Config {
    let mut config = Config::for_forum(base_url, root);
    config.throttle = ThrottleConfig {
        base_delay: 0.0,
        min_delay: 0.0,
        ..ThrottleConfig::default()
    };
    config.crawler.workers = 2;
    config.scheduler.poll_interval_ms = 10;
    config.scheduler.max_idle_polls = 3;
    config.scheduler.grow_interval_ms = 10;
    config
}

/// Builds a crawl context over `root`, the way the coordinator does
pub fn create_context(config: Config) -> Arc<CrawlContext> {
    let root = config.site.backup_root.clone();
    let site = Site::parse(&config.site.base_url).unwrap();
    let throttle = Arc::new(ThrottleController::new(&config.throttle, &config.crawler));
    let fetcher = Fetcher::new(&config, &BTreeMap::new(), throttle).unwrap();

    Arc::new(CrawlContext {
        filter: LinkFilter::new(site, &config.filters),
        store: Arc::new(CrawlStateStore::in_root(&root, config.crawler.retry_limit).unwrap()),
        redirects: Arc::new(RedirectMap::in_root(&root).unwrap()),
        fetcher: Arc::new(fetcher),
        mapper: Arc::new(SlugPathMapper::new(&config.paths)),
        config: Arc::new(config),
    })
}

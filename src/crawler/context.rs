use crate::config::Config;
use crate::crawler::fetcher::Fetcher;
use crate::storage::{write_atomic, CrawlStateStore, RedirectMap};
use crate::url::{LinkFilter, PathMapper, Site};
use crate::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a worker needs, shared by all workers of a run
pub struct CrawlContext {
    pub config: Arc<Config>,
    pub filter: LinkFilter,
    pub store: Arc<CrawlStateStore>,
    pub redirects: Arc<RedirectMap>,
    pub fetcher: Arc<Fetcher>,
    pub mapper: Arc<dyn PathMapper>,
}

impl CrawlContext {
    pub fn site(&self) -> &Site {
        self.filter.site()
    }

    /// Adds unseen paths to the store, mapping a local file only for the new ones
    ///
    /// # Returns
    ///
    /// The number of paths that were new
    pub fn enqueue<I, S>(&self, paths: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mapper = Arc::clone(&self.mapper);
        let added = self
            .store
            .add_urls_with(paths, |path| mapper.local_path_for(path))?;
        Ok(added.len())
    }

    /// Absolute location of a store-relative local path
    pub fn output_path(&self, local_path: &str) -> PathBuf {
        self.config.site.backup_root.join(local_path)
    }

    /// Atomically writes a page below the backup root
    pub async fn write_page(&self, local_path: &str, content: String) -> Result<()> {
        let path = self.output_path(local_path);
        tokio::task::spawn_blocking(move || write_atomic(&path, content.as_bytes())).await??;
        Ok(())
    }
}

impl std::fmt::Debug for CrawlContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlContext")
            .field("site", self.site())
            .field("backup_root", &self.config.site.backup_root)
            .finish_non_exhaustive()
    }
}

/// Builds a context over a temporary backup root with no pacing delay
#[cfg(test)]
pub(crate) fn create_test_context(base_url: &str, root: &std::path::Path) -> CrawlContext {
    use crate::config::ThrottleConfig;
    use crate::state::ThrottleController;
    use crate::url::SlugPathMapper;
    use std::collections::BTreeMap;

    let mut config = Config::for_forum(base_url, root);
    config.throttle = ThrottleConfig {
        base_delay: 0.0,
        min_delay: 0.0,
        ..ThrottleConfig::default()
    };
    config.scheduler.poll_interval_ms = 10;
    config.scheduler.max_idle_polls = 3;
    config.scheduler.grow_interval_ms = 10;

    let throttle = Arc::new(ThrottleController::new(&config.throttle, &config.crawler));
    let fetcher = Fetcher::new(&config, &BTreeMap::new(), throttle).unwrap();
    let site = Site::parse(base_url).unwrap();

    CrawlContext {
        filter: LinkFilter::new(site, &config.filters),
        store: Arc::new(CrawlStateStore::in_root(root, config.crawler.retry_limit).unwrap()),
        redirects: Arc::new(RedirectMap::in_root(root).unwrap()),
        fetcher: Arc::new(fetcher),
        mapper: Arc::new(SlugPathMapper::new(&config.paths)),
        config: Arc::new(config),
    }
}

//! Mirror coordinator - wires the stores, fetcher and pipeline together
//!
//! This module contains the top-level run logic:
//! - Opening (or resuming from) the persisted stores in the backup root
//! - Building the throttled fetcher, the ad blocklist and the rewrite pipeline
//! - Seeding the forum root and running the discovery and download phases
//! - Exporting the final crawl state

use crate::adblock::AdBlocklist;
use crate::auth::Credentials;
use crate::config::{validate, Config};
use crate::crawler::assets::AssetManager;
use crate::crawler::context::CrawlContext;
use crate::crawler::fetcher::{build_http_client, Fetcher};
use crate::crawler::scheduler::{PhaseReport, Scheduler};
use crate::rewrite::{HtmlPageRewriter, PageRewriter};
use crate::state::{ThrottleController, UrlStatus};
use crate::storage::{AssetCache, CrawlStateStore, PersistentStore, RedirectMap, FINAL_STATE_FILE};
use crate::url::{LinkFilter, SlugPathMapper, Site};
use crate::Result;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Outcome of a complete run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorSummary {
    pub discovery: PhaseReport,
    pub download: PhaseReport,

    /// Records per status once both phases finished
    pub counts: BTreeMap<UrlStatus, usize>,

    pub logged_in: bool,
}

/// Owns everything a mirror run needs
pub struct Coordinator {
    ctx: Arc<CrawlContext>,
    rewriter: Arc<dyn PageRewriter>,
    logged_in: bool,
}

impl Coordinator {
    /// Opens the stores in the backup root and builds the pipeline
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration; `site.backup-root` is created if missing
    /// * `credentials` - Session cookies sent with every forum request
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run; previous progress in the backup root is resumed
    /// * `Err(MirrorError)` - Invalid configuration or unreadable state files
    pub async fn new(config: Config, credentials: Credentials) -> Result<Self> {
        validate(&config)?;
        let root = config.site.backup_root.clone();
        std::fs::create_dir_all(&root)?;

        let site = Site::parse(&config.site.base_url)?;
        let store = Arc::new(CrawlStateStore::in_root(&root, config.crawler.retry_limit)?);
        let redirects = Arc::new(RedirectMap::in_root(&root)?);
        let cache = Arc::new(AssetCache::in_root(&root)?);

        if !store.is_empty() {
            tracing::info!(
                "Resuming: {} known pages, {} pending",
                store.len(),
                store.pending_count()
            );
        }

        let mapper = SlugPathMapper::with_claimed(&config.paths, store.claimed_local_paths());
        let throttle = Arc::new(ThrottleController::new(&config.throttle, &config.crawler));
        let fetcher = Arc::new(Fetcher::new(&config, &credentials.cookies, throttle)?);

        let list_client = build_http_client(&config, &BTreeMap::new(), true)?;
        let blocklist = Arc::new(AdBlocklist::load(&config.assets, &list_client, &root).await);
        if !blocklist.is_empty() {
            tracing::info!("Ad blocklist holds {} host patterns", blocklist.len());
        }

        let assets = Arc::new(AssetManager::new(
            &config,
            Arc::clone(&fetcher),
            cache,
            blocklist,
        ));
        let rewriter = Arc::new(HtmlPageRewriter::new(
            site.clone(),
            assets,
            Arc::clone(&store),
            Arc::clone(&redirects),
        ));

        let ctx = Arc::new(CrawlContext {
            filter: LinkFilter::new(site, &config.filters),
            store,
            redirects,
            fetcher,
            mapper: Arc::new(mapper),
            config: Arc::new(config),
        });

        Ok(Self {
            ctx,
            rewriter,
            logged_in: credentials.logged_in,
        })
    }

    pub fn context(&self) -> &Arc<CrawlContext> {
        &self.ctx
    }

    /// Runs both phases to completion and writes `crawl_state_final.json`
    pub async fn run(&self) -> Result<MirrorSummary> {
        let root = &self.ctx.config.site.backup_root;
        tracing::info!("Mirroring {} into {}", self.ctx.site().base(), root.display());

        if self.ctx.enqueue(["/"])? > 0 {
            tracing::info!("Seeded forum root");
        }

        let scheduler = Scheduler::new(Arc::clone(&self.ctx), Arc::clone(&self.rewriter));
        let discovery = scheduler.run_discovery_phase().await;
        let download = scheduler.run_download_phase().await;

        self.ctx.store.save()?;
        self.ctx.redirects.save()?;
        self.ctx.store.export_to(&root.join(FINAL_STATE_FILE))?;

        let counts = self.ctx.store.counts_by_status();
        tracing::info!("Mirror complete: {:?}", counts);

        Ok(MirrorSummary {
            discovery,
            download,
            counts,
            logged_in: self.logged_in,
        })
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("ctx", &self.ctx)
            .field("logged_in", &self.logged_in)
            .finish_non_exhaustive()
    }
}

/// Runs a complete mirror
///
/// This is the main entry point. It will:
/// 1. Load the session cookies from `cookies_path` and check them
/// 2. Open or resume the state stored in the backup root
/// 3. Discover every reachable page, then download and localize each one
///
/// # Arguments
///
/// * `config` - The mirror configuration
/// * `cookies_path` - JSON cookie file; a missing file means an anonymous crawl
pub async fn run_mirror(config: Config, cookies_path: &Path) -> Result<MirrorSummary> {
    let credentials = Credentials::establish(&config, cookies_path).await?;
    let coordinator = Coordinator::new(config, credentials).await?;
    coordinator.run().await
}

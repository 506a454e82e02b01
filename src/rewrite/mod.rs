//! Page rewrite pipeline
//!
//! The download phase hands every fetched page to a [`PageRewriter`]. The default
//! [`HtmlPageRewriter`] works in three steps:
//! 1. collect the page's asset references with `scraper`
//! 2. download each one through the [`AssetManager`]
//! 3. substitute local paths, drop ad-blocked elements and localize internal anchors in a
//!    single `lol_html` pass

mod assets;
mod css;
mod html;
mod links;

pub use assets::{collect_asset_refs, link_kind, srcset_urls, AssetRef};
pub use css::{css_urls, replace_css_urls};
pub use html::{localize_html, AnchorResolver, Localization};
pub use links::relative_link;

use crate::crawler::AssetManager;
use crate::storage::{CrawlStateStore, RedirectMap};
use crate::url::{path_plus_query, Site};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// Turns a fetched page into its offline form
#[async_trait]
pub trait PageRewriter: Send + Sync {
    /// Localizes assets and internal links of one page
    ///
    /// # Arguments
    ///
    /// * `page_url` - URL the page was finally served from
    /// * `html` - Page content
    /// * `local_path` - File the result will be written to, relative to the backup root
    async fn process_page(&self, page_url: &Url, html: &str, local_path: &str) -> Result<String>;
}

/// Default rewriter for forum pages
#[derive(Debug)]
pub struct HtmlPageRewriter {
    site: Site,
    assets: Arc<AssetManager>,
    store: Arc<CrawlStateStore>,
    redirects: Arc<RedirectMap>,
}

impl HtmlPageRewriter {
    pub fn new(
        site: Site,
        assets: Arc<AssetManager>,
        store: Arc<CrawlStateStore>,
        redirects: Arc<RedirectMap>,
    ) -> Self {
        Self {
            site,
            assets,
            store,
            redirects,
        }
    }

    /// Downloads every asset of the page; returns raw reference -> link relative to the page
    async fn localize_assets(
        &self,
        page_url: &Url,
        refs: Vec<AssetRef>,
        local_path: &str,
    ) -> HashMap<String, String> {
        let mut localized = HashMap::new();
        for asset in refs {
            let Ok(url) = page_url.join(&asset.raw) else {
                tracing::debug!("Unresolvable asset reference {:?} on {}", asset.raw, page_url);
                continue;
            };
            if let Some(stored) = self.assets.fetch(&url, asset.kind).await {
                localized.insert(asset.raw, relative_link(local_path, &stored));
            }
        }
        localized
    }
}

#[async_trait]
impl PageRewriter for HtmlPageRewriter {
    async fn process_page(&self, page_url: &Url, html: &str, local_path: &str) -> Result<String> {
        let refs = collect_asset_refs(html);
        let total = refs.len();
        let assets = self.localize_assets(page_url, refs, local_path).await;
        tracing::debug!("{}: {}/{} assets localized", local_path, assets.len(), total);

        let anchors = StoreAnchors {
            page_url,
            local_path,
            rewriter: self,
        };
        let localization = Localization {
            page_url,
            assets: &assets,
            blocklist: self.assets.blocklist(),
            anchors: &anchors,
        };
        localize_html(html, &localization)
    }
}

/// Resolves anchors through the redirect map and the crawl state store
struct StoreAnchors<'a> {
    page_url: &'a Url,
    local_path: &'a str,
    rewriter: &'a HtmlPageRewriter,
}

impl AnchorResolver for StoreAnchors<'_> {
    fn resolve_anchor(&self, href: &str) -> Option<String> {
        let href = href.trim();
        let lower = href.to_ascii_lowercase();
        if href.is_empty()
            || href.starts_with('#')
            || lower.starts_with("mailto:")
            || lower.starts_with("javascript:")
        {
            return None;
        }

        let mut url = self.page_url.join(href).ok()?;
        if !self.rewriter.site.is_same_domain(&url) {
            return None;
        }
        let fragment = url.fragment().map(str::to_string);
        url.set_fragment(None);

        let key = self.rewriter.redirects.resolve(&path_plus_query(&url));
        let target = self.rewriter.store.local_path(&key)?;

        let mut link = relative_link(self.local_path, &target);
        if let Some(fragment) = fragment {
            link.push('#');
            link.push_str(&fragment);
        }
        Some(link)
    }
}

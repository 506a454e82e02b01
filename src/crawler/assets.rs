//! Asset downloading and deduplication
//!
//! Every asset URL is fetched at most once per mirror: the first successful download is
//! stored under a name derived from the URL hash and recorded in the [`AssetCache`], and
//! every later reference is answered from the cache.

use crate::adblock::AdBlocklist;
use crate::config::Config;
use crate::crawler::fetcher::Fetcher;
use crate::storage::{write_atomic, AssetCache};
use crate::Result;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

/// Directory (relative to the backup root) for image assets
pub const IMAGE_DIR: &str = "assets/images/internal";

/// Directory (relative to the backup root) for every other asset
pub const FILE_DIR: &str = "assets/files/internal";

/// Hex digits of the URL hash used in asset file names
const HASH_LEN: usize = 32;

/// Extensions stored under [`IMAGE_DIR`]
const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".bmp", ".ico"];

/// URL suffixes that name a server script rather than the payload type
const SCRIPT_SUFFIXES: &[&str] = &[".php", ".asp", ".aspx", ".jsp", ".cgi", ".forum"];

/// What an asset reference is used for; only consulted when the URL has no extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Image,
    Stylesheet,
    Script,
    Font,
    Other,
}

impl AssetKind {
    fn extension_hint(self) -> Option<&'static str> {
        match self {
            AssetKind::Font => Some(".woff"),
            AssetKind::Stylesheet => Some(".css"),
            AssetKind::Script => Some(".js"),
            AssetKind::Image | AssetKind::Other => None,
        }
    }
}

/// Fetches assets through the shared [`Fetcher`] and stores them below the backup root
#[derive(Debug)]
pub struct AssetManager {
    fetcher: Arc<Fetcher>,
    cache: Arc<AssetCache>,
    blocklist: Arc<AdBlocklist>,
    backup_root: PathBuf,
    max_bytes: Option<usize>,
    /// One lock per URL being downloaded, so concurrent pages share a single request
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AssetManager {
    pub fn new(
        config: &Config,
        fetcher: Arc<Fetcher>,
        cache: Arc<AssetCache>,
        blocklist: Arc<AdBlocklist>,
    ) -> Self {
        Self {
            fetcher,
            cache,
            blocklist,
            backup_root: config.site.backup_root.clone(),
            max_bytes: config.assets.max_asset_bytes(),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn blocklist(&self) -> &AdBlocklist {
        &self.blocklist
    }

    /// Returns the local path of `url`, downloading it first if needed
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute asset URL
    /// * `kind` - How the page uses the asset, used to pick an extension
    ///
    /// # Returns
    ///
    /// * `Some(path)` - Path relative to the backup root, `/`-separated
    /// * `None` - The host is ad-blocked, the URL is not HTTP(S), the download failed or the
    ///   payload exceeds `assets.max-asset-kb`
    pub async fn fetch(&self, url: &Url, kind: AssetKind) -> Option<String> {
        if !matches!(url.scheme(), "http" | "https") || self.blocklist.is_blocked_url(url) {
            return None;
        }

        if let Some(cached) = self.cache.lookup(url.as_str()) {
            return Some(cached);
        }

        let slot = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(in_flight.entry(url.as_str().to_string()).or_default())
        };
        let _guard = slot.lock().await;

        // another page may have finished the download while we waited
        if let Some(cached) = self.cache.lookup(url.as_str()) {
            return Some(cached);
        }

        let stored = match self.download(url, kind).await {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("Could not store asset {}: {}", url, e);
                None
            }
        };

        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(url.as_str());
        stored
    }

    async fn download(&self, url: &Url, kind: AssetKind) -> Result<Option<String>> {
        let fetched = self.fetcher.fetch_bytes(url).await;
        let body = match fetched.body {
            Some(body) if fetched.status == 200 => body,
            _ => {
                tracing::debug!("Asset {} returned HTTP {}", url, fetched.status);
                return Ok(None);
            }
        };

        if let Some(max) = self.max_bytes {
            if body.len() > max {
                tracing::debug!("Asset {} skipped: {} bytes over limit", url, body.len());
                return Ok(None);
            }
        }

        let ext = choose_extension(url, kind, fetched.content_type.as_deref(), &body);
        let dir = if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            IMAGE_DIR
        } else {
            FILE_DIR
        };
        let local_path = format!("{}/{}{}", dir, url_hash(url), ext);

        let target = self.backup_root.join(&local_path);
        tokio::task::spawn_blocking(move || write_atomic(&target, &body)).await??;

        let winner = self.cache.insert(url.as_str(), &local_path)?;
        tracing::debug!("Stored asset {} -> {}", url, winner);
        Ok(Some(winner))
    }
}

/// First 32 hex digits of the SHA-256 of the URL
pub fn url_hash(url: &Url) -> String {
    let digest = Sha256::digest(url.as_str().as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(HASH_LEN);
    hash
}

/// Picks the file extension (with leading dot) for an asset
///
/// Tried in order: the URL path suffix, the kind hint, the Content-Type header, the payload's
/// magic bytes. Falls back to `.bin`.
pub fn choose_extension(
    url: &Url,
    kind: AssetKind,
    content_type: Option<&str>,
    body: &[u8],
) -> String {
    url_extension(url)
        .or_else(|| kind.extension_hint().map(str::to_string))
        .or_else(|| content_type.and_then(extension_for_mime).map(str::to_string))
        .or_else(|| sniff_extension(body).map(str::to_string))
        .unwrap_or_else(|| ".bin".to_string())
}

fn url_extension(url: &Url) -> Option<String> {
    let ext = Path::new(url.path()).extension()?.to_str()?.to_ascii_lowercase();
    if ext.is_empty() || ext.len() > 5 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    let ext = format!(".{}", ext);
    if SCRIPT_SUFFIXES.contains(&ext.as_str()) {
        return None;
    }
    Some(ext)
}

fn extension_for_mime(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let ext = match mime.as_str() {
        "image/png" => ".png",
        "image/jpeg" | "image/jpg" => ".jpg",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "image/svg+xml" => ".svg",
        "image/bmp" => ".bmp",
        "image/x-icon" | "image/vnd.microsoft.icon" => ".ico",
        "text/css" => ".css",
        "text/javascript" | "application/javascript" | "application/x-javascript" => ".js",
        "font/woff" | "application/font-woff" => ".woff",
        "font/woff2" => ".woff2",
        "font/ttf" | "application/x-font-ttf" => ".ttf",
        "font/otf" => ".otf",
        _ => return None,
    };
    Some(ext)
}

fn sniff_extension(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some(".jpg"),
        [0x89, 0x50, 0x4E, 0x47, ..] => Some(".png"),
        [0x47, 0x49, 0x46, 0x38, ..] => Some(".gif"),
        [0x52, 0x49, 0x46, 0x46, ..] if bytes.len() >= 12 && &bytes[8..12] == b"WEBP" => {
            Some(".webp")
        }
        [0x42, 0x4D, ..] => Some(".bmp"),
        [0x00, 0x00, 0x01, 0x00, ..] => Some(".ico"),
        [0x77, 0x4F, 0x46, 0x46, ..] => Some(".woff"),
        [0x77, 0x4F, 0x46, 0x32, ..] => Some(".woff2"),
        _ if bytes.starts_with(b"<svg") => Some(".svg"),
        _ => None,
    }
}

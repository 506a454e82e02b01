//! On-disk cache of downloaded hosts files
//!
//! Each source is stored in the backup root as `hosts_<stem>.txt` and reused until it is older
//! than the source's `cache-days`.

use crate::config::AdSource;
use crate::storage::write_atomic;
use crate::Result;
use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};

/// A hosts file cached in the backup root
#[derive(Debug, Clone)]
pub struct CachedHostsFile {
    pub path: PathBuf,

    /// Last modification time of the cached copy, if it exists
    pub fetched_at: Option<DateTime<Utc>>,
}

impl CachedHostsFile {
    /// Locates the cache file for `source` inside `root`
    pub fn locate(root: &Path, source: &AdSource) -> Self {
        let path = root.join(cache_file_name(&source.url));
        let fetched_at = std::fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        Self { path, fetched_at }
    }

    /// Returns true if there is no cached copy or it is older than `cache_days`
    pub fn is_stale(&self, cache_days: u64) -> bool {
        match self.fetched_at {
            Some(fetched_at) => match i64::try_from(cache_days).ok().and_then(Duration::try_days) {
                Some(max_age) => Utc::now() - fetched_at > max_age,
                None => false,
            },
            None => true,
        }
    }

    pub fn read(&self) -> Result<String> {
        Ok(std::fs::read_to_string(&self.path)?)
    }

    pub fn write(&self, text: &str) -> Result<()> {
        write_atomic(&self.path, text.as_bytes())?;
        Ok(())
    }
}

/// `hosts_<stem>.txt`, where stem is the last path segment of `url` without its extension
pub fn cache_file_name(url: &str) -> String {
    let last = url
        .split(|c: char| c == '?' || c == '#')
        .next()
        .unwrap_or_default()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let stem = match last.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => last,
    };

    let stem: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "hosts_list.txt".to_string()
    } else {
        format!("hosts_{}.txt", stem)
    }
}

/// Returns the text of `source`, downloading it only when the cached copy is stale
///
/// A failed download falls back to a stale cached copy when one exists.
pub async fn load_or_fetch(
    client: &reqwest::Client,
    root: &Path,
    source: &AdSource,
) -> Result<String> {
    let cached = CachedHostsFile::locate(root, source);
    if !cached.is_stale(source.cache_days) {
        tracing::debug!("Using cached hosts file {}", cached.path.display());
        return cached.read();
    }

    match fetch_text(client, &source.url).await {
        Ok(text) => {
            cached.write(&text)?;
            tracing::info!("Downloaded hosts file {}", source.url);
            Ok(text)
        }
        Err(e) if cached.fetched_at.is_some() => {
            tracing::warn!(
                "Failed to refresh {} ({}), using stale copy",
                source.url,
                e
            );
            cached.read()
        }
        Err(e) => Err(e),
    }
}

async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.text().await?)
}

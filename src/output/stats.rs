//! Statistics generation from the persisted crawl state
//!
//! This module provides functionality for summarizing a backup root's
//! `crawl_state.json` and displaying the result.

use crate::state::UrlStatus;
use crate::storage::{AssetCache, CrawlStateStore, PersistentStore, RedirectMap, UrlRecord};
use crate::Result;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Failure messages listed by [`print_statistics`]
const TOP_ERRORS: usize = 5;

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStatistics {
    /// Total number of known pages
    pub total_pages: usize,

    /// Count of pages by status
    pub pages_by_status: BTreeMap<UrlStatus, usize>,

    /// Pages known to redirect elsewhere
    pub redirect_sources: usize,

    /// Pages that failed at least once
    pub retried: usize,

    /// Most frequent `last_error` values of failed pages, most frequent first
    pub top_errors: Vec<(String, usize)>,

    /// Entries of `assets_cache.json`
    pub assets: usize,

    /// Entries of `redirects.json`
    pub redirects: usize,
}

impl CrawlStatistics {
    /// Summarizes a set of records
    pub fn from_records(records: &BTreeMap<String, UrlRecord>) -> Self {
        let mut stats = Self {
            total_pages: records.len(),
            ..Self::default()
        };
        let mut errors: HashMap<&str, usize> = HashMap::new();

        for record in records.values() {
            *stats.pages_by_status.entry(record.status).or_insert(0) += 1;
            if record.is_redirect_source {
                stats.redirect_sources += 1;
            }
            if record.retry_count > 0 {
                stats.retried += 1;
            }
            if record.status == UrlStatus::Failed && !record.is_redirect_source {
                if let Some(error) = record.last_error.as_deref() {
                    *errors.entry(error).or_insert(0) += 1;
                }
            }
        }

        let mut top_errors: Vec<(String, usize)> = errors
            .into_iter()
            .map(|(error, count)| (error.to_string(), count))
            .collect();
        top_errors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_errors.truncate(TOP_ERRORS);
        stats.top_errors = top_errors;

        stats
    }

    /// Summarizes a live store
    pub fn from_store(store: &CrawlStateStore) -> Self {
        Self::from_records(&store.records())
    }

    pub fn count(&self, status: UrlStatus) -> usize {
        self.pages_by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Loads statistics from the state files of a backup root without modifying them
///
/// # Arguments
///
/// * `root` - The backup root
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Statistics; all zero if no crawl has run yet
/// * `Err(MirrorError)` - A state file exists but is unreadable
pub fn load_statistics(root: &Path) -> Result<CrawlStatistics> {
    let records = CrawlStateStore::read_records(&root.join(CrawlStateStore::FILE_NAME))?;
    let mut stats = CrawlStatistics::from_records(&records);
    stats.assets = AssetCache::in_root(root)?.len();
    stats.redirects = RedirectMap::in_root(root)?.len();
    Ok(stats)
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Mirror Statistics ===\n");

    println!("Overview:");
    println!("  Known pages: {}", stats.total_pages);
    println!("  Redirect sources: {}", stats.redirect_sources);
    println!("  Pages retried at least once: {}", stats.retried);
    println!("  Cached assets: {}", stats.assets);
    println!("  Recorded redirects: {}", stats.redirects);
    println!();

    println!("Pages by Status:");
    for status in UrlStatus::all_statuses() {
        let count = stats.count(status);
        if count == 0 {
            continue;
        }
        let percentage = if stats.total_pages > 0 {
            (count as f64 / stats.total_pages as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    if !stats.top_errors.is_empty() {
        println!("Top Failures:");
        for (error, count) in &stats.top_errors {
            println!("  {:>5}  {}", count, error);
        }
        println!();
    }

    let downloaded = stats.count(UrlStatus::Downloaded);
    let mirrorable = stats.total_pages - stats.redirect_sources;
    let success_rate = if mirrorable > 0 {
        (downloaded as f64 / mirrorable as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Completion: {:.1}% ({} / {} pages downloaded)",
        success_rate, downloaded, mirrorable
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Phase;
    use crate::storage::Outcome;
    use tempfile::TempDir;

    fn create_test_store(dir: &TempDir) -> CrawlStateStore {
        let store = CrawlStateStore::in_root(dir.path(), 1).unwrap();
        store.add_url("/", "index.html").unwrap();
        store.add_url("/t1-a", "topics/t1-a.html").unwrap();
        store.add_url("/t2-b", "topics/t2-b.html").unwrap();
        store.add_url("/t3-c", "topics/t3-c.html").unwrap();
        store.mark_redirect_source("/t3-c").unwrap();

        store.reserve_next(Phase::Discovery).unwrap();
        store
            .record_outcome("/", Phase::Discovery, Outcome::Success)
            .unwrap();
        for _ in 0..2 {
            let path = store.reserve_next(Phase::Discovery).unwrap().unwrap();
            store
                .record_outcome(&path, Phase::Discovery, Outcome::failure("HTTP 404"))
                .unwrap();
        }
        store
    }

    #[test]
    fn test_statistics_from_store() {
        let dir = TempDir::new().unwrap();
        let stats = CrawlStatistics::from_store(&create_test_store(&dir));

        assert_eq!(stats.total_pages, 4);
        assert_eq!(stats.count(UrlStatus::Discovered), 1);
        assert_eq!(stats.count(UrlStatus::Failed), 3);
        assert_eq!(stats.redirect_sources, 1);
        assert_eq!(stats.retried, 2);
        assert_eq!(stats.top_errors, vec![("HTTP 404".to_string(), 2)]);
    }

    #[test]
    fn test_load_statistics_reads_without_writing() {
        let dir = TempDir::new().unwrap();
        {
            let store = create_test_store(&dir);
            store.add_url("/t4-d", "topics/t4-d.html").unwrap();
            store.reserve_next(Phase::Discovery).unwrap();
        }
        let state_file = dir.path().join(CrawlStateStore::FILE_NAME);
        let before = std::fs::read(&state_file).unwrap();

        let stats = load_statistics(dir.path()).unwrap();
        assert_eq!(stats.count(UrlStatus::Discovering), 1);
        assert_eq!(std::fs::read(&state_file).unwrap(), before);
    }

    #[test]
    fn test_load_statistics_empty_root() {
        let dir = TempDir::new().unwrap();
        let stats = load_statistics(dir.path()).unwrap();
        assert_eq!(stats, CrawlStatistics::default());
    }
}

//! Storage module for persisting crawl data
//!
//! Three independent JSON snapshots live in the backup root:
//! - `crawl_state.json`: every known page path and its lifecycle record
//! - `assets_cache.json`: downloaded asset URL -> local path
//! - `redirects.json`: redirect source path -> destination path
//!
//! Each store has its own lock and rewrites its file atomically on every mutation. The stores
//! never lock one another.

mod asset_cache;
mod atomic;
mod crawl_state;
mod redirects;
mod traits;

pub use asset_cache::AssetCache;
pub use atomic::write_atomic;
pub use crawl_state::{CrawlStateStore, Outcome, UrlRecord};
pub use redirects::{RedirectMap, MAX_REDIRECT_HOPS};
pub use traits::{PersistentStore, StorageError, StorageResult};

use std::path::{Path, PathBuf};

/// Snapshot copy written after a completed run
pub const FINAL_STATE_FILE: &str = "crawl_state_final.json";

/// Paths of the snapshot files a run writes in `root`
pub fn state_files(root: &Path) -> [PathBuf; 3] {
    [
        root.join(CrawlStateStore::FILE_NAME),
        root.join(AssetCache::FILE_NAME),
        root.join(RedirectMap::FILE_NAME),
    ]
}

/// Deletes the persisted state in `root` so the next run starts from scratch
///
/// # Returns
///
/// The number of files removed
pub fn remove_state_files(root: &Path) -> StorageResult<usize> {
    let mut removed = 0;
    for path in state_files(root) {
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(removed)
}

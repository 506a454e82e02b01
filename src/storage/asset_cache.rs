use crate::storage::traits::{load_snapshot, save_snapshot, PersistentStore, StorageResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Durable map of remote asset URL -> local relative path
///
/// Write-once: the first successful download of a URL wins and every later request for it is
/// answered from here without touching the network. Nothing is ever evicted.
#[derive(Debug)]
pub struct AssetCache {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl AssetCache {
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let entries = load_snapshot(&path)?;
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Opens `assets_cache.json` inside the backup root
    pub fn in_root(root: &Path) -> StorageResult<Self> {
        Self::open(root.join(Self::FILE_NAME))
    }

    pub fn lookup(&self, url: &str) -> Option<String> {
        self.lock().get(url).cloned()
    }

    /// Stores `local_path` for `url` unless another path was stored first
    ///
    /// # Returns
    ///
    /// The path now associated with `url`: `local_path` or the earlier winner
    pub fn insert(&self, url: &str, local_path: &str) -> StorageResult<String> {
        let mut entries = self.lock();
        if let Some(existing) = entries.get(url) {
            return Ok(existing.clone());
        }
        entries.insert(url.to_string(), local_path.to_string());
        save_snapshot(&self.path, &*entries, false)?;
        Ok(local_path.to_string())
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PersistentStore for AssetCache {
    const FILE_NAME: &'static str = "assets_cache.json";

    fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> StorageResult<()> {
        let entries = self.lock();
        save_snapshot(&self.path, &*entries, false)
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

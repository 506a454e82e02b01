use crate::storage::traits::{load_snapshot, save_snapshot, PersistentStore, StorageResult};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Maximum number of hops followed by [`RedirectMap::resolve`]
pub const MAX_REDIRECT_HOPS: usize = 16;

/// Durable map of source path -> destination path
///
/// Persisted pretty-printed with sorted keys so the file diffs cleanly between runs.
#[derive(Debug)]
pub struct RedirectMap {
    path: PathBuf,
    map: Mutex<BTreeMap<String, String>>,
}

impl RedirectMap {
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let map = load_snapshot(&path)?;
        Ok(Self {
            path,
            map: Mutex::new(map),
        })
    }

    /// Opens `redirects.json` inside the backup root
    pub fn in_root(root: &Path) -> StorageResult<Self> {
        Self::open(root.join(Self::FILE_NAME))
    }

    /// Records that `src` redirects to `dst`
    ///
    /// No-op when either side is empty, when they are equal, or when the mapping already holds.
    ///
    /// # Returns
    ///
    /// `true` if the map changed
    pub fn record(&self, src: &str, dst: &str) -> StorageResult<bool> {
        if src.is_empty() || dst.is_empty() || src == dst {
            return Ok(false);
        }

        let mut map = self.lock();
        if map.get(src).map(String::as_str) == Some(dst) {
            return Ok(false);
        }
        map.insert(src.to_string(), dst.to_string());
        save_snapshot(&self.path, &*map, true)?;
        Ok(true)
    }

    /// Follows the redirect chain starting at `path`
    ///
    /// Stops at the first path with no mapping, at a path already visited during this walk, or
    /// after [`MAX_REDIRECT_HOPS`] hops, and returns the last path reached.
    pub fn resolve(&self, path: &str) -> String {
        let map = self.lock();
        let mut visited = HashSet::new();
        let mut current = path.to_string();

        for _ in 0..MAX_REDIRECT_HOPS {
            if !visited.insert(current.clone()) {
                break;
            }
            match map.get(&current) {
                Some(next) => current = next.clone(),
                None => break,
            }
        }

        current
    }

    pub fn get(&self, src: &str) -> Option<String> {
        self.lock().get(src).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.map.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PersistentStore for RedirectMap {
    const FILE_NAME: &'static str = "redirects.json";

    fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> StorageResult<()> {
        let map = self.lock();
        save_snapshot(&self.path, &*map, true)
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_map(dir: &TempDir) -> RedirectMap {
        RedirectMap::in_root(dir.path()).unwrap()
    }

    #[test]
    fn test_chain_resolution() {
        let dir = TempDir::new().unwrap();
        let map = create_test_map(&dir);
        map.record("/a", "/b").unwrap();
        map.record("/b", "/c").unwrap();

        assert_eq!(map.resolve("/a"), "/c");
        assert_eq!(map.resolve("/b"), "/c");
        assert_eq!(map.resolve("/c"), "/c");
        assert_eq!(map.resolve("/unknown"), "/unknown");
    }

    #[test]
    fn test_cycle_terminates() {
        let dir = TempDir::new().unwrap();
        let map = create_test_map(&dir);
        map.record("/x", "/y").unwrap();
        map.record("/y", "/x").unwrap();

        assert_eq!(map.resolve("/x"), "/x");
        assert_eq!(map.resolve("/y"), "/y");
    }

    #[test]
    fn test_long_chain_is_capped() {
        let dir = TempDir::new().unwrap();
        let map = create_test_map(&dir);
        for i in 0..40 {
            map.record(&format!("/p{}", i), &format!("/p{}", i + 1)).unwrap();
        }

        assert_eq!(map.resolve("/p0"), format!("/p{}", MAX_REDIRECT_HOPS));
    }

    #[test]
    fn test_record_ignores_noops() {
        let dir = TempDir::new().unwrap();
        let map = create_test_map(&dir);

        assert!(!map.record("", "/b").unwrap());
        assert!(!map.record("/a", "").unwrap());
        assert!(!map.record("/a", "/a").unwrap());
        assert!(map.record("/a", "/b").unwrap());
        assert!(!map.record("/a", "/b").unwrap());
        assert!(map.record("/a", "/c").unwrap());
        assert_eq!(map.get("/a").as_deref(), Some("/c"));
    }

    #[test]
    fn test_persisted_sorted_and_pretty() {
        let dir = TempDir::new().unwrap();
        {
            let map = create_test_map(&dir);
            map.record("/z", "/a").unwrap();
            map.record("/m", "/n").unwrap();
        }

        let text = std::fs::read_to_string(dir.path().join(RedirectMap::FILE_NAME)).unwrap();
        assert!(text.contains('\n'));
        assert!(text.find("\"/m\"").unwrap() < text.find("\"/z\"").unwrap());

        let map = create_test_map(&dir);
        assert_eq!(map.len(), 2);
        assert_eq!(map.resolve("/z"), "/a");
    }
}

//! Crawl state store
//!
//! Durable mapping of every known path to its [`UrlRecord`]. This is the single source of truth
//! for "has this page been handled": workers never keep private copies, they reserve and
//! report through this API.

use crate::state::{Phase, UrlStatus};
use crate::storage::traits::{load_snapshot, save_snapshot, PersistentStore, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Longest diagnostic kept in `last_error`
const MAX_ERROR_LEN: usize = 200;

/// Persisted state of one page, keyed by its path+query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// Output file, relative to the backup root with `/` separators
    pub local_path: String,

    /// Set once the path is known to redirect elsewhere
    #[serde(default)]
    pub is_redirect_source: bool,

    pub status: UrlStatus,

    #[serde(default)]
    pub retry_count: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UrlRecord {
    fn queued(local_path: impl Into<String>) -> Self {
        Self {
            local_path: local_path.into(),
            is_redirect_source: false,
            status: UrlStatus::Queued,
            retry_count: 0,
            last_error: None,
            updated_at: Some(Utc::now()),
        }
    }

    fn set_status(&mut self, status: UrlStatus) {
        self.status = status;
        self.updated_at = Some(Utc::now());
    }
}

/// Result of one phase's attempt at a reserved path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(String),
}

impl Outcome {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    records: BTreeMap<String, UrlRecord>,
    /// Paths that entered `Queued`, oldest first; entries whose status moved on are skipped
    queued: VecDeque<String>,
    /// Same for `Discovered`
    discovered: VecDeque<String>,
}

impl StoreInner {
    fn from_records(records: BTreeMap<String, UrlRecord>) -> Self {
        let mut inner = Self {
            records,
            ..Self::default()
        };
        let ready: Vec<(String, UrlStatus)> = inner
            .records
            .iter()
            .filter(|(_, record)| record.status.is_pending())
            .map(|(path, record)| (path.clone(), record.status))
            .collect();
        for (path, status) in ready {
            inner.enqueue(path, status);
        }
        inner
    }

    fn enqueue(&mut self, path: String, status: UrlStatus) {
        match status {
            UrlStatus::Queued => self.queued.push_back(path),
            UrlStatus::Discovered => self.discovered.push_back(path),
            _ => {}
        }
    }

    fn queue_mut(&mut self, status: UrlStatus) -> Option<&mut VecDeque<String>> {
        match status {
            UrlStatus::Queued => Some(&mut self.queued),
            UrlStatus::Discovered => Some(&mut self.discovered),
            _ => None,
        }
    }

    /// Pops the oldest path still holding `status`
    fn pop_ready(&mut self, status: UrlStatus) -> Option<String> {
        loop {
            let path = self.queue_mut(status)?.pop_front()?;
            if self.records.get(&path).map(|r| r.status) == Some(status) {
                return Some(path);
            }
        }
    }

    /// Undoes the last `enqueue(_, status)`
    fn unqueue_last(&mut self, status: UrlStatus) {
        if let Some(queue) = self.queue_mut(status) {
            queue.pop_back();
        }
    }

    /// Puts back a record as it was before a mutation whose write failed
    fn restore(&mut self, path: &str, previous: Option<UrlRecord>) {
        match previous {
            Some(record) => {
                self.records.insert(path.to_string(), record);
            }
            None => {
                self.records.remove(path);
            }
        }
    }
}

/// Durable, lock-protected map of path -> [`UrlRecord`]
///
/// Every mutation happens under a single mutex together with the snapshot write, so a
/// reservation is linearizable and the file on disk always matches a state the store was in.
#[derive(Debug)]
pub struct CrawlStateStore {
    path: PathBuf,
    retry_limit: u32,
    inner: Mutex<StoreInner>,
}

impl CrawlStateStore {
    /// Opens the store at `path`, loading the last persisted snapshot
    ///
    /// Reservations left behind by an interrupted run (`discovering`/`downloading`) are
    /// released back to their phase's start status.
    ///
    /// # Arguments
    ///
    /// * `path` - Snapshot file, usually `<backup root>/crawl_state.json`
    /// * `retry_limit` - Failed attempts after which a record becomes `failed`
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlStateStore)` - Store ready for use (empty if the file did not exist)
    /// * `Err(StorageError)` - The file exists but could not be read or parsed
    pub fn open(path: impl Into<PathBuf>, retry_limit: u32) -> StorageResult<Self> {
        let path = path.into();
        let mut records: BTreeMap<String, UrlRecord> = load_snapshot(&path)?;

        let mut released = 0usize;
        for record in records.values_mut() {
            if record.status.is_in_progress() {
                let status = record.status.released();
                record.set_status(status);
                released += 1;
            }
        }

        let store = Self {
            path,
            retry_limit: retry_limit.max(1),
            inner: Mutex::new(StoreInner::from_records(records)),
        };

        if released > 0 {
            tracing::info!("Released {} interrupted reservations", released);
            store.save()?;
        }

        Ok(store)
    }

    /// Reads a snapshot as-is, without releasing reservations or writing anything back
    pub fn read_records(path: &Path) -> StorageResult<BTreeMap<String, UrlRecord>> {
        load_snapshot(path)
    }

    /// Opens `crawl_state.json` inside the backup root
    pub fn in_root(root: &Path, retry_limit: u32) -> StorageResult<Self> {
        Self::open(root.join(Self::FILE_NAME), retry_limit)
    }

    /// Inserts a `queued` record for `path` unless it is already known
    ///
    /// # Returns
    ///
    /// `true` if the record was created, `false` if the path already existed
    pub fn add_url(&self, path: &str, local_path: &str) -> StorageResult<bool> {
        let mut inner = self.lock();
        if inner.records.contains_key(path) {
            return Ok(false);
        }
        inner
            .records
            .insert(path.to_string(), UrlRecord::queued(local_path));
        inner.enqueue(path.to_string(), UrlStatus::Queued);

        if let Err(e) = self.persist(&inner) {
            inner.restore(path, None);
            inner.unqueue_last(UrlStatus::Queued);
            return Err(e);
        }
        Ok(true)
    }

    /// Inserts every unseen path of a batch with a single write
    ///
    /// `local_path_for` is only called for paths that are not in the store yet, so an existing
    /// record always keeps the file it was first assigned.
    ///
    /// # Returns
    ///
    /// The paths that were newly added, in input order
    pub fn add_urls_with<I, S, F>(&self, paths: I, mut local_path_for: F) -> StorageResult<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnMut(&str) -> String,
    {
        let mut inner = self.lock();
        let mut added = Vec::new();

        for path in paths {
            let path = path.as_ref();
            if inner.records.contains_key(path) {
                continue;
            }
            let local_path = local_path_for(path);
            inner
                .records
                .insert(path.to_string(), UrlRecord::queued(local_path));
            inner.enqueue(path.to_string(), UrlStatus::Queued);
            added.push(path.to_string());
        }

        if !added.is_empty() {
            if let Err(e) = self.persist(&inner) {
                for path in &added {
                    inner.restore(path, None);
                    inner.unqueue_last(UrlStatus::Queued);
                }
                return Err(e);
            }
        }
        Ok(added)
    }

    /// Atomically claims the oldest record waiting for `phase`
    ///
    /// The record moves to the phase's in-progress status before the lock is released, so two
    /// concurrent callers can never receive the same path. If the snapshot cannot be written the
    /// record goes back to the head of its queue.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(path))` - The reserved path
    /// * `Ok(None)` - Nothing is currently waiting for this phase
    pub fn reserve_next(&self, phase: Phase) -> StorageResult<Option<String>> {
        let mut inner = self.lock();
        let Some(path) = inner.pop_ready(phase.input_status()) else {
            return Ok(None);
        };

        let previous = inner.records.get(&path).cloned();
        if let Some(record) = inner.records.get_mut(&path) {
            record.set_status(phase.in_progress_status());
        }

        if let Err(e) = self.persist(&inner) {
            inner.restore(&path, previous);
            if let Some(queue) = inner.queue_mut(phase.input_status()) {
                queue.push_front(path);
            }
            return Err(e);
        }
        Ok(Some(path))
    }

    /// Flags `path` as a redirect source and makes it terminal
    ///
    /// Creates the record (with no local file) when the path was never seen before.
    pub fn mark_redirect_source(&self, path: &str) -> StorageResult<()> {
        let mut inner = self.lock();
        let previous = inner.records.get(path).cloned();
        let record = inner
            .records
            .entry(path.to_string())
            .or_insert_with(|| UrlRecord::queued(String::new()));
        record.is_redirect_source = true;
        record.set_status(UrlStatus::Failed);

        if let Err(e) = self.persist(&inner) {
            inner.restore(path, previous);
            return Err(e);
        }
        Ok(())
    }

    /// Applies the result of a phase attempt to a reserved record
    ///
    /// Success advances to the phase's completion status. Failure bumps the retry count and
    /// either hands the record back to the phase or, once the retry limit is reached, marks it
    /// `failed`.
    ///
    /// # Returns
    ///
    /// The new status, or `None` if the record was not reserved by `phase` (for example
    /// because it became a redirect source meanwhile) and was left untouched
    pub fn record_outcome(
        &self,
        path: &str,
        phase: Phase,
        outcome: Outcome,
    ) -> StorageResult<Option<UrlStatus>> {
        let mut inner = self.lock();
        let retry_limit = self.retry_limit;

        let previous = inner.records.get(path).cloned();
        let Some(record) = inner.records.get_mut(path) else {
            tracing::warn!("Outcome for unknown path {} ignored", path);
            return Ok(None);
        };

        if record.status != phase.in_progress_status() {
            tracing::debug!(
                "Outcome for {} ignored: status is {}, not reserved for {}",
                path,
                record.status,
                phase
            );
            return Ok(None);
        }

        let status = match outcome {
            Outcome::Success => phase.completion_status(),
            Outcome::Failure(message) => {
                record.retry_count += 1;
                record.last_error = Some(truncate_error(&message));
                if record.retry_count < retry_limit {
                    phase.input_status()
                } else {
                    UrlStatus::Failed
                }
            }
        };
        record.set_status(status);

        inner.enqueue(path.to_string(), status);
        if let Err(e) = self.persist(&inner) {
            inner.restore(path, previous);
            inner.unqueue_last(status);
            return Err(e);
        }
        Ok(Some(status))
    }

    /// Number of records still waiting for a phase (`queued` or `discovered`)
    pub fn pending_count(&self) -> usize {
        self.lock()
            .records
            .values()
            .filter(|r| r.status.is_pending())
            .count()
    }

    /// Whether any record is waiting for `phase`
    pub fn has_ready(&self, phase: Phase) -> bool {
        let status = phase.input_status();
        self.lock().records.values().any(|r| r.status == status)
    }

    pub fn get(&self, path: &str) -> Option<UrlRecord> {
        self.lock().records.get(path).cloned()
    }

    /// Output file assigned to `path`, if the path is known and has one
    pub fn local_path(&self, path: &str) -> Option<String> {
        self.lock()
            .records
            .get(path)
            .map(|r| r.local_path.clone())
            .filter(|p| !p.is_empty())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lock().records.contains_key(path)
    }

    /// Record count per status; statuses with no records are omitted
    pub fn counts_by_status(&self) -> BTreeMap<UrlStatus, usize> {
        let mut counts = BTreeMap::new();
        for record in self.lock().records.values() {
            *counts.entry(record.status).or_insert(0) += 1;
        }
        counts
    }

    /// Copy of every record, in path order
    pub fn records(&self) -> BTreeMap<String, UrlRecord> {
        self.lock().records.clone()
    }

    /// Every local path already assigned, used to seed collision avoidance
    pub fn claimed_local_paths(&self) -> Vec<String> {
        self.lock()
            .records
            .values()
            .filter(|r| !r.local_path.is_empty())
            .map(|r| r.local_path.clone())
            .collect()
    }

    /// Writes a copy of the current snapshot to another file
    pub fn export_to(&self, path: &Path) -> StorageResult<()> {
        let inner = self.lock();
        save_snapshot(path, &inner.records, false)
    }

    fn persist(&self, inner: &StoreInner) -> StorageResult<()> {
        save_snapshot(&self.path, &inner.records, false)
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PersistentStore for CrawlStateStore {
    const FILE_NAME: &'static str = "crawl_state.json";

    fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> StorageResult<()> {
        let inner = self.lock();
        self.persist(&inner)
    }

    fn len(&self) -> usize {
        self.lock().records.len()
    }
}

fn truncate_error(message: &str) -> String {
    if message.chars().count() <= MAX_ERROR_LEN {
        return message.to_string();
    }
    message.chars().take(MAX_ERROR_LEN).collect()
}

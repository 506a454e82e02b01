//! Storage traits and error types
//!
//! Every store is a JSON snapshot in the backup folder. This module holds the shared error type,
//! the [`PersistentStore`] trait implemented by all three stores, and the snapshot helpers.

use crate::storage::atomic::write_atomic;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Corrupt snapshot {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A durable map persisted as a single JSON file
///
/// Implementations guard their map with one mutex and rewrite the whole file atomically on
/// every mutation, so the file on disk is always a complete snapshot.
pub trait PersistentStore {
    /// File name of the snapshot inside the backup root
    const FILE_NAME: &'static str;

    /// Full path of the snapshot this store writes
    fn path(&self) -> &Path;

    /// Writes the current contents to disk
    fn save(&self) -> StorageResult<()>;

    /// Number of entries held
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reads a snapshot, returning the default value when the file does not exist
///
/// An unreadable or unparsable file is an error: silently starting over would throw away the
/// progress of every earlier run.
pub(crate) fn load_snapshot<T>(path: &Path) -> StorageResult<T>
where
    T: DeserializeOwned + Default,
{
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(e.into()),
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Serializes `value` and atomically replaces the snapshot at `path`
pub(crate) fn save_snapshot<T>(path: &Path, value: &T, pretty: bool) -> StorageResult<()>
where
    T: Serialize + ?Sized,
{
    let bytes = if pretty {
        serde_json::to_vec_pretty(value)?
    } else {
        serde_json::to_vec(value)?
    };
    write_atomic(path, &bytes)?;
    Ok(())
}

//! Scoped temporary files backing lazily loaded assets

use crate::error::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tempfile::{TempDir, TempPath};
use tracing::debug;

/// A temporary file handed out by a [`TempStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempFile {
    pub id: u64,
    pub path: PathBuf,
}

/// Scoped temporary-file service
///
/// `acquire` hands out an empty file; `release` deletes it. Releasing an id
/// twice is harmless.
pub trait TempStore: Send + Sync {
    fn acquire(&self) -> Result<TempFile>;

    fn release(&self, id: u64) -> Result<()>;
}

/// [`TempStore`] backed by a directory on disk
pub struct TempDirStore {
    base: PathBuf,
    // Removed (with anything left inside) when the store is dropped
    _root: Option<TempDir>,
    files: Mutex<HashMap<u64, TempPath>>,
    next_id: AtomicU64,
}

impl TempDirStore {
    /// Store in a fresh directory under the system temp dir
    pub fn new() -> Result<Self> {
        let root = tempfile::Builder::new().prefix("iyamf-").tempdir()?;
        Ok(TempDirStore {
            base: root.path().to_path_buf(),
            _root: Some(root),
            files: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Store creating its files inside an existing directory
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        Ok(TempDirStore {
            base: dir.as_ref().to_path_buf(),
            _root: None,
            files: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Files acquired and not yet released
    pub fn active(&self) -> usize {
        self.files.lock().len()
    }
}

impl TempStore for TempDirStore {
    fn acquire(&self) -> Result<TempFile> {
        let file = tempfile::Builder::new()
            .prefix("asset-")
            .suffix(".bin")
            .tempfile_in(&self.base)?;
        let temp_path = file.into_temp_path();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let path = temp_path.to_path_buf();

        debug!("Acquired temp file {} at {}", id, path.display());
        self.files.lock().insert(id, temp_path);

        Ok(TempFile { id, path })
    }

    fn release(&self, id: u64) -> Result<()> {
        let removed = self.files.lock().remove(&id);
        if let Some(temp_path) = removed {
            debug!("Releasing temp file {}", id);
            temp_path.close()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for TempDirStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TempDirStore")
            .field("base", &self.base)
            .field("active", &self.active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_release() {
        let store = TempDirStore::new().unwrap();
        let file = store.acquire().unwrap();
        assert!(file.path.exists());
        assert!(file.path.starts_with(store.base()));
        assert_eq!(store.active(), 1);

        store.release(file.id).unwrap();
        assert!(!file.path.exists());
        assert_eq!(store.active(), 0);

        // Second release is a no-op
        store.release(file.id).unwrap();
    }

    #[test]
    fn test_ids_are_unique() {
        let store = TempDirStore::new().unwrap();
        let a = store.acquire().unwrap();
        let b = store.acquire().unwrap();
        assert_ne!(a.id, b.id);
        assert_ne!(a.path, b.path);
    }

    #[test]
    fn test_in_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("cache");
        let store = TempDirStore::in_dir(&nested).unwrap();
        let file = store.acquire().unwrap();
        assert!(file.path.starts_with(&nested));
        drop(store);
        // Dropping the store releases outstanding files
        assert!(!file.path.exists());
    }
}

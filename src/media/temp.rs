//! Scoped transient files.
//!
//! Every conversion job materializes its input (and any intermediate or
//! output artifact) as a file under one store directory. A [`TempResource`]
//! owns exactly one such path and removes it when released or dropped, so a
//! job that fails, times out or is cancelled cannot leave files behind.
//!
//! Names are `<prefix>-<uuid>.<suffix>`. The random token keeps concurrent
//! jobs (and repeated runs) from ever sharing a path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::error::MediaError;

const FILE_PREFIX: &str = "convertbot";

#[derive(Debug, Default)]
struct Ledger {
    acquired: AtomicU64,
    released: AtomicU64,
}

/// Point-in-time acquisition counters of a [`TempStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TempStats {
    pub acquired: u64,
    pub released: u64,
}

impl TempStats {
    /// Resources handed out but not yet released.
    pub fn outstanding(&self) -> u64 {
        self.acquired.saturating_sub(self.released)
    }
}

/// Provider of [`TempResource`]s rooted at one directory.
///
/// Cloning is cheap; clones share the directory and the counters.
#[derive(Debug, Clone)]
pub struct TempStore {
    root: PathBuf,
    ledger: Arc<Ledger>,
}

impl TempStore {
    /// Create a store under `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ledger: Arc::new(Ledger::default()),
        }
    }

    /// Directory holding this store's files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the store directory if it is missing.
    pub fn ensure_root(&self) -> Result<(), MediaError> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Allocate a uniquely named slot with the given extension.
    ///
    /// Nothing is written; the file appears once a caller writes to
    /// [`TempResource::path`].
    pub fn acquire(&self, suffix: &str) -> Result<TempResource, MediaError> {
        self.ensure_root()?;

        let suffix = suffix.trim_start_matches('.');
        let path = self
            .root
            .join(format!("{}-{}.{}", FILE_PREFIX, Uuid::new_v4().simple(), suffix));

        self.ledger.acquired.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(path = %path.display(), "Acquired temp resource");

        Ok(TempResource {
            path,
            suffix: suffix.to_string(),
            released: false,
            ledger: Arc::clone(&self.ledger),
        })
    }

    /// Snapshot of acquisitions and releases so far.
    pub fn stats(&self) -> TempStats {
        TempStats {
            acquired: self.ledger.acquired.load(Ordering::Relaxed),
            released: self.ledger.released.load(Ordering::Relaxed),
        }
    }
}

/// One exclusively owned transient file.
#[derive(Debug)]
pub struct TempResource {
    path: PathBuf,
    suffix: String,
    released: bool,
    ledger: Arc<Ledger>,
}

impl TempResource {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Extension this resource was acquired with (without the dot).
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Remove the underlying file.
    ///
    /// Idempotent: a second call, or a call on a path that was never
    /// written, does nothing. A file that could not be removed stays
    /// outstanding in [`TempStore::stats`].
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::trace!(path = %self.path.display(), "Released temp resource"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove temp resource"
                );
                return;
            }
        }
        self.ledger.released.fetch_add(1, Ordering::Relaxed);
    }
}

impl Drop for TempResource {
    fn drop(&mut self) {
        self.release();
    }
}

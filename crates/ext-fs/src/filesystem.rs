//! The filesystem seam used by the registry and the autoloader
//!
//! Manifest reads, modification times and autoload file probes all go
//! through [`Filesystem`]. [`DiskFs`] is the production implementation;
//! [`MemoryFs`] keeps files in memory and counts reads, which is what tests
//! use to observe whether manifests were parsed again.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::UNIX_EPOCH;

use crate::{Error, NormalizedPath, Result, io};

/// Read-only view of the files the registry cares about.
pub trait Filesystem: Send + Sync + std::fmt::Debug {
    /// Read a whole file as UTF-8 text.
    fn read_text(&self, path: &NormalizedPath) -> Result<String>;

    /// Whether `path` names an existing regular file.
    fn is_file(&self, path: &NormalizedPath) -> bool;

    /// Modification time in seconds since the Unix epoch.
    fn modified(&self, path: &NormalizedPath) -> Result<u64>;
}

/// [`Filesystem`] backed by the real disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskFs;

impl DiskFs {
    pub fn new() -> Self {
        Self
    }
}

impl Filesystem for DiskFs {
    fn read_text(&self, path: &NormalizedPath) -> Result<String> {
        io::read_text(path)
    }

    fn is_file(&self, path: &NormalizedPath) -> bool {
        path.is_file()
    }

    fn modified(&self, path: &NormalizedPath) -> Result<u64> {
        let native = path.to_native();
        let metadata = std::fs::metadata(&native).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound {
                    path: native.clone(),
                }
            } else {
                Error::io(&native, e)
            }
        })?;
        let modified = metadata.modified().map_err(|e| Error::io(&native, e))?;
        Ok(modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone)]
struct MemoryFile {
    content: String,
    mtime: u64,
}

/// In-memory [`Filesystem`] for tests and dry runs.
///
/// Every successful [`Filesystem::read_text`] call bumps a counter
/// readable through [`MemoryFs::reads`].
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: Mutex<BTreeMap<NormalizedPath, MemoryFile>>,
    reads: AtomicUsize,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MemoryFs::insert`].
    pub fn with_file(self, path: impl Into<NormalizedPath>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    /// Add or replace a file. New files start with mtime 1; replacing a
    /// file bumps its mtime.
    pub fn insert(&self, path: impl Into<NormalizedPath>, content: impl Into<String>) {
        let mut files = self.lock();
        let path = path.into();
        let mtime = files.get(&path).map_or(1, |f| f.mtime + 1);
        files.insert(
            path,
            MemoryFile {
                content: content.into(),
                mtime,
            },
        );
    }

    /// Override the modification time of an existing file.
    pub fn set_mtime(&self, path: impl Into<NormalizedPath>, mtime: u64) {
        if let Some(file) = self.lock().get_mut(&path.into()) {
            file.mtime = mtime;
        }
    }

    pub fn remove(&self, path: impl Into<NormalizedPath>) {
        self.lock().remove(&path.into());
    }

    /// Number of successful reads so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<NormalizedPath, MemoryFile>> {
        // A poisoned map is still a valid map
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Filesystem for MemoryFs {
    fn read_text(&self, path: &NormalizedPath) -> Result<String> {
        let files = self.lock();
        let file = files.get(path).ok_or_else(|| Error::NotFound {
            path: path.to_native(),
        })?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(file.content.clone())
    }

    fn is_file(&self, path: &NormalizedPath) -> bool {
        self.lock().contains_key(path)
    }

    fn modified(&self, path: &NormalizedPath) -> Result<u64> {
        self.lock()
            .get(path)
            .map(|f| f.mtime)
            .ok_or_else(|| Error::NotFound {
                path: path.to_native(),
            })
    }
}

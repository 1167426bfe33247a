//! Installation fixtures: extension directories on disk or in memory.

use std::fs;
use std::path::{Path, PathBuf};

use ext_fs::{MemoryFs, NormalizedPath};
use serde_json::Value;
use tempfile::TempDir;

/// A temporary installation with `extensions/` and `skins/` directories.
///
/// # Example
///
/// ```rust,no_run
/// use ext_test_utils::{ManifestBuilder, TestInstall};
///
/// let install = TestInstall::new();
/// let manifest = install.add_extension("Foo", &ManifestBuilder::new("Foo").build());
/// install.write_file("extensions/Foo/src/Bar.php", "<?php");
/// assert!(manifest.is_file());
/// ```
pub struct TestInstall {
    temp_dir: TempDir,
}

impl Default for TestInstall {
    fn default() -> Self {
        Self::new()
    }
}

impl TestInstall {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    /// Return the root path of the temporary directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// The root as a [`NormalizedPath`].
    pub fn normalized_root(&self) -> NormalizedPath {
        NormalizedPath::new(self.root())
    }

    /// Write `extensions/<dir>/extension.json` and return its path.
    pub fn add_extension(&self, dir: &str, manifest: &Value) -> NormalizedPath {
        self.write_json(&format!("extensions/{dir}/extension.json"), manifest)
    }

    /// Write `skins/<dir>/skin.json` and return its path.
    pub fn add_skin(&self, dir: &str, manifest: &Value) -> NormalizedPath {
        self.write_json(&format!("skins/{dir}/skin.json"), manifest)
    }

    /// Write `content` to `path` (relative to root), creating parents.
    ///
    /// # Panics
    /// Panics if the filesystem operations fail.
    pub fn write_file(&self, path: &str, content: &str) -> PathBuf {
        let full_path = self.root().join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .unwrap_or_else(|e| panic!("TestInstall: failed to create {}: {e}", parent.display()));
        }
        fs::write(&full_path, content)
            .unwrap_or_else(|e| panic!("TestInstall: failed to write {}: {e}", full_path.display()));
        full_path
    }

    fn write_json(&self, path: &str, manifest: &Value) -> NormalizedPath {
        NormalizedPath::new(self.write_file(path, &manifest.to_string()))
    }
}

/// An in-memory filesystem holding `manifests` as JSON files.
pub fn memory_fs(manifests: &[(&str, Value)]) -> MemoryFs {
    manifests
        .iter()
        .fold(MemoryFs::new(), |fs, (path, body)| fs.with_file(*path, body.to_string()))
}

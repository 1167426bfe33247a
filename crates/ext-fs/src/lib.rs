//! Filesystem seam for the extension registry
//!
//! Everything that touches the disk on behalf of the registry goes through
//! this crate: normalized paths, the [`Filesystem`] trait (with a disk-backed
//! and an in-memory implementation), atomic writes, content fingerprints and
//! format-agnostic config loading.

pub mod config;
pub mod error;
pub mod filesystem;
pub mod fingerprint;
pub mod io;
pub mod path;

pub use config::ConfigStore;
pub use error::{Error, Result};
pub use filesystem::{DiskFs, Filesystem, MemoryFs};
pub use path::NormalizedPath;

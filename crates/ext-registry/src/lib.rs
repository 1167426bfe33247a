//! Extension and skin registration.
//!
//! This crate reads JSON manifests, extracts what each unit contributes,
//! checks requirements, merges globals into a [`Settings`] store by
//! per-key [`MergeStrategy`], and wires autoload maps into an
//! [`ext_autoload::Autoloader`]. [`ExtensionRegistry`] drives the whole
//! pipeline and caches processed batches through a [`CacheStore`].

pub mod assoc;
pub mod cache;
pub mod checker;
pub mod config;
pub mod credits;
pub mod error;
pub mod extracted;
pub mod manifest;
pub mod merge;
pub mod processor;
pub mod registry;
pub mod requirements;
pub mod settings;
pub mod version;

/// The canonical filename of an extension manifest.
pub const EXTENSION_MANIFEST: &str = "extension.json";

/// The canonical filename of a skin manifest.
pub const SKIN_MANIFEST: &str = "skin.json";

pub use cache::{CacheStore, FileCache, MemoryCache, NullCache};
pub use checker::{DependencyKind, VersionChecker, Violation};
pub use config::RegistryConfig;
pub use credits::Credit;
pub use error::{Error, Result};
pub use extracted::{AutoloadInfo, ExtractedInfo, GlobalValue};
pub use manifest::Manifest;
pub use merge::MergeStrategy;
pub use processor::Processor;
pub use registry::{CallbackResult, ExtensionRegistry, RegistrationCallback};
pub use requirements::Requirements;
pub use settings::{Config, Settings};
pub use version::VersionConstraint;

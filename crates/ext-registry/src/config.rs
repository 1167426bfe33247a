//! Registry configuration, loaded from `extreg.toml` (or JSON/YAML).

use std::collections::BTreeMap;
use std::time::Duration;

use ext_fs::{ConfigStore, NormalizedPath};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::Result;

fn default_host_version() -> String {
    "1.43.0".to_string()
}

fn default_abilities() -> BTreeMap<String, bool> {
    BTreeMap::from([("shell".to_string(), true)])
}

fn default_install_root() -> NormalizedPath {
    NormalizedPath::new("/")
}

fn default_cache_keyspace() -> String {
    "local".to_string()
}

fn default_cache_expiry_secs() -> u64 {
    60 * 60 * 24
}

/// Environment the registry loads extensions into.
///
/// Every field has a default, so an empty file is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Version of the host, checked against `requires.MediaWiki`.
    #[serde(default = "default_host_version")]
    pub host_version: String,

    /// Runtime version checked against `requires.platform.php`. Unknown
    /// when unset, which fails any such constraint.
    pub runtime_version: Option<String>,

    /// Loaded runtime extensions, matched by `ext-<name>` requirements.
    pub runtime_extensions: Vec<String>,

    /// Host abilities, matched by `ability-<name>` requirements.
    #[serde(default = "default_abilities")]
    pub abilities: BTreeMap<String, bool>,

    /// Messages explaining why an ability is unavailable.
    pub ability_errors: BTreeMap<String, String>,

    /// Fold `dev-requires` into `requires`.
    pub check_dev: bool,

    /// Register `TestAutoloadClasses` and `TestAutoloadNamespaces`.
    pub load_test_autoload: bool,

    /// Skip caching a batch that raised deprecation warnings, so the
    /// warnings show again on the next load.
    pub development_warnings: bool,

    /// Use this mtime for every queued manifest instead of asking the
    /// filesystem.
    pub mtime_override: Option<u64>,

    /// Relative autoload targets resolve against this directory.
    #[serde(default = "default_install_root")]
    pub install_root: NormalizedPath,

    /// Classes shipped with the host, consulted before extension classes.
    pub local_classes: IndexMap<String, NormalizedPath>,

    /// Classes consulted after extension classes.
    pub override_classes: IndexMap<String, NormalizedPath>,

    /// Prefix of every cache key.
    #[serde(default = "default_cache_keyspace")]
    pub cache_keyspace: String,

    /// Lifetime of a cached bundle; zero keeps it forever.
    #[serde(default = "default_cache_expiry_secs")]
    pub cache_expiry_secs: u64,

    /// Directory for the file-backed cache. No persistent cache when unset.
    pub cache_dir: Option<NormalizedPath>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            host_version: default_host_version(),
            runtime_version: None,
            runtime_extensions: Vec::new(),
            abilities: default_abilities(),
            ability_errors: BTreeMap::new(),
            check_dev: false,
            load_test_autoload: false,
            development_warnings: false,
            mtime_override: None,
            install_root: default_install_root(),
            local_classes: IndexMap::new(),
            override_classes: IndexMap::new(),
            cache_keyspace: default_cache_keyspace(),
            cache_expiry_secs: default_cache_expiry_secs(),
            cache_dir: None,
        }
    }
}

impl RegistryConfig {
    /// Load from a TOML, JSON or YAML file, by extension.
    pub fn load(path: &NormalizedPath) -> Result<Self> {
        Ok(ConfigStore::new().load(path)?)
    }

    pub fn save(&self, path: &NormalizedPath) -> Result<()> {
        Ok(ConfigStore::new().save(path, self)?)
    }

    pub fn cache_expiry(&self) -> Duration {
        Duration::from_secs(self.cache_expiry_secs)
    }
}

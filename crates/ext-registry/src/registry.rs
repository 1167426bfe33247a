//! The extension registry
//!
//! [`ExtensionRegistry`] owns everything registration produces: the queue of
//! manifests waiting to load, the credits of loaded units, attributes,
//! constants, the settings store and the autoloader.
//!
//! Lifecycle: [`queue`](ExtensionRegistry::queue) manifests, call
//! [`load_from_queue`](ExtensionRegistry::load_from_queue) (repeatable),
//! then [`finish`](ExtensionRegistry::finish) to seal the settings. Loading
//! after `finish` is an error.
//!
//! A processed queue is cached under a key derived from the queue (paths
//! and mtimes) and the environment, so an unchanged installation does not
//! parse its manifests again.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use ext_autoload::Autoloader;
use ext_fs::{Filesystem, NormalizedPath, fingerprint::fingerprint_json};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::assoc::Assoc;
use crate::cache::{CacheStore, NullCache};
use crate::checker::VersionChecker;
use crate::config::RegistryConfig;
use crate::credits::Credit;
use crate::error::{Error, Result};
use crate::extracted::ExtractedInfo;
use crate::manifest::{Manifest, OLDEST_MANIFEST_VERSION};
use crate::processor::Processor;
use crate::requirements::Requirements;
use crate::settings::{Config, Settings};
use crate::version::VersionConstraint;

/// Bumped whenever the cached bundle changes shape.
pub const CACHE_VERSION: u32 = 8;

/// Attributes cached apart from the main bundle and read on demand.
pub const LAZY_ATTRIBUTES: [&str; 3] = ["TrackingCategories", "QUnitTestModules", "SkinLessImportPaths"];

/// Outcome of a registration callback.
pub type CallbackResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// A function a manifest's `callback` can name, run once the unit's batch
/// has been exported.
pub type RegistrationCallback = Box<dyn Fn(&Credit, &mut Settings) -> CallbackResult + Send + Sync>;

/// Everything that invalidates a cached bundle.
#[derive(Serialize)]
struct Vary<'a> {
    registration: u32,
    host: &'a str,
    abilities: &'a BTreeMap<String, bool>,
    check_dev: bool,
    load_test_autoload: bool,
    queue: &'a IndexMap<NormalizedPath, u64>,
}

/// Loads extension and skin manifests into settings, constants and the
/// autoloader.
pub struct ExtensionRegistry {
    fs: Arc<dyn Filesystem>,
    config: RegistryConfig,
    cache: Arc<dyn CacheStore>,
    /// Manifest path to mtime.
    queue: IndexMap<NormalizedPath, u64>,
    finished: bool,
    loaded: IndexMap<String, Credit>,
    attributes: Map<String, Value>,
    test_attributes: Map<String, Value>,
    lazy_attributes: Map<String, Value>,
    constants: IndexMap<String, i64>,
    settings: Settings,
    sealed: Option<Config>,
    autoloader: Autoloader,
    callbacks: HashMap<String, RegistrationCallback>,
    vary_hash: Option<String>,
    /// The vary hash covers every loaded unit, so lazy attribute cache
    /// entries keyed by it are complete.
    lazy_cacheable: bool,
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("queue", &self.queue)
            .field("finished", &self.finished)
            .field("loaded", &self.loaded.keys().collect::<Vec<_>>())
            .field("constants", &self.constants)
            .field("callbacks", &self.callbacks.keys().collect::<Vec<_>>())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl ExtensionRegistry {
    /// A registry reading manifests through `fs`, without a persistent cache.
    pub fn new(fs: Arc<dyn Filesystem>, config: RegistryConfig) -> Self {
        let autoloader = Autoloader::new(Arc::clone(&fs), config.install_root.clone())
            .with_local_classes(config.local_classes.clone())
            .with_override_classes(config.override_classes.clone());
        Self {
            fs,
            config,
            cache: Arc::new(NullCache),
            queue: IndexMap::new(),
            finished: false,
            loaded: IndexMap::new(),
            attributes: Map::new(),
            test_attributes: Map::new(),
            lazy_attributes: Map::new(),
            constants: IndexMap::new(),
            settings: Settings::new(),
            sealed: None,
            autoloader,
            callbacks: HashMap::new(),
            vary_hash: None,
            lazy_cacheable: false,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = cache;
        self
    }

    /// Start from settings the host has already populated.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Constants the host defines before any extension loads.
    pub fn with_constants(mut self, constants: IndexMap<String, i64>) -> Self {
        self.constants = constants;
        self
    }

    pub fn with_autoloader(mut self, autoloader: Autoloader) -> Self {
        self.autoloader = autoloader;
        self
    }

    /// Make `callback` available to manifests under `name`.
    pub fn register_callback<F>(&mut self, name: impl Into<String>, callback: F)
    where
        F: Fn(&Credit, &mut Settings) -> CallbackResult + Send + Sync + 'static,
    {
        self.callbacks.insert(name.into(), Box::new(callback));
    }

    /// Queue a manifest for the next [`load_from_queue`](Self::load_from_queue).
    ///
    /// After [`finish`](Self::finish) the path is still recorded, so the
    /// next load can name it, but the call fails.
    pub fn queue(&mut self, path: impl Into<NormalizedPath>) -> Result<()> {
        let path = path.into();
        let mtime = match self.config.mtime_override {
            Some(mtime) => mtime,
            None => self
                .fs
                .modified(&path)
                .map_err(|source| Error::MissingExtension {
                    path: path.clone(),
                    source,
                })?,
        };
        self.queue.insert(path.clone(), mtime);
        self.invalidate_process_cache();

        if self.finished {
            return Err(Error::LateRegistration { paths: vec![path] });
        }
        Ok(())
    }

    /// Queued manifests with their mtimes.
    pub fn queued(&self) -> &IndexMap<NormalizedPath, u64> {
        &self.queue
    }

    pub fn clear_queue(&mut self) {
        self.queue.clear();
        self.invalidate_process_cache();
    }

    /// Load every queued manifest, from the cache when possible.
    pub fn load_from_queue(&mut self) -> Result<()> {
        if self.queue.is_empty() {
            return Ok(());
        }
        if self.finished {
            return Err(Error::LateRegistration {
                paths: self.queue.keys().cloned().collect(),
            });
        }

        let key = self.cache_key("main", None)?;
        let cached = self
            .cache
            .get(&key)
            .and_then(|value| match serde_json::from_value::<ExtractedInfo>(value) {
                Ok(info) => Some(info),
                Err(e) => {
                    warn!(key = %key, error = %e, "Discarding unreadable cached registration data");
                    None
                }
            });

        let info = match cached {
            Some(info) => {
                debug!(key = %key, "Registration cache hit");
                info
            }
            None => {
                debug!(key = %key, queued = self.queue.len(), "Registration cache miss");
                let queue = self.queue.clone();
                let info = self.read_from_queue(&queue)?;
                self.save_to_cache(&key, &info)?;
                info
            }
        };

        let whole = self.loaded.is_empty();
        self.export_extracted_data(info)?;
        // The vary hash is kept for lazy attribute lookups
        self.lazy_cacheable = whole;
        self.queue.clear();
        Ok(())
    }

    /// Read and process `queue` without touching registry state.
    ///
    /// Fails on the first unreadable or malformed manifest, and with one
    /// error listing every violation when requirements are not met.
    pub fn read_from_queue(&self, queue: &IndexMap<NormalizedPath, u64>) -> Result<ExtractedInfo> {
        let mut processor = Processor::new(Arc::clone(&self.fs)).with_defined_constants(self.constants.clone());
        let mut requirements: IndexMap<String, Requirements> = IndexMap::new();
        let mut warnings = false;

        for path in queue.keys() {
            let manifest = Manifest::read(self.fs.as_ref(), path)?;
            let version = match manifest.manifest_version()? {
                Some(version) => version,
                None => {
                    warn!(path = %path, "Manifest does not declare manifest_version, assuming 1; this is deprecated");
                    warnings = true;
                    OLDEST_MANIFEST_VERSION
                }
            };
            processor.extract_info(&manifest, version)?;

            let requires = manifest.requirements(self.config.check_dev)?;
            if !requires.is_empty() {
                requirements.insert(manifest.require_name()?.to_string(), requires);
            }
        }

        let mut info = processor.extracted_info(self.config.load_test_autoload)?;
        info.warnings = warnings;

        let checker = VersionChecker::new(self.config.host_version.clone())
            .with_runtime_version(self.config.runtime_version.clone())
            .with_runtime_extensions(&self.config.runtime_extensions)
            .with_abilities(self.config.abilities.clone())
            .with_ability_errors(self.config.ability_errors.clone())
            .with_loaded(self.loaded.values().chain(info.credits.values()));
        let violations = checker.check(&requirements)?;
        if !violations.is_empty() {
            return Err(Error::Incompatible { violations });
        }
        Ok(info)
    }

    /// Apply a processed batch: settings, autoload maps, constants,
    /// credits, attributes, then callbacks.
    ///
    /// Conflicts are detected before anything is applied, so a rejected
    /// batch leaves the registry as it was.
    pub fn export_extracted_data(&mut self, info: ExtractedInfo) -> Result<()> {
        self.validate_batch(&info)?;

        for (key, global) in info.globals {
            let strategy = global.strategy();
            if !self.settings.apply(&key, global.value, strategy) {
                debug!(key = %key, %strategy, "Existing setting kept");
            }
        }

        for (name, value) in info.defines {
            self.constants.entry(name).or_insert(value);
        }
        self.autoloader.register_namespaces(info.autoload.namespaces);
        self.autoloader.register_classes(info.autoload.classes);
        self.autoloader.load_files(&info.autoload.files)?;

        for (name, value) in info.attributes {
            merge_attribute(&mut self.attributes, name, value);
        }
        info!(units = info.credits.len(), "Registered extensions");
        self.loaded.extend(info.credits);

        for (unit, name) in info.callbacks {
            let (Some(credit), Some(callback)) = (self.loaded.get(&unit), self.callbacks.get(&name)) else {
                continue;
            };
            debug!(unit = %unit, callback = %name, "Running registration callback");
            callback(credit, &mut self.settings).map_err(|e| Error::CallbackFailed {
                unit: unit.clone(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    fn validate_batch(&self, info: &ExtractedInfo) -> Result<()> {
        for (name, value) in &info.defines {
            if let Some(existing) = self.constants.get(name)
                && existing != value
            {
                return Err(Error::ConstantRedefined {
                    name: name.clone(),
                    existing: *existing,
                    new: *value,
                });
            }
        }
        for (name, credit) in &info.credits {
            if let Some(first) = self.loaded.get(name) {
                return Err(Error::DuplicateName {
                    name: name.clone(),
                    first: first.path.clone(),
                    second: credit.path.clone(),
                });
            }
        }
        for callback in info.callbacks.values() {
            if !self.callbacks.contains_key(callback) {
                return Err(Error::UnknownCallback {
                    callback: callback.clone(),
                });
            }
        }
        let root = self.autoloader.install_root();
        for file in &info.autoload.files {
            let file = file.absolutize(root);
            if !self.fs.is_file(&file) {
                return Err(ext_autoload::Error::MissingFile { path: file }.into());
            }
        }
        Ok(())
    }

    /// Whether `name` is loaded and, unless `constraint` is `*`, its
    /// version satisfies `constraint`.
    pub fn is_loaded(&self, name: &str, constraint: &str) -> Result<bool> {
        let Some(credit) = self.loaded.get(name) else {
            return Ok(false);
        };
        if constraint.trim() == "*" {
            return Ok(true);
        }
        let Some(version) = &credit.version else {
            return Err(Error::UnversionedDependency {
                name: name.to_string(),
                constraint: constraint.to_string(),
            });
        };
        Ok(VersionConstraint::parse(constraint)?.satisfies(version))
    }

    /// Credits of every loaded unit, keyed by name.
    pub fn all_things(&self) -> &IndexMap<String, Credit> {
        &self.loaded
    }

    /// Value of attribute `name`, an empty list when nothing set it.
    pub fn attribute(&mut self, name: &str) -> Result<Value> {
        if let Some(value) = self.test_attributes.get(name) {
            return Ok(value.clone());
        }
        if LAZY_ATTRIBUTES.contains(&name) {
            return self.lazy_attribute(name);
        }
        Ok(self
            .attributes
            .get(name)
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new())))
    }

    fn lazy_attribute(&mut self, name: &str) -> Result<Value> {
        if let Some(value) = self.lazy_attributes.get(name) {
            return Ok(value.clone());
        }

        // Only a single-batch load has a hash that names every loaded manifest
        let key = if self.lazy_cacheable {
            Some(self.cache_key("lazy-attrib", Some(name))?)
        } else {
            None
        };
        if let Some(value) = key.as_deref().and_then(|key| self.cache.get(key)) {
            debug!(attribute = name, "Lazy attribute cache hit");
            self.lazy_attributes.insert(name.to_string(), value.clone());
            return Ok(value);
        }

        let paths: IndexMap<NormalizedPath, u64> = self
            .loaded
            .values()
            .map(|credit| (credit.path.clone(), 1))
            .collect();
        let value = if paths.is_empty() {
            Value::Array(Vec::new())
        } else {
            debug!(attribute = name, manifests = paths.len(), "Reading lazy attribute from manifests");
            let mut info = self.read_manifests_for_attributes(&paths)?;
            info.attributes
                .shift_remove(name)
                .unwrap_or_else(|| Value::Array(Vec::new()))
        };
        if let Some(key) = &key {
            self.cache.set(key, value.clone(), self.config.cache_expiry());
        }
        self.lazy_attributes.insert(name.to_string(), value.clone());
        Ok(value)
    }

    /// Process already loaded manifests again. Their credits are what is
    /// being re-read, so they do not count as loaded for the checker.
    fn read_manifests_for_attributes(&self, paths: &IndexMap<NormalizedPath, u64>) -> Result<ExtractedInfo> {
        let mut processor = Processor::new(Arc::clone(&self.fs)).with_defined_constants(self.constants.clone());
        for path in paths.keys() {
            let manifest = Manifest::read(self.fs.as_ref(), path)?;
            let version = manifest.manifest_version()?.unwrap_or(OLDEST_MANIFEST_VERSION);
            processor.extract_info(&manifest, version)?;
        }
        processor.extracted_info(self.config.load_test_autoload)
    }

    /// Override an attribute until [`clear_attribute_for_test`](Self::clear_attribute_for_test).
    pub fn set_attribute_for_test(&mut self, name: impl Into<String>, value: Value) {
        self.test_attributes.insert(name.into(), value);
    }

    pub fn clear_attribute_for_test(&mut self, name: &str) {
        self.test_attributes.shift_remove(name);
    }

    /// Close the registry and seal the settings. Calling it again returns
    /// the same configuration.
    pub fn finish(&mut self) -> Config {
        if let Some(config) = &self.sealed {
            return config.clone();
        }
        self.finished = true;
        let config = self.settings.clone().seal();
        self.sealed = Some(config.clone());
        info!(units = self.loaded.len(), settings = config.len(), "Registration finished");
        config
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The settings store. Read-only; extensions change it through their
    /// globals and callbacks.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The sealed configuration, once [`finish`](Self::finish) ran.
    pub fn config(&self) -> Option<&Config> {
        self.sealed.as_ref()
    }

    pub fn registry_config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn constants(&self) -> &IndexMap<String, i64> {
        &self.constants
    }

    pub fn autoloader(&self) -> &Autoloader {
        &self.autoloader
    }

    pub fn autoloader_mut(&mut self) -> &mut Autoloader {
        &mut self.autoloader
    }

    fn invalidate_process_cache(&mut self) {
        self.vary_hash = None;
        self.lazy_cacheable = false;
        self.lazy_attributes.clear();
    }

    fn vary_hash(&mut self) -> Result<String> {
        if let Some(hash) = &self.vary_hash {
            return Ok(hash.clone());
        }
        let vary = Vary {
            registration: CACHE_VERSION,
            host: &self.config.host_version,
            abilities: &self.config.abilities,
            check_dev: self.config.check_dev,
            load_test_autoload: self.config.load_test_autoload,
            queue: &self.queue,
        };
        let hash = fingerprint_json(&vary)?;
        self.vary_hash = Some(hash.clone());
        Ok(hash)
    }

    fn cache_key(&mut self, kind: &str, attribute: Option<&str>) -> Result<String> {
        let hash = self.vary_hash()?;
        let mut key = format!("{}:registration-{kind}:{hash}", self.config.cache_keyspace);
        if let Some(attribute) = attribute {
            key.push(':');
            key.push_str(attribute);
        }
        Ok(key)
    }

    fn save_to_cache(&mut self, key: &str, info: &ExtractedInfo) -> Result<()> {
        if info.warnings && self.config.development_warnings {
            debug!(key, "Not caching registration data that raised warnings");
            return Ok(());
        }

        let mut main = info.clone();
        let lazy: Vec<(&str, Value)> = LAZY_ATTRIBUTES
            .iter()
            .filter_map(|name| main.attributes.shift_remove(*name).map(|value| (*name, value)))
            .collect();
        let ttl = self.config.cache_expiry();
        self.cache.set(key, serde_json::to_value(&main)?, ttl);

        // Lazy parts of a follow-up batch would only cover that batch
        if self.loaded.is_empty() {
            for (name, value) in lazy {
                let key = self.cache_key("lazy-attrib", Some(name))?;
                self.cache.set(&key, value, ttl);
            }
        }
        Ok(())
    }
}

/// Recursively merge an attribute into the registry's attributes.
fn merge_attribute(attributes: &mut Map<String, Value>, name: String, value: Value) {
    let merged = match attributes.shift_remove(&name) {
        Some(existing) => match (Assoc::from_value(existing), Assoc::from_value(value.clone())) {
            (Some(existing), Some(extra)) => existing.merge_recursive(extra).into_value(),
            _ => value,
        },
        None => value,
    };
    attributes.insert(name, merged);
}

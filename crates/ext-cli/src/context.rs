//! Shared setup for commands: configuration, cache and manifest discovery.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ext_fs::{DiskFs, NormalizedPath};
use ext_registry::{
    EXTENSION_MANIFEST, ExtensionRegistry, FileCache, RegistryConfig, SKIN_MANIFEST,
};
use tracing::debug;

use crate::error::{CliError, Result};

/// Everything a command needs to build a registry.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub config: RegistryConfig,
    pub no_cache: bool,
}

impl Session {
    /// Read the configuration file when one is given, else use defaults.
    pub fn new(config_path: Option<&Path>, no_cache: bool) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                debug!(path = %path.display(), "Loading registry config");
                RegistryConfig::load(&NormalizedPath::new(path))?
            }
            None => RegistryConfig::default(),
        };
        Ok(Self { config, no_cache })
    }

    /// An empty registry over the real filesystem.
    pub fn registry(&self) -> ExtensionRegistry {
        let registry = ExtensionRegistry::new(Arc::new(DiskFs::new()), self.config.clone());
        match (&self.config.cache_dir, self.no_cache) {
            (Some(dir), false) => registry.with_cache(Arc::new(FileCache::new(dir.clone()))),
            _ => registry,
        }
    }

    /// Queue every manifest found under `paths` and load them as one batch.
    pub fn load(&self, paths: &[PathBuf]) -> Result<ExtensionRegistry> {
        let manifests = collect_manifests(paths)?;
        let mut registry = self.registry();
        for manifest in manifests {
            registry.queue(manifest)?;
        }
        registry.load_from_queue()?;
        Ok(registry)
    }
}

/// Expand `paths` into manifest files.
///
/// A file is taken as is. A directory contributes its own `extension.json`
/// and `skin.json`, or failing that those of its immediate subdirectories.
pub fn collect_manifests(paths: &[PathBuf]) -> Result<Vec<NormalizedPath>> {
    let mut manifests: Vec<NormalizedPath> = Vec::new();
    let mut push = |path: PathBuf| {
        let path = NormalizedPath::new(path);
        if !manifests.contains(&path) {
            manifests.push(path);
        }
    };

    for path in paths {
        let path = dunce::canonicalize(path)
            .map_err(|e| CliError::user(format!("Cannot access {}: {e}", path.display())))?;
        if path.is_file() {
            push(path);
            continue;
        }

        let own = manifests_in(&path);
        if !own.is_empty() {
            own.into_iter().for_each(&mut push);
            continue;
        }

        let mut children: Vec<PathBuf> = std::fs::read_dir(&path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|child| child.is_dir())
            .collect();
        children.sort();
        let found: Vec<PathBuf> = children.iter().flat_map(|child| manifests_in(child)).collect();
        if found.is_empty() {
            return Err(CliError::user(format!(
                "No {EXTENSION_MANIFEST} or {SKIN_MANIFEST} found in {}",
                path.display()
            )));
        }
        found.into_iter().for_each(&mut push);
    }

    Ok(manifests)
}

fn manifests_in(dir: &Path) -> Vec<PathBuf> {
    [EXTENSION_MANIFEST, SKIN_MANIFEST]
        .into_iter()
        .map(|name| dir.join(name))
        .filter(|path| path.is_file())
        .collect()
}

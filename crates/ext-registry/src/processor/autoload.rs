use ext_fs::NormalizedPath;
use indexmap::IndexMap;
use serde_json::Value;

use super::{Processor, entries};
use crate::error::{Error, Result};
use crate::manifest::Manifest;

/// Composer bootstrap file, relative to the manifest directory.
pub const COMPOSER_AUTOLOADER: &str = "vendor/autoload.php";

fn anchored_map(manifest: &Manifest, key: &str, dir: &NormalizedPath) -> Result<IndexMap<String, NormalizedPath>> {
    let Some(value) = manifest.get(key) else {
        return Ok(IndexMap::new());
    };
    entries(value, key, manifest.path())?
        .into_iter()
        .map(|(name, target)| match target {
            Value::String(relative) => Ok((name, dir.join(relative))),
            _ => Err(Error::InvalidValue {
                key: format!("{key}.{name}"),
                path: manifest.path().clone(),
                reason: "expected a relative path".to_string(),
            }),
        })
        .collect()
}

fn add_absent(target: &mut IndexMap<String, NormalizedPath>, extra: IndexMap<String, NormalizedPath>) {
    for (key, path) in extra {
        target.entry(key).or_insert(path);
    }
}

impl Processor {
    pub(super) fn extract_autoload(&mut self, manifest: &Manifest, dir: &NormalizedPath) -> Result<()> {
        if manifest.get("load_composer_autoloader") == Some(&Value::Bool(true)) {
            let file = dir.join(COMPOSER_AUTOLOADER);
            if self.fs.is_file(&file) {
                self.autoload.files.push(file);
            }
        }

        add_absent(&mut self.autoload.classes, anchored_map(manifest, "AutoloadClasses", dir)?);
        add_absent(
            &mut self.autoload.namespaces,
            anchored_map(manifest, "AutoloadNamespaces", dir)?,
        );
        add_absent(
            &mut self.autoload_dev.classes,
            anchored_map(manifest, "TestAutoloadClasses", dir)?,
        );
        add_absent(
            &mut self.autoload_dev.namespaces,
            anchored_map(manifest, "TestAutoloadNamespaces", dir)?,
        );
        Ok(())
    }
}

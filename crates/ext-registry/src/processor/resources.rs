use ext_fs::NormalizedPath;
use serde_json::{Map, Value};

use super::{Processor, anchor, entries, slot};
use crate::assoc::update;
use crate::error::{Error, Result};
use crate::manifest::Manifest;

const MODULE_SETTINGS: [&str; 3] = ["ResourceModules", "ResourceModuleSkinStyles", "OOUIThemePaths"];

/// Anchor `localBasePath` at the manifest directory; an empty base path
/// means the directory itself.
fn anchor_base_path(dir: &NormalizedPath, data: &mut Map<String, Value>) {
    if let Some(Value::String(base)) = data.get("localBasePath") {
        let anchored = if base.is_empty() {
            Value::String(dir.to_string())
        } else {
            anchor(dir, base)
        };
        data.insert("localBasePath".to_string(), anchored);
    }
}

/// Strings of a value that is either one string or a list of strings.
fn string_list(value: &Value) -> Vec<&str> {
    match value {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        Value::Object(map) => map.values().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

impl Processor {
    pub(super) fn extract_messages(&mut self, manifest: &Manifest, dir: &NormalizedPath) -> Result<()> {
        let path = manifest.path();

        if let Some(files) = manifest.get("ExtensionMessagesFiles") {
            let files: Vec<(String, Value)> = entries(files, "ExtensionMessagesFiles", path)?
                .into_iter()
                .filter_map(|(key, file)| file.as_str().map(|file| (key, anchor(dir, file))))
                .collect();
            update(slot(&mut self.globals, "wgExtensionMessagesFiles"), |map| {
                for (key, file) in files {
                    if !map.contains_key(&key) {
                        map.insert(&key, file);
                    }
                }
            });
        }

        if let Some(dirs) = manifest.get("MessagesDirs") {
            let dirs: Vec<(String, Vec<Value>)> = entries(dirs, "MessagesDirs", path)?
                .into_iter()
                .map(|(key, files)| (key, string_list(files).into_iter().map(|f| anchor(dir, f)).collect()))
                .collect();
            update(slot(&mut self.globals, "wgMessagesDirs"), |map| {
                for (key, files) in dirs {
                    update(map.slot(&key), |list| files.into_iter().for_each(|f| list.push(f)));
                }
            });
        }
        Ok(())
    }

    pub(super) fn extract_resource_modules(
        &mut self,
        manifest: &Manifest,
        dir: &NormalizedPath,
        unit: &str,
    ) -> Result<()> {
        let path = manifest.path();
        let expect_object = |key: &str, value: &Value| -> Result<Map<String, Value>> {
            match value {
                Value::Object(map) => Ok(map.clone()),
                _ => Err(Error::ExpectedArray {
                    key: key.to_string(),
                    path: path.clone(),
                }),
            }
        };

        let defaults = match manifest.get("ResourceFileModulePaths") {
            Some(value) => {
                let mut defaults = expect_object("ResourceFileModulePaths", value)?;
                anchor_base_path(dir, &mut defaults);
                Some(defaults)
            }
            None => None,
        };

        for setting in MODULE_SETTINGS {
            let Some(modules) = manifest.get(setting) else {
                continue;
            };
            let mut prepared = Vec::new();
            for (name, data) in entries(modules, setting, path)? {
                let mut data = expect_object(&format!("{setting}.{name}"), data)?;
                anchor_base_path(dir, &mut data);
                if let Some(defaults) = &defaults {
                    for (key, value) in defaults {
                        data.entry(key.clone()).or_insert_with(|| value.clone());
                    }
                }
                prepared.push((name, Value::Object(data)));
            }
            update(slot(&mut self.attributes, setting), |map| {
                for (name, data) in prepared {
                    map.insert(&name, data);
                }
            });
        }

        if let Some(module) = manifest.get("QUnitTestModule") {
            let mut data = expect_object("QUnitTestModule", module)?;
            anchor_base_path(dir, &mut data);
            update(slot(&mut self.attributes, "QUnitTestModules"), |map| {
                map.insert(&format!("test.{unit}"), Value::Object(data))
            });
        }

        if let Some(module) = manifest.get("MessagePosterModule") {
            let data = expect_object("MessagePosterModule", module)?;
            let base_dir = match data.get("localBasePath").and_then(Value::as_str) {
                None | Some("") => dir.clone(),
                Some(base) => dir.join(base),
            };
            let scripts: Vec<Value> = data
                .get("scripts")
                .map(string_list)
                .unwrap_or_default()
                .into_iter()
                .map(|script| anchor(&base_dir, script))
                .collect();
            let dependencies: Vec<Value> = match data.get("dependencies") {
                Some(Value::Array(items)) => items.clone(),
                Some(other) => vec![other.clone()],
                None => Vec::new(),
            };
            update(slot(&mut self.attributes, "MessagePosterModule"), |poster| {
                update(poster.slot("scripts"), |list| scripts.into_iter().for_each(|s| list.push(s)));
                update(poster.slot("dependencies"), |list| {
                    dependencies.into_iter().for_each(|d| list.push(d))
                });
            });
        }
        Ok(())
    }

    pub(super) fn extract_service_wiring(&mut self, manifest: &Manifest, dir: &NormalizedPath) -> Result<()> {
        let Some(files) = manifest.get("ServiceWiringFiles") else {
            return Ok(());
        };
        let anchored: Vec<Value> = entries(files, "ServiceWiringFiles", manifest.path())?
            .into_iter()
            .filter_map(|(_, file)| file.as_str().map(|file| anchor(dir, file)))
            .collect();
        update(slot(&mut self.attributes, "ServiceWiringFiles"), |list| {
            anchored.into_iter().for_each(|file| list.push(file))
        });
        Ok(())
    }
}

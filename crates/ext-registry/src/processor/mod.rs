//! Manifest processing
//!
//! A [`Processor`] is a builder: [`Processor::extract_info`] is called once
//! per manifest of a batch and appends to the processor's accumulators, and
//! [`Processor::extracted_info`] consumes it into an [`ExtractedInfo`]
//! snapshot. Later manifests see what earlier ones contributed, which is
//! what makes duplicate names and duplicate config settings detectable.
//!
//! Extraction order per manifest: hooks, messages, namespaces, resource
//! modules, autoload, credits, callback, config, remaining keys and, for
//! schema 2, cross-unit attributes.

mod autoload;
mod hooks;
mod namespaces;
mod resources;

use std::sync::Arc;

use ext_fs::{Filesystem, NormalizedPath};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::assoc::{Assoc, is_array};
use crate::credits::Credit;
use crate::error::{Error, Result};
use crate::extracted::{AutoloadInfo, ExtractedInfo, GlobalValue};
use crate::manifest::Manifest;
use crate::merge::{MergeStrategy, builtin_strategy};

pub use hooks::HookCallback;

/// Prefix for config keys when a manifest declares none.
pub const DEFAULT_CONFIG_PREFIX: &str = "wg";

/// Top-level keys stored as `wg<Key>` globals with a recursive merge.
pub const GLOBAL_SETTINGS: &[&str] = &[
    "ActionFilteredLogs",
    "Actions",
    "AddGroups",
    "APIFormatModules",
    "APIListModules",
    "APIMetaModules",
    "APIModules",
    "APIPropModules",
    "AuthManagerAutoConfig",
    "AvailableRights",
    "CentralIdLookupProviders",
    "ChangeCredentialsBlacklist",
    "ConfigRegistry",
    "ContentHandlers",
    "DefaultUserOptions",
    "ExtensionEntryPointListFiles",
    "ExtensionFunctions",
    "FeedClasses",
    "FileExtensions",
    "FilterLogTypes",
    "GrantPermissionGroups",
    "GrantPermissions",
    "GroupPermissions",
    "GroupsAddToSelf",
    "GroupsRemoveFromSelf",
    "HiddenPrefs",
    "ImplicitGroups",
    "JobClasses",
    "LogActions",
    "LogActionsHandlers",
    "LogHeaders",
    "LogNames",
    "LogRestrictions",
    "LogTypes",
    "MediaHandlers",
    "PasswordPolicy",
    "RateLimits",
    "RawHtmlMessages",
    "ReauthenticateTime",
    "RecentChangesFlags",
    "RemoveCredentialsBlacklist",
    "RemoveGroups",
    "ResourceLoaderSources",
    "RevokePermissions",
    "SessionProviders",
    "SpecialPages",
];

/// Top-level keys a schema 2 manifest may contribute as attributes.
pub const CORE_ATTRIBUTES: &[&str] = &[
    "ParsoidModules",
    "RestRoutes",
    "SkinOOUIThemes",
    "SkinCodexThemes",
    "SearchMappings",
    "TrackingCategories",
    "LateJSConfigVarNames",
    "TempUserSerialProviders",
    "TempUserSerialMappings",
    "DatabaseVirtualDomains",
    "UserRequirementsConditions",
];

/// Keys that end up in the credit record.
pub const CREDIT_ATTRIBUTES: &[&str] = &[
    "type",
    "author",
    "description",
    "descriptionmsg",
    "license-name",
    "name",
    "namemsg",
    "url",
    "version",
];

/// Keys handled explicitly, never turned into schema 1 attributes.
pub const NOT_ATTRIBUTES: &[&str] = &[
    "callback",
    "config",
    "config_prefix",
    "load_composer_autoloader",
    "manifest_version",
    "namespaces",
    "requires",
    "dev-requires",
    "attributes",
    "AutoloadClasses",
    "AutoloadNamespaces",
    "TestAutoloadClasses",
    "TestAutoloadNamespaces",
    "ExtensionMessagesFiles",
    "ForeignResourcesDir",
    "Hooks",
    "HookHandlers",
    "DeprecatedHooks",
    "DomainEventSubscribers",
    "MessagePosterModule",
    "MessagesDirs",
    "OOUIThemePaths",
    "ParserTestFiles",
    "QUnitTestModule",
    "ResourceFileModulePaths",
    "ResourceModuleSkinStyles",
    "ResourceModules",
    "ServiceWiringFiles",
];

/// Accumulates extracted data across the manifests of one batch.
#[derive(Debug)]
pub struct Processor {
    fs: Arc<dyn Filesystem>,
    /// Constants the host already defines.
    defined: IndexMap<String, i64>,
    globals: Map<String, Value>,
    strategies: IndexMap<String, MergeStrategy>,
    defines: IndexMap<String, i64>,
    callbacks: IndexMap<String, String>,
    credits: IndexMap<String, Credit>,
    attributes: Map<String, Value>,
    /// Schema 2 `attributes` sections, keyed by target unit.
    ext_attributes: Map<String, Value>,
    autoload: AutoloadInfo,
    autoload_dev: AutoloadInfo,
}

impl Processor {
    pub fn new(fs: Arc<dyn Filesystem>) -> Self {
        Self {
            fs,
            defined: IndexMap::new(),
            globals: Map::new(),
            strategies: IndexMap::new(),
            defines: IndexMap::new(),
            callbacks: IndexMap::new(),
            credits: IndexMap::new(),
            attributes: Map::new(),
            ext_attributes: Map::new(),
            autoload: AutoloadInfo::default(),
            autoload_dev: AutoloadInfo::default(),
        }
    }

    /// Constants already defined by the host. A namespace whose constant
    /// is listed here keeps the host's id.
    pub fn with_defined_constants(mut self, defined: IndexMap<String, i64>) -> Self {
        self.defined = defined;
        self
    }

    /// Extract one manifest into the accumulators.
    pub fn extract_info(&mut self, manifest: &Manifest, version: u64) -> Result<()> {
        let unit = manifest.require_name()?.to_string();
        let dir = manifest.dir();
        debug!(unit = %unit, path = %manifest.path(), version, "Extracting manifest");

        self.extract_hooks(manifest, &unit)?;
        self.extract_messages(manifest, &dir)?;
        self.extract_namespaces(manifest)?;
        self.extract_resource_modules(manifest, &dir, &unit)?;
        self.extract_service_wiring(manifest, &dir)?;
        self.extract_autoload(manifest, &dir)?;
        self.extract_credits(manifest)?;
        self.extract_callback(manifest, &unit)?;
        self.extract_config(manifest, version, &dir, &unit)?;
        self.extract_remaining(manifest, version)?;
        if version >= 2 {
            self.extract_attributes(manifest)?;
        }
        Ok(())
    }

    /// Names of the units extracted so far.
    pub fn credits(&self) -> &IndexMap<String, Credit> {
        &self.credits
    }

    /// Consume the processor into a snapshot. Test-only autoload maps are
    /// included when `include_dev` is set.
    pub fn extracted_info(mut self, include_dev: bool) -> Result<ExtractedInfo> {
        let ext_attributes = std::mem::take(&mut self.ext_attributes);
        for (unit, attributes) in ext_attributes {
            // Attributes for units outside the batch are dropped
            let Some(credit) = self.credits.get(&unit) else {
                continue;
            };
            let path = credit.path.clone();
            for (name, value) in entries(&attributes, &unit, &path)? {
                store_recursive(&mut self.attributes, &format!("{unit}{name}"), value.clone(), &path)?;
            }
        }

        if include_dev {
            let dev = std::mem::take(&mut self.autoload_dev);
            self.autoload.absorb(dev);
        }

        let globals = self
            .globals
            .into_iter()
            .map(|(key, value)| {
                let merge_strategy =
                    builtin_strategy(&key).or_else(|| self.strategies.get(&key).copied());
                (key, GlobalValue { value, merge_strategy })
            })
            .collect();

        Ok(ExtractedInfo {
            globals,
            defines: self.defines,
            callbacks: self.callbacks,
            credits: self.credits,
            attributes: self.attributes,
            autoload: self.autoload,
            warnings: false,
        })
    }

    fn extract_credits(&mut self, manifest: &Manifest) -> Result<()> {
        let credit = Credit::from_manifest(manifest)?;
        if let Some(first) = self.credits.get(&credit.name) {
            return Err(Error::DuplicateName {
                name: credit.name.clone(),
                first: first.path.clone(),
                second: credit.path,
            });
        }
        self.credits.insert(credit.name.clone(), credit);
        Ok(())
    }

    fn extract_callback(&mut self, manifest: &Manifest, unit: &str) -> Result<()> {
        match manifest.get("callback") {
            None => Ok(()),
            Some(Value::String(callback)) => {
                self.callbacks.insert(unit.to_string(), callback.clone());
                Ok(())
            }
            Some(_) => Err(Error::InvalidValue {
                key: "callback".to_string(),
                path: manifest.path().clone(),
                reason: "callbacks are referenced by name".to_string(),
            }),
        }
    }

    fn extract_config(&mut self, manifest: &Manifest, version: u64, dir: &NormalizedPath, unit: &str) -> Result<()> {
        let Some(config) = manifest.get("config") else {
            return Ok(());
        };
        let Value::Object(config) = config else {
            return Err(Error::ExpectedArray {
                key: "config".to_string(),
                path: manifest.path().clone(),
            });
        };

        let mut prefix = manifest
            .get("config_prefix")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_CONFIG_PREFIX);
        if version == 1
            && let Some(custom) = config.get("_prefix").and_then(Value::as_str)
        {
            prefix = custom;
        }

        for (key, data) in config {
            if key.starts_with('@') || (version == 1 && key == "_prefix") {
                continue;
            }
            let global = format!("{prefix}{key}");

            if version == 1 {
                self.add_config_global(global, data.clone(), unit)?;
                continue;
            }

            let Some(mut value) = data.get("value").cloned() else {
                return Err(Error::MissingConfigValue {
                    key: key.clone(),
                    path: manifest.path().clone(),
                });
            };
            if data.get("path").and_then(Value::as_bool) == Some(true) {
                value = anchor_value(dir, value);
            }
            if let Some(tag) = data.get("merge_strategy") {
                let strategy = match tag {
                    Value::String(tag) => tag.parse::<MergeStrategy>()?,
                    other => {
                        return Err(Error::UnknownMergeStrategy {
                            tag: other.to_string(),
                        });
                    }
                };
                self.strategies.insert(global.clone(), strategy);
            }
            self.add_config_global(global, value, unit)?;
        }
        Ok(())
    }

    fn add_config_global(&mut self, key: String, value: Value, unit: &str) -> Result<()> {
        if self.globals.contains_key(&key) {
            return Err(Error::DuplicateSetting {
                key,
                unit: unit.to_string(),
            });
        }
        self.globals.insert(key, value);
        Ok(())
    }

    fn extract_remaining(&mut self, manifest: &Manifest, version: u64) -> Result<()> {
        let path = manifest.path();
        for (key, value) in manifest.body() {
            if GLOBAL_SETTINGS.contains(&key.as_str()) {
                store_recursive(&mut self.globals, &format!("wg{key}"), value.clone(), path)?;
                continue;
            }
            if key.starts_with('@') {
                continue;
            }
            if version >= 2 {
                if CORE_ATTRIBUTES.contains(&key.as_str()) {
                    store_shallow(&mut self.attributes, key, value.clone(), path)?;
                }
            } else if !NOT_ATTRIBUTES.contains(&key.as_str()) && !CREDIT_ATTRIBUTES.contains(&key.as_str()) {
                store_recursive(&mut self.attributes, key, value.clone(), path)?;
            }
        }
        Ok(())
    }

    fn extract_attributes(&mut self, manifest: &Manifest) -> Result<()> {
        let Some(attributes) = manifest.get("attributes") else {
            return Ok(());
        };
        let path = manifest.path();
        for (unit, value) in entries(attributes, "attributes", path)? {
            store_recursive(&mut self.ext_attributes, &unit, value.clone(), path)?;
        }
        Ok(())
    }
}

/// Key/value pairs of a list or object; lists yield their indices as keys.
fn entries<'a>(value: &'a Value, key: &str, path: &NormalizedPath) -> Result<Vec<(String, &'a Value)>> {
    match value {
        Value::Object(map) => Ok(map.iter().map(|(k, v)| (k.clone(), v)).collect()),
        Value::Array(items) => Ok(items.iter().enumerate().map(|(i, v)| (i.to_string(), v)).collect()),
        _ => Err(Error::ExpectedArray {
            key: key.to_string(),
            path: path.clone(),
        }),
    }
}

/// Mutable slot for `key`, created as an empty list when absent.
fn slot<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Value {
    map.entry(key).or_insert_with(|| Value::Array(Vec::new()))
}

fn anchor(dir: &NormalizedPath, relative: &str) -> Value {
    Value::String(dir.join(relative).into())
}

/// Anchor a string, or every string inside a list or object, at `dir`.
fn anchor_value(dir: &NormalizedPath, value: Value) -> Value {
    match value {
        Value::String(s) => anchor(dir, &s),
        Value::Array(items) => Value::Array(items.into_iter().map(|v| anchor_value(dir, v)).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, anchor_value(dir, v))).collect()),
        other => other,
    }
}

/// Store `value` under `name`, merging recursively with what is there.
fn store_recursive(target: &mut Map<String, Value>, name: &str, value: Value, path: &NormalizedPath) -> Result<()> {
    store(target, name, value, path, Assoc::merge_recursive)
}

/// Store `value` under `name`, merging shallowly with what is there.
fn store_shallow(target: &mut Map<String, Value>, name: &str, value: Value, path: &NormalizedPath) -> Result<()> {
    store(target, name, value, path, Assoc::merge)
}

fn store(
    target: &mut Map<String, Value>,
    name: &str,
    value: Value,
    path: &NormalizedPath,
    combine: fn(Assoc, Assoc) -> Assoc,
) -> Result<()> {
    if !is_array(&value) {
        return Err(Error::ExpectedArray {
            key: name.to_string(),
            path: path.clone(),
        });
    }
    let merged = match target.get_mut(name) {
        Some(existing) => {
            let base = Assoc::from_value(existing.take()).unwrap_or_default();
            let extra = Assoc::from_value(value).unwrap_or_default();
            combine(base, extra).into_value()
        }
        None => value,
    };
    target.insert(name.to_string(), merged);
    Ok(())
}

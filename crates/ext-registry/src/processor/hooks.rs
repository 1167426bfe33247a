use ext_fs::NormalizedPath;
use serde_json::{Map, Value};

use super::{Processor, entries, slot};
use crate::assoc::update;
use crate::error::{Error, Result};
use crate::manifest::Manifest;

/// One callback declared for a hook.
#[derive(Debug, Clone, PartialEq)]
pub enum HookCallback {
    /// A bare name: a handler reference when `HookHandlers` defines it,
    /// otherwise a legacy callable.
    Named(String),
    /// A descriptor object naming a handler, plus any other fields it
    /// carries (e.g. `deprecated`).
    Handler {
        handler: String,
        options: Map<String, Value>,
    },
    /// A legacy callable given as a list or object.
    Legacy(Value),
}

impl HookCallback {
    /// Every callback declared by one `Hooks` entry.
    pub fn parse(spec: &Value) -> Vec<HookCallback> {
        match spec {
            Value::String(name) => vec![HookCallback::Named(name.clone())],
            Value::Object(map) if map.contains_key("handler") => {
                Self::descriptor(map).into_iter().collect()
            }
            Value::Array(items) => items.iter().filter_map(Self::parse_entry).collect(),
            Value::Object(map) => map.values().filter_map(Self::parse_entry).collect(),
            _ => Vec::new(),
        }
    }

    fn parse_entry(item: &Value) -> Option<HookCallback> {
        match item {
            Value::String(name) => Some(HookCallback::Named(name.clone())),
            Value::Object(map) if map.contains_key("handler") => Self::descriptor(map),
            Value::Array(_) | Value::Object(_) => Some(HookCallback::Legacy(item.clone())),
            _ => None,
        }
    }

    fn descriptor(map: &Map<String, Value>) -> Option<HookCallback> {
        let Some(handler) = map.get("handler").and_then(Value::as_str) else {
            return Some(HookCallback::Legacy(Value::Object(map.clone())));
        };
        let options = map
            .iter()
            .filter(|(key, _)| key.as_str() != "handler")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Some(HookCallback::Handler {
            handler: handler.to_string(),
            options,
        })
    }
}

impl Processor {
    pub(super) fn extract_hooks(&mut self, manifest: &Manifest, unit: &str) -> Result<()> {
        let path = manifest.path();

        let mut handlers = Map::new();
        if let Some(definitions) = manifest.get("HookHandlers") {
            for (name, definition) in entries(definitions, "HookHandlers", path)? {
                let mut annotated = Map::new();
                annotated.insert("name".to_string(), Value::String(format!("{unit}-{name}")));
                if let Value::Object(fields) = definition {
                    for (key, value) in fields {
                        if key != "name" {
                            annotated.insert(key.clone(), value.clone());
                        }
                    }
                }
                handlers.insert(name, Value::Object(annotated));
            }
        }

        if let Some(hooks) = manifest.get("Hooks") {
            for (hook, spec) in entries(hooks, "Hooks", path)? {
                for callback in HookCallback::parse(spec) {
                    self.register_hook(&hook, callback, &handlers, path)?;
                }
            }
        }

        if let Some(deprecated) = manifest.get("DeprecatedHooks") {
            let mut additions = Vec::new();
            for (hook, info) in entries(deprecated, "DeprecatedHooks", path)? {
                let Value::Object(info) = info else {
                    return Err(Error::ExpectedArray {
                        key: format!("DeprecatedHooks.{hook}"),
                        path: path.clone(),
                    });
                };
                let mut info = info.clone();
                info.entry("component")
                    .or_insert_with(|| Value::String(unit.to_string()));
                additions.push((hook, Value::Object(info)));
            }
            update(slot(&mut self.attributes, "DeprecatedHooks"), |existing| {
                for (hook, info) in additions {
                    if !existing.contains_key(&hook) {
                        existing.insert(&hook, info);
                    }
                }
            });
        }
        Ok(())
    }

    fn register_hook(
        &mut self,
        hook: &str,
        callback: HookCallback,
        handlers: &Map<String, Value>,
        path: &NormalizedPath,
    ) -> Result<()> {
        match callback {
            HookCallback::Named(name) => match handlers.get(&name) {
                Some(definition) => self.push_handler(hook, definition.clone(), Map::new(), path),
                None => self.push_legacy(hook, Value::String(name)),
            },
            HookCallback::Handler { handler, options } => {
                let definition = handlers.get(&handler).ok_or_else(|| Error::MissingHookHandler {
                    hook: hook.to_string(),
                    path: path.clone(),
                })?;
                self.push_handler(hook, definition.clone(), options, path);
            }
            HookCallback::Legacy(callable) => self.push_legacy(hook, callable),
        }
        Ok(())
    }

    fn push_handler(&mut self, hook: &str, definition: Value, options: Map<String, Value>, path: &NormalizedPath) {
        let mut entry = Map::new();
        entry.insert("handler".to_string(), definition);
        for (key, value) in options {
            if key != "extensionPath" {
                entry.insert(key, value);
            }
        }
        entry.insert("extensionPath".to_string(), Value::String(path.to_string()));

        update(slot(&mut self.attributes, "Hooks"), |hooks| {
            update(hooks.slot(hook), |list| list.push(Value::Object(entry)))
        });
    }

    fn push_legacy(&mut self, hook: &str, callable: Value) {
        update(slot(&mut self.globals, "wgHooks"), |hooks| {
            update(hooks.slot(hook), |list| list.push(callable))
        });
    }
}

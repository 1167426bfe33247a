use serde_json::{Map, Value};

use super::{Processor, entries, slot};
use crate::assoc::update;
use crate::error::{Error, Result};
use crate::manifest::Manifest;

/// Truthiness of an optional flag: present, non-null and not false, zero
/// or empty.
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty() && s != "0",
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}

/// Present but falsy, e.g. `"movable": false`.
fn explicitly_off(value: Option<&Value>) -> bool {
    matches!(value, Some(v) if !v.is_null() && !truthy(Some(v)))
}

impl Processor {
    pub(super) fn extract_namespaces(&mut self, manifest: &Manifest) -> Result<()> {
        let Some(namespaces) = manifest.get("namespaces") else {
            return Ok(());
        };
        let path = manifest.path();
        let invalid = |reason: &str| Error::InvalidValue {
            key: "namespaces".to_string(),
            path: path.clone(),
            reason: reason.to_string(),
        };

        for (_, ns) in entries(namespaces, "namespaces", path)? {
            let Value::Object(ns) = ns else {
                return Err(invalid("each namespace must be an object"));
            };
            let constant = ns
                .get("constant")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid("namespace without a constant"))?;
            // A constant the host already defines keeps its id
            let id = match self.defined.get(constant) {
                Some(id) => *id,
                None => ns
                    .get("id")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| invalid(&format!("namespace {constant} without a numeric id")))?,
            };
            match self.defines.get(constant) {
                Some(existing) if *existing != id => {
                    return Err(Error::ConstantRedefined {
                        name: constant.to_string(),
                        existing: *existing,
                        new: id,
                    });
                }
                Some(_) => {}
                None => {
                    self.defines.insert(constant.to_string(), id);
                }
            }
            let key = id.to_string();

            if !truthy(ns.get("conditional")) {
                let name = ns
                    .get("name")
                    .cloned()
                    .ok_or_else(|| invalid(&format!("namespace {constant} without a name")))?;
                update(slot(&mut self.attributes, "ExtensionNamespaces"), |map| {
                    map.insert(&key, name)
                });
            }
            if explicitly_off(ns.get("movable")) {
                update(slot(&mut self.attributes, "ImmovableNamespaces"), |list| {
                    list.push(Value::from(id))
                });
            }
            self.set_namespace_global(ns, "gender", "wgExtraGenderNamespaces", &key);
            if truthy(ns.get("subpages")) {
                update(slot(&mut self.globals, "wgNamespacesWithSubpages"), |map| {
                    map.insert(&key, Value::Bool(true))
                });
            }
            if truthy(ns.get("content")) {
                update(slot(&mut self.globals, "wgContentNamespaces"), |list| {
                    list.push(Value::from(id))
                });
            }
            self.set_namespace_global(ns, "defaultcontentmodel", "wgNamespaceContentModels", &key);
            self.set_namespace_global(ns, "protection", "wgNamespaceProtection", &key);
            self.set_namespace_global(ns, "capitallinkoverride", "wgCapitalLinkOverrides", &key);
            if explicitly_off(ns.get("includable")) {
                update(slot(&mut self.globals, "wgNonincludableNamespaces"), |list| {
                    list.push(Value::from(id))
                });
            }
        }
        Ok(())
    }

    /// `global[id] = ns[field]` when the field is present.
    fn set_namespace_global(&mut self, ns: &Map<String, Value>, field: &str, global: &str, id: &str) {
        if let Some(value) = ns.get(field).filter(|v| !v.is_null()) {
            let value = value.clone();
            update(slot(&mut self.globals, global), |map| map.insert(id, value));
        }
    }
}

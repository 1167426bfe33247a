//! [`ManifestBuilder`] for extension and skin manifests.

use serde_json::{Map, Value, json};

/// Builds a manifest body one key at a time.
///
/// # Example
///
/// ```rust
/// use ext_test_utils::ManifestBuilder;
/// use serde_json::json;
///
/// let body = ManifestBuilder::new("Foo")
///     .version("1.0.0")
///     .config("Enable", json!(true))
///     .build();
/// assert_eq!(body["manifest_version"], 2);
/// assert_eq!(body["config"]["Enable"]["value"], true);
/// ```
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    body: Map<String, Value>,
}

impl ManifestBuilder {
    /// A schema 2 manifest named `name`.
    pub fn new(name: &str) -> Self {
        let mut body = Map::new();
        body.insert("name".to_string(), json!(name));
        body.insert("manifest_version".to_string(), json!(2));
        Self { body }
    }

    /// A manifest without `manifest_version`, which the registry treats as
    /// deprecated schema 1.
    pub fn legacy(name: &str) -> Self {
        let mut builder = Self::new(name);
        builder.body.remove("manifest_version");
        builder
    }

    pub fn manifest_version(self, version: u64) -> Self {
        self.set("manifest_version", json!(version))
    }

    pub fn version(self, version: &str) -> Self {
        self.set("version", json!(version))
    }

    /// Add `requires.<kind>` (or `requires.MediaWiki` for the host).
    pub fn requires(mut self, kind: &str, requirement: Value) -> Self {
        let requires = self
            .body
            .entry("requires")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(requires) = requires {
            requires.insert(kind.to_string(), requirement);
        }
        self
    }

    /// Add a schema 2 config entry `{ "value": value }`.
    pub fn config(self, key: &str, value: Value) -> Self {
        self.config_entry(key, json!({ "value": value }))
    }

    /// Add a config entry verbatim.
    pub fn config_entry(mut self, key: &str, entry: Value) -> Self {
        let config = self
            .body
            .entry("config")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(config) = config {
            config.insert(key.to_string(), entry);
        }
        self
    }

    /// Set any top-level key.
    pub fn set(mut self, key: &str, value: Value) -> Self {
        self.body.insert(key.to_string(), value);
        self
    }

    pub fn build(self) -> Value {
        Value::Object(self.body)
    }

    /// The manifest as JSON text.
    pub fn to_json(&self) -> String {
        Value::Object(self.body.clone()).to_string()
    }
}

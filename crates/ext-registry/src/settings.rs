//! Host settings store
//!
//! [`Settings`] is the mutable key/value store the registry merges extension
//! globals into. When registration finishes it is sealed into an immutable
//! [`Config`] that can be shared freely.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::merge::MergeStrategy;

/// Mutable settings, keyed by fully prefixed names such as `wgFoo`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    values: Map<String, Value>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Set a value, replacing whatever was there.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Combine `value` into `key` using `strategy`. Returns whether the
    /// stored value changed.
    pub fn apply(&mut self, key: &str, value: Value, strategy: MergeStrategy) -> bool {
        match strategy.combine(self.values.get(key), value) {
            Some(merged) => {
                self.values.insert(key.to_string(), merged);
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Freeze into a shareable read-only [`Config`].
    pub fn seal(self) -> Config {
        Config {
            values: Arc::new(self.values),
        }
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Settings {
    fn from_iter<T: IntoIterator<Item = (K, Value)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Read-only settings produced by finishing registration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    values: Arc<Map<String, Value>>,
}

impl Config {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for Config {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.values.serialize(serializer)
    }
}

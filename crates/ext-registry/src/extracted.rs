use ext_fs::NormalizedPath;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::credits::Credit;
use crate::merge::MergeStrategy;

/// A global setting contributed by a batch, with how to merge it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalValue {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_strategy: Option<MergeStrategy>,
}

impl GlobalValue {
    pub fn strategy(&self) -> MergeStrategy {
        self.merge_strategy.unwrap_or_default()
    }
}

/// Autoload data of a batch. Classes and namespaces are first-wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoloadInfo {
    #[serde(default)]
    pub files: Vec<NormalizedPath>,
    #[serde(default)]
    pub classes: IndexMap<String, NormalizedPath>,
    #[serde(default)]
    pub namespaces: IndexMap<String, NormalizedPath>,
}

impl AutoloadInfo {
    /// Add entries of `other` whose keys are not present yet.
    pub fn absorb(&mut self, other: AutoloadInfo) {
        self.files.extend(other.files);
        for (class, path) in other.classes {
            self.classes.entry(class).or_insert(path);
        }
        for (prefix, dir) in other.namespaces {
            self.namespaces.entry(prefix).or_insert(dir);
        }
    }
}

/// Everything a batch of manifests contributes. This is what gets cached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedInfo {
    pub globals: IndexMap<String, GlobalValue>,
    pub defines: IndexMap<String, i64>,
    /// Unit name to callback name.
    pub callbacks: IndexMap<String, String>,
    pub credits: IndexMap<String, Credit>,
    pub attributes: Map<String, Value>,
    pub autoload: AutoloadInfo,
    /// Whether a deprecation warning was raised while reading the batch.
    #[serde(default)]
    pub warnings: bool,
}

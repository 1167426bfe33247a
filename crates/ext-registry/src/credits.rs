//! Credit records: the identity and metadata of a loaded unit.

use ext_fs::NormalizedPath;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::manifest::Manifest;

/// Unit type used when a manifest does not declare one.
pub const DEFAULT_TYPE: &str = "other";

/// Name, version and attribution of one extension or skin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credit {
    /// Manifest the unit was loaded from.
    pub path: NormalizedPath,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// A single author or a list of authors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptionmsg: Option<String>,
    #[serde(rename = "license-name", default, skip_serializing_if = "Option::is_none")]
    pub license_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namemsg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Credit {
    /// An unnamed record of type `other` for `path`.
    pub fn new(path: impl Into<NormalizedPath>) -> Self {
        Self {
            path: path.into(),
            kind: DEFAULT_TYPE.to_string(),
            name: String::new(),
            version: None,
            author: None,
            description: None,
            descriptionmsg: None,
            license_name: None,
            namemsg: None,
            url: None,
        }
    }

    /// Collect the credit attributes of `manifest`.
    pub fn from_manifest(manifest: &Manifest) -> Result<Self> {
        let text = |key: &str| -> Result<Option<String>> {
            match manifest.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) => Ok(Some(s.clone())),
                Some(_) => Err(Error::InvalidValue {
                    key: key.to_string(),
                    path: manifest.path().clone(),
                    reason: "expected a string".to_string(),
                }),
            }
        };

        Ok(Self {
            kind: text("type")?.unwrap_or_else(|| DEFAULT_TYPE.to_string()),
            name: manifest.require_name()?.to_string(),
            version: manifest.version(),
            author: manifest.get("author").cloned(),
            description: text("description")?,
            descriptionmsg: text("descriptionmsg")?,
            license_name: text("license-name")?,
            namemsg: text("namemsg")?,
            url: text("url")?,
            ..Self::new(manifest.path().clone())
        })
    }

    /// Authors as a flat list of strings.
    pub fn authors(&self) -> Vec<String> {
        match &self.author {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }
}

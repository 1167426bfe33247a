//! Manifest reading for `extension.json` and `skin.json` files.
//!
//! A manifest declares one extension or skin: its credits, requirements,
//! hooks, autoload maps, configuration and attributes. Manifests are parsed
//! once into a JSON object and never modified afterwards.
//!
//! # Example
//!
//! ```json
//! {
//!     "name": "Example",
//!     "version": "1.2.0",
//!     "manifest_version": 2,
//!     "requires": { "MediaWiki": ">= 1.40" },
//!     "AutoloadNamespaces": { "Example\\": "src/" },
//!     "config": { "ExampleEnable": { "value": true } }
//! }
//! ```

use ext_fs::{Filesystem, NormalizedPath};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::requirements::Requirements;

/// Newest manifest schema understood by the processor.
pub const MANIFEST_VERSION: u64 = 2;

/// Oldest manifest schema still accepted.
pub const OLDEST_MANIFEST_VERSION: u64 = 1;

/// A parsed manifest together with the path it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    path: NormalizedPath,
    body: Map<String, Value>,
}

impl Manifest {
    /// Parse manifest JSON. The top level must be an object.
    pub fn parse(path: impl Into<NormalizedPath>, content: &str) -> Result<Self> {
        let path = path.into();
        let value: Value = serde_json::from_str(content).map_err(|e| Error::InvalidManifest {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        match value {
            Value::Object(body) => Ok(Self { path, body }),
            _ => Err(Error::InvalidManifest {
                path,
                reason: "top level is not an object".to_string(),
            }),
        }
    }

    /// Read and parse the manifest at `path`.
    pub fn read(fs: &dyn Filesystem, path: &NormalizedPath) -> Result<Self> {
        let content = fs.read_text(path).map_err(|source| Error::UnreadableManifest {
            path: path.clone(),
            source,
        })?;
        Self::parse(path.clone(), &content)
    }

    pub fn path(&self) -> &NormalizedPath {
        &self.path
    }

    /// Directory relative manifest paths are anchored at.
    pub fn dir(&self) -> NormalizedPath {
        self.path.dirname()
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// The unit name, if declared as a string.
    pub fn name(&self) -> Option<&str> {
        self.body.get("name").and_then(Value::as_str)
    }

    /// The unit name, or an error naming the manifest.
    pub fn require_name(&self) -> Result<&str> {
        self.name().ok_or_else(|| Error::MissingName {
            path: self.path.clone(),
        })
    }

    /// The declared version. Numbers are accepted and rendered as text.
    pub fn version(&self) -> Option<String> {
        match self.body.get("version")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// The declared schema version, `None` when the key is absent.
    pub fn manifest_version(&self) -> Result<Option<u64>> {
        let Some(raw) = self.body.get("manifest_version") else {
            return Ok(None);
        };
        match raw.as_u64() {
            Some(v) if (OLDEST_MANIFEST_VERSION..=MANIFEST_VERSION).contains(&v) => Ok(Some(v)),
            _ => Err(Error::UnsupportedManifestVersion {
                path: self.path.clone(),
                version: raw.to_string(),
            }),
        }
    }

    /// Requirements from `requires`, with `dev-requires` folded in when
    /// `include_dev` is set.
    pub fn requirements(&self, include_dev: bool) -> Result<Requirements> {
        let unit = self.name().unwrap_or(self.path.as_str());
        let mut requirements = match self.body.get("requires") {
            Some(value) => Requirements::from_value(unit, value)?,
            None => Requirements::default(),
        };
        if include_dev && let Some(value) = self.body.get("dev-requires") {
            requirements.merge_dev(Requirements::from_value(unit, value)?);
        }
        Ok(requirements)
    }
}

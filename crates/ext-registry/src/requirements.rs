//! Declared requirements of a single unit.
//!
//! ```json
//! "requires": {
//!     "MediaWiki": ">= 1.40",
//!     "platform": { "php": ">= 8.1", "ext-curl": "*", "ability-shell": true },
//!     "extensions": { "Echo": "*" },
//!     "skins": { "Vector": ">= 1.0" }
//! }
//! ```

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Requirement key naming the host application.
pub const CORE_REQUIREMENT: &str = "MediaWiki";

const PLATFORM_RUNTIME: &str = "php";
const PLATFORM_EXTENSION_PREFIX: &str = "ext-";
const PLATFORM_ABILITY_PREFIX: &str = "ability-";

/// Everything a unit's `requires` (and optionally `dev-requires`) declares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Requirements {
    /// Constraint on the host version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core: Option<String>,
    /// Constraint on the runtime version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    /// Runtime extensions that must be present.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub runtime_extensions: Vec<String>,
    /// Abilities that must be present (`true`) or absent (`false`).
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub abilities: IndexMap<String, bool>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub extensions: IndexMap<String, String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub skins: IndexMap<String, String>,
}

impl Requirements {
    /// Parse a `requires` object declared by `unit`.
    pub fn from_value(unit: &str, value: &Value) -> Result<Self> {
        let Value::Object(sections) = value else {
            return Err(invalid(unit, "requires must be an object"));
        };

        let mut requirements = Self::default();
        for (kind, section) in sections {
            match kind.as_str() {
                CORE_REQUIREMENT => {
                    requirements.core = Some(constraint(unit, kind, section)?);
                }
                "platform" => requirements.parse_platform(unit, section)?,
                "extensions" => requirements.extensions = dependency_map(unit, kind, section)?,
                "skins" => requirements.skins = dependency_map(unit, kind, section)?,
                other => {
                    return Err(Error::UnknownDependencyType {
                        unit: unit.to_string(),
                        kind: other.to_string(),
                    });
                }
            }
        }
        Ok(requirements)
    }

    fn parse_platform(&mut self, unit: &str, section: &Value) -> Result<()> {
        let Value::Object(entries) = section else {
            return Err(invalid(unit, "platform requirements must be an object"));
        };

        for (name, value) in entries {
            if name == PLATFORM_RUNTIME {
                self.runtime = Some(constraint(unit, name, value)?);
            } else if let Some(extension) = name.strip_prefix(PLATFORM_EXTENSION_PREFIX) {
                if value.as_str() != Some("*") {
                    return Err(Error::PlatformExtensionConstraint {
                        unit: unit.to_string(),
                    });
                }
                self.runtime_extensions.push(extension.to_string());
            } else if let Some(ability) = name.strip_prefix(PLATFORM_ABILITY_PREFIX) {
                let Some(required) = value.as_bool() else {
                    return Err(Error::NonBooleanAbility {
                        unit: unit.to_string(),
                    });
                };
                self.abilities.insert(ability.to_string(), required);
            } else {
                return Err(Error::UnknownDependencyType {
                    unit: unit.to_string(),
                    kind: name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Fold development-only requirements in. Constraints on the same
    /// target are joined so both must hold.
    pub fn merge_dev(&mut self, dev: Requirements) {
        join_optional(&mut self.core, dev.core);
        join_optional(&mut self.runtime, dev.runtime);
        for extension in dev.runtime_extensions {
            if !self.runtime_extensions.contains(&extension) {
                self.runtime_extensions.push(extension);
            }
        }
        self.abilities.extend(dev.abilities);
        join_maps(&mut self.extensions, dev.extensions);
        join_maps(&mut self.skins, dev.skins);
    }

    pub fn is_empty(&self) -> bool {
        self.core.is_none()
            && self.runtime.is_none()
            && self.runtime_extensions.is_empty()
            && self.abilities.is_empty()
            && self.extensions.is_empty()
            && self.skins.is_empty()
    }
}

fn invalid(unit: &str, reason: &str) -> Error {
    Error::InvalidRequirements {
        unit: unit.to_string(),
        reason: reason.to_string(),
    }
}

fn constraint(unit: &str, key: &str, value: &Value) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(unit, &format!("constraint for {key} must be a string")))
}

fn dependency_map(unit: &str, kind: &str, section: &Value) -> Result<IndexMap<String, String>> {
    let Value::Object(entries) = section else {
        return Err(invalid(unit, &format!("{kind} requirements must be an object")));
    };
    entries
        .iter()
        .map(|(name, value)| Ok((name.clone(), constraint(unit, name, value)?)))
        .collect()
}

fn join_optional(target: &mut Option<String>, extra: Option<String>) {
    if let Some(extra) = extra {
        *target = Some(match target.take() {
            Some(existing) => conjoin(&existing, &extra),
            None => extra,
        });
    }
}

fn join_maps(target: &mut IndexMap<String, String>, extra: IndexMap<String, String>) {
    for (name, constraint) in extra {
        let slot = target.entry(name).or_default();
        *slot = if slot.is_empty() {
            constraint
        } else {
            conjoin(slot, &constraint)
        };
    }
}

/// Both constraints must hold. `||` binds looser than the implicit AND, so
/// every alternative of one side is paired with every alternative of the other.
fn conjoin(left: &str, right: &str) -> String {
    let alternatives = |raw: &str| -> Vec<String> { raw.split("||").map(|alt| alt.trim().to_string()).collect() };
    let right = alternatives(right);
    alternatives(left)
        .iter()
        .flat_map(|l| right.iter().map(move |r| format!("{l} {r}")))
        .collect::<Vec<_>>()
        .join(" || ")
}

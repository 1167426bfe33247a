//! Requirement checking against the host, the platform and loaded units.
//!
//! [`VersionChecker::check`] walks every unit's [`Requirements`] and
//! collects all unmet ones as [`Violation`]s, so a failing batch reports
//! every problem at once.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use indexmap::IndexMap;
use tracing::debug;

use crate::credits::Credit;
use crate::error::Result;
use crate::requirements::Requirements;
use crate::version::{VersionConstraint, parse_version};

/// Whether a dependency is an extension or a skin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Extension,
    Skin,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyKind::Extension => f.write_str("extension"),
            DependencyKind::Skin => f.write_str("skin"),
        }
    }
}

/// One unmet requirement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error(
        "{unit} is not compatible with the current MediaWiki core (version {version}), it requires: {constraint}."
    )]
    IncompatibleCore {
        unit: String,
        version: String,
        constraint: String,
    },

    #[error("{unit} is not compatible with the current PHP version ({version}), it requires: {constraint}.")]
    IncompatiblePlatform {
        unit: String,
        version: String,
        constraint: String,
    },

    #[error("{unit} requires {extension} PHP extension to be installed.")]
    MissingPlatformExtension { unit: String, extension: String },

    #[error("{unit} requires \"{ability}\" ability{}", detail_suffix(.detail))]
    MissingAbility {
        unit: String,
        ability: String,
        detail: Option<String>,
    },

    #[error("{unit} requires {dependency} to be installed.")]
    MissingDependency {
        unit: String,
        kind: DependencyKind,
        dependency: String,
    },

    #[error("{dependency} does not expose its version, but {unit} requires: {constraint}.")]
    UnversionedDependency {
        unit: String,
        kind: DependencyKind,
        dependency: String,
        constraint: String,
    },

    #[error("{dependency} does not have a valid version string.")]
    InvalidDependencyVersion {
        unit: String,
        kind: DependencyKind,
        dependency: String,
    },

    #[error(
        "{unit} is not compatible with the current installed version of {dependency} ({installed}), it requires: {constraint}."
    )]
    IncompatibleDependency {
        unit: String,
        kind: DependencyKind,
        dependency: String,
        installed: String,
        constraint: String,
    },
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail.as_ref().map(|d| format!(": {d}")).unwrap_or_default()
}

impl Violation {
    /// Name of the unit whose requirement is unmet.
    pub fn unit(&self) -> &str {
        match self {
            Violation::IncompatibleCore { unit, .. }
            | Violation::IncompatiblePlatform { unit, .. }
            | Violation::MissingPlatformExtension { unit, .. }
            | Violation::MissingAbility { unit, .. }
            | Violation::MissingDependency { unit, .. }
            | Violation::UnversionedDependency { unit, .. }
            | Violation::InvalidDependencyVersion { unit, .. }
            | Violation::IncompatibleDependency { unit, .. } => unit,
        }
    }
}

/// Checks requirements against a fixed environment.
#[derive(Debug, Clone, Default)]
pub struct VersionChecker {
    core_version: String,
    runtime_version: Option<String>,
    runtime_extensions: BTreeSet<String>,
    abilities: BTreeMap<String, bool>,
    ability_errors: BTreeMap<String, String>,
    loaded: IndexMap<String, Option<String>>,
}

impl VersionChecker {
    pub fn new(core_version: impl Into<String>) -> Self {
        Self {
            core_version: core_version.into(),
            ..Self::default()
        }
    }

    pub fn with_runtime_version(mut self, version: Option<String>) -> Self {
        self.runtime_version = version;
        self
    }

    pub fn with_runtime_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.runtime_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_abilities(mut self, abilities: BTreeMap<String, bool>) -> Self {
        self.abilities = abilities;
        self
    }

    /// Custom messages shown when a required ability is unavailable.
    pub fn with_ability_errors(mut self, errors: BTreeMap<String, String>) -> Self {
        self.ability_errors = errors;
        self
    }

    /// Units dependencies may be satisfied by.
    pub fn with_loaded<'a, I>(mut self, credits: I) -> Self
    where
        I: IntoIterator<Item = &'a Credit>,
    {
        self.loaded.extend(
            credits
                .into_iter()
                .map(|credit| (credit.name.clone(), credit.version.clone())),
        );
        self
    }

    /// Check every unit's requirements. Returns all violations found;
    /// malformed constraints are errors.
    pub fn check(&self, requirements: &IndexMap<String, Requirements>) -> Result<Vec<Violation>> {
        let mut violations = Vec::new();
        for (unit, requires) in requirements {
            debug!(unit = %unit, "Checking requirements");
            self.check_core(unit, requires, &mut violations)?;
            self.check_platform(unit, requires, &mut violations)?;
            for (dependency, constraint) in &requires.extensions {
                self.check_dependency(unit, DependencyKind::Extension, dependency, constraint, &mut violations)?;
            }
            for (dependency, constraint) in &requires.skins {
                self.check_dependency(unit, DependencyKind::Skin, dependency, constraint, &mut violations)?;
            }
        }
        Ok(violations)
    }

    fn check_core(&self, unit: &str, requires: &Requirements, out: &mut Vec<Violation>) -> Result<()> {
        let Some(raw) = &requires.core else {
            return Ok(());
        };
        let constraint = VersionConstraint::parse(raw)?;
        let version = parse_version(&self.core_version)?;
        if !constraint.satisfies_version(&version) {
            out.push(Violation::IncompatibleCore {
                unit: unit.to_string(),
                version: self.core_version.clone(),
                constraint: raw.clone(),
            });
        }
        Ok(())
    }

    fn check_platform(&self, unit: &str, requires: &Requirements, out: &mut Vec<Violation>) -> Result<()> {
        if let Some(raw) = &requires.runtime {
            let constraint = VersionConstraint::parse(raw)?;
            let satisfied = self
                .runtime_version
                .as_deref()
                .is_some_and(|version| constraint.satisfies(version));
            if !satisfied {
                out.push(Violation::IncompatiblePlatform {
                    unit: unit.to_string(),
                    version: self.runtime_version.clone().unwrap_or_else(|| "unknown".to_string()),
                    constraint: raw.clone(),
                });
            }
        }

        for extension in &requires.runtime_extensions {
            if !self.runtime_extensions.contains(extension) {
                out.push(Violation::MissingPlatformExtension {
                    unit: unit.to_string(),
                    extension: extension.clone(),
                });
            }
        }

        for (ability, required) in &requires.abilities {
            let available = self.abilities.get(ability).copied().unwrap_or(false);
            if *required && !available {
                out.push(Violation::MissingAbility {
                    unit: unit.to_string(),
                    ability: ability.clone(),
                    detail: self.ability_errors.get(ability).cloned(),
                });
            }
        }
        Ok(())
    }

    fn check_dependency(
        &self,
        unit: &str,
        kind: DependencyKind,
        dependency: &str,
        raw: &str,
        out: &mut Vec<Violation>,
    ) -> Result<()> {
        let Some(installed) = self.loaded.get(dependency) else {
            out.push(Violation::MissingDependency {
                unit: unit.to_string(),
                kind,
                dependency: dependency.to_string(),
            });
            return Ok(());
        };

        let constraint = VersionConstraint::parse(raw)?;
        if constraint.is_any() {
            return Ok(());
        }

        let Some(installed) = installed else {
            out.push(Violation::UnversionedDependency {
                unit: unit.to_string(),
                kind,
                dependency: dependency.to_string(),
                constraint: raw.to_string(),
            });
            return Ok(());
        };

        match parse_version(installed) {
            Err(_) => out.push(Violation::InvalidDependencyVersion {
                unit: unit.to_string(),
                kind,
                dependency: dependency.to_string(),
            }),
            Ok(version) if !constraint.satisfies_version(&version) => {
                out.push(Violation::IncompatibleDependency {
                    unit: unit.to_string(),
                    kind,
                    dependency: dependency.to_string(),
                    installed: installed.clone(),
                    constraint: raw.to_string(),
                });
            }
            Ok(_) => {}
        }
        Ok(())
    }
}

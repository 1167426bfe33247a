use ext_fs::NormalizedPath;

use crate::checker::Violation;

/// Errors that can occur while reading, processing or registering
/// extensions and skins.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A queued manifest could not be read.
    #[error("Unable to read {path}, does it exist?")]
    UnreadableManifest {
        path: NormalizedPath,
        #[source]
        source: ext_fs::Error,
    },

    /// A queued manifest is not a JSON object.
    #[error("{path} is not a valid JSON file: {reason}")]
    InvalidManifest { path: NormalizedPath, reason: String },

    /// `manifest_version` is outside the supported range.
    #[error("{path}: unsupported manifest_version: {version}")]
    UnsupportedManifestVersion { path: NormalizedPath, version: String },

    /// The manifest has no usable `name`.
    #[error("{path} does not declare a name")]
    MissingName { path: NormalizedPath },

    /// Two manifests declared the same name.
    #[error("It was attempted to load {name} twice, from {first} and {second}.")]
    DuplicateName {
        name: String,
        first: NormalizedPath,
        second: NormalizedPath,
    },

    /// A non-attribute, non-credit key in a v1 manifest or a whitelisted
    /// global was set twice within one batch.
    #[error(
        "The configuration setting '{key}' was already set by core or another extension, and cannot be set again by {unit}."
    )]
    DuplicateSetting { key: String, unit: String },

    /// A value that must be a list or map was a scalar.
    #[error("The value for '{key}' should be an array (from {path})")]
    ExpectedArray { key: String, path: NormalizedPath },

    /// A v2 `config` entry lacks its `value`.
    #[error("Missing value for config {key} in {path}")]
    MissingConfigValue { key: String, path: NormalizedPath },

    /// A `merge_strategy` tag is not one of the known strategies.
    #[error("Unknown merge strategy '{tag}'")]
    UnknownMergeStrategy { tag: String },

    /// A hook references a handler name absent from `HookHandlers`.
    #[error("Missing handler definition for {hook} in HookHandlers attribute in {path}")]
    MissingHookHandler { hook: String, path: NormalizedPath },

    /// A manifest field has the wrong shape.
    #[error("Invalid value for '{key}' in {path}: {reason}")]
    InvalidValue {
        key: String,
        path: NormalizedPath,
        reason: String,
    },

    /// A constant was already defined with a different value.
    #[error("{name} cannot be re-defined with {new} it has already been set with {existing}")]
    ConstantRedefined { name: String, existing: i64, new: i64 },

    /// A manifest `callback` names nothing in the callback table.
    #[error("callback '{callback}' is not callable")]
    UnknownCallback { callback: String },

    /// A registration callback reported failure.
    #[error("registration callback for {unit} failed: {message}")]
    CallbackFailed { unit: String, message: String },

    /// Manifests were queued after registration finished.
    #[error("The following paths tried to load late: {}", join_paths(.paths))]
    LateRegistration { paths: Vec<NormalizedPath> },

    /// A version constraint was checked against a unit without a version.
    #[error("{name} does not expose its version, but an extension or a skin requires: {constraint}.")]
    UnversionedDependency { name: String, constraint: String },

    /// A `requires` section has the wrong shape.
    #[error("Invalid requirements in {unit}: {reason}")]
    InvalidRequirements { unit: String, reason: String },

    /// A `requires` section names an unknown dependency type.
    #[error("Dependency type {kind} unknown in {unit}")]
    UnknownDependencyType { unit: String, kind: String },

    /// A platform extension requirement carries a real version constraint.
    #[error("Version constraints for PHP extensions are not supported in {unit}")]
    PlatformExtensionConstraint { unit: String },

    /// An ability requirement is not a boolean.
    #[error("Only booleans are allowed to indicate the presence of abilities in {unit}")]
    NonBooleanAbility { unit: String },

    /// Requirements of the batch are not met.
    #[error("{}", join_violations(.violations))]
    Incompatible { violations: Vec<Violation> },

    /// A version constraint string could not be parsed.
    #[error("invalid version constraint '{constraint}': {reason}")]
    VersionConstraintParse { constraint: String, reason: String },

    /// A version string could not be parsed.
    #[error("invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    /// The manifest to queue does not exist.
    #[error("Unable to queue {path}: {source}")]
    MissingExtension {
        path: NormalizedPath,
        #[source]
        source: ext_fs::Error,
    },

    #[error(transparent)]
    Fs(#[from] ext_fs::Error),

    #[error(transparent)]
    Autoload(#[from] ext_autoload::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn join_paths(paths: &[NormalizedPath]) -> String {
    paths
        .iter()
        .map(NormalizedPath::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T> = std::result::Result<T, Error>;

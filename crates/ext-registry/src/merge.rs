//! Merge strategies for combining extension globals with existing settings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assoc::{Assoc, is_array, is_empty_array};
use crate::error::Error;

/// How an extension-provided value combines with an existing setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MergeStrategy {
    /// Only set the value when the key is absent.
    #[serde(rename = "provide_default")]
    ProvideDefault,
    /// New entries first; new wins on string-key collisions.
    #[default]
    #[serde(rename = "array_merge")]
    ArrayMerge,
    #[serde(rename = "array_merge_recursive")]
    ArrayMergeRecursive,
    /// Existing values replace the new ones key by key, recursively.
    #[serde(rename = "array_replace_recursive")]
    ArrayReplaceRecursive,
    /// Union; existing keys win.
    #[serde(rename = "array_plus")]
    ArrayPlus,
    /// Two-level union; existing keys win at both levels.
    #[serde(rename = "array_plus_2d")]
    ArrayPlus2d,
}

impl MergeStrategy {
    pub const ALL: [MergeStrategy; 6] = [
        MergeStrategy::ProvideDefault,
        MergeStrategy::ArrayMerge,
        MergeStrategy::ArrayMergeRecursive,
        MergeStrategy::ArrayReplaceRecursive,
        MergeStrategy::ArrayPlus,
        MergeStrategy::ArrayPlus2d,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MergeStrategy::ProvideDefault => "provide_default",
            MergeStrategy::ArrayMerge => "array_merge",
            MergeStrategy::ArrayMergeRecursive => "array_merge_recursive",
            MergeStrategy::ArrayReplaceRecursive => "array_replace_recursive",
            MergeStrategy::ArrayPlus => "array_plus",
            MergeStrategy::ArrayPlus2d => "array_plus_2d",
        }
    }

    /// Combine `incoming` with the `existing` setting value.
    ///
    /// Returns the value to store, or `None` when the existing value stays
    /// as it is. An absent or empty existing value is always replaced
    /// (except by `provide_default`, which only fills absent keys); a
    /// scalar on either side leaves the existing value untouched.
    pub fn combine(self, existing: Option<&Value>, incoming: Value) -> Option<Value> {
        let existing = match existing {
            None => return Some(incoming),
            Some(_) if self == MergeStrategy::ProvideDefault => return None,
            Some(value) if is_empty_array(value) => return Some(incoming),
            Some(value) => value,
        };

        if !is_array(existing) || !is_array(&incoming) {
            return None;
        }

        let old = Assoc::from_value(existing.clone())?;
        let new = Assoc::from_value(incoming)?;
        let merged = match self {
            MergeStrategy::ProvideDefault => return None,
            MergeStrategy::ArrayMerge => new.prepend(old),
            MergeStrategy::ArrayMergeRecursive => old.merge_recursive(new),
            MergeStrategy::ArrayReplaceRecursive => new.replace_recursive(old),
            MergeStrategy::ArrayPlus => old.plus(new),
            MergeStrategy::ArrayPlus2d => old.plus_2d(new),
        };
        Some(merged.into_value())
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MergeStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| Error::UnknownMergeStrategy { tag: s.to_string() })
    }
}

/// Strategies attached to well-known settings regardless of what the
/// contributing manifest declares.
pub(crate) fn builtin_strategy(key: &str) -> Option<MergeStrategy> {
    let strategy = match key {
        "wgAddGroups" | "wgHooks" | "wgPasswordPolicy" | "wgRemoveGroups"
        | "wgGroupsAddToSelf" | "wgGroupsRemoveFromSelf" => MergeStrategy::ArrayMergeRecursive,
        "wgAuthManagerAutoConfig" | "wgGrantPermissions" | "wgGroupPermissions"
        | "wgRateLimits" | "wgRevokePermissions" => MergeStrategy::ArrayPlus2d,
        "wgCapitalLinkOverrides" | "wgExtraGenderNamespaces" | "wgNamespaceContentModels"
        | "wgNamespaceProtection" | "wgNamespacesWithSubpages" => MergeStrategy::ArrayPlus,
        _ => return None,
    };
    Some(strategy)
}

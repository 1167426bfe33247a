//! Version constraint parsing and checking.
//!
//! Constraints use the package-manager syntax manifests declare their
//! requirements in:
//!
//! - **Comparisons**: `>=1.30`, `> 1.2.3`, `<2.0`, `<=1.5`, `==1.0.0`,
//!   `=1.0`, `!=1.1`; a bare version means an exact match
//! - **Conjunctions**: comma or whitespace separated (`>= 1.0, < 2.0`)
//! - **Alternatives**: `||` between conjunctions
//! - **Ranges**: caret `^1.2` (`>=1.2.0 <2.0.0`), tilde `~1.2.3`
//!   (`>=1.2.3 <1.3.0`), wildcards `1.2.*` and `*`
//!
//! Versions have one to three numeric components plus an optional
//! pre-release suffix (`1.43.0-alpha`). Missing components are zero.
//!
//! # Examples
//!
//! ```
//! use ext_registry::version::VersionConstraint;
//!
//! let constraint = VersionConstraint::parse(">= 1.30").unwrap();
//! assert!(constraint.satisfies("1.43.0-alpha"));
//! assert!(!constraint.satisfies("1.25.0"));
//!
//! let constraint = VersionConstraint::parse("^1.2 || ^2.0").unwrap();
//! assert!(constraint.satisfies("2.4.1"));
//! assert!(!constraint.satisfies("3.0.0"));
//! ```

use std::sync::LazyLock;

use regex::Regex;
use semver::{Prerelease, Version};

use crate::error::{Error, Result};

// Operators may be separated from their version by whitespace.
static OPERATOR_GAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(>=|<=|!=|==|<>|>|<|=|\^|~)\s+").unwrap());

static TOKEN_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s,]+").unwrap());

/// A single version comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    /// `>=`
    Gte,
    /// `>`
    Gt,
    /// `<=`
    Lte,
    /// `<`
    Lt,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

/// A single version specifier: an operator paired with a version.
#[derive(Debug, Clone)]
struct Specifier {
    op: CompareOp,
    version: Version,
}

impl Specifier {
    fn new(op: CompareOp, version: Version) -> Self {
        Self { op, version }
    }

    fn matches(&self, candidate: &Version) -> bool {
        // A stable bound admits pre-releases of the same release on ordered
        // comparisons: `>=1.35` accepts `1.35.0-alpha`, `<2.0` rejects
        // `2.0.0-alpha`.
        let stripped;
        let candidate = if self.version.pre.is_empty()
            && !candidate.pre.is_empty()
            && !matches!(self.op, CompareOp::Eq | CompareOp::Ne)
        {
            stripped = Version::new(candidate.major, candidate.minor, candidate.patch);
            &stripped
        } else {
            candidate
        };

        match self.op {
            CompareOp::Gte => candidate >= &self.version,
            CompareOp::Gt => candidate > &self.version,
            CompareOp::Lte => candidate <= &self.version,
            CompareOp::Lt => candidate < &self.version,
            CompareOp::Eq => candidate == &self.version,
            CompareOp::Ne => candidate != &self.version,
        }
    }
}

/// A parsed version constraint that can be checked against concrete versions.
///
/// Holds one or more alternatives; a version satisfies the constraint when
/// every specifier of at least one alternative matches.
#[derive(Debug, Clone)]
pub struct VersionConstraint {
    alternatives: Vec<Vec<Specifier>>,
    /// The original constraint string for display.
    raw: String,
}

impl VersionConstraint {
    /// Parse a version constraint string.
    pub fn parse(constraint: &str) -> Result<Self> {
        let raw = constraint.trim().to_string();
        if raw.is_empty() {
            return Err(parse_error(&raw, "empty constraint"));
        }

        let mut alternatives = Vec::new();
        for alternative in raw.split("||") {
            let glued = OPERATOR_GAP.replace_all(alternative.trim(), "$1");
            let mut specifiers = Vec::new();
            let mut any = false;
            for token in TOKEN_SEPARATOR.split(&glued).filter(|t| !t.is_empty()) {
                let parsed = parse_token(token).map_err(|reason| parse_error(&raw, &reason))?;
                any |= parsed.is_empty();
                specifiers.extend(parsed);
            }
            if specifiers.is_empty() && !any {
                return Err(parse_error(&raw, "empty alternative"));
            }
            alternatives.push(specifiers);
        }

        Ok(Self { alternatives, raw })
    }

    /// Check if a version string satisfies this constraint.
    ///
    /// Returns `false` if the version string cannot be parsed.
    pub fn satisfies(&self, version: &str) -> bool {
        match parse_version(version) {
            Ok(v) => self.satisfies_version(&v),
            Err(_) => false,
        }
    }

    /// Check if a `semver::Version` satisfies this constraint.
    pub fn satisfies_version(&self, version: &Version) -> bool {
        self.alternatives
            .iter()
            .any(|specs| specs.iter().all(|spec| spec.matches(version)))
    }

    /// Whether the constraint accepts every version (`*`).
    pub fn is_any(&self) -> bool {
        self.alternatives.iter().any(Vec::is_empty)
    }

    /// Return the original constraint string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl std::fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_error(constraint: &str, reason: &str) -> Error {
    Error::VersionConstraintParse {
        constraint: constraint.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse one token into the specifiers it expands to. An empty result
/// means "any version".
fn parse_token(token: &str) -> std::result::Result<Vec<Specifier>, String> {
    if matches!(token, "*" | "x" | "X") {
        return Ok(Vec::new());
    }
    if let Some(rest) = token.strip_prefix('^') {
        return caret(rest);
    }
    if let Some(rest) = token.strip_prefix('~') {
        return tilde(rest);
    }

    let (op, version_str) = if let Some(rest) = token.strip_prefix(">=") {
        (CompareOp::Gte, rest)
    } else if let Some(rest) = token.strip_prefix("<=") {
        (CompareOp::Lte, rest)
    } else if let Some(rest) = token.strip_prefix("!=") {
        (CompareOp::Ne, rest)
    } else if let Some(rest) = token.strip_prefix("<>") {
        (CompareOp::Ne, rest)
    } else if let Some(rest) = token.strip_prefix("==") {
        (CompareOp::Eq, rest)
    } else if let Some(rest) = token.strip_prefix('=') {
        (CompareOp::Eq, rest)
    } else if let Some(rest) = token.strip_prefix('>') {
        (CompareOp::Gt, rest)
    } else if let Some(rest) = token.strip_prefix('<') {
        (CompareOp::Lt, rest)
    } else {
        // Bare version implies ==
        (CompareOp::Eq, token)
    };

    if is_wildcard(version_str) {
        if op != CompareOp::Eq {
            return Err(format!("wildcard not allowed with an operator: {token}"));
        }
        return wildcard(version_str);
    }

    let partial = Partial::parse(version_str)?;
    Ok(vec![Specifier::new(op, partial.version)])
}

fn is_wildcard(s: &str) -> bool {
    s.split('.').any(|part| matches!(part, "*" | "x" | "X"))
}

fn caret(s: &str) -> std::result::Result<Vec<Specifier>, String> {
    let partial = Partial::parse(s)?;
    let v = &partial.version;
    let upper = if v.major > 0 || partial.components == 1 {
        Version::new(v.major + 1, 0, 0)
    } else if v.minor > 0 || partial.components == 2 {
        Version::new(0, v.minor + 1, 0)
    } else {
        Version::new(0, 0, v.patch + 1)
    };
    Ok(range(partial.version, upper))
}

fn tilde(s: &str) -> std::result::Result<Vec<Specifier>, String> {
    let partial = Partial::parse(s)?;
    let v = &partial.version;
    let upper = if partial.components == 3 {
        Version::new(v.major, v.minor + 1, 0)
    } else {
        Version::new(v.major + 1, 0, 0)
    };
    Ok(range(partial.version, upper))
}

fn wildcard(s: &str) -> std::result::Result<Vec<Specifier>, String> {
    let fixed: Vec<&str> = s
        .split('.')
        .take_while(|part| !matches!(*part, "*" | "x" | "X"))
        .collect();
    if fixed.is_empty() {
        return Ok(Vec::new());
    }
    let partial = Partial::parse(&fixed.join("."))?;
    let v = &partial.version;
    let upper = match partial.components {
        1 => Version::new(v.major + 1, 0, 0),
        2 => Version::new(v.major, v.minor + 1, 0),
        _ => return Err(format!("invalid wildcard version: {s}")),
    };
    Ok(range(partial.version, upper))
}

fn range(lower: Version, upper: Version) -> Vec<Specifier> {
    vec![
        Specifier::new(CompareOp::Gte, lower),
        Specifier::new(CompareOp::Lt, upper),
    ]
}

/// A version together with how many numeric components were written.
struct Partial {
    version: Version,
    components: usize,
}

impl Partial {
    fn parse(s: &str) -> std::result::Result<Self, String> {
        let s = s.trim();
        let s = s.strip_prefix(['v', 'V']).unwrap_or(s);
        let s = s.split_once('+').map_or(s, |(head, _build)| head);
        let (numbers, pre) = match s.split_once('-') {
            Some((numbers, pre)) => (numbers, pre),
            None => (s, ""),
        };

        let parts = numbers
            .split('.')
            .map(|part| part.parse::<u64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| format!("invalid version: {s}"))?;
        if parts.is_empty() || parts.len() > 3 {
            return Err(format!("invalid version: {s}"));
        }

        let mut version = Version::new(
            parts[0],
            parts.get(1).copied().unwrap_or(0),
            parts.get(2).copied().unwrap_or(0),
        );
        if !pre.is_empty() {
            version.pre = Prerelease::new(pre).map_err(|e| format!("invalid version '{s}': {e}"))?;
        }

        Ok(Self {
            version,
            components: parts.len(),
        })
    }
}

/// Parse a version string, padding missing components with zeros.
///
/// - `"1.43"` -> `1.43.0`
/// - `"1.43.0-alpha"` -> `1.43.0-alpha`
/// - `"v2"` -> `2.0.0`
pub fn parse_version(s: &str) -> Result<Version> {
    Partial::parse(s)
        .map(|partial| partial.version)
        .map_err(|reason| Error::InvalidVersion {
            version: s.to_string(),
            reason,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    // --- VersionConstraint::parse ---

    #[test]
    fn test_parse_gte() {
        let c = VersionConstraint::parse(">=1.30").unwrap();
        assert_eq!(c.alternatives.len(), 1);
        assert_eq!(c.alternatives[0].len(), 1);
        assert_eq!(c.as_str(), ">=1.30");
    }

    #[test]
    fn test_parse_operator_with_space() {
        let c = VersionConstraint::parse(">= 1.30").unwrap();
        assert_eq!(c.alternatives[0].len(), 1);
    }

    #[test]
    fn test_parse_compound() {
        let c = VersionConstraint::parse(">=1.0, <2.0").unwrap();
        assert_eq!(c.alternatives[0].len(), 2);
        let c = VersionConstraint::parse(">=1.0 <2.0").unwrap();
        assert_eq!(c.alternatives[0].len(), 2);
    }

    #[test]
    fn test_parse_alternatives() {
        let c = VersionConstraint::parse("^1.0 || ^2.0").unwrap();
        assert_eq!(c.alternatives.len(), 2);
    }

    #[test]
    fn test_parse_star_is_any() {
        let c = VersionConstraint::parse("*").unwrap();
        assert!(c.is_any());
        assert!(c.satisfies("0.0.1"));
        assert!(c.satisfies("99.0.0-beta"));
    }

    #[rstest]
    #[case("")]
    #[case(">=abc")]
    #[case("1.2.3.4")]
    #[case(">=1.*")]
    #[case("^")]
    #[case("1.0 ||")]
    fn test_parse_rejected(#[case] input: &str) {
        assert!(VersionConstraint::parse(input).is_err(), "{input} should not parse");
    }

    // --- satisfies ---

    #[rstest]
    #[case(">= 1.30", "1.43.0-alpha", true)]
    #[case(">= 1.30", "1.25.0", false)]
    #[case(">=1.35", "1.35.0-alpha", true)]
    #[case(">1.35.0", "1.35.0-alpha", false)]
    #[case("<2.0", "1.99.9", true)]
    #[case("<2.0", "2.0.0-alpha", false)]
    #[case("<=1.5", "1.5.0", true)]
    #[case("==1.0.0", "1.0.0", true)]
    #[case("=1.0", "1.0.1", false)]
    #[case("1.2.3", "1.2.3", true)]
    #[case("!=1.1", "1.1.0", false)]
    #[case("!=1.1", "1.2.0", true)]
    #[case(">= 1.0, < 2.0", "1.5.0", true)]
    #[case(">= 1.0, < 2.0", "2.0.0", false)]
    #[case("^1.2", "1.9.0", true)]
    #[case("^1.2", "2.0.0", false)]
    #[case("^0.3.1", "0.3.9", true)]
    #[case("^0.3.1", "0.4.0", false)]
    #[case("~1.2", "1.9.0", true)]
    #[case("~1.2.3", "1.2.9", true)]
    #[case("~1.2.3", "1.3.0", false)]
    #[case("1.2.*", "1.2.7", true)]
    #[case("1.2.*", "1.3.0", false)]
    #[case("1.*", "1.99.0", true)]
    #[case("^1.0 || ^3.0", "3.1.0", true)]
    #[case("^1.0 || ^3.0", "2.1.0", false)]
    #[case("1.0.0-beta", "1.0.0-beta", true)]
    #[case(">=1.0.0-beta", "1.0.0-alpha", false)]
    fn test_satisfies(#[case] constraint: &str, #[case] version: &str, #[case] expected: bool) {
        let c = VersionConstraint::parse(constraint).unwrap();
        assert_eq!(c.satisfies(version), expected, "{version} against {constraint}");
    }

    #[test]
    fn test_satisfies_two_part_version() {
        let c = VersionConstraint::parse(">=1.30").unwrap();
        assert!(c.satisfies("1.31"));
    }

    #[test]
    fn test_satisfies_invalid_version_returns_false() {
        let c = VersionConstraint::parse(">=1.30").unwrap();
        assert!(!c.satisfies("not-a-version"));
    }

    // --- parse_version ---

    #[test]
    fn test_parse_version_pads_components() {
        assert_eq!(parse_version("1.43").unwrap(), Version::new(1, 43, 0));
        assert_eq!(parse_version("2").unwrap(), Version::new(2, 0, 0));
        assert_eq!(parse_version(" v1.2.3 ").unwrap(), Version::new(1, 2, 3));
    }

    #[test]
    fn test_parse_version_keeps_prerelease() {
        let v = parse_version("1.43.0-alpha").unwrap();
        assert_eq!(v.pre.as_str(), "alpha");
    }

    #[test]
    fn test_parse_version_rejects_garbage() {
        assert!(parse_version("one.two").is_err());
        assert!(parse_version("").is_err());
    }

    // --- Display ---

    #[test]
    fn test_display() {
        let c = VersionConstraint::parse(">= 1.0, < 2.0").unwrap();
        assert_eq!(format!("{c}"), ">= 1.0, < 2.0");
    }
}

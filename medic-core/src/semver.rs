//! Semantic versions and dependency version constraints.
//!
//! Versions compare component-wise: major, then minor, then patch. The derived
//! `Ord` relies on the field declaration order below.

use crate::{ChangeType, ValidationError, VersionError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A `major.minor.patch` version identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl SemVer {
    /// Starting version of a newly initialized agent.
    pub const ZERO: SemVer = SemVer {
        major: 0,
        minor: 0,
        patch: 0,
    };

    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Compute the next version for a change of the given type.
    ///
    /// Major resets minor and patch, minor resets patch, patch increments only
    /// the last component. Fails if the bumped component would overflow.
    pub fn bump(&self, change_type: ChangeType) -> Result<SemVer, VersionError> {
        let overflow = || VersionError::VersionOverflow {
            version: *self,
            change_type,
        };
        Ok(match change_type {
            ChangeType::Major => SemVer::new(self.major.checked_add(1).ok_or_else(overflow)?, 0, 0),
            ChangeType::Minor => {
                SemVer::new(self.major, self.minor.checked_add(1).ok_or_else(overflow)?, 0)
            }
            ChangeType::Patch => {
                SemVer::new(self.major, self.minor, self.patch.checked_add(1).ok_or_else(overflow)?)
            }
        })
    }

    /// Parse a version string such as `1.2.3` or `v1.2.3`.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() != 3 {
            return Err(ValidationError::InvalidVersion {
                input: input.to_string(),
            });
        }
        let mut components = [0u64; 3];
        for (slot, part) in components.iter_mut().zip(parts.iter()) {
            *slot = part
                .parse::<u64>()
                .map_err(|_| ValidationError::InvalidVersion {
                    input: input.to_string(),
                })?;
        }
        Ok(SemVer::new(components[0], components[1], components[2]))
    }
}

impl Default for SemVer {
    fn default() -> Self {
        SemVer::ZERO
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SemVer {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SemVer::parse(s)
    }
}

impl TryFrom<String> for SemVer {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SemVer::parse(&value)
    }
}

impl From<SemVer> for String {
    fn from(v: SemVer) -> Self {
        v.to_string()
    }
}

// ============================================================================
// VERSION CONSTRAINTS
// ============================================================================

/// Constraint placed on a dependency's version by a dependency edge.
///
/// A bare version (`1.2.0`) means "at least this version", matching `>=1.2.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VersionConstraint {
    /// `*`: any version satisfies the constraint
    Any,
    /// `>=x.y.z` or `x.y.z`
    AtLeast(SemVer),
    /// `^x.y.z`: same major version and at least `x.y.z`
    Compatible(SemVer),
    /// `=x.y.z`
    Exact(SemVer),
}

impl VersionConstraint {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        let invalid = || ValidationError::InvalidConstraint {
            input: input.to_string(),
        };
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(VersionConstraint::Any);
        }
        if let Some(rest) = trimmed.strip_prefix(">=") {
            return SemVer::parse(rest)
                .map(VersionConstraint::AtLeast)
                .map_err(|_| invalid());
        }
        if let Some(rest) = trimmed.strip_prefix('^') {
            return SemVer::parse(rest)
                .map(VersionConstraint::Compatible)
                .map_err(|_| invalid());
        }
        if let Some(rest) = trimmed.strip_prefix('=') {
            return SemVer::parse(rest)
                .map(VersionConstraint::Exact)
                .map_err(|_| invalid());
        }
        SemVer::parse(trimmed)
            .map(VersionConstraint::AtLeast)
            .map_err(|_| invalid())
    }

    /// The minimum version this constraint requires, if any.
    pub fn minimum(&self) -> Option<SemVer> {
        match self {
            VersionConstraint::Any => None,
            VersionConstraint::AtLeast(v)
            | VersionConstraint::Compatible(v)
            | VersionConstraint::Exact(v) => Some(*v),
        }
    }

    /// Check whether `current` satisfies this constraint.
    pub fn is_satisfied_by(&self, current: &SemVer) -> bool {
        match self {
            VersionConstraint::Any => true,
            VersionConstraint::AtLeast(required) => current >= required,
            VersionConstraint::Compatible(required) => {
                current.major == required.major && current >= required
            }
            VersionConstraint::Exact(required) => current == required,
        }
    }
}

impl Default for VersionConstraint {
    fn default() -> Self {
        VersionConstraint::Any
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Any => write!(f, "*"),
            VersionConstraint::AtLeast(v) => write!(f, ">={}", v),
            VersionConstraint::Compatible(v) => write!(f, "^{}", v),
            VersionConstraint::Exact(v) => write!(f, "={}", v),
        }
    }
}

impl FromStr for VersionConstraint {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionConstraint::parse(s)
    }
}

impl TryFrom<String> for VersionConstraint {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        VersionConstraint::parse(&value)
    }
}

impl From<VersionConstraint> for String {
    fn from(c: VersionConstraint) -> Self {
        c.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bump_resets_lower_components() {
        let v = SemVer::new(1, 4, 7);
        assert_eq!(v.bump(ChangeType::Major).unwrap(), SemVer::new(2, 0, 0));
        assert_eq!(v.bump(ChangeType::Minor).unwrap(), SemVer::new(1, 5, 0));
        assert_eq!(v.bump(ChangeType::Patch).unwrap(), SemVer::new(1, 4, 8));
    }

    #[test]
    fn test_bump_overflow_is_an_error() {
        let v = SemVer::new(u64::MAX, u64::MAX, u64::MAX);
        for change in [ChangeType::Major, ChangeType::Minor, ChangeType::Patch] {
            assert_eq!(
                v.bump(change),
                Err(VersionError::VersionOverflow {
                    version: v,
                    change_type: change
                })
            );
        }
        assert_eq!(
            SemVer::new(u64::MAX, 3, u64::MAX).bump(ChangeType::Minor).unwrap(),
            SemVer::new(u64::MAX, 4, 0)
        );
    }

    #[test]
    fn test_three_patches_from_zero() {
        let mut v = SemVer::ZERO;
        let mut seen = Vec::new();
        for _ in 0..3 {
            v = v.bump(ChangeType::Patch).unwrap();
            seen.push(v.to_string());
        }
        assert_eq!(seen, vec!["0.0.1", "0.0.2", "0.0.3"]);
    }

    #[test]
    fn test_parse_accepts_v_prefix_and_rejects_garbage() {
        assert_eq!(SemVer::parse("v2.0.1").unwrap(), SemVer::new(2, 0, 1));
        assert!(SemVer::parse("2.0").is_err());
        assert!(SemVer::parse("2.x.1").is_err());
    }

    #[test]
    fn test_component_wise_ordering() {
        assert!(SemVer::new(1, 10, 0) > SemVer::new(1, 9, 99));
        assert!(SemVer::new(2, 0, 0) > SemVer::new(1, 99, 99));
        assert!(SemVer::new(1, 2, 3) == SemVer::new(1, 2, 3));
    }

    #[test]
    fn test_constraint_parsing_and_satisfaction() {
        let bare = VersionConstraint::parse("1.2.0").unwrap();
        assert_eq!(bare, VersionConstraint::AtLeast(SemVer::new(1, 2, 0)));
        assert!(bare.is_satisfied_by(&SemVer::new(1, 3, 0)));
        assert!(!bare.is_satisfied_by(&SemVer::new(1, 1, 9)));

        let caret = VersionConstraint::parse("^1.2.0").unwrap();
        assert!(caret.is_satisfied_by(&SemVer::new(1, 9, 0)));
        assert!(!caret.is_satisfied_by(&SemVer::new(2, 0, 0)));

        let exact = VersionConstraint::parse("=0.3.1").unwrap();
        assert!(exact.is_satisfied_by(&SemVer::new(0, 3, 1)));
        assert!(!exact.is_satisfied_by(&SemVer::new(0, 3, 2)));

        assert_eq!(VersionConstraint::parse("*").unwrap(), VersionConstraint::Any);
        assert!(VersionConstraint::parse(">=one").is_err());
    }

    #[test]
    fn test_serde_uses_string_form() {
        let json = serde_json::to_string(&SemVer::new(3, 1, 4)).unwrap();
        assert_eq!(json, "\"3.1.4\"");
        let c: VersionConstraint = serde_json::from_str("\"^1.0.0\"").unwrap();
        assert_eq!(c, VersionConstraint::Compatible(SemVer::new(1, 0, 0)));
    }
}

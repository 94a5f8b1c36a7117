//! Semantic versions and the version advancement policy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CatalogError, Result};

use super::plan::VersionStrategy;

/// Version used when a versioned object gets its first version and the
/// caller did not ask for a specific one.
pub const DEFAULT_INITIAL_VERSION: &str = "1.0.0";

/// A `major.minor.patch` version. Pre-release and build metadata are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SemVer {
    /// Major component.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Patch component.
    pub patch: u64,
}

impl SemVer {
    /// Creates a version from its components.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self { major, minor, patch }
    }

    /// Parses a version string.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the string is not `major.minor.patch`.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || CatalogError::validation("invalid semantic version", s);

        let mut parts = s.split('.');
        let mut next = || -> Result<u64> {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty()
                || !part.bytes().all(|b| b.is_ascii_digit())
                || (part.len() > 1 && part.starts_with('0'))
            {
                return Err(invalid());
            }
            part.parse().map_err(|_| invalid())
        };

        let version = Self::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(version)
    }

    /// Returns the next minor version, or `None` if the minor component is exhausted.
    #[must_use]
    pub const fn bump_minor(self) -> Option<Self> {
        match self.minor.checked_add(1) {
            Some(minor) => Some(Self::new(self.major, minor, 0)),
            None => None,
        }
    }

    /// Returns the next patch version, or `None` if the patch component is exhausted.
    #[must_use]
    pub const fn bump_patch(self) -> Option<Self> {
        match self.patch.checked_add(1) {
            Some(patch) => Some(Self::new(self.major, self.minor, patch)),
            None => None,
        }
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SemVer {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SemVer {
    type Error = CatalogError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<SemVer> for String {
    fn from(v: SemVer) -> Self {
        v.to_string()
    }
}

/// What the caller asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionRequest {
    /// Requested version string; ignored by the bump strategies once a
    /// version exists.
    pub version_string: Option<String>,
    /// Advancement strategy.
    pub strategy: VersionStrategy,
}

/// Decision of the version policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionDecision {
    /// No version exists yet; create this one.
    CreateFirst(SemVer),
    /// Create this new version.
    Create(SemVer),
    /// The computed version already exists.
    NoAction(SemVer),
    /// `EXACT` request that is not newer than the highest existing version.
    Reject {
        /// Requested version.
        requested: SemVer,
        /// Highest existing version.
        existing: SemVer,
    },
}

/// Computes the next version for a versioned object.
#[derive(Debug, Default, Clone, Copy)]
pub struct VersionPolicy;

impl VersionPolicy {
    /// Creates a new policy.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decides the next version given all existing versions of the parent.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a version string that must be used is
    /// malformed, or if the bumped component would overflow.
    pub fn next_version(&self, existing: &[SemVer], request: &VersionRequest) -> Result<VersionDecision> {
        let Some(highest) = existing.iter().max().copied() else {
            let first = match request.version_string.as_deref() {
                Some(s) => SemVer::parse(s)?,
                None => SemVer::parse(DEFAULT_INITIAL_VERSION)?,
            };
            return Ok(VersionDecision::CreateFirst(first));
        };

        let candidate = match request.strategy {
            VersionStrategy::Exact => {
                let requested = request
                    .version_string
                    .as_deref()
                    .ok_or_else(|| {
                        CatalogError::validation("EXACT strategy requires a version string", "")
                    })
                    .and_then(SemVer::parse)?;
                if requested <= highest {
                    return Ok(VersionDecision::Reject {
                        requested,
                        existing: highest,
                    });
                }
                requested
            }
            VersionStrategy::BumpMinor => highest.bump_minor().ok_or_else(|| {
                CatalogError::validation("minor version cannot be incremented", highest.to_string())
            })?,
            VersionStrategy::BumpPatch => highest.bump_patch().ok_or_else(|| {
                CatalogError::validation("patch version cannot be incremented", highest.to_string())
            })?,
        };

        if existing.contains(&candidate) {
            Ok(VersionDecision::NoAction(candidate))
        } else {
            Ok(VersionDecision::Create(candidate))
        }
    }
}

/// Returns the highest parseable version among `versions`, skipping malformed ones.
#[must_use]
pub fn highest<'a>(versions: impl IntoIterator<Item = &'a str>) -> Option<SemVer> {
    versions.into_iter().filter_map(|v| SemVer::parse(v).ok()).max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn v(s: &str) -> SemVer {
        SemVer::parse(s).unwrap()
    }

    fn request(version: Option<&str>, strategy: VersionStrategy) -> VersionRequest {
        VersionRequest {
            version_string: version.map(String::from),
            strategy,
        }
    }

    #[test]
    fn test_parse_and_order() {
        assert_eq!(v("1.2.3"), SemVer::new(1, 2, 3));
        assert!(v("1.10.0") > v("1.9.9"));
        assert!(v("2.0.0") > v("1.99.99"));
        assert_eq!(v("0.0.1").to_string(), "0.0.1");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "1", "1.2", "1.2.3.4", "1.2.x", "v1.2.3", "1.2.3-rc1", "01.2.3", "1..3"] {
            let err = SemVer::parse(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{bad}");
        }
    }

    #[test]
    fn test_bump_determinism() {
        let policy = VersionPolicy::new();
        let existing = [v("1.0.0"), v("1.2.3"), v("1.1.0")];

        assert_eq!(
            policy.next_version(&existing, &request(None, VersionStrategy::BumpMinor)).unwrap(),
            VersionDecision::Create(v("1.3.0"))
        );
        assert_eq!(
            policy.next_version(&existing, &request(Some("9.9.9"), VersionStrategy::BumpPatch)).unwrap(),
            VersionDecision::Create(v("1.2.4"))
        );
    }

    #[test]
    fn test_bump_overflow_fails_validation() {
        let policy = VersionPolicy::new();
        let max = u64::MAX;

        let existing = [v(&format!("1.{max}.0"))];
        let err = policy
            .next_version(&existing, &request(None, VersionStrategy::BumpMinor))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let existing = [v(&format!("1.2.{max}"))];
        let err = policy
            .next_version(&existing, &request(None, VersionStrategy::BumpPatch))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        // the other component still advances
        assert_eq!(
            policy.next_version(&existing, &request(None, VersionStrategy::BumpMinor)).unwrap(),
            VersionDecision::Create(v("1.3.0"))
        );
    }

    #[test]
    fn test_exact_not_greater_is_rejected() {
        let policy = VersionPolicy::new();
        let existing = [v("1.2.3")];

        assert_eq!(
            policy.next_version(&existing, &request(Some("1.2.3"), VersionStrategy::Exact)).unwrap(),
            VersionDecision::Reject { requested: v("1.2.3"), existing: v("1.2.3") }
        );
        assert_eq!(
            policy.next_version(&existing, &request(Some("1.3.0"), VersionStrategy::Exact)).unwrap(),
            VersionDecision::Create(v("1.3.0"))
        );
    }

    #[test]
    fn test_exact_malformed_fails_validation() {
        let policy = VersionPolicy::new();
        let err = policy
            .next_version(&[v("1.0.0")], &request(Some("next"), VersionStrategy::Exact))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_first_version() {
        let policy = VersionPolicy::new();
        assert_eq!(
            policy.next_version(&[], &request(None, VersionStrategy::BumpPatch)).unwrap(),
            VersionDecision::CreateFirst(v(DEFAULT_INITIAL_VERSION))
        );
        assert_eq!(
            policy.next_version(&[], &request(Some("0.3.0"), VersionStrategy::Exact)).unwrap(),
            VersionDecision::CreateFirst(v("0.3.0"))
        );
        assert!(policy.next_version(&[], &request(Some("0.3"), VersionStrategy::BumpMinor)).is_err());
    }

    #[test]
    fn test_highest_skips_malformed() {
        assert_eq!(highest(["1.0.0", "junk", "1.4.0", "1.3.9"]), Some(v("1.4.0")));
        assert_eq!(highest(std::iter::empty()), None);
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&v("2.1.0")).unwrap();
        assert_eq!(json, "\"2.1.0\"");
        let back: SemVer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v("2.1.0"));
    }
}

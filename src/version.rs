// SPDX-License-Identifier: MPL-2.0

//! Version identifiers: semantic versions, branches, revisions, and
//! paired forms that tie a branch or semver tag to the revision it
//! resolved to.

use std::fmt::{self, Display};
use std::str::FromStr;

use thiserror::Error;

/// An opaque, immutable revision identifier (a commit hash, changeset id, …).
///
/// Revisions carry no ordering; two revisions are either byte-identical or
/// unrelated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Revision(String);

impl Revision {
    /// Creates a revision from its identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The pairable half of a [`Version::Paired`]: either a semver tag or a
/// branch name. A raw revision is never paired with itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PairedBase {
    /// A semantic version tag.
    Semver(semver::Version),
    /// A floating branch name.
    Branch(String),
}

impl Display for PairedBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairedBase::Semver(v) => Display::fmt(v, f),
            PairedBase::Branch(b) => f.write_str(b),
        }
    }
}

/// A project version.
///
/// Only semantic versions are totally ordered; branches and revisions are
/// opaque identities. A [`Version::Paired`] value records both the name a
/// version was requested under and the immutable revision it resolved to,
/// and answers to either.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Version {
    /// A semantic version, e.g. `1.2.0` or `2.0.0-beta.1`.
    Semver(semver::Version),
    /// A floating branch name, e.g. `main`.
    Branch(String),
    /// A bare immutable revision.
    Revision(Revision),
    /// A semver tag or branch together with the revision it resolved to.
    Paired {
        /// What the version was requested as.
        base: PairedBase,
        /// What it resolved to.
        rev: Revision,
    },
}

impl Version {
    /// Shorthand for a `major.minor.patch` semantic version.
    pub fn semver(major: u64, minor: u64, patch: u64) -> Self {
        Version::Semver(semver::Version::new(major, minor, patch))
    }

    /// The semantic version underlying this version, if there is one.
    /// Paired semver tags expose their base.
    pub fn as_semver(&self) -> Option<&semver::Version> {
        match self {
            Version::Semver(v) => Some(v),
            Version::Paired {
                base: PairedBase::Semver(v),
                ..
            } => Some(v),
            _ => None,
        }
    }

    /// The revision underlying this version, if there is one.
    pub fn revision(&self) -> Option<&Revision> {
        match self {
            Version::Revision(r) => Some(r),
            Version::Paired { rev, .. } => Some(rev),
            _ => None,
        }
    }

    /// Pairs this version with the revision it resolved to. A bare revision
    /// is already immutable and is returned unchanged.
    pub fn pair(self, rev: Revision) -> Self {
        match self {
            Version::Semver(v) => Version::Paired {
                base: PairedBase::Semver(v),
                rev,
            },
            Version::Branch(b) => Version::Paired {
                base: PairedBase::Branch(b),
                rev,
            },
            other => other,
        }
    }

    /// Whether two versions denote the same underlying version.
    ///
    /// This is looser than equality: a paired version matches its own base
    /// and its own revision, so `1.0.0+rev(abc)` matches both `1.0.0` and
    /// `abc`. The relation is symmetric.
    pub fn matches(&self, other: &Version) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (Version::Paired { base, rev }, _) => {
                Self::base_matches(base, other) || Self::rev_matches(rev, other)
            }
            (_, Version::Paired { base, rev }) => {
                Self::base_matches(base, self) || Self::rev_matches(rev, self)
            }
            _ => false,
        }
    }

    fn base_matches(base: &PairedBase, other: &Version) -> bool {
        match (base, other) {
            (PairedBase::Semver(a), Version::Semver(b)) => a == b,
            (PairedBase::Branch(a), Version::Branch(b)) => a == b,
            _ => false,
        }
    }

    fn rev_matches(rev: &Revision, other: &Version) -> bool {
        match other {
            Version::Revision(r) => rev == r,
            Version::Paired { rev: r, .. } => rev == r,
            _ => false,
        }
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Semver(v) => Display::fmt(v, f),
            Version::Branch(b) => f.write_str(b),
            Version::Revision(r) => Display::fmt(r, f),
            Version::Paired { base, rev } => write!(f, "{base}@{rev}"),
        }
    }
}

/// Error returned when parsing an empty version string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("empty version string")]
pub struct VersionParseError;

impl FromStr for Version {
    type Err = VersionParseError;

    /// Parses a semantic version where possible, and falls back to treating
    /// the string as a branch name. Bare revisions and paired versions are
    /// constructed explicitly, never parsed.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(VersionParseError);
        }
        match semver::Version::parse(s) {
            Ok(v) => Ok(Version::Semver(v)),
            Err(_) => Ok(Version::Branch(s.to_owned())),
        }
    }
}

// Candidate ordering ##########################################################

/// Sorts candidate versions for the default, newest-first policy.
///
/// Semver-comparable versions (including paired semver tags) come first in
/// descending order, with pre-releases below their release counterpart.
/// Branches follow, then bare revisions, each preserving their incoming
/// order.
pub fn sort_for_upgrade(versions: &mut [Version]) {
    sort_candidates(versions, false)
}

/// Sorts candidate versions oldest-first; the mirror of
/// [`sort_for_upgrade`].
pub fn sort_for_downgrade(versions: &mut [Version]) {
    sort_candidates(versions, true)
}

fn sort_candidates(versions: &mut [Version], ascending: bool) {
    fn class(v: &Version) -> u8 {
        match v {
            _ if v.as_semver().is_some() => 0,
            Version::Branch(_) | Version::Paired { .. } => 1,
            Version::Revision(_) => 2,
            Version::Semver(_) => unreachable!(),
        }
    }
    versions.sort_by(|a, b| {
        let by_class = class(a).cmp(&class(b));
        if !by_class.is_eq() {
            return by_class;
        }
        match (a.as_semver(), b.as_semver()) {
            (Some(x), Some(y)) if ascending => x.cmp(y),
            (Some(x), Some(y)) => y.cmp(x),
            // Stable sort keeps non-semver candidates in incoming order.
            _ => std::cmp::Ordering::Equal,
        }
    });
}

// TESTS #######################################################################

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn parse_classifies_semver_and_branches() {
        assert_eq!(v("1.2.3"), Version::semver(1, 2, 3));
        assert_eq!(v("main"), Version::Branch("main".into()));
        assert!("".parse::<Version>().is_err());
    }

    #[test]
    fn paired_matches_base_and_revision() {
        let paired = v("1.0.0").pair(Revision::new("abc123"));
        assert!(paired.matches(&v("1.0.0")));
        assert!(v("1.0.0").matches(&paired));
        assert!(paired.matches(&Version::Revision(Revision::new("abc123"))));
        assert!(!paired.matches(&v("1.0.1")));
        assert!(!paired.matches(&Version::Revision(Revision::new("def456"))));
    }

    #[test]
    fn upgrade_sort_is_newest_first_with_prereleases_below_release() {
        let mut vs = vec![v("1.0.0-alpha"), v("main"), v("1.0.0"), v("2.0.0")];
        sort_for_upgrade(&mut vs);
        assert_eq!(
            vs,
            vec![v("2.0.0"), v("1.0.0"), v("1.0.0-alpha"), v("main")]
        );
    }

    #[test]
    fn downgrade_sort_is_oldest_first() {
        let mut vs = vec![v("1.1.0"), v("1.0.0"), v("2.0.0")];
        sort_for_downgrade(&mut vs);
        assert_eq!(vs, vec![v("1.0.0"), v("1.1.0"), v("2.0.0")]);
    }

    #[test]
    fn revisions_sort_after_branches() {
        let mut vs = vec![
            Version::Revision(Revision::new("deadbeef")),
            v("main"),
            v("0.9.0"),
        ];
        sort_for_upgrade(&mut vs);
        assert_eq!(vs[0], v("0.9.0"));
        assert_eq!(vs[1], v("main"));
        assert_eq!(vs[2], Version::Revision(Revision::new("deadbeef")));
    }
}

// SPDX-License-Identifier: MPL-2.0

//! Constraints are predicates over [versions](crate::version::Version),
//! closed under intersection.
//!
//! The lattice has [`Constraint::Any`] at the top and [`Constraint::None`]
//! at the bottom. Semver ranges are carried as [`semver::VersionReq`]
//! requirements; intersecting two ranges conjoins their comparator lists,
//! since a requirement is itself a conjunction of comparators.

use std::fmt::{self, Display};
use std::str::FromStr;

use thiserror::Error;

use crate::version::Version;

/// A predicate over versions.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Constraint {
    /// Admits every version.
    Any,
    /// Admits no version.
    None,
    /// Admits semantic versions inside a range. Branches and revisions
    /// never satisfy a range.
    Range(semver::VersionReq),
    /// Admits exactly one version, under [`Version::matches`] identity.
    Exact(Version),
}

impl Constraint {
    /// Whether `version` satisfies this constraint. Total over every
    /// version kind: non-semver versions satisfy only `Any` and an `Exact`
    /// of the same identity.
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Constraint::Any => true,
            Constraint::None => false,
            Constraint::Range(req) => version
                .as_semver()
                .map_or(false, |sv| req.matches(sv)),
            Constraint::Exact(v) => v.matches(version),
        }
    }

    /// The constraint admitting exactly the versions admitted by both
    /// `self` and `other`.
    ///
    /// `Any` is the identity and `None` is absorbing. The result of
    /// intersecting two ranges is their comparator conjunction; emptiness
    /// of such a conjunction is not detected here and instead surfaces as
    /// an unsatisfiable candidate filter during solving.
    pub fn intersect(&self, other: &Constraint) -> Constraint {
        match (self, other) {
            (Constraint::Any, c) | (c, Constraint::Any) => c.clone(),
            (Constraint::None, _) | (_, Constraint::None) => Constraint::None,
            (Constraint::Exact(a), Constraint::Exact(b)) => {
                if a.matches(b) {
                    // Prefer the revision-pinned side, it is the narrower
                    // description of the same version.
                    if b.revision().is_some() {
                        Constraint::Exact(b.clone())
                    } else {
                        Constraint::Exact(a.clone())
                    }
                } else {
                    Constraint::None
                }
            }
            (Constraint::Exact(v), range @ Constraint::Range(_))
            | (range @ Constraint::Range(_), Constraint::Exact(v)) => {
                if range.matches(v) {
                    Constraint::Exact(v.clone())
                } else {
                    Constraint::None
                }
            }
            (Constraint::Range(a), Constraint::Range(b)) => {
                let mut comparators = a.comparators.clone();
                for c in &b.comparators {
                    if !comparators.contains(c) {
                        comparators.push(c.clone());
                    }
                }
                Constraint::Range(semver::VersionReq { comparators })
            }
        }
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Any => f.write_str("*"),
            Constraint::None => f.write_str("∅"),
            Constraint::Range(req) => Display::fmt(req, f),
            Constraint::Exact(v) => write!(f, "={v}"),
        }
    }
}

/// Error returned when parsing an empty constraint string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("empty constraint string")]
pub struct ConstraintParseError;

impl FromStr for Constraint {
    type Err = ConstraintParseError;

    /// Parses `*` as [`Constraint::Any`], a plain version (`1.0.0`) as an
    /// exact pin, a range expression (`~1.0.0`, `>=1, <2`) as a range, and
    /// anything else as an exact branch pin.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ConstraintParseError);
        }
        if s == "*" {
            return Ok(Constraint::Any);
        }
        if let Ok(v) = semver::Version::parse(s) {
            return Ok(Constraint::Exact(Version::Semver(v)));
        }
        match semver::VersionReq::parse(s) {
            Ok(req) => Ok(Constraint::Range(req)),
            Err(_) => Ok(Constraint::Exact(Version::Branch(s.to_owned()))),
        }
    }
}

// TESTS #######################################################################

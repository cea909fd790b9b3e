// SPDX-License-Identifier: MPL-2.0

//! Solve results and the advisory lock that biases a later solve.

use std::collections::BTreeMap;

use crate::project::ProjectName;
use crate::version::{Revision, Version};

/// The output of a successful solve: one version per transitively required
/// project, the root excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Solution {
    /// Selected version per project.
    pub projects: BTreeMap<ProjectName, Version>,
    /// Candidate propagation attempts the search needed.
    pub attempts: u32,
    /// Selections that had to be undone along the way.
    pub backtracks: u32,
}

/// A previously solved state, used to bias candidate enumeration.
///
/// A lock is advisory: a locked version is promoted to the front of a
/// project's candidate list, and simply loses that privilege when it no
/// longer satisfies the active constraints. It never causes a failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Lock {
    /// Pinned version per project.
    pub projects: BTreeMap<ProjectName, LockedProject>,
}

/// One lock entry: the pinned version and, when known, the immutable
/// revision it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LockedProject {
    /// The pinned version.
    pub version: Version,
    /// The revision the version resolved to, if recorded.
    pub revision: Option<Revision>,
}

impl Lock {
    /// An empty lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins `name` to `version` with no recorded revision.
    pub fn pin(&mut self, name: impl Into<ProjectName>, version: Version) {
        self.projects.insert(
            name.into(),
            LockedProject {
                version,
                revision: None,
            },
        );
    }

    /// The lock entry for `name`, if any.
    pub fn get(&self, name: &ProjectName) -> Option<&LockedProject> {
        self.projects.get(name)
    }
}

impl LockedProject {
    /// Whether `candidate` is the version this entry pins: it matches the
    /// locked version, or carries the locked revision.
    pub fn pins(&self, candidate: &Version) -> bool {
        if self.version.matches(candidate) {
            return true;
        }
        match (&self.revision, candidate.revision()) {
            (Some(locked), Some(rev)) => locked == rev,
            _ => false,
        }
    }
}

impl From<&Solution> for Lock {
    fn from(solution: &Solution) -> Self {
        Lock {
            projects: solution
                .projects
                .iter()
                .map(|(name, version)| {
                    (
                        name.clone(),
                        LockedProject {
                            version: version.clone(),
                            revision: version.revision().cloned(),
                        },
                    )
                })
                .collect(),
        }
    }
}

// TESTS #######################################################################

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_entry_pins_by_version_or_revision() {
        let rev = Revision::new("abc");
        let entry = LockedProject {
            version: Version::semver(1, 0, 0),
            revision: Some(rev.clone()),
        };
        assert!(entry.pins(&Version::semver(1, 0, 0)));
        assert!(entry.pins(&Version::semver(1, 0, 0).pair(rev.clone())));
        assert!(entry.pins(&Version::Revision(rev)));
        assert!(!entry.pins(&Version::semver(1, 1, 0)));
    }

    #[test]
    fn lock_from_solution_records_revisions() {
        let rev = Revision::new("abc");
        let mut projects = BTreeMap::new();
        projects.insert(
            ProjectName::new("a"),
            Version::semver(1, 0, 0).pair(rev.clone()),
        );
        projects.insert(ProjectName::new("b"), Version::semver(2, 0, 0));
        let solution = Solution {
            projects,
            attempts: 2,
            backtracks: 0,
        };
        let lock = Lock::from(&solution);
        assert_eq!(lock.get(&ProjectName::new("a")).unwrap().revision, Some(rev));
        assert_eq!(lock.get(&ProjectName::new("b")).unwrap().revision, None);
    }
}

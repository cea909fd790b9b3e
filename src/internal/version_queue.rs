// SPDX-License-Identifier: MPL-2.0

//! The candidate cursor for one project.

use crate::project::ProjectName;
use crate::version::Version;

/// The ordered candidate versions of one project, with a cursor over the
/// one currently being attempted. The cursor only ever advances; versions
/// skipped under one search state are not revisited when backtracking
/// relaxes constraints later.
#[derive(Debug, Clone)]
pub struct VersionQueue {
    pub name: ProjectName,
    versions: Vec<Version>,
    cursor: usize,
}

impl VersionQueue {
    /// A queue over `versions` in the order they should be attempted.
    pub fn new(name: ProjectName, versions: Vec<Version>) -> Self {
        Self {
            name,
            versions,
            cursor: 0,
        }
    }

    /// The candidate under the cursor, if any remain.
    pub fn current(&self) -> Option<&Version> {
        self.versions.get(self.cursor)
    }

    /// Moves the cursor past the current candidate and returns the next.
    pub fn advance(&mut self) -> Option<&Version> {
        if self.cursor < self.versions.len() {
            self.cursor += 1;
        }
        self.current()
    }

    /// Every candidate the queue was created with.
    pub fn all(&self) -> &[Version] {
        &self.versions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_advances_to_exhaustion() {
        let mut q = VersionQueue::new(
            ProjectName::new("a"),
            vec![Version::semver(1, 1, 0), Version::semver(1, 0, 0)],
        );
        assert_eq!(q.current(), Some(&Version::semver(1, 1, 0)));
        assert_eq!(q.advance(), Some(&Version::semver(1, 0, 0)));
        assert_eq!(q.advance(), None);
        assert_eq!(q.advance(), None);
        assert_eq!(q.all().len(), 2);
    }
}

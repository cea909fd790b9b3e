// SPDX-License-Identifier: MPL-2.0

//! Projects, atoms, packages, and manifests.
//!
//! A project is identified by a slash-delimited root path such as
//! `github.com/x/y`. Its packages live at that path or below it, and are
//! keyed by their full import path.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use crate::constraint::Constraint;
use crate::version::Version;

/// The identity of a project: its root import path. Equality is byte-exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ProjectName(String);

impl ProjectName {
    /// Creates a project name from its root import path.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// The root import path.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `path` belongs to this project: it equals the root path, or
    /// extends it past a `/` separator. `foobar` is not owned by `foo`;
    /// only `foo` itself and `foo/...` are.
    pub fn owns(&self, path: &str) -> bool {
        match path.strip_prefix(self.0.as_str()) {
            Some("") => true,
            Some(rest) => rest.starts_with('/'),
            None => false,
        }
    }
}

impl From<&str> for ProjectName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ProjectName {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A `(project, version)` pair: one candidate for, or member of, a solution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProjectAtom {
    /// The project.
    pub name: ProjectName,
    /// The pinned version.
    pub version: Version,
}

impl Display for ProjectAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// A single package of a project: its full import path and the import
/// paths appearing in its non-ignored source files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    /// Full import path; begins with the owning project's root path, or
    /// equals it.
    pub path: String,
    /// Imports declared by the package's source files, internal and
    /// external alike.
    pub imports: Vec<String>,
}

impl Package {
    /// Creates a package from its path and imports.
    pub fn new(
        path: impl Into<String>,
        imports: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            path: path.into(),
            imports: imports.into_iter().map(Into::into).collect(),
        }
    }
}

/// The constraints a project's manifest declares on other projects at one
/// of its versions.
///
/// A declared constraint is dormant until some package of the target
/// project is actually reached through imports; the solver activates it
/// only then.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    /// Declared constraints, keyed by target project.
    pub constraints: BTreeMap<ProjectName, Constraint>,
}

impl Manifest {
    /// An empty manifest declaring nothing.
    pub fn new() -> Self {
        Self::default()
    }
}

impl FromIterator<(ProjectName, Constraint)> for Manifest {
    fn from_iter<I: IntoIterator<Item = (ProjectName, Constraint)>>(iter: I) -> Self {
        Self {
            constraints: iter.into_iter().collect(),
        }
    }
}

/// The root project's identity and declared constraints, as handed to
/// [`solve`](crate::solver::solve). The root's packages are obtained from
/// the source manager, which ignores the version argument for the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootManifest {
    /// The root project.
    pub name: ProjectName,
    /// Constraints declared by the root manifest.
    pub constraints: BTreeMap<ProjectName, Constraint>,
}

impl RootManifest {
    /// A root manifest with no declared constraints.
    pub fn new(name: impl Into<ProjectName>) -> Self {
        Self {
            name: name.into(),
            constraints: BTreeMap::new(),
        }
    }

    /// Adds a declared constraint on `target`.
    pub fn with_constraint(
        mut self,
        target: impl Into<ProjectName>,
        constraint: Constraint,
    ) -> Self {
        self.constraints.insert(target.into(), constraint);
        self
    }
}

// TESTS #######################################################################

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ownership_requires_slash_separator() {
        let foo = ProjectName::new("foo");
        assert!(foo.owns("foo"));
        assert!(foo.owns("foo/bar"));
        assert!(foo.owns("foo/bar/baz"));
        assert!(!foo.owns("foobar"));
        assert!(!foo.owns("fo"));
        assert!(!foo.owns("bar/foo"));
    }

    #[test]
    fn ownership_of_nested_roots() {
        let nested = ProjectName::new("github.com/x/y");
        assert!(nested.owns("github.com/x/y/internal/z"));
        assert!(!nested.owns("github.com/x/yy"));
    }
}

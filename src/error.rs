// SPDX-License-Identifier: MPL-2.0

//! Handling solver errors.

use thiserror::Error;

use crate::constraint::Constraint;
use crate::project::{ProjectAtom, ProjectName};
use crate::version::Version;

/// Errors that may occur while solving dependencies.
///
/// [`MissingPackage`](SolveError::MissingPackage) and
/// [`ConstraintConflict`](SolveError::ConstraintConflict) arise during
/// candidate propagation and are normally consumed by the backtracker;
/// a caller only ever observes them through trace output. What escapes a
/// solve is [`NoViableVersion`](SolveError::NoViableVersion) once search
/// is exhausted, a non-recoverable
/// [`SourceManager`](SolveError::SourceManager) failure,
/// [`Exhausted`](SolveError::Exhausted), or
/// [`Cancelled`](SolveError::Cancelled).
#[derive(Error, Debug)]
pub enum SolveError {
    /// Every candidate version of a project failed its constraint or
    /// package-presence checks. Reported against the root-most project
    /// whose candidates were fully tried.
    #[error("no version of {project} satisfies {constraint} ({} candidates tried)", .tried.len())]
    NoViableVersion {
        /// The project with no admissible candidate left.
        project: ProjectName,
        /// The accumulated constraint active when candidates ran out.
        constraint: Constraint,
        /// The candidates that were tried, in enumeration order.
        tried: Vec<Version>,
    },

    /// A required package was absent from the selected version.
    #[error("{atom} has no package {package}")]
    MissingPackage {
        /// The atom whose package list was consulted.
        atom: ProjectAtom,
        /// The absent package path.
        package: String,
    },

    /// The constraints declared on a project admit no common version.
    #[error("constraints on {project} from {} declarers are mutually unsatisfiable", .entries.len())]
    ConstraintConflict {
        /// The over-constrained project.
        project: ProjectName,
        /// Every declarer and the constraint it contributed.
        entries: Vec<(ProjectAtom, Constraint)>,
    },

    /// The source manager failed. `NotFound` failures are absorbed into
    /// the search as conflicts; network and malformed-data failures
    /// propagate here.
    #[error(transparent)]
    SourceManager(#[from] SourceError),

    /// The configured attempt budget ran out before a solution was found.
    #[error("gave up after {attempts} solve attempts")]
    Exhausted {
        /// The attempt budget that was exceeded.
        attempts: u32,
    },

    /// The cancellation signal was observed.
    #[error("solve cancelled")]
    Cancelled,
}

/// A failure reported by a [`SourceManager`](crate::solver::SourceManager)
/// operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} for {project}: {detail}")]
pub struct SourceError {
    /// What went wrong.
    pub kind: SourceErrorKind,
    /// The project the operation concerned.
    pub project: ProjectName,
    /// Human-readable detail.
    pub detail: String,
}

impl SourceError {
    /// A `NotFound` failure.
    pub fn not_found(project: impl Into<ProjectName>, detail: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::NotFound,
            project: project.into(),
            detail: detail.into(),
        }
    }

    /// A `NetworkFailure`.
    pub fn network(project: impl Into<ProjectName>, detail: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::NetworkFailure,
            project: project.into(),
            detail: detail.into(),
        }
    }

    /// A `Malformed` failure.
    pub fn malformed(project: impl Into<ProjectName>, detail: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Malformed,
            project: project.into(),
            detail: detail.into(),
        }
    }
}

/// The kind of a [`SourceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// The project, version, or import path is unknown to the source of
    /// truth. Recoverable: the solver folds it into the search.
    NotFound,
    /// Fetching from the source of truth failed or timed out.
    NetworkFailure,
    /// The source of truth returned data it could not interpret.
    Malformed,
}

impl std::fmt::Display for SourceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceErrorKind::NotFound => f.write_str("not found"),
            SourceErrorKind::NetworkFailure => f.write_str("network failure"),
            SourceErrorKind::Malformed => f.write_str("malformed data"),
        }
    }
}

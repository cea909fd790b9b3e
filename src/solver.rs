// SPDX-License-Identifier: MPL-2.0

//! Bimodal version solving.
//!
//! Dependencies here are bimodal: a project's dependency surface is not
//! fixed by its manifest alone but discovered incrementally, as specific
//! packages of the project become reachable through imports from the root.
//! Selecting a version of one project can therefore surface brand-new
//! demands on packages of projects selected long before, and manifest
//! constraints stay dormant until a package of their target project is
//! actually reached.
//!
//! ## API
//!
//! ```
//! use bimodal::project::{Package, ProjectName, RootManifest};
//! use bimodal::solver::{solve, OfflineSourceManager, SolveOptions};
//! use bimodal::version::Version;
//!
//! let mut source_manager = OfflineSourceManager::new();
//! source_manager.add_project(
//!     ProjectName::new("root"),
//!     Version::semver(0, 0, 0),
//!     Vec::new(),
//!     vec![Package::new("root", ["a"])],
//! );
//! source_manager.add_project(
//!     ProjectName::new("a"),
//!     Version::semver(1, 0, 0),
//!     Vec::new(),
//!     vec![Package::new("a", Vec::<String>::new())],
//! );
//!
//! let solution = solve(
//!     RootManifest::new("root"),
//!     &source_manager,
//!     SolveOptions::default(),
//! )
//! .unwrap();
//! assert_eq!(
//!     solution.projects[&ProjectName::new("a")],
//!     Version::semver(1, 0, 0),
//! );
//! ```
//!
//! The [`SourceManager`] supplies candidate versions, per-version package
//! lists, manifests, and external-reach data. [`OfflineSourceManager`] is
//! the in-memory implementation; real implementations typically sit on
//! top of version control checkouts and an
//! [`ImportScanner`](crate::scanner::ImportScanner).

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::constraint::Constraint;
use crate::error::{SolveError, SourceError};
use crate::internal::core::SolverCore;
use crate::lock::{Lock, Solution};
use crate::project::{Manifest, Package, ProjectName, RootManifest};
use crate::reach::{self, ReachMap};
use crate::type_aliases::Map;
use crate::version::Version;

/// Main function of the library. Finds one version per project
/// transitively required by the root's imports, such that every import is
/// satisfiable and every activated constraint holds.
pub fn solve<S: SourceManager>(
    root_manifest: RootManifest,
    source_manager: &S,
    options: SolveOptions,
) -> Result<Solution, SolveError> {
    SolverCore::new(root_manifest, source_manager, options).solve()
}

/// Knobs for one solve.
#[derive(Default)]
pub struct SolveOptions {
    /// Enumerate candidates oldest-first instead of newest-first.
    pub downgrade: bool,
    /// Ignore the lock entirely, letting every project move.
    pub change_all: bool,
    /// Abort with [`SolveError::Exhausted`] after this many candidate
    /// attempts. Zero means unbounded.
    pub max_attempts: u32,
    /// A prior solve result used to bias candidate order. Advisory only:
    /// an entry that no longer satisfies the active constraints is
    /// skipped, never an error.
    pub lock: Option<Lock>,
    /// Receives one line per solver transition. The same lines are
    /// emitted at `debug` level on the `log` facade.
    pub trace_sink: Option<Box<dyn io::Write>>,
    /// Polled between state transitions and once per candidate; setting
    /// it makes the solve return [`SolveError::Cancelled`].
    pub cancel: Option<Arc<AtomicBool>>,
}

/// The capability surface the solver consumes from a source of truth.
///
/// Implementations may parallelize and cache internally however they
/// like; the solver treats every call as a synchronous oracle and
/// memoizes answers per `(project, version)` for the duration of one
/// solve. All operations fail with a [`SourceError`]; `NotFound` failures
/// are folded into the search, the other kinds abort it.
pub trait SourceManager {
    /// All candidate versions of a project, in the manager's natural
    /// order. The solver applies the enumeration policy and lock bias on
    /// top.
    fn list_versions(&self, name: &ProjectName) -> Result<Vec<Version>, SourceError>;

    /// The packages of a project at a pinned version, keyed by full
    /// import path. For the root project the version argument is ignored.
    fn list_packages(
        &self,
        name: &ProjectName,
        version: &Version,
    ) -> Result<BTreeMap<String, Package>, SourceError>;

    /// The constraints declared by the project's manifest at a pinned
    /// version.
    fn project_manifest(
        &self,
        name: &ProjectName,
        version: &Version,
    ) -> Result<Manifest, SourceError>;

    /// For each package of the project at a pinned version, the set of
    /// external imports transitively reachable from it. See
    /// [`reach::external_reach`].
    fn external_reach(
        &self,
        name: &ProjectName,
        version: &Version,
    ) -> Result<ReachMap, SourceError>;

    /// The root of the project owning an import path. Consulted only when
    /// no already-known project root owns the path.
    fn deduce_project_root(&self, import_path: &str) -> Result<ProjectName, SourceError>;

    /// Whether the project's repository exists at all. Advisory; used to
    /// reject deduced roots early.
    fn repo_exists(&self, name: &ProjectName) -> Result<bool, SourceError>;

    /// A local directory already holding this project at this version, if
    /// the manager knows of one. Advisory; the solver never requires it.
    fn vendor_hint(&self, _name: &ProjectName, _version: &Version) -> Option<PathBuf> {
        None
    }
}

/// An in-memory [`SourceManager`].
///
/// Projects are registered one `(name, version)` at a time, in insertion
/// order. The first registered project is treated as the root:
/// [`list_packages`](SourceManager::list_packages) ignores the version
/// argument for it, because the root is pinned to a synthetic version.
/// Reach maps are derived lazily through
/// [`reach::external_reach`] and memoized write-once per
/// `(name, version)`.
#[derive(Debug, Clone, Default)]
pub struct OfflineSourceManager {
    records: Vec<ProjectRecord>,
    reach_cache: RefCell<Map<(ProjectName, Version), ReachMap>>,
}

#[derive(Debug, Clone)]
struct ProjectRecord {
    name: ProjectName,
    version: Version,
    manifest: Manifest,
    packages: BTreeMap<String, Package>,
}

impl OfflineSourceManager {
    /// Creates an empty manager with no projects.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the packages and declared constraints of one project
    /// version. The first registration overall becomes the root project.
    pub fn add_project(
        &mut self,
        name: ProjectName,
        version: Version,
        constraints: impl IntoIterator<Item = (ProjectName, Constraint)>,
        packages: impl IntoIterator<Item = Package>,
    ) {
        self.records.push(ProjectRecord {
            name,
            version,
            manifest: constraints.into_iter().collect(),
            packages: packages
                .into_iter()
                .map(|pkg| (pkg.path.clone(), pkg))
                .collect(),
        });
    }

    fn find(&self, name: &ProjectName, version: &Version) -> Option<&ProjectRecord> {
        self.records
            .iter()
            .enumerate()
            .find(|(idx, record)| {
                // The root (first record) answers for any version.
                record.name == *name && (*idx == 0 || record.version.matches(version))
            })
            .map(|(_, record)| record)
    }
}

impl SourceManager for OfflineSourceManager {
    fn list_versions(&self, name: &ProjectName) -> Result<Vec<Version>, SourceError> {
        let versions: Vec<Version> = self
            .records
            .iter()
            .filter(|r| r.name == *name)
            .map(|r| r.version.clone())
            .collect();
        if versions.is_empty() {
            return Err(SourceError::not_found(name.clone(), "no such project"));
        }
        Ok(versions)
    }

    fn list_packages(
        &self,
        name: &ProjectName,
        version: &Version,
    ) -> Result<BTreeMap<String, Package>, SourceError> {
        self.find(name, version)
            .map(|r| r.packages.clone())
            .ok_or_else(|| {
                SourceError::not_found(name.clone(), format!("no version {version}"))
            })
    }

    fn project_manifest(
        &self,
        name: &ProjectName,
        version: &Version,
    ) -> Result<Manifest, SourceError> {
        self.find(name, version)
            .map(|r| r.manifest.clone())
            .ok_or_else(|| {
                SourceError::not_found(name.clone(), format!("no version {version}"))
            })
    }

    fn external_reach(
        &self,
        name: &ProjectName,
        version: &Version,
    ) -> Result<ReachMap, SourceError> {
        let key = (name.clone(), version.clone());
        if let Some(cached) = self.reach_cache.borrow().get(&key) {
            return Ok(cached.clone());
        }
        let record = self.find(name, version).ok_or_else(|| {
            SourceError::not_found(name.clone(), format!("no version {version}"))
        })?;
        let packages: Vec<Package> = record.packages.values().cloned().collect();
        let computed = reach::external_reach(&record.name, &packages);
        self.reach_cache
            .borrow_mut()
            .insert(key, computed.clone());
        Ok(computed)
    }

    fn deduce_project_root(&self, import_path: &str) -> Result<ProjectName, SourceError> {
        let mut best: Option<&ProjectName> = None;
        for record in &self.records {
            if record.name.owns(import_path)
                && best.map_or(true, |b| record.name.as_str().len() > b.as_str().len())
            {
                best = Some(&record.name);
            }
        }
        best.cloned().ok_or_else(|| {
            SourceError::not_found(
                ProjectName::new(import_path),
                "no project owns this import path",
            )
        })
    }

    fn repo_exists(&self, name: &ProjectName) -> Result<bool, SourceError> {
        Ok(self.records.iter().any(|r| r.name == *name))
    }
}

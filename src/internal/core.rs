// SPDX-License-Identifier: MPL-2.0

//! The solver state machine.
//!
//! Drives the search: picks the next demanded project, walks its candidate
//! versions in policy order, propagates package reach and manifest
//! constraints for each candidate, and rewinds chronologically when a
//! candidate queue runs dry. Every candidate attempt is planned without
//! side effects first and committed only when all of its checks pass, so
//! a rejected candidate leaves no trace in the selection store.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::io::Write;
use std::rc::Rc;
use std::sync::atomic::Ordering;

use log::debug;

use crate::constraint::Constraint;
use crate::error::{SolveError, SourceError, SourceErrorKind};
use crate::internal::selection::{Declaration, Dependency, Selection};
use crate::internal::version_queue::VersionQueue;
use crate::lock::Solution;
use crate::project::{Package, ProjectAtom, ProjectName, RootManifest};
use crate::reach::ReachMap;
use crate::solver::{SolveOptions, SourceManager};
use crate::type_aliases::Map;
use crate::version::{sort_for_downgrade, sort_for_upgrade, Version};

/// A failed operation inside the search: either a conflict the
/// backtracker absorbs, or a fatal error that ends the solve.
enum Fail {
    Conflict(SolveError),
    Fatal(SolveError),
}

impl Fail {
    fn into_error(self) -> SolveError {
        match self {
            Fail::Conflict(e) | Fail::Fatal(e) => e,
        }
    }
}

impl From<SourceError> for Fail {
    fn from(e: SourceError) -> Self {
        match e.kind {
            SourceErrorKind::NotFound => Fail::Conflict(SolveError::SourceManager(e)),
            _ => Fail::Fatal(SolveError::SourceManager(e)),
        }
    }
}

/// One selection-stack entry of a validated attempt, with the records
/// attributed to it.
struct PlanUnit {
    atom: ProjectAtom,
    packages: BTreeSet<String>,
    pins_version: bool,
    deps: Vec<(ProjectName, Dependency)>,
    decls: Vec<(ProjectName, Declaration)>,
}

/// A fully validated attempt, ready to commit. Unit 0 pins the candidate;
/// later units are package expansions of already-selected projects whose
/// reach the candidate extended.
struct Plan {
    units: Vec<PlanUnit>,
}

/// Per-entry search state alongside the selection stack: the candidate
/// queue of a version-pinning entry.
struct Frame {
    queue: Option<VersionQueue>,
}

pub struct SolverCore<'a, S: SourceManager> {
    sm: &'a S,
    root: RootManifest,
    opts: SolveOptions,
    sel: Selection,
    frames: Vec<Frame>,
    attempts: u32,
    backtracks: u32,
    // Memoized source manager answers, keyed for the lifetime of the solve.
    versions: Map<ProjectName, Rc<Vec<Version>>>,
    packages: Map<(ProjectName, Version), Rc<BTreeMap<String, Package>>>,
    reach: Map<(ProjectName, Version), Rc<ReachMap>>,
    constraints: Map<(ProjectName, Version), Rc<BTreeMap<ProjectName, Constraint>>>,
    deduced: Map<String, ProjectName>,
}

impl<'a, S: SourceManager> SolverCore<'a, S> {
    pub fn new(root: RootManifest, source_manager: &'a S, options: SolveOptions) -> Self {
        Self {
            sm: source_manager,
            root,
            opts: options,
            sel: Selection::new(),
            frames: Vec::new(),
            attempts: 0,
            backtracks: 0,
            versions: Map::default(),
            packages: Map::default(),
            reach: Map::default(),
            constraints: Map::default(),
            deduced: Map::default(),
        }
    }

    pub fn solve(mut self) -> Result<Solution, SolveError> {
        let root_name = self.root.name.clone();
        self.trace_line(format_args!("solve {root_name}"));
        self.select_root()?;
        loop {
            self.check_cancelled()?;
            let Some(name) = self.next_unresolved()? else {
                break;
            };
            let queue = VersionQueue::new(name.clone(), self.candidates(&name)?);
            self.select_project(queue)?;
        }
        let mut projects = BTreeMap::new();
        for (name, version) in self.sel.selections() {
            if name != &self.root.name {
                projects.insert(name.clone(), version.clone());
            }
        }
        let (attempts, backtracks) = (self.attempts, self.backtracks);
        self.trace_line(format_args!(
            "solution found: {} projects, {attempts} attempts, {backtracks} backtracks",
            projects.len(),
        ));
        Ok(Solution {
            projects,
            attempts,
            backtracks,
        })
    }

    // State transitions #######################################################

    /// Pushes the root atom with its full package set as required. The
    /// root is pinned to a synthetic version; failures here happen before
    /// any search exists to absorb them, so they escape directly.
    fn select_root(&mut self) -> Result<(), SolveError> {
        let atom = ProjectAtom {
            name: self.root.name.clone(),
            version: Version::semver(0, 0, 0),
        };
        let plan = self.plan_attempt(&atom).map_err(Fail::into_error)?;
        self.trace_line(format_args!("✓ select {} (root)", atom.name));
        self.commit(plan, None);
        Ok(())
    }

    /// Walks `queue` until a candidate commits, then hands control back to
    /// the main loop; an exhausted queue triggers backtracking.
    fn select_project(&mut self, mut queue: VersionQueue) -> Result<(), SolveError> {
        loop {
            self.check_cancelled()?;
            let Some(version) = queue.current().cloned() else {
                self.trace_line(format_args!("✗ {} has no viable version left", queue.name));
                return self.backtrack(queue);
            };
            let atom = ProjectAtom {
                name: queue.name.clone(),
                version,
            };
            self.count_attempt()?;
            match self.plan_attempt(&atom) {
                Ok(plan) => {
                    self.trace_line(format_args!("✓ select {atom}"));
                    self.commit(plan, Some(queue));
                    return Ok(());
                }
                Err(Fail::Fatal(e)) => return Err(e),
                Err(Fail::Conflict(reason)) => {
                    self.trace_line(format_args!("✗ reject {atom}: {reason}"));
                    queue.advance();
                }
            }
        }
    }

    /// Chronological rewind: unselects entries from the top of the stack
    /// until one of them can advance to a fresh candidate. When the whole
    /// stack is unwound the solve fails, reporting the root-most project
    /// whose candidates were fully tried.
    fn backtrack(&mut self, exhausted: VersionQueue) -> Result<(), SolveError> {
        let mut report = self.no_viable_version(&exhausted);
        loop {
            self.check_cancelled()?;
            if self.frames.len() <= 1 {
                // Only the root remains.
                return Err(report);
            }
            let frame = self.frames.pop().expect("frame stack is non-empty");
            let popped = self
                .sel
                .pop_entry()
                .expect("selection stack mirrors the frame stack");
            self.trace_line(format_args!(
                "← unselect {} (depth {})",
                popped.atom, popped.depth
            ));
            if popped.pins_version {
                self.backtracks += 1;
            }
            let Some(mut queue) = frame.queue else {
                continue;
            };
            queue.advance();
            loop {
                self.check_cancelled()?;
                let Some(version) = queue.current().cloned() else {
                    break;
                };
                let atom = ProjectAtom {
                    name: queue.name.clone(),
                    version,
                };
                self.count_attempt()?;
                match self.plan_attempt(&atom) {
                    Ok(plan) => {
                        self.trace_line(format_args!("✓ select {atom} (after backtrack)"));
                        self.commit(plan, Some(queue));
                        return Ok(());
                    }
                    Err(Fail::Fatal(e)) => return Err(e),
                    Err(Fail::Conflict(reason)) => {
                        self.trace_line(format_args!("✗ reject {atom}: {reason}"));
                        queue.advance();
                    }
                }
            }
            report = self.no_viable_version(&queue);
        }
    }

    fn no_viable_version(&self, queue: &VersionQueue) -> SolveError {
        SolveError::NoViableVersion {
            project: queue.name.clone(),
            constraint: self.sel.accumulated_constraint(&queue.name),
            tried: queue.all().to_vec(),
        }
    }

    /// The fail-fast pick: among demanded-but-unselected projects, the one
    /// with the fewest candidates admitted by its accumulated constraint,
    /// ties broken by first-demand order.
    fn next_unresolved(&mut self) -> Result<Option<ProjectName>, SolveError> {
        let mut pending = self.sel.unresolved();
        if pending.is_empty() {
            return Ok(None);
        }
        pending.sort_by_key(|(_, seq)| *seq);
        let mut best: Option<(usize, ProjectName)> = None;
        for (name, _) in pending {
            let constraint = self.sel.accumulated_constraint(&name);
            let viable = self
                .versions_of(&name)?
                .iter()
                .filter(|v| constraint.matches(v))
                .count();
            match &best {
                Some((count, _)) if *count <= viable => {}
                _ => best = Some((viable, name)),
            }
        }
        Ok(best.map(|(_, name)| name))
    }

    // Candidate propagation ###################################################

    /// Validates one candidate without mutating anything: package
    /// presence, external-reach expansion (transitively, including fresh
    /// packages of already-selected projects), and manifest-constraint
    /// admission.
    fn plan_attempt(&mut self, atom: &ProjectAtom) -> Result<Plan, Fail> {
        let is_root = atom.name == self.root.name;
        let pkg_list = self.packages_of(atom)?;

        let required: BTreeSet<String> = if is_root {
            pkg_list.keys().cloned().collect()
        } else {
            let constraint = self.sel.accumulated_constraint(&atom.name);
            if !constraint.matches(&atom.version) {
                return Err(Fail::Conflict(SolveError::NoViableVersion {
                    project: atom.name.clone(),
                    constraint,
                    tried: vec![atom.version.clone()],
                }));
            }
            self.sel.required_packages(&atom.name)
        };
        for pkg in &required {
            if !pkg_list.contains_key(pkg) {
                return Err(Fail::Conflict(SolveError::MissingPackage {
                    atom: atom.clone(),
                    package: pkg.clone(),
                }));
            }
        }

        let mut units = vec![PlanUnit {
            atom: atom.clone(),
            packages: required.clone(),
            pins_version: true,
            deps: Vec::new(),
            decls: Vec::new(),
        }];
        // Packages of selected projects already claimed by this plan.
        let mut planned: Map<ProjectName, BTreeSet<String>> = Map::default();
        let mut work: VecDeque<(usize, ProjectAtom, BTreeSet<String>)> =
            VecDeque::from([(0, atom.clone(), required)]);

        while let Some((unit_idx, watom, wpkgs)) = work.pop_front() {
            let reach = self.reach_of(&watom)?;
            let mut grouped: BTreeMap<ProjectName, BTreeSet<String>> = BTreeMap::new();
            for pkg in &wpkgs {
                // A package absent from the reach map has empty reach.
                let Some(imports) = reach.get(pkg) else {
                    continue;
                };
                for import in imports {
                    let target = self.deduce(import)?;
                    if target == watom.name {
                        continue;
                    }
                    grouped
                        .entry(target)
                        .or_default()
                        .insert(import.clone());
                }
            }

            for (target, tpkgs) in grouped {
                if target == atom.name {
                    // An expansion reached back into the candidate itself.
                    for pkg in &tpkgs {
                        if !pkg_list.contains_key(pkg) {
                            return Err(Fail::Conflict(SolveError::MissingPackage {
                                atom: atom.clone(),
                                package: pkg.clone(),
                            }));
                        }
                    }
                    let fresh: BTreeSet<String> = tpkgs
                        .iter()
                        .filter(|p| !units[0].packages.contains(*p))
                        .cloned()
                        .collect();
                    units[unit_idx].deps.push((
                        target,
                        Dependency {
                            depender: watom.clone(),
                            packages: tpkgs.clone(),
                            constraint: Constraint::Any,
                        },
                    ));
                    if !fresh.is_empty() {
                        units[0].packages.extend(fresh.iter().cloned());
                        work.push_back((0, atom.clone(), fresh));
                    }
                    continue;
                }

                if let Some(selected) = self.sel.selected_version(&target).cloned() {
                    let tatom = ProjectAtom {
                        name: target.clone(),
                        version: selected,
                    };
                    let tlist = self.packages_of(&tatom)?;
                    for pkg in &tpkgs {
                        if !tlist.contains_key(pkg) {
                            return Err(Fail::Conflict(SolveError::MissingPackage {
                                atom: tatom.clone(),
                                package: pkg.clone(),
                            }));
                        }
                    }
                    let committed = self.sel.propagated_packages(&target);
                    let already = planned.entry(target.clone()).or_default();
                    let fresh: BTreeSet<String> = tpkgs
                        .iter()
                        .filter(|p| !committed.contains(*p) && !already.contains(*p))
                        .cloned()
                        .collect();
                    already.extend(fresh.iter().cloned());
                    units[unit_idx].deps.push((
                        target,
                        Dependency {
                            depender: watom.clone(),
                            packages: tpkgs.clone(),
                            constraint: Constraint::Any,
                        },
                    ));
                    if !fresh.is_empty() {
                        let next_idx = units.len();
                        units.push(PlanUnit {
                            atom: tatom.clone(),
                            packages: fresh.clone(),
                            pins_version: false,
                            deps: Vec::new(),
                            decls: Vec::new(),
                        });
                        work.push_back((next_idx, tatom, fresh));
                    }
                } else {
                    units[unit_idx].deps.push((
                        target,
                        Dependency {
                            depender: watom.clone(),
                            packages: tpkgs,
                            constraint: Constraint::Any,
                        },
                    ));
                }
            }
        }

        // Manifest-declared constraints. Activation is handled by the
        // store: a declaration participates only while its target has an
        // import-driven demand. What must be checked here is admission
        // against already-pinned versions.
        let declared = if is_root {
            Rc::new(self.root.constraints.clone())
        } else {
            self.constraints_of(atom)?
        };
        for (target, constraint) in declared.iter() {
            if target == &self.root.name || target == &atom.name {
                continue;
            }
            if let Some(selected) = self.sel.selected_version(target) {
                if !constraint.matches(selected) {
                    let mut entries = self.sel.constraint_entries(target);
                    entries.push((atom.clone(), constraint.clone()));
                    return Err(Fail::Conflict(SolveError::ConstraintConflict {
                        project: target.clone(),
                        entries,
                    }));
                }
            }
            units[0].decls.push((
                target.clone(),
                Declaration {
                    declarer: atom.clone(),
                    constraint: constraint.clone(),
                },
            ));
        }

        Ok(Plan { units })
    }

    /// Applies a validated plan to the selection store. `queue` is parked
    /// with the version-pinning entry for later backtracking.
    fn commit(&mut self, plan: Plan, queue: Option<VersionQueue>) {
        let mut queue = queue;
        for unit in plan.units {
            self.sel
                .push_entry(unit.atom, unit.packages, unit.pins_version);
            self.frames.push(Frame {
                queue: queue.take(),
            });
            for (target, dep) in unit.deps {
                self.sel.add_dependency(target, dep);
            }
            for (target, decl) in unit.decls {
                self.sel.add_declaration(target, decl);
            }
        }
        debug_assert_eq!(self.frames.len() as u32, self.sel.depth());
    }

    // Source manager access ###################################################

    /// Candidate versions in attempt order: policy-sorted, with a lock
    /// pin promoted to the front unless `change_all` disables the lock.
    fn candidates(&mut self, name: &ProjectName) -> Result<Vec<Version>, SolveError> {
        let raw = self.versions_of(name)?;
        let mut ordered = (*raw).clone();
        if self.opts.downgrade {
            sort_for_downgrade(&mut ordered);
        } else {
            sort_for_upgrade(&mut ordered);
        }
        if !self.opts.change_all {
            if let Some(entry) = self.opts.lock.as_ref().and_then(|l| l.get(name)) {
                let (mut pinned, rest): (Vec<_>, Vec<_>) =
                    ordered.into_iter().partition(|v| entry.pins(v));
                pinned.extend(rest);
                ordered = pinned;
            }
        }
        Ok(ordered)
    }

    fn versions_of(&mut self, name: &ProjectName) -> Result<Rc<Vec<Version>>, SolveError> {
        if let Some(cached) = self.versions.get(name) {
            return Ok(cached.clone());
        }
        let list = match self.sm.list_versions(name) {
            Ok(list) => list,
            // An unknown project has no candidates; the search handles it.
            Err(e) if e.kind == SourceErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(SolveError::SourceManager(e)),
        };
        let cached = Rc::new(list);
        self.versions.insert(name.clone(), cached.clone());
        Ok(cached)
    }

    fn packages_of(
        &mut self,
        atom: &ProjectAtom,
    ) -> Result<Rc<BTreeMap<String, Package>>, Fail> {
        let key = (atom.name.clone(), atom.version.clone());
        if let Some(cached) = self.packages.get(&key) {
            return Ok(cached.clone());
        }
        let map = self.sm.list_packages(&atom.name, &atom.version)?;
        let cached = Rc::new(map);
        self.packages.insert(key, cached.clone());
        Ok(cached)
    }

    fn reach_of(&mut self, atom: &ProjectAtom) -> Result<Rc<ReachMap>, Fail> {
        let key = (atom.name.clone(), atom.version.clone());
        if let Some(cached) = self.reach.get(&key) {
            return Ok(cached.clone());
        }
        let map = self.sm.external_reach(&atom.name, &atom.version)?;
        let cached = Rc::new(map);
        self.reach.insert(key, cached.clone());
        Ok(cached)
    }

    fn constraints_of(
        &mut self,
        atom: &ProjectAtom,
    ) -> Result<Rc<BTreeMap<ProjectName, Constraint>>, Fail> {
        let key = (atom.name.clone(), atom.version.clone());
        if let Some(cached) = self.constraints.get(&key) {
            return Ok(cached.clone());
        }
        let manifest = self.sm.project_manifest(&atom.name, &atom.version)?;
        let cached = Rc::new(manifest.constraints);
        self.constraints.insert(key, cached.clone());
        Ok(cached)
    }

    /// The project owning an import path: the longest currently-known
    /// project root that owns it, falling back to the source manager.
    /// Deductions are cached for the lifetime of the solve.
    fn deduce(&mut self, import: &str) -> Result<ProjectName, Fail> {
        if let Some(known) = self.deduced.get(import) {
            return Ok(known.clone());
        }
        let mut best: Option<ProjectName> = None;
        for name in std::iter::once(&self.root.name).chain(self.sel.demanded_names()) {
            if name.owns(import)
                && best
                    .as_ref()
                    .map_or(true, |b| name.as_str().len() > b.as_str().len())
            {
                best = Some(name.clone());
            }
        }
        let name = match best {
            Some(name) => name,
            None => {
                let name = self.sm.deduce_project_root(import)?;
                if !self.sm.repo_exists(&name)? {
                    return Err(Fail::Conflict(SolveError::SourceManager(
                        SourceError::not_found(name, "repository does not exist"),
                    )));
                }
                name
            }
        };
        self.deduced.insert(import.to_owned(), name.clone());
        Ok(name)
    }

    // Bookkeeping #############################################################

    fn count_attempt(&mut self) -> Result<(), SolveError> {
        self.attempts += 1;
        if self.opts.max_attempts > 0 && self.attempts > self.opts.max_attempts {
            return Err(SolveError::Exhausted {
                attempts: self.opts.max_attempts,
            });
        }
        Ok(())
    }

    fn check_cancelled(&mut self) -> Result<(), SolveError> {
        let cancelled = self
            .opts
            .cancel
            .as_ref()
            .map_or(false, |c| c.load(Ordering::Relaxed));
        if cancelled {
            self.trace_line(format_args!("solve cancelled"));
            return Err(SolveError::Cancelled);
        }
        Ok(())
    }

    fn trace_line(&mut self, args: fmt::Arguments<'_>) {
        debug!("{args}");
        if let Some(sink) = self.opts.trace_sink.as_mut() {
            let _ = writeln!(sink, "{args}");
        }
    }
}

// SPDX-License-Identifier: MPL-2.0

//! The selection and constraint store: the stack of committed atoms, the
//! dependency records binding them together, and the declared constraints
//! waiting for activation.
//!
//! The store is an imperative stack with exact undo. Every entry keeps a
//! log of the records it appended; because entries are removed in strict
//! LIFO order, those records are still at the tail of their vectors when
//! the entry is popped, so `pop_entry` reverses `push_entry` perfectly. A
//! full rewind restores the store to its initial state bit for bit.

use std::collections::BTreeSet;

use crate::constraint::Constraint;
use crate::project::{ProjectAtom, ProjectName};
use crate::type_aliases::Map;
use crate::version::Version;

/// One import-driven demand on a project: who demanded it, which of its
/// packages, and under what constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub depender: ProjectAtom,
    pub packages: BTreeSet<String>,
    pub constraint: Constraint,
}

/// One manifest-declared constraint on a project. Dormant until the
/// target project has at least one import-driven dependency record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub declarer: ProjectAtom,
    pub constraint: Constraint,
}

/// One committed step of the search: either the entry pinning a project's
/// version, or a later package expansion of an already-pinned project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedEntry {
    pub atom: ProjectAtom,
    /// The packages this entry propagated.
    pub packages: BTreeSet<String>,
    /// Search depth at which the entry was added.
    pub depth: u32,
    /// Whether this entry pinned the project's version.
    pub pins_version: bool,
    /// One target per dependency record appended under this entry.
    undo_deps: Vec<ProjectName>,
    /// One target per declaration record appended under this entry.
    undo_decls: Vec<ProjectName>,
    /// Demand-sequence counter before this entry, restored on pop.
    seq_before: u64,
}

/// Summary of a popped entry, for the backtracker and trace output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoppedEntry {
    pub atom: ProjectAtom,
    pub depth: u32,
    pub pins_version: bool,
}

/// The selection and constraint store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    entries: Vec<SelectedEntry>,
    selected: Map<ProjectName, Version>,
    deps: Map<ProjectName, Vec<Dependency>>,
    decls: Map<ProjectName, Vec<Declaration>>,
    /// Sequence number assigned when a project first acquired a
    /// dependency record, for insertion-order tie-breaking.
    first_demand: Map<ProjectName, u64>,
    seq: u64,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current search depth: the number of committed entries.
    pub fn depth(&self) -> u32 {
        self.entries.len() as u32
    }

    /// The pinned version of `name`, if it is selected.
    pub fn selected_version(&self, name: &ProjectName) -> Option<&Version> {
        self.selected.get(name)
    }

    /// Whether `name` currently has any import-driven demand.
    pub fn reached(&self, name: &ProjectName) -> bool {
        self.deps.get(name).map_or(false, |d| !d.is_empty())
    }

    /// Union of the packages demanded of `name` by its dependers.
    pub fn required_packages(&self, name: &ProjectName) -> BTreeSet<String> {
        let mut union = BTreeSet::new();
        if let Some(deps) = self.deps.get(name) {
            for dep in deps {
                union.extend(dep.packages.iter().cloned());
            }
        }
        union
    }

    /// Union of the packages already propagated for a selected `name`,
    /// across its pinning entry and every later expansion.
    pub fn propagated_packages(&self, name: &ProjectName) -> BTreeSet<String> {
        let mut union = BTreeSet::new();
        for entry in &self.entries {
            if &entry.atom.name == name {
                union.extend(entry.packages.iter().cloned());
            }
        }
        union
    }

    /// The intersection of every constraint currently bearing on `name`:
    /// its dependency records always, and its declared constraints only
    /// while the project is reached. This is the activation rule that
    /// keeps dormant constraints out of the problem.
    pub fn accumulated_constraint(&self, name: &ProjectName) -> Constraint {
        let mut acc = Constraint::Any;
        let Some(deps) = self.deps.get(name) else {
            return acc;
        };
        for dep in deps {
            acc = acc.intersect(&dep.constraint);
        }
        if !deps.is_empty() {
            if let Some(decls) = self.decls.get(name) {
                for decl in decls {
                    acc = acc.intersect(&decl.constraint);
                }
            }
        }
        acc
    }

    /// Every non-trivial constraint on `name` with the atom that
    /// contributed it, for conflict reporting.
    pub fn constraint_entries(&self, name: &ProjectName) -> Vec<(ProjectAtom, Constraint)> {
        let mut entries = Vec::new();
        if let Some(deps) = self.deps.get(name) {
            for dep in deps {
                if dep.constraint != Constraint::Any {
                    entries.push((dep.depender.clone(), dep.constraint.clone()));
                }
            }
        }
        if self.reached(name) {
            if let Some(decls) = self.decls.get(name) {
                for decl in decls {
                    entries.push((decl.declarer.clone(), decl.constraint.clone()));
                }
            }
        }
        entries
    }

    /// Every project that currently has a dependency record. Includes
    /// selected projects; their demanders keep records alive.
    pub fn demanded_names(&self) -> impl Iterator<Item = &ProjectName> {
        self.deps
            .iter()
            .filter(|(_, deps)| !deps.is_empty())
            .map(|(name, _)| name)
    }

    /// The selected projects and their pinned versions, in no particular
    /// order.
    pub fn selections(&self) -> impl Iterator<Item = (&ProjectName, &Version)> {
        self.selected.iter()
    }

    /// The demanded-but-unselected projects, each with the sequence
    /// number of its first demand. Unordered; callers sort.
    pub fn unresolved(&self) -> Vec<(ProjectName, u64)> {
        self.deps
            .iter()
            .filter(|(name, deps)| !deps.is_empty() && !self.selected.contains_key(name))
            .map(|(name, _)| {
                let seq = self.first_demand.get(name).copied().unwrap_or(u64::MAX);
                (name.clone(), seq)
            })
            .collect()
    }

    /// Commits an entry at the current depth. Dependency and declaration
    /// records added afterwards are attributed to it until the next push.
    pub fn push_entry(&mut self, atom: ProjectAtom, packages: BTreeSet<String>, pins_version: bool) {
        if pins_version {
            self.selected
                .insert(atom.name.clone(), atom.version.clone());
        }
        self.entries.push(SelectedEntry {
            atom,
            packages,
            depth: self.entries.len() as u32,
            pins_version,
            undo_deps: Vec::new(),
            undo_decls: Vec::new(),
            seq_before: self.seq,
        });
    }

    /// Records a dependency on `target`, attributed to the top entry.
    pub fn add_dependency(&mut self, target: ProjectName, dep: Dependency) {
        let records = self.deps.entry(target.clone()).or_default();
        if records.is_empty() {
            self.first_demand.insert(target.clone(), self.seq);
            self.seq += 1;
        }
        records.push(dep);
        self.entries
            .last_mut()
            .expect("dependency added with no committed entry")
            .undo_deps
            .push(target);
    }

    /// Records a declared constraint on `target`, attributed to the top
    /// entry.
    pub fn add_declaration(&mut self, target: ProjectName, decl: Declaration) {
        self.decls.entry(target.clone()).or_default().push(decl);
        self.entries
            .last_mut()
            .expect("declaration added with no committed entry")
            .undo_decls
            .push(target);
    }

    /// Removes the top entry, undoing exactly what it added.
    pub fn pop_entry(&mut self) -> Option<PoppedEntry> {
        let entry = self.entries.pop()?;
        for target in entry.undo_deps.iter().rev() {
            let records = self
                .deps
                .get_mut(target)
                .expect("undo names a target with records");
            records.pop();
            if records.is_empty() {
                self.deps.remove(target);
                self.first_demand.remove(target);
            }
        }
        for target in entry.undo_decls.iter().rev() {
            let records = self
                .decls
                .get_mut(target)
                .expect("undo names a target with records");
            records.pop();
            if records.is_empty() {
                self.decls.remove(target);
            }
        }
        if entry.pins_version {
            self.selected.remove(&entry.atom.name);
        }
        self.seq = entry.seq_before;
        Some(PoppedEntry {
            atom: entry.atom,
            depth: entry.depth,
            pins_version: entry.pins_version,
        })
    }
}

// TESTS #######################################################################

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(name: &str, version: &str) -> ProjectAtom {
        ProjectAtom {
            name: ProjectName::new(name),
            version: version.parse().unwrap(),
        }
    }

    fn pkgs(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    fn demand(sel: &mut Selection, target: &str, depender: &ProjectAtom, packages: &[&str]) {
        sel.add_dependency(
            ProjectName::new(target),
            Dependency {
                depender: depender.clone(),
                packages: pkgs(packages),
                constraint: Constraint::Any,
            },
        );
    }

    #[test]
    fn required_packages_union_over_dependers() {
        let mut sel = Selection::new();
        let root = atom("root", "0.0.0");
        sel.push_entry(root.clone(), pkgs(&["root"]), true);
        demand(&mut sel, "a", &root, &["a"]);

        let a = atom("a", "1.0.0");
        sel.push_entry(a.clone(), pkgs(&["a"]), true);
        demand(&mut sel, "b", &a, &["b", "b/sub"]);
        demand(&mut sel, "b", &root, &["b"]);

        assert_eq!(
            sel.required_packages(&ProjectName::new("b")),
            pkgs(&["b", "b/sub"])
        );
        assert!(sel.reached(&ProjectName::new("b")));
        assert!(!sel.reached(&ProjectName::new("c")));
    }

    #[test]
    fn declarations_stay_dormant_until_reached() {
        let mut sel = Selection::new();
        let root = atom("root", "0.0.0");
        let b = ProjectName::new("b");
        sel.push_entry(root.clone(), pkgs(&["root"]), true);
        sel.add_declaration(
            b.clone(),
            Declaration {
                declarer: root.clone(),
                constraint: "1.0.0".parse().unwrap(),
            },
        );

        // Not reached: the declaration contributes nothing.
        assert_eq!(sel.accumulated_constraint(&b), Constraint::Any);

        demand(&mut sel, "b", &root, &["b"]);
        assert_eq!(
            sel.accumulated_constraint(&b),
            "1.0.0".parse::<Constraint>().unwrap()
        );
    }

    #[test]
    fn unresolved_excludes_selected_projects() {
        let mut sel = Selection::new();
        let root = atom("root", "0.0.0");
        sel.push_entry(root.clone(), pkgs(&["root"]), true);
        demand(&mut sel, "a", &root, &["a"]);
        demand(&mut sel, "b", &root, &["b"]);

        let mut names: Vec<_> = sel.unresolved();
        names.sort_by_key(|(_, seq)| *seq);
        assert_eq!(names[0].0, ProjectName::new("a"));
        assert_eq!(names[1].0, ProjectName::new("b"));

        sel.push_entry(atom("a", "1.0.0"), pkgs(&["a"]), true);
        let names = sel.unresolved();
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].0, ProjectName::new("b"));
    }

    #[test]
    fn pop_entry_is_an_exact_inverse() {
        let mut sel = Selection::new();
        let root = atom("root", "0.0.0");
        sel.push_entry(root.clone(), pkgs(&["root"]), true);
        demand(&mut sel, "a", &root, &["a"]);

        let before = sel.clone();

        let a = atom("a", "1.0.0");
        sel.push_entry(a.clone(), pkgs(&["a"]), true);
        demand(&mut sel, "b", &a, &["b"]);
        demand(&mut sel, "a", &a, &["a/extra"]);
        sel.add_declaration(
            ProjectName::new("b"),
            Declaration {
                declarer: a.clone(),
                constraint: "~1.0.0".parse().unwrap(),
            },
        );
        sel.push_entry(a.clone(), pkgs(&["a/extra"]), false);
        demand(&mut sel, "c", &a, &["c"]);

        assert_ne!(sel, before);
        sel.pop_entry().unwrap();
        let popped = sel.pop_entry().unwrap();
        assert!(popped.pins_version);
        assert_eq!(sel, before);
    }
}

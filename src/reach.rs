// SPDX-License-Identifier: MPL-2.0

//! External-reach computation.
//!
//! Given a project's packages, computes for each package the set of
//! external imports reachable from it: the transitive closure over
//! imports internal to the project, with every import that leaves the
//! project collected along the way. Import cycles inside a project are
//! legal and handled by contracting strongly connected components, so two
//! packages importing each other share one reach set.

use std::collections::{BTreeMap, BTreeSet};

use crate::project::{Package, ProjectName};

/// The external reach of every package of one project version: package
/// path to the set of external import paths reachable from it.
pub type ReachMap = BTreeMap<String, BTreeSet<String>>;

/// Computes the external reach of each package.
///
/// An import is internal when `root` [owns](ProjectName::owns) it (equal
/// to the root path, or below it past a `/` separator) and external
/// otherwise. An internal import that names no package in `packages` is
/// treated as having empty reach: the package may exist only at another
/// version, and if it is genuinely required the solver surfaces that as a
/// missing-package conflict instead.
///
/// The result is independent of the order of `packages`.
pub fn external_reach(root: &ProjectName, packages: &[Package]) -> ReachMap {
    // Sorted node indexing makes the SCC traversal order, and with it the
    // whole computation, independent of input order.
    let mut paths: Vec<&str> = packages.iter().map(|p| p.path.as_str()).collect();
    paths.sort_unstable();
    paths.dedup();
    let index_of = |path: &str| paths.binary_search(&path).ok();

    let n = paths.len();
    let mut internal_edges: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
    let mut external: Vec<BTreeSet<String>> = vec![BTreeSet::new(); n];

    for pkg in packages {
        let Some(from) = index_of(&pkg.path) else {
            continue;
        };
        for imp in &pkg.imports {
            if imp == &pkg.path {
                continue;
            }
            if root.owns(imp) {
                if let Some(to) = index_of(imp) {
                    internal_edges[from].insert(to);
                }
            } else {
                external[from].insert(imp.clone());
            }
        }
    }

    // Tarjan emits components in reverse topological order of the
    // condensation, so by the time a component is popped every component
    // it reaches has its reach set already computed.
    let sccs = Sccs::compute(n, &internal_edges);
    let mut component_reach: Vec<BTreeSet<String>> = Vec::with_capacity(sccs.components.len());
    for members in &sccs.components {
        let mut reach = BTreeSet::new();
        for &node in members {
            reach.extend(external[node].iter().cloned());
            for &succ in &internal_edges[node] {
                let target = sccs.component_of[succ];
                if target != component_reach.len() {
                    reach.extend(component_reach[target].iter().cloned());
                }
            }
        }
        component_reach.push(reach);
    }

    paths
        .iter()
        .enumerate()
        .map(|(i, path)| {
            (
                (*path).to_owned(),
                component_reach[sccs.component_of[i]].clone(),
            )
        })
        .collect()
}

struct Sccs {
    /// Member nodes per component, in emission (reverse topological) order.
    components: Vec<Vec<usize>>,
    /// Component index per node.
    component_of: Vec<usize>,
}

impl Sccs {
    fn compute(n: usize, edges: &[BTreeSet<usize>]) -> Self {
        let mut state = TarjanState {
            edges,
            index: vec![usize::MAX; n],
            lowlink: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
            next_index: 0,
            components: Vec::new(),
            component_of: vec![usize::MAX; n],
        };
        for node in 0..n {
            if state.index[node] == usize::MAX {
                state.visit(node);
            }
        }
        Sccs {
            components: state.components,
            component_of: state.component_of,
        }
    }
}

struct TarjanState<'a> {
    edges: &'a [BTreeSet<usize>],
    index: Vec<usize>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next_index: usize,
    components: Vec<Vec<usize>>,
    component_of: Vec<usize>,
}

impl TarjanState<'_> {
    fn visit(&mut self, node: usize) {
        self.index[node] = self.next_index;
        self.lowlink[node] = self.next_index;
        self.next_index += 1;
        self.stack.push(node);
        self.on_stack[node] = true;

        for &succ in &self.edges[node] {
            if self.index[succ] == usize::MAX {
                self.visit(succ);
                self.lowlink[node] = self.lowlink[node].min(self.lowlink[succ]);
            } else if self.on_stack[succ] {
                self.lowlink[node] = self.lowlink[node].min(self.index[succ]);
            }
        }

        if self.lowlink[node] == self.index[node] {
            let id = self.components.len();
            let mut members = Vec::new();
            loop {
                let popped = self.stack.pop().expect("scc stack never underflows");
                self.on_stack[popped] = false;
                self.component_of[popped] = id;
                members.push(popped);
                if popped == node {
                    break;
                }
            }
            self.components.push(members);
        }
    }
}

// TESTS #######################################################################

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(path: &str, imports: &[&str]) -> Package {
        Package::new(path, imports.iter().copied())
    }

    fn reach(root: &str, packages: &[Package]) -> ReachMap {
        external_reach(&ProjectName::new(root), packages)
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn direct_externals_only() {
        let rm = reach("root", &[pkg("root", &["a", "b"])]);
        assert_eq!(rm["root"], set(&["a", "b"]));
    }

    #[test]
    fn transitive_through_subpackages() {
        let rm = reach(
            "root",
            &[
                pkg("root", &["root/foo"]),
                pkg("root/foo", &["root/foo/bar"]),
                pkg("root/foo/bar", &["a"]),
            ],
        );
        assert_eq!(rm["root"], set(&["a"]));
        assert_eq!(rm["root/foo"], set(&["a"]));
        assert_eq!(rm["root/foo/bar"], set(&["a"]));
    }

    #[test]
    fn prefix_without_separator_is_external() {
        let rm = reach("foo", &[pkg("foo", &["foobar", "foo/sub"]), pkg("foo/sub", &[])]);
        assert_eq!(rm["foo"], set(&["foobar"]));
    }

    #[test]
    fn cycles_share_reach() {
        let rm = reach(
            "root",
            &[
                pkg("root/a", &["root/b", "x"]),
                pkg("root/b", &["root/a", "y"]),
            ],
        );
        assert_eq!(rm["root/a"], set(&["x", "y"]));
        assert_eq!(rm["root/b"], set(&["x", "y"]));
    }

    #[test]
    fn unknown_internal_import_contributes_nothing() {
        let rm = reach("root", &[pkg("root", &["root/gone", "a"])]);
        assert_eq!(rm["root"], set(&["a"]));
    }

    #[test]
    fn result_is_order_independent() {
        let forward = [
            pkg("root", &["root/a"]),
            pkg("root/a", &["root/b", "x"]),
            pkg("root/b", &["y"]),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();
        assert_eq!(reach("root", &forward), reach("root", &reversed));
    }
}

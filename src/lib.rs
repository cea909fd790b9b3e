// SPDX-License-Identifier: MPL-2.0

//! Bimodal version solving.
//!
//! Version solving consists in finding a set of projects and versions
//! that satisfy all the constraints of a given root project. What makes
//! the problem *bimodal* is that dependencies are not declared by a
//! manifest list alone: they are discovered from the imports of the
//! packages that are actually reachable from the root.
//! A project's dependency surface therefore grows while the solve is
//! running, as more of its packages are pulled in by other selections,
//! and a manifest constraint only takes effect once some package of its
//! target project is reached at all. A constraint on a project nobody
//! imports is dormant and never drags that project into the solution.
//!
//! # Solving
//!
//! The entry point is [`solve`](solver::solve), which takes the root
//! project's [manifest](project::RootManifest), a
//! [`SourceManager`](solver::SourceManager) supplying candidate versions
//! and per-version package data, and [options](solver::SolveOptions)
//! controlling enumeration policy, lock bias, attempt budget, tracing,
//! and cancellation. The result maps every transitively required project
//! to a single [version](version::Version).
//!
//! The search interleaves version selection with reach expansion: picking
//! a candidate pulls in the external imports of its required packages,
//! which may demand new projects, new packages of already-selected
//! projects, and newly activated constraints, any of which can reject the
//! candidate and eventually force chronological backtracking over the
//! selection store. Candidate enumeration is
//! deterministic, so identical inputs produce identical solutions.
//!
//! # Source managers
//!
//! The solver depends only on the
//! [`SourceManager`](solver::SourceManager) trait. The crate ships
//! [`OfflineSourceManager`](solver::OfflineSourceManager), an in-memory
//! implementation useful for tests and for callers that assemble project
//! data themselves. Managers backed by real checkouts typically use the
//! [`ImportScanner`](scanner::ImportScanner) to extract package names and
//! imports from source directories, and
//! [`reach::external_reach`] to derive reach maps from package lists.
//!
//! # Results, locks, and errors
//!
//! A successful solve yields a [`Solution`](lock::Solution); feeding it
//! back as a [`Lock`](lock::Lock) biases the next solve towards the same
//! versions, so an unchanged input re-solves without backtracking. When
//! solving fails the error names the root-most project whose candidates
//! were exhausted, along with the constraint that was active; see
//! [`SolveError`](error::SolveError) for the full taxonomy.

#![warn(missing_docs)]

pub mod constraint;
pub mod error;
pub mod lock;
pub mod project;
pub mod reach;
pub mod scanner;
pub mod solver;
pub mod type_aliases;
pub mod version;

mod internal;

// SPDX-License-Identifier: MPL-2.0

//! Publicly exported type aliases.

/// Map implementation used by the solver for internal keyed state.
pub type Map<K, V> = rustc_hash::FxHashMap<K, V>;

/// Set implementation used by the solver for internal keyed state.
pub type Set<V> = rustc_hash::FxHashSet<V>;

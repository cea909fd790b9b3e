// SPDX-License-Identifier: MPL-2.0

//! Non-public machinery of the solver.

pub mod core;
pub mod selection;
pub mod version_queue;

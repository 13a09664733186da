// src/dag/mod.rs

//! Source dependency graph and scheduling.
//!
//! - [`declaration`] parses the `name(dep, dep)` declaration grammar.
//! - [`graph`] holds the dependency graph and computes a deterministic
//!   topological order.
//! - [`scheduler`] drives one asynchronous task per source in that order,
//!   gating each on its prerequisites.

pub mod declaration;
pub mod graph;
pub mod scheduler;

pub use declaration::{Declaration, parse_declarations};
pub use graph::DagGraph;
pub use scheduler::{ProviderMap, Resolved, Scheduler, resolve};

// src/dag/mod.rs

//! Resource graphs and their concurrent evaluation.
//!
//! - [`graph`] holds members and signal-gated edges, and flattens nested
//!   graphs on registration.
//! - [`setter`] is the `when(..).and(..).do_(..)` builder.
//! - [`validate`] rejects duplicate names, dangling edges and cycles.
//! - [`scheduler`] runs one task per member and propagates signals.

pub mod graph;
pub mod scheduler;
pub mod setter;
pub mod validate;

pub use graph::ResourceGraph;
pub use scheduler::{EDGE_CAPACITY, MaterializeOptions};
pub use setter::DependencySetter;

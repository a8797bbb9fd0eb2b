// src/types.rs

//! Small shared types.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Separator placed between a graph's registration name and the names of the
/// resources it contains, e.g. `users·lcmGroup`.
pub const NAME_SEPARATOR: &str = "·";

/// Opaque handle for a registered resource or a flattened sub-graph.
///
/// Handles are unique for the whole process, so a handle obtained from a
/// child graph stays valid after that graph is registered into a parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(u64);

impl ResourceId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ResourceId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Prefix a member name with the name of the graph it is registered under.
pub(crate) fn prefixed(parent: &str, child: &str) -> String {
    format!("{parent}{NAME_SEPARATOR}{child}")
}

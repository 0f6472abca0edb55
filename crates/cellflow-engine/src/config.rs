//! Session configuration.

use serde::{Deserialize, Serialize};

use crate::scheduler::SchedulerPolicy;

/// Knobs an embedder sets once when opening a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Consistency policy used by readiness checks.
    pub policy: SchedulerPolicy,
    /// Track and consult unit edges derived from static analysis.
    pub static_edges: bool,
    /// Track and consult unit edges observed at runtime.
    pub dynamic_edges: bool,
    /// Interpret cell id order as layout order: updates from cells placed
    /// below a cell are invisible to its readiness checks.
    pub flow_order: bool,
    /// Suppress the live report for `a = a`-shaped reassignments whose
    /// runtime identity is unchanged.
    pub suppress_identity_reassign: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            policy: SchedulerPolicy::Liveness,
            static_edges: true,
            dynamic_edges: true,
            flow_order: false,
            suppress_identity_reassign: true,
        }
    }
}

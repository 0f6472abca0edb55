// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Static liveness analysis for cell statements.
//!
//! Given a statement list, the analyzer reports which reference chains the
//! block *reads* (live) and which it *binds* (dead), without executing
//! anything. The resolver and scheduler consume these sets to decide what a
//! re-run of the cell would depend on.

mod liveness;

pub use liveness::{compute_liveness, LiveRef, LivenessResult, ReassignCandidate};

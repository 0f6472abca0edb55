// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Foundation types for cellflow
//!
//! Leaf types shared by every other crate: the logical clock and the
//! typed identifiers used as arena keys throughout the dependency graph.

pub mod ids;
pub mod timestamp;

pub use ids::{CellId, NamespaceId, ObjId, ScopeId, SymbolId, TypeTag};
pub use timestamp::Timestamp;

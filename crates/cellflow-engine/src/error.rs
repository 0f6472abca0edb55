//! Engine error types.

use cellflow_foundation::{CellId, ObjId};
use thiserror::Error;

/// Engine result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the engine.
///
/// Staleness itself is never an error: a waiting cell is an answer, not a
/// fault. Errors here mean the embedder handed the engine something it
/// cannot interpret.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown cell: {0}")]
    UnknownCell(CellId),

    #[error("cell {cell} failed to parse: {message}")]
    Parse { cell: CellId, message: String },

    #[error("no value with identity {0} is tracked")]
    UnknownObject(ObjId),

    #[error("event at statement {stmt} is out of range for the cell ({len} statements)")]
    StatementOutOfRange { stmt: u32, len: usize },
}

//! Logical clock for the dependency graph
//!
//! A `Timestamp` identifies both "when a value was produced" and "when a
//! read occurred": the pair of the execution-unit counter and the statement
//! index inside that unit. The uninitialized sentinel sorts before every
//! real timestamp.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical time: `(execution-unit counter, statement index)`.
///
/// Totally ordered, unit counter first. Unit counters are 1-based; the
/// reserved value 0 marks the uninitialized sentinel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct Timestamp {
    /// Execution-unit counter (1-based; 0 is the sentinel).
    pub cell: u64,
    /// Statement index within the unit.
    pub stmt: u32,
}

impl Timestamp {
    /// Sentinel value sorting before all real timestamps.
    pub const UNINITIALIZED: Timestamp = Timestamp { cell: 0, stmt: 0 };

    /// Create a timestamp for a statement within an execution unit.
    pub fn new(cell: u64, stmt: u32) -> Self {
        Self { cell, stmt }
    }

    /// Timestamp for a unit boundary (statement 0).
    pub fn at_cell(cell: u64) -> Self {
        Self { cell, stmt: 0 }
    }

    /// Whether this is a real timestamp (not the sentinel).
    pub fn is_initialized(&self) -> bool {
        *self != Self::UNINITIALIZED
    }

    /// The larger of two timestamps.
    pub fn max_of(self, other: Timestamp) -> Timestamp {
        self.max(other)
    }

    /// Clamp this timestamp up to a floor.
    ///
    /// Used for manual resets: a raised floor makes older values read as
    /// fresh without rewriting the graph.
    pub fn clamped(self, floor: Timestamp) -> Timestamp {
        self.max(floor)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_initialized() {
            write!(f, "{}:{}", self.cell, self.stmt)
        } else {
            write!(f, "-")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_sorts_first() {
        let real = Timestamp::new(1, 0);
        assert!(Timestamp::UNINITIALIZED < real);
        assert!(!Timestamp::UNINITIALIZED.is_initialized());
        assert!(real.is_initialized());
    }

    #[test]
    fn test_total_order() {
        assert!(Timestamp::new(1, 3) < Timestamp::new(2, 0));
        assert!(Timestamp::new(2, 0) < Timestamp::new(2, 1));
        assert_eq!(Timestamp::new(4, 2), Timestamp::new(4, 2));
    }

    #[test]
    fn test_clamped() {
        let floor = Timestamp::at_cell(5);
        assert_eq!(Timestamp::new(2, 1).clamped(floor), floor);
        assert_eq!(Timestamp::new(7, 0).clamped(floor), Timestamp::new(7, 0));
    }

    #[test]
    fn test_display() {
        assert_eq!(Timestamp::new(3, 1).to_string(), "3:1");
        assert_eq!(Timestamp::UNINITIALIZED.to_string(), "-");
    }
}

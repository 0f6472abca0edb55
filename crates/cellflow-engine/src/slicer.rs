//! Timestamp slicing.
//!
//! The update protocol records, for every applied update, which timestamps
//! the written value was computed from. Slicing is a closure over those
//! edges: starting from seed timestamps, keep following dependency edges
//! until nothing new is discovered, then coarsen to units and rebuild the
//! minimal source that reproduces the seeds.
//!
//! Statement indices synthesized inside function bodies may exceed the
//! statement count of the recording unit; such units are reproduced whole.

use cellflow_foundation::Timestamp;
use indexmap::{IndexMap, IndexSet};

use crate::cell::CellStore;
use crate::config::SessionConfig;
use crate::graph::DependencyGraph;

/// Ordered unit -> reconstructed source mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SliceResult {
    pub units: IndexMap<u64, String>,
}

impl SliceResult {
    /// The whole slice as one runnable source block, in unit order.
    pub fn source(&self) -> String {
        self.units
            .values()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Closure walker over the recorded per-timestamp dependency edges.
pub struct Slicer<'a> {
    graph: &'a DependencyGraph,
    cells: &'a CellStore,
    static_edges: bool,
    dynamic_edges: bool,
}

impl<'a> Slicer<'a> {
    pub fn new(graph: &'a DependencyGraph, cells: &'a CellStore, config: &SessionConfig) -> Self {
        Self {
            graph,
            cells,
            static_edges: config.static_edges,
            dynamic_edges: config.dynamic_edges,
        }
    }

    /// All timestamps the seeds transitively depend on, seeds included.
    pub fn closure(&self, seeds: &[Timestamp]) -> IndexSet<Timestamp> {
        let mut visited: IndexSet<Timestamp> = IndexSet::new();
        let mut stack: Vec<Timestamp> = seeds
            .iter()
            .copied()
            .filter(|ts| ts.is_initialized())
            .collect();
        while let Some(ts) = stack.pop() {
            if !visited.insert(ts) {
                continue;
            }
            if self.static_edges {
                if let Some(deps) = self.graph.static_ts_deps.get(&ts) {
                    stack.extend(deps.iter().copied());
                }
            }
            if self.dynamic_edges {
                if let Some(deps) = self.graph.dynamic_ts_deps.get(&ts) {
                    stack.extend(deps.iter().copied());
                }
            }
        }
        visited
    }

    /// Slice down to the statements that produced the seeds, coarsened per
    /// unit and ordered by unit.
    pub fn slice(&self, seeds: &[Timestamp]) -> SliceResult {
        let closure = self.closure(seeds);

        let mut per_unit: IndexMap<u64, IndexSet<u32>> = IndexMap::new();
        for ts in &closure {
            per_unit.entry(ts.cell).or_default().insert(ts.stmt);
        }
        per_unit.sort_unstable_keys();

        let mut result = SliceResult::default();
        for (unit, stmt_indices) in per_unit {
            let Some(version) = self.cells.version(unit) else {
                continue;
            };
            let out_of_range = stmt_indices
                .iter()
                .any(|idx| *idx as usize >= version.stmts.len());
            let source = if out_of_range {
                version.source.clone()
            } else {
                let mut indices: Vec<u32> = stmt_indices.into_iter().collect();
                indices.sort_unstable();
                indices
                    .into_iter()
                    .map(|idx| version.stmts[idx as usize].span.to_range())
                    .map(|range| version.source[range].trim_end().to_string())
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            result.units.insert(unit, source);
        }
        result
    }
}

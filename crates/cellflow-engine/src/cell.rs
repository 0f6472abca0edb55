//! Execution units and their version history.
//!
//! A logical cell (stable `CellId`) gains a new unit version each time it
//! runs; versions are keyed by the global unit counter at run time. Each
//! version holds the parsed statements and four symbol-justified adjacency
//! maps to other units (static/dynamic x parents/children), kept symmetric
//! by the store.

use std::sync::Arc;

use cellflow_ast::Stmt;
use cellflow_foundation::{CellId, SymbolId, Timestamp};
use indexmap::{IndexMap, IndexSet};

/// One executed version of a cell.
#[derive(Debug, Clone)]
pub struct CellVersion {
    pub cell: CellId,
    /// Global unit counter value of this run; doubles as the version key.
    pub unit: u64,
    pub source: String,
    pub stmts: Arc<Vec<Stmt>>,
    /// Unit of the previous version of the same logical cell.
    pub prev: Option<u64>,
    /// Units this version statically read from, per justifying symbol.
    pub static_parents: IndexMap<u64, IndexSet<SymbolId>>,
    pub static_children: IndexMap<u64, IndexSet<SymbolId>>,
    /// Units this version read from at runtime.
    pub dynamic_parents: IndexMap<u64, IndexSet<SymbolId>>,
    pub dynamic_children: IndexMap<u64, IndexSet<SymbolId>>,
}

impl CellVersion {
    /// Timestamp of this run's unit boundary.
    pub fn run_ts(&self) -> Timestamp {
        Timestamp::at_cell(self.unit)
    }
}

/// All unit versions, indexed by unit counter and by logical cell.
#[derive(Debug, Default)]
pub struct CellStore {
    versions: IndexMap<u64, CellVersion>,
    latest: IndexMap<CellId, u64>,
}

impl CellStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new run of a logical cell.
    pub fn record_run(
        &mut self,
        cell: CellId,
        unit: u64,
        source: impl Into<String>,
        stmts: Arc<Vec<Stmt>>,
    ) -> &CellVersion {
        let prev = self.latest.insert(cell, unit);
        self.versions.insert(
            unit,
            CellVersion {
                cell,
                unit,
                source: source.into(),
                stmts,
                prev,
                static_parents: IndexMap::new(),
                static_children: IndexMap::new(),
                dynamic_parents: IndexMap::new(),
                dynamic_children: IndexMap::new(),
            },
        );
        &self.versions[&unit]
    }

    pub fn version(&self, unit: u64) -> Option<&CellVersion> {
        self.versions.get(&unit)
    }

    /// Latest version of a logical cell.
    pub fn latest(&self, cell: CellId) -> Option<&CellVersion> {
        self.latest.get(&cell).and_then(|unit| self.version(*unit))
    }

    /// Unit counter of the latest version of a logical cell.
    pub fn latest_unit(&self, cell: CellId) -> Option<u64> {
        self.latest.get(&cell).copied()
    }

    /// All logical cells in first-run order.
    pub fn cells(&self) -> impl Iterator<Item = CellId> + '_ {
        self.latest.keys().copied()
    }

    /// Add a static dependency edge between units, symmetric.
    pub fn add_static_edge(&mut self, child_unit: u64, parent_unit: u64, sym: SymbolId) {
        if child_unit == parent_unit {
            return;
        }
        if let Some(child) = self.versions.get_mut(&child_unit) {
            child
                .static_parents
                .entry(parent_unit)
                .or_default()
                .insert(sym);
        }
        if let Some(parent) = self.versions.get_mut(&parent_unit) {
            parent
                .static_children
                .entry(child_unit)
                .or_default()
                .insert(sym);
        }
    }

    /// Add a dynamic dependency edge between units, symmetric.
    pub fn add_dynamic_edge(&mut self, child_unit: u64, parent_unit: u64, sym: SymbolId) {
        if child_unit == parent_unit {
            return;
        }
        if let Some(child) = self.versions.get_mut(&child_unit) {
            child
                .dynamic_parents
                .entry(parent_unit)
                .or_default()
                .insert(sym);
        }
        if let Some(parent) = self.versions.get_mut(&parent_unit) {
            parent
                .dynamic_children
                .entry(child_unit)
                .or_default()
                .insert(sym);
        }
    }
}

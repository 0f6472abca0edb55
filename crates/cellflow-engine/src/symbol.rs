//! Versioned binding entities.

use std::sync::Arc;

use cellflow_ast::{Param, Stmt};
use cellflow_foundation::{CellId, NamespaceId, ObjId, ScopeId, SymbolId, Timestamp};
use indexmap::{IndexMap, IndexSet};

/// What a symbol binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// Plain variable or attribute.
    Default,
    /// A subscript member of a container.
    Subscript,
    Function,
    Class,
    Import,
    Module,
    /// Engine-internal symbol with no user-visible name (e.g. a literal
    /// element before it is bound anywhere).
    Anonymous,
}

/// Two-phase binding state.
///
/// A symbol created from an observed read starts `Uninitialized` and is
/// promoted to `Bound` once a write supplies a value identity. The phase is
/// part of the symbol, not a flag threaded through call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Binding {
    #[default]
    Uninitialized,
    Bound {
        obj: ObjId,
    },
}

impl Binding {
    /// The bound identity, if the write phase has happened.
    pub fn obj(&self) -> Option<ObjId> {
        match self {
            Binding::Bound { obj } => Some(*obj),
            Binding::Uninitialized => None,
        }
    }
}

/// Definition payload for function/lambda symbols, analyzed on call
/// resolution rather than at definition time.
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub params: Vec<Param>,
    pub body: Arc<Vec<Stmt>>,
}

/// The central graph entity: one versioned binding.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    /// Lexical scope or namespace-as-scope owning the binding.
    pub scope: ScopeId,
    pub binding: Binding,
    /// Freshest upstream timestamp this symbol must catch up to.
    pub required_ts: Timestamp,
    /// When this symbol was last (re)bound or mutated.
    pub updated_ts: Timestamp,
    /// Monotonic per-symbol version counter.
    pub version: u64,
    /// Upstream edges; values are the timestamps at which the edge was
    /// (re)asserted, newest last.
    pub parents: IndexMap<SymbolId, Vec<Timestamp>>,
    /// Downstream edges, kept symmetric with `parents`.
    pub children: IndexMap<SymbolId, Vec<Timestamp>>,
    /// Cells that consumed the whole value.
    pub deep_live_cells: IndexSet<CellId>,
    /// Cells that consumed only a member of the value.
    pub shallow_live_cells: IndexSet<CellId>,
    /// When the symbol was last read.
    pub last_used_ts: Timestamp,
    /// Unit counter of the most recent `$$`-tagged write, if any.
    pub cascading_reactive_unit: Option<u64>,
    /// Unit counters at which a `~`-tagged read blocked propagation.
    pub blocked_units: IndexSet<u64>,
    /// Namespace mirroring this symbol's bound value, if it is a container.
    pub namespace: Option<NamespaceId>,
    /// Namespace this symbol is a member of, if any.
    pub containing_namespace: Option<NamespaceId>,
    pub function: Option<FunctionInfo>,
    pub tombstone: bool,
}

impl Symbol {
    pub fn new(id: SymbolId, name: impl Into<String>, kind: SymbolKind, scope: ScopeId) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            scope,
            binding: Binding::Uninitialized,
            required_ts: Timestamp::UNINITIALIZED,
            updated_ts: Timestamp::UNINITIALIZED,
            version: 0,
            parents: IndexMap::new(),
            children: IndexMap::new(),
            deep_live_cells: IndexSet::new(),
            shallow_live_cells: IndexSet::new(),
            last_used_ts: Timestamp::UNINITIALIZED,
            cascading_reactive_unit: None,
            blocked_units: IndexSet::new(),
            namespace: None,
            containing_namespace: None,
            function: None,
            tombstone: false,
        }
    }

    /// The bound value identity, if any.
    pub fn obj(&self) -> Option<ObjId> {
        self.binding.obj()
    }

    /// Whether the write phase has happened.
    pub fn is_bound(&self) -> bool {
        matches!(self.binding, Binding::Bound { .. })
    }

    /// Whether the required timestamp is unsatisfied, given the global
    /// reset floor. Namespace recursion lives in the staleness module.
    pub fn is_directly_waiting(&self, floor: Timestamp) -> bool {
        self.required_ts > self.updated_ts.clamped(floor)
    }

    /// Mark a fresh update at `ts`.
    pub fn refresh(&mut self, ts: Timestamp) {
        self.updated_ts = ts;
        self.version += 1;
        // A refresh satisfies whatever was required before it.
        if self.required_ts <= ts {
            self.required_ts = Timestamp::UNINITIALIZED;
        }
    }

    /// Record that an upstream update at `ts` must be caught up to.
    pub fn mark_waiting(&mut self, ts: Timestamp) {
        self.required_ts = self.required_ts.max_of(ts);
    }

    /// Record a read at `ts`, deep or shallow, from the given cell.
    pub fn record_usage(&mut self, cell: CellId, ts: Timestamp, deep: bool) {
        self.last_used_ts = self.last_used_ts.max_of(ts);
        if deep {
            self.deep_live_cells.insert(cell);
        } else {
            self.shallow_live_cells.insert(cell);
        }
    }
}

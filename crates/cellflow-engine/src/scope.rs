//! Lexical scopes.

use cellflow_foundation::{ScopeId, SymbolId};
use indexmap::{IndexMap, IndexSet};

/// What introduced a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// The one global scope of a session.
    Global,
    /// A function definition body.
    Function,
    /// A class definition body.
    Class,
    /// A fresh per-call scope created during call resolution.
    Call,
}

/// Ordinary lexical scope: name table plus parent link.
#[derive(Debug, Clone)]
pub struct Scope {
    pub id: ScopeId,
    pub parent: Option<ScopeId>,
    pub kind: ScopeKind,
    pub bindings: IndexMap<String, SymbolId>,
    /// Names declared global inside this scope; lookups for them skip
    /// directly to the global scope.
    pub global_names: IndexSet<String>,
}

impl Scope {
    pub fn new(id: ScopeId, parent: Option<ScopeId>, kind: ScopeKind) -> Self {
        Self {
            id,
            parent,
            kind,
            bindings: IndexMap::new(),
            global_names: IndexSet::new(),
        }
    }

    /// Look up a name in this scope only (no parent walk).
    pub fn get(&self, name: &str) -> Option<SymbolId> {
        self.bindings.get(name).copied()
    }

    /// Bind a name in this scope, returning the displaced symbol if any.
    pub fn bind(&mut self, name: impl Into<String>, symbol: SymbolId) -> Option<SymbolId> {
        self.bindings.insert(name.into(), symbol)
    }

    /// Remove a binding.
    pub fn unbind(&mut self, name: &str) -> Option<SymbolId> {
        self.bindings.shift_remove(name)
    }
}

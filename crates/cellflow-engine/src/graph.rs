//! The dependency graph arena.
//!
//! Symbols, scopes and namespaces live in `Vec` arenas addressed by typed
//! integer ids; edges are id-to-id maps, never owning references, so cyclic
//! object graphs (aliasing, self-referential containers) are representable
//! without reference cycles.

use std::collections::HashMap;

use cellflow_foundation::{NamespaceId, ObjId, ScopeId, SymbolId, Timestamp, TypeTag};
use indexmap::{IndexMap, IndexSet};
use tracing::trace;

use crate::namespace::Namespace;
use crate::scope::{Scope, ScopeKind};
use crate::symbol::{Symbol, SymbolKind};

/// Runtime shape of a value, as far as instrumentation reported it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjInfo {
    pub type_tag: TypeTag,
    pub is_container: bool,
}

/// Arena-backed symbol/scope/namespace graph with the alias table.
#[derive(Debug)]
pub struct DependencyGraph {
    symbols: Vec<Symbol>,
    scopes: Vec<Scope>,
    namespaces: Vec<Namespace>,
    /// Identity token -> symbols currently bound to that value. The alias
    /// set doubles as the engine's reference count.
    aliases: IndexMap<ObjId, IndexSet<SymbolId>>,
    /// Identity token -> live namespace mirroring it.
    namespaces_by_obj: HashMap<ObjId, NamespaceId>,
    /// Observed type/shape per identity token.
    objects: HashMap<ObjId, ObjInfo>,
    /// Generation counter for identity-token reuse detection.
    obj_generation: u64,
    /// Per-timestamp dependency edges recorded by the update protocol,
    /// consumed by the slicer.
    pub static_ts_deps: IndexMap<Timestamp, IndexSet<Timestamp>>,
    pub dynamic_ts_deps: IndexMap<Timestamp, IndexSet<Timestamp>>,
    global_scope: ScopeId,
}

impl DependencyGraph {
    pub fn new() -> Self {
        let mut graph = Self {
            symbols: Vec::new(),
            scopes: Vec::new(),
            namespaces: Vec::new(),
            aliases: IndexMap::new(),
            namespaces_by_obj: HashMap::new(),
            objects: HashMap::new(),
            obj_generation: 0,
            static_ts_deps: IndexMap::new(),
            dynamic_ts_deps: IndexMap::new(),
            global_scope: ScopeId::new(0),
        };
        graph.global_scope = graph.create_scope(None, ScopeKind::Global);
        graph
    }

    /// The session's global scope.
    pub fn global_scope(&self) -> ScopeId {
        self.global_scope
    }

    // === arena access ===

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.index()]
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.index()]
    }

    pub fn namespace(&self, id: NamespaceId) -> &Namespace {
        &self.namespaces[id.index()]
    }

    pub fn namespace_mut(&mut self, id: NamespaceId) -> &mut Namespace {
        &mut self.namespaces[id.index()]
    }

    /// All symbol ids, tombstoned ones included.
    pub fn symbol_ids(&self) -> impl Iterator<Item = SymbolId> {
        (0..self.symbols.len() as u32).map(SymbolId::new)
    }

    // === creation ===

    pub fn create_scope(&mut self, parent: Option<ScopeId>, kind: ScopeKind) -> ScopeId {
        let id = ScopeId::new(self.scopes.len() as u32);
        self.scopes.push(Scope::new(id, parent, kind));
        id
    }

    pub fn create_symbol(
        &mut self,
        name: impl Into<String>,
        kind: SymbolKind,
        scope: ScopeId,
    ) -> SymbolId {
        let id = SymbolId::new(self.symbols.len() as u32);
        let symbol = Symbol::new(id, name, kind, scope);
        trace!(symbol = %symbol.name, id = %id, "symbol created");
        self.symbols.push(symbol);
        id
    }

    /// Namespace for a value identity, creating it on first sight.
    pub fn ensure_namespace(&mut self, obj: ObjId) -> NamespaceId {
        if let Some(id) = self.lookup_namespace(obj) {
            return id;
        }
        let id = NamespaceId::new(self.namespaces.len() as u32);
        self.obj_generation += 1;
        self.namespaces
            .push(Namespace::new(id, obj, self.obj_generation));
        self.namespaces_by_obj.insert(obj, id);
        id
    }

    /// Live namespace for a value identity. Tombstoned entries (from
    /// identity-token reuse after collection) do not resolve.
    pub fn lookup_namespace(&self, obj: ObjId) -> Option<NamespaceId> {
        let id = *self.namespaces_by_obj.get(&obj)?;
        let ns = self.namespace(id);
        (!ns.tombstone && ns.obj == obj).then_some(id)
    }

    // === name resolution ===

    /// Look up a name walking the scope chain.
    pub fn lookup_name(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = self.scope(id);
            if scope.global_names.contains(name) {
                return self.scope(self.global_scope).get(name);
            }
            if let Some(sym) = scope.get(name) {
                return Some(sym);
            }
            current = scope.parent;
        }
        None
    }

    /// Look up a name in a scope chain, creating an uninitialized symbol in
    /// `scope` itself when the name is unknown (implicit creation on first
    /// observed read).
    pub fn ensure_name(&mut self, scope: ScopeId, name: &str, kind: SymbolKind) -> SymbolId {
        if let Some(sym) = self.lookup_name(scope, name) {
            return sym;
        }
        let sym = self.create_symbol(name, kind, scope);
        self.scope_mut(scope).bind(name, sym);
        sym
    }

    // === value metadata ===

    /// Record what instrumentation observed about a value identity.
    pub fn note_obj(&mut self, obj: ObjId, type_tag: TypeTag, is_container: bool) {
        self.objects.insert(
            obj,
            ObjInfo {
                type_tag,
                is_container,
            },
        );
    }

    /// Observed shape of a value identity.
    pub fn obj_info(&self, obj: ObjId) -> Option<&ObjInfo> {
        self.objects.get(&obj)
    }

    // === alias table ===

    /// Point a symbol's binding at a value identity, maintaining the alias
    /// table. Returns the previous identity, if any.
    pub fn bind_obj(&mut self, sym: SymbolId, obj: ObjId) -> Option<ObjId> {
        let previous = self.symbol(sym).obj();
        if previous == Some(obj) {
            return previous;
        }
        if let Some(old) = previous {
            if let Some(set) = self.aliases.get_mut(&old) {
                set.shift_remove(&sym);
            }
        }
        self.aliases.entry(obj).or_default().insert(sym);
        self.symbol_mut(sym).binding = crate::symbol::Binding::Bound { obj };
        previous
    }

    /// Symbols currently aliasing a value identity.
    pub fn aliases_of(&self, obj: ObjId) -> IndexSet<SymbolId> {
        self.aliases.get(&obj).cloned().unwrap_or_default()
    }

    /// Engine-side reference count of a value: live aliases plus one for a
    /// namespace owner whose symbol is itself alive.
    pub fn refcount(&self, obj: ObjId) -> usize {
        let alias_count = self
            .aliases
            .get(&obj)
            .map(|set| {
                set.iter()
                    .filter(|sym| !self.symbol(**sym).tombstone)
                    .count()
            })
            .unwrap_or(0);
        let owner_alive = self
            .lookup_namespace(obj)
            .and_then(|ns| self.namespace(ns).owner)
            .is_some_and(|owner| !self.symbol(owner).tombstone);
        alias_count + usize::from(owner_alive && alias_count == 0)
    }

    // === symbol edges (always symmetric) ===

    /// Assert a parent edge at `ts`. Timestamps accumulate per edge.
    pub fn add_edge(&mut self, parent: SymbolId, child: SymbolId, ts: Timestamp) {
        if parent == child {
            return;
        }
        self.symbol_mut(parent)
            .children
            .entry(child)
            .or_default()
            .push(ts);
        self.symbol_mut(child)
            .parents
            .entry(parent)
            .or_default()
            .push(ts);
    }

    /// Remove one edge in both directions.
    pub fn remove_edge(&mut self, parent: SymbolId, child: SymbolId) {
        self.symbol_mut(parent).children.shift_remove(&child);
        self.symbol_mut(child).parents.shift_remove(&parent);
    }

    /// Drop all parent edges of a symbol.
    pub fn clear_parent_edges(&mut self, child: SymbolId) {
        let parents: Vec<SymbolId> = self.symbol(child).parents.keys().copied().collect();
        for parent in parents {
            self.remove_edge(parent, child);
        }
    }

    /// Drop every edge touching a symbol (used when tombstoning).
    pub fn clear_all_edges(&mut self, sym: SymbolId) {
        self.clear_parent_edges(sym);
        let children: Vec<SymbolId> = self.symbol(sym).children.keys().copied().collect();
        for child in children {
            self.remove_edge(sym, child);
        }
    }

    /// Whether `ancestor` is reachable from `start` walking parent edges.
    pub fn is_ancestor(&self, start: SymbolId, ancestor: SymbolId) -> bool {
        let mut seen = IndexSet::new();
        let mut stack = vec![start];
        while let Some(sym) = stack.pop() {
            if !seen.insert(sym) {
                continue;
            }
            if sym == ancestor {
                return true;
            }
            stack.extend(self.symbol(sym).parents.keys().copied());
        }
        false
    }

    /// Record a per-timestamp dependency edge for the slicer.
    pub fn record_ts_dep(&mut self, at: Timestamp, on: Timestamp, dynamic: bool) {
        if !on.is_initialized() || at == on {
            return;
        }
        let map = if dynamic {
            &mut self.dynamic_ts_deps
        } else {
            &mut self.static_ts_deps
        };
        map.entry(at).or_default().insert(on);
    }

    // === garbage ===

    /// Tombstone every symbol whose value has no remaining alias and whose
    /// namespace has no live owner, then unlink their edges and drop dead
    /// namespaces. Returns the number of symbols collected.
    pub fn collect_garbage(&mut self) -> usize {
        let mut dead_objs: Vec<ObjId> = Vec::new();
        for (obj, _) in self.aliases.iter() {
            if self.refcount(*obj) == 0 {
                dead_objs.push(*obj);
            }
        }

        let mut collected = 0;
        for obj in dead_objs {
            self.aliases.shift_remove(&obj);
            let Some(ns_id) = self.lookup_namespace(obj) else {
                continue;
            };
            let members: Vec<SymbolId> = self.namespace(ns_id).members().collect();
            for member in members {
                if !self.symbol(member).tombstone {
                    self.clear_all_edges(member);
                    self.symbol_mut(member).tombstone = true;
                    collected += 1;
                }
            }
            self.namespace_mut(ns_id).tombstone = true;
            self.namespaces_by_obj.remove(&obj);
        }
        collected
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_graph_with(names: &[&str]) -> (DependencyGraph, Vec<SymbolId>) {
        let mut graph = DependencyGraph::new();
        let scope = graph.global_scope();
        let syms = names
            .iter()
            .map(|n| graph.ensure_name(scope, n, SymbolKind::Default))
            .collect();
        (graph, syms)
    }

    #[test]
    fn test_implicit_creation_is_uninitialized() {
        let (graph, syms) = make_graph_with(&["x"]);
        assert!(!graph.symbol(syms[0]).is_bound());
    }

    #[test]
    fn test_lookup_walks_scope_chain() {
        let mut graph = DependencyGraph::new();
        let global = graph.global_scope();
        let x = graph.ensure_name(global, "x", SymbolKind::Default);
        let inner = graph.create_scope(Some(global), ScopeKind::Function);
        assert_eq!(graph.lookup_name(inner, "x"), Some(x));
    }

    #[test]
    fn test_edges_symmetric() {
        let (mut graph, syms) = make_graph_with(&["a", "b"]);
        graph.add_edge(syms[0], syms[1], Timestamp::new(1, 0));
        assert!(graph.symbol(syms[0]).children.contains_key(&syms[1]));
        assert!(graph.symbol(syms[1]).parents.contains_key(&syms[0]));
        graph.remove_edge(syms[0], syms[1]);
        assert!(graph.symbol(syms[0]).children.is_empty());
        assert!(graph.symbol(syms[1]).parents.is_empty());
    }

    #[test]
    fn test_self_edge_ignored() {
        let (mut graph, syms) = make_graph_with(&["a"]);
        graph.add_edge(syms[0], syms[0], Timestamp::new(1, 0));
        assert!(graph.symbol(syms[0]).parents.is_empty());
    }

    #[test]
    fn test_alias_table_tracks_rebinds() {
        let (mut graph, syms) = make_graph_with(&["a", "b"]);
        let obj1 = ObjId::new(10);
        let obj2 = ObjId::new(11);
        graph.bind_obj(syms[0], obj1);
        graph.bind_obj(syms[1], obj1);
        assert_eq!(graph.aliases_of(obj1).len(), 2);
        graph.bind_obj(syms[1], obj2);
        assert_eq!(graph.aliases_of(obj1).len(), 1);
        assert_eq!(graph.aliases_of(obj2).len(), 1);
    }

    #[test]
    fn test_ancestor_walk_terminates_on_cycle() {
        let (mut graph, syms) = make_graph_with(&["a", "b"]);
        graph.add_edge(syms[0], syms[1], Timestamp::new(1, 0));
        graph.add_edge(syms[1], syms[0], Timestamp::new(1, 1));
        assert!(graph.is_ancestor(syms[0], syms[1]));
        assert!(graph.is_ancestor(syms[1], syms[0]));
    }

    #[test]
    fn test_namespace_stale_reuse_guard() {
        let mut graph = DependencyGraph::new();
        let obj = ObjId::new(5);
        let ns = graph.ensure_namespace(obj);
        graph.namespace_mut(ns).tombstone = true;
        assert_eq!(graph.lookup_namespace(obj), None);
        // A fresh value reusing the token gets a fresh namespace.
        let ns2 = graph.ensure_namespace(obj);
        assert_ne!(ns, ns2);
    }

    #[test]
    fn test_garbage_collects_unaliased() {
        let (mut graph, syms) = make_graph_with(&["a", "member"]);
        let obj = ObjId::new(9);
        graph.bind_obj(syms[0], obj);
        let ns = graph.ensure_namespace(obj);
        graph.namespace_mut(ns).owner = Some(syms[0]);
        graph
            .namespace_mut(ns)
            .bind_member(crate::namespace::MemberKey::Attribute("m".into()), syms[1]);

        // Rebinding the only alias away orphans the value.
        graph.bind_obj(syms[0], ObjId::new(10));
        // Owner symbol is still alive but no longer aliases obj; refcount
        // counts the owner only while it is tombstone-free AND the value is
        // otherwise unaliased, so tombstone the owner first.
        graph.symbol_mut(syms[0]).tombstone = true;
        let collected = graph.collect_garbage();
        assert_eq!(collected, 1);
        assert!(graph.symbol(syms[1]).tombstone);
        assert!(graph.symbol(syms[1]).parents.is_empty());
        assert_eq!(graph.lookup_namespace(obj), None);
    }
}

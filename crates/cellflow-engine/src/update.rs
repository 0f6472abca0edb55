//! The update protocol.
//!
//! Runs whenever a symbol's bound value is rebound, mutated or deleted.
//! Advances timestamps and versions on the directly-updated set, records
//! descendant freshness in namespaces, then propagates "waiting" through
//! child edges and namespace containment. Every walk carries a global seen
//! set; aliased and self-referential object graphs are cyclic and the
//! walks must terminate anyway.
//!
//! Containment works in both directions, asymmetrically:
//!
//! - *Upward*, a member update also counts as an update of every alias of
//!   each enclosing container: those symbols still point at current data,
//!   so they are refreshed, and only their readers go waiting. This is what
//!   keeps `b = a; a[0] = 2` from flagging `b`.
//! - *Downward*, a symbol that is rebound or newly marked waiting drags the
//!   members of its own namespace along: they described the old value.

use cellflow_foundation::{SymbolId, Timestamp};
use indexmap::IndexSet;
use tracing::debug;

use crate::graph::DependencyGraph;
use crate::mutation::DescendantScope;

/// What kind of update hit the target symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateKind {
    /// Non-mutating rebind: old parent edges are replaced by the new set.
    Rebind,
    /// In-place mutation: new parents are unioned in, old parents kept, and
    /// all aliases of the value count as directly updated.
    Mutate(DescendantScope),
    /// Binding removed: all parent edges cleared, dependents still
    /// notified.
    Delete,
}

/// One update to apply.
#[derive(Debug, Clone)]
pub struct Update {
    pub target: SymbolId,
    pub kind: UpdateKind,
    /// Upstream symbols the new value was computed from.
    pub parents: IndexSet<SymbolId>,
    pub ts: Timestamp,
}

/// Apply an update and propagate staleness. Returns the directly-updated
/// set (useful to callers batching several updates in one statement).
pub fn apply_update(graph: &mut DependencyGraph, update: &Update) -> IndexSet<SymbolId> {
    let directly_updated = directly_updated_set(graph, update);

    // Phase 1: refresh the directly-updated symbols and their namespaces.
    // Members refreshed by an all-descendants mutation point at current
    // data themselves but their readers do not; they join the propagation
    // frontier below.
    let mut refreshed_members: Vec<SymbolId> = Vec::new();
    for &sym in &directly_updated {
        graph.symbol_mut(sym).refresh(update.ts);
        if let Some(ns) = graph.symbol(sym).containing_namespace {
            graph.namespace_mut(ns).record_descendent_update(update.ts);
        }
        if let UpdateKind::Mutate(scope) = &update.kind {
            if sym == update.target {
                refreshed_members = refresh_descendants(graph, sym, *scope, update.ts);
            }
        }
    }

    // Phase 2: propagate waiting outward. Directly-updated symbols expand
    // through child edges only; the rebound/deleted target and every
    // newly-waiting symbol also drag their namespace members along.
    let mut seen: IndexSet<SymbolId> = directly_updated.clone();
    seen.extend(refreshed_members.iter().copied());
    let mut frontier: Vec<(SymbolId, bool)> = directly_updated
        .iter()
        .map(|&sym| {
            let with_members =
                sym == update.target && !matches!(update.kind, UpdateKind::Mutate(_));
            (sym, with_members)
        })
        .collect();
    frontier.extend(refreshed_members.into_iter().map(|sym| (sym, true)));

    while let Some((sym, with_members)) = frontier.pop() {
        let mut dependents: Vec<SymbolId> = graph.symbol(sym).children.keys().copied().collect();
        if with_members {
            if let Some(ns) = graph.symbol(sym).namespace {
                dependents.extend(graph.namespace(ns).members());
            }
        }
        for dependent in dependents {
            if seen.insert(dependent) {
                debug!(
                    symbol = %graph.symbol(dependent).name,
                    ts = %update.ts,
                    "marked waiting"
                );
                graph.symbol_mut(dependent).mark_waiting(update.ts);
                frontier.push((dependent, true));
            }
        }
    }

    // Phase 3: install the new parent edges per edge lifetime.
    match &update.kind {
        UpdateKind::Rebind => {
            // Self-assignment guard: keep existing edges if the rebind
            // would make the target its own ancestor.
            let cyclic = update
                .parents
                .iter()
                .any(|&p| p == update.target || graph.is_ancestor(p, update.target));
            if !cyclic {
                graph.clear_parent_edges(update.target);
            }
            for &parent in &update.parents {
                if parent != update.target && !graph.is_ancestor(parent, update.target) {
                    graph.add_edge(parent, update.target, update.ts);
                }
            }
        }
        UpdateKind::Mutate(_) => {
            for &parent in &update.parents {
                if parent != update.target {
                    graph.add_edge(parent, update.target, update.ts);
                }
            }
        }
        UpdateKind::Delete => {
            graph.clear_parent_edges(update.target);
        }
    }

    // Record per-timestamp edges for the slicer.
    for &parent in &update.parents {
        let parent_ts = graph.symbol(parent).updated_ts;
        graph.record_ts_dep(update.ts, parent_ts, false);
    }

    directly_updated
}

/// The directly-updated set.
///
/// Mutations touch every alias of the value. Any update to a namespace
/// member also refreshes the enclosing containers' aliases, transitively:
/// those bindings still point at current data.
fn directly_updated_set(graph: &mut DependencyGraph, update: &Update) -> IndexSet<SymbolId> {
    let mut set: IndexSet<SymbolId> = IndexSet::from([update.target]);
    if let UpdateKind::Mutate(_) = &update.kind {
        if let Some(obj) = graph.symbol(update.target).obj() {
            set.extend(graph.aliases_of(obj));
        }
    }

    // Upward containment closure.
    let mut frontier: Vec<SymbolId> = set.iter().copied().collect();
    while let Some(sym) = frontier.pop() {
        let Some(ns_id) = graph.symbol(sym).containing_namespace else {
            continue;
        };
        graph.namespace_mut(ns_id).record_descendent_update(update.ts);
        let ns = graph.namespace(ns_id);
        let mut enclosing: Vec<SymbolId> = ns.owner.into_iter().collect();
        enclosing.extend(graph.aliases_of(ns.obj));
        for owner in enclosing {
            if set.insert(owner) {
                frontier.push(owner);
            }
        }
    }
    set
}

/// Refresh namespace descendants per the operation's declared scope.
/// Returns the refreshed member symbols.
fn refresh_descendants(
    graph: &mut DependencyGraph,
    sym: SymbolId,
    scope: DescendantScope,
    ts: Timestamp,
) -> Vec<SymbolId> {
    let Some(ns) = graph.symbol(sym).namespace else {
        return Vec::new();
    };
    graph.namespace_mut(ns).record_descendent_update(ts);
    match scope {
        DescendantScope::All => {
            let members: Vec<SymbolId> = graph.namespace(ns).members().collect();
            for &member in &members {
                graph.symbol_mut(member).refresh(ts);
            }
            graph.namespace_mut(ns).record_structural_change(ts);
            members
        }
        // The touched member is created/refreshed by the accompanying
        // write event; only the structural timestamp moves here.
        DescendantScope::AppendedIndex | DescendantScope::KeyArg(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellflow_ast::SubscriptKey;
    use cellflow_foundation::ObjId;
    use crate::namespace::MemberKey;
    use crate::symbol::SymbolKind;

    fn make_graph(names: &[&str]) -> (DependencyGraph, Vec<SymbolId>) {
        let mut graph = DependencyGraph::new();
        let scope = graph.global_scope();
        let syms = names
            .iter()
            .map(|n| graph.ensure_name(scope, n, SymbolKind::Default))
            .collect();
        (graph, syms)
    }

    fn rebind(graph: &mut DependencyGraph, target: SymbolId, parents: &[SymbolId], ts: Timestamp) {
        apply_update(
            graph,
            &Update {
                target,
                kind: UpdateKind::Rebind,
                parents: parents.iter().copied().collect(),
                ts,
            },
        );
    }

    /// Container bound to `owner` with one indexed member; returns the
    /// member symbol.
    fn attach_member(
        graph: &mut DependencyGraph,
        owner: SymbolId,
        obj: ObjId,
        index: i64,
    ) -> SymbolId {
        graph.bind_obj(owner, obj);
        let ns = graph.ensure_namespace(obj);
        graph.namespace_mut(ns).owner = Some(owner);
        graph.symbol_mut(owner).namespace = Some(ns);
        let scope = graph.global_scope();
        let member = graph.create_symbol("<member>", SymbolKind::Subscript, scope);
        graph.symbol_mut(member).containing_namespace = Some(ns);
        graph
            .namespace_mut(ns)
            .bind_member(MemberKey::Subscript(SubscriptKey::Index(index)), member);
        member
    }

    #[test]
    fn test_rebind_marks_children_waiting() {
        let (mut graph, syms) = make_graph(&["x", "y"]);
        let (x, y) = (syms[0], syms[1]);
        rebind(&mut graph, x, &[], Timestamp::new(1, 0));
        rebind(&mut graph, y, &[x], Timestamp::new(2, 0));
        assert!(!graph.symbol(y).is_directly_waiting(Timestamp::UNINITIALIZED));

        rebind(&mut graph, x, &[], Timestamp::new(3, 0));
        assert!(graph.symbol(y).is_directly_waiting(Timestamp::UNINITIALIZED));
    }

    #[test]
    fn test_waiting_is_transitive() {
        let (mut graph, syms) = make_graph(&["x", "y", "z"]);
        let (x, y, z) = (syms[0], syms[1], syms[2]);
        rebind(&mut graph, x, &[], Timestamp::new(1, 0));
        rebind(&mut graph, y, &[x], Timestamp::new(2, 0));
        rebind(&mut graph, z, &[y], Timestamp::new(3, 0));
        rebind(&mut graph, x, &[], Timestamp::new(4, 0));
        assert!(graph.symbol(y).is_directly_waiting(Timestamp::UNINITIALIZED));
        assert!(graph.symbol(z).is_directly_waiting(Timestamp::UNINITIALIZED));
    }

    #[test]
    fn test_rebind_replaces_parent_edges() {
        let (mut graph, syms) = make_graph(&["a", "b", "c"]);
        let (a, b, c) = (syms[0], syms[1], syms[2]);
        rebind(&mut graph, c, &[a], Timestamp::new(1, 0));
        assert!(graph.symbol(c).parents.contains_key(&a));
        rebind(&mut graph, c, &[b], Timestamp::new(2, 0));
        assert!(!graph.symbol(c).parents.contains_key(&a));
        assert!(graph.symbol(c).parents.contains_key(&b));
    }

    #[test]
    fn test_self_assignment_guard_keeps_edges() {
        let (mut graph, syms) = make_graph(&["a", "b"]);
        let (a, b) = (syms[0], syms[1]);
        rebind(&mut graph, b, &[a], Timestamp::new(1, 0));
        // `b = b` must not clear the a -> b edge.
        rebind(&mut graph, b, &[b], Timestamp::new(2, 0));
        assert!(graph.symbol(b).parents.contains_key(&a));
        assert!(!graph.symbol(b).parents.contains_key(&b));
    }

    #[test]
    fn test_mutation_updates_all_aliases() {
        let (mut graph, syms) = make_graph(&["a", "b"]);
        let (a, b) = (syms[0], syms[1]);
        let obj = ObjId::new(7);
        graph.bind_obj(a, obj);
        graph.bind_obj(b, obj);
        apply_update(
            &mut graph,
            &Update {
                target: a,
                kind: UpdateKind::Mutate(DescendantScope::All),
                parents: IndexSet::new(),
                ts: Timestamp::new(3, 0),
            },
        );
        assert_eq!(graph.symbol(a).updated_ts, Timestamp::new(3, 0));
        assert_eq!(graph.symbol(b).updated_ts, Timestamp::new(3, 0));
        // Aliases were directly updated, not marked waiting.
        assert!(!graph.symbol(b).is_directly_waiting(Timestamp::UNINITIALIZED));
    }

    #[test]
    fn test_mutation_keeps_old_parents() {
        let (mut graph, syms) = make_graph(&["src", "lst", "extra"]);
        let (src, lst, extra) = (syms[0], syms[1], syms[2]);
        rebind(&mut graph, lst, &[src], Timestamp::new(1, 0));
        apply_update(
            &mut graph,
            &Update {
                target: lst,
                kind: UpdateKind::Mutate(DescendantScope::All),
                parents: IndexSet::from([extra]),
                ts: Timestamp::new(2, 0),
            },
        );
        assert!(graph.symbol(lst).parents.contains_key(&src));
        assert!(graph.symbol(lst).parents.contains_key(&extra));
    }

    #[test]
    fn test_delete_clears_parents_notifies_children() {
        let (mut graph, syms) = make_graph(&["p", "x", "c"]);
        let (p, x, c) = (syms[0], syms[1], syms[2]);
        rebind(&mut graph, x, &[p], Timestamp::new(1, 0));
        rebind(&mut graph, c, &[x], Timestamp::new(2, 0));
        apply_update(
            &mut graph,
            &Update {
                target: x,
                kind: UpdateKind::Delete,
                parents: IndexSet::new(),
                ts: Timestamp::new(3, 0),
            },
        );
        assert!(graph.symbol(x).parents.is_empty());
        assert!(graph.symbol(c).is_directly_waiting(Timestamp::UNINITIALIZED));
    }

    #[test]
    fn test_member_write_refreshes_container_aliases() {
        let (mut graph, syms) = make_graph(&["a", "b", "reader"]);
        let (a, b, reader) = (syms[0], syms[1], syms[2]);
        let obj = ObjId::new(9);
        let member = attach_member(&mut graph, a, obj, 0);
        graph.bind_obj(b, obj);
        // `reader = a` consumed the container deeply.
        rebind(&mut graph, reader, &[a], Timestamp::new(1, 0));

        // `a[0] = 2`: the alias still points at current data; the deep
        // reader holds a value computed from the old contents.
        rebind(&mut graph, member, &[], Timestamp::new(2, 0));
        assert!(!graph.symbol(b).is_directly_waiting(Timestamp::UNINITIALIZED));
        assert_eq!(graph.symbol(a).updated_ts, Timestamp::new(2, 0));
        assert!(
            graph
                .symbol(reader)
                .is_directly_waiting(Timestamp::UNINITIALIZED)
        );
    }

    #[test]
    fn test_member_write_leaves_sibling_members_fresh() {
        let (mut graph, syms) = make_graph(&["lst", "y"]);
        let (lst, y) = (syms[0], syms[1]);
        let obj = ObjId::new(10);
        let member0 = attach_member(&mut graph, lst, obj, 0);
        let ns = graph.symbol(lst).namespace.unwrap();
        let scope = graph.global_scope();
        let member1 = graph.create_symbol("<member>", SymbolKind::Subscript, scope);
        graph.symbol_mut(member1).containing_namespace = Some(ns);
        graph
            .namespace_mut(ns)
            .bind_member(MemberKey::Subscript(SubscriptKey::Index(1)), member1);

        // `y = lst[0] + 1`, then `lst[1] = 9`.
        rebind(&mut graph, member0, &[], Timestamp::new(1, 0));
        rebind(&mut graph, y, &[member0], Timestamp::new(2, 0));
        rebind(&mut graph, member1, &[], Timestamp::new(3, 0));
        assert!(
            !graph
                .symbol(member0)
                .is_directly_waiting(Timestamp::UNINITIALIZED)
        );
        assert!(!graph.symbol(y).is_directly_waiting(Timestamp::UNINITIALIZED));
    }

    #[test]
    fn test_all_descendants_mutation_notifies_member_readers() {
        let (mut graph, syms) = make_graph(&["lst", "y"]);
        let (lst, y) = (syms[0], syms[1]);
        let member = attach_member(&mut graph, lst, ObjId::new(13), 0);
        rebind(&mut graph, member, &[], Timestamp::new(1, 0));
        // `y = lst[0]`, then `lst.sort()`.
        rebind(&mut graph, y, &[member], Timestamp::new(2, 0));
        apply_update(
            &mut graph,
            &Update {
                target: lst,
                kind: UpdateKind::Mutate(DescendantScope::All),
                parents: IndexSet::new(),
                ts: Timestamp::new(3, 0),
            },
        );
        // The member points at current data; its reader does not.
        assert!(
            !graph
                .symbol(member)
                .is_directly_waiting(Timestamp::UNINITIALIZED)
        );
        assert!(graph.symbol(y).is_directly_waiting(Timestamp::UNINITIALIZED));
    }

    #[test]
    fn test_rebinding_container_marks_members_waiting() {
        let (mut graph, syms) = make_graph(&["d"]);
        let d = syms[0];
        let member = attach_member(&mut graph, d, ObjId::new(11), 0);
        rebind(&mut graph, d, &[], Timestamp::new(5, 0));
        assert!(
            graph
                .symbol(member)
                .is_directly_waiting(Timestamp::UNINITIALIZED)
        );
    }

    #[test]
    fn test_namespace_descendent_timestamp_recorded() {
        let (mut graph, syms) = make_graph(&["d"]);
        let d = syms[0];
        let member = attach_member(&mut graph, d, ObjId::new(12), 0);
        rebind(&mut graph, member, &[], Timestamp::new(4, 1));
        let ns = graph.symbol(d).namespace.unwrap();
        assert_eq!(graph.namespace(ns).max_descendent_ts, Timestamp::new(4, 1));
    }

    #[test]
    fn test_propagation_terminates_on_cycles() {
        let (mut graph, syms) = make_graph(&["a", "b"]);
        let (a, b) = (syms[0], syms[1]);
        // Mutual dependency through existing edges.
        graph.add_edge(a, b, Timestamp::new(1, 0));
        graph.add_edge(b, a, Timestamp::new(1, 1));
        // Must terminate and visit each node at most once.
        apply_update(
            &mut graph,
            &Update {
                target: a,
                kind: UpdateKind::Mutate(DescendantScope::All),
                parents: IndexSet::new(),
                ts: Timestamp::new(2, 0),
            },
        );
        assert!(graph.symbol(b).is_directly_waiting(Timestamp::UNINITIALIZED));
    }
}

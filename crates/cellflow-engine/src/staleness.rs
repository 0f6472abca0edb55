//! Staleness and readiness queries.
//!
//! `is_waiting` answers "does this symbol currently hold data computed from
//! something older than its freshest upstream." The positional variant
//! answers the flow-order question "assuming units execute up to position
//! P, is a read of this symbol at P safe": only updates that happened
//! before P exist from P's point of view.
//!
//! The positional recursion can cycle through namespace and child edges,
//! so results are memoized per `(symbol, position, deep)` with the memo
//! entry pre-seeded to "not waiting" before recursing. The memo is
//! invalidated wholesale when the global execution counter advances; no
//! other event may invalidate it.

use std::collections::HashMap;

use cellflow_foundation::{SymbolId, Timestamp};
use indexmap::IndexSet;

use crate::graph::DependencyGraph;

/// Position meaning "after everything": collapses the positional query to
/// the plain any-order one.
pub const ANY_POSITION: u64 = u64::MAX;

/// Memoized positional readiness results.
#[derive(Debug, Default)]
pub struct ReadinessCache {
    counter: u64,
    memo: HashMap<(SymbolId, u64, bool), bool>,
}

impl ReadinessCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all memoized results if the execution counter has advanced.
    pub fn sync(&mut self, counter: u64) {
        if counter != self.counter {
            self.memo.clear();
            self.counter = counter;
        }
    }
}

/// Whether a symbol is waiting on an upstream update.
///
/// With `deep`, a symbol also waits when anything nested in its namespace
/// waits (consuming the whole container consumes every member).
pub fn is_waiting(graph: &DependencyGraph, sym: SymbolId, floor: Timestamp, deep: bool) -> bool {
    let mut visited = IndexSet::new();
    waiting_inner(graph, sym, floor, deep, &mut visited)
}

fn waiting_inner(
    graph: &DependencyGraph,
    sym: SymbolId,
    floor: Timestamp,
    deep: bool,
    visited: &mut IndexSet<SymbolId>,
) -> bool {
    if !visited.insert(sym) {
        return false;
    }
    let symbol = graph.symbol(sym);
    if symbol.is_directly_waiting(floor) {
        return true;
    }
    if deep {
        if let Some(ns) = symbol.namespace {
            for member in graph.namespace(ns).members().collect::<Vec<_>>() {
                if waiting_inner(graph, member, floor, true, visited) {
                    return true;
                }
            }
        }
    }
    false
}

/// Positional readiness: is a read of `sym` at unit position `pos` safe.
///
/// A symbol waits at `pos` when some stale-making parent update is visible
/// from `pos` (edge introduced before `pos`, parent refreshed after this
/// symbol but still before `pos`). Updates at or past `pos` have not
/// happened yet in flow order and do not count. Pass [`ANY_POSITION`] for
/// any-order semantics.
pub fn is_waiting_at_position(
    graph: &DependencyGraph,
    cache: &mut ReadinessCache,
    sym: SymbolId,
    pos: u64,
    deep: bool,
    floor: Timestamp,
) -> bool {
    let key = (sym, pos, deep);
    if let Some(&hit) = cache.memo.get(&key) {
        return hit;
    }
    // Fixpoint guard: a cycle reaching back here reads "not waiting".
    cache.memo.insert(key, false);
    let result = waiting_at_position_inner(graph, cache, sym, pos, deep, floor);
    cache.memo.insert(key, result);
    result
}

fn waiting_at_position_inner(
    graph: &DependencyGraph,
    cache: &mut ReadinessCache,
    sym: SymbolId,
    pos: u64,
    deep: bool,
    floor: Timestamp,
) -> bool {
    let symbol = graph.symbol(sym);
    let self_ts = symbol.updated_ts.clamped(floor);

    if symbol.is_directly_waiting(floor) {
        for (parent, edge_ts) in &symbol.parents {
            if !edge_ts.iter().any(|t| t.cell < pos) {
                continue;
            }
            let parent_ts = graph.symbol(*parent).updated_ts.clamped(floor);
            if parent_ts > self_ts && parent_ts.cell < pos {
                return true;
            }
        }
        // Waiting imposed without a parent edge (namespace containment):
        // honor it when the triggering update is visible from `pos`.
        if symbol.required_ts > self_ts && symbol.required_ts.cell < pos {
            return true;
        }
    }

    if deep {
        if let Some(ns) = symbol.namespace {
            for member in graph.namespace(ns).members().collect::<Vec<_>>() {
                if is_waiting_at_position(graph, cache, member, pos, deep, floor) {
                    return true;
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellflow_ast::SubscriptKey;
    use cellflow_foundation::ObjId;

    use crate::namespace::MemberKey;
    use crate::symbol::SymbolKind;
    use crate::update::{apply_update, Update, UpdateKind};

    const NO_FLOOR: Timestamp = Timestamp::UNINITIALIZED;

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

    #[test]
    fn test_fresh_symbol_not_waiting() {
        let (mut graph, syms) = make_graph(&["x"]);
        rebind(&mut graph, syms[0], &[], Timestamp::new(1, 0));
        assert!(!is_waiting(&graph, syms[0], NO_FLOOR, true));
    }

    #[test]
    fn test_deep_waits_on_namespace_member() {
        let (mut graph, syms) = make_graph(&["lst", "member"]);
        let (lst, member) = (syms[0], syms[1]);
        let obj = ObjId::new(4);
        graph.bind_obj(lst, obj);
        let ns = graph.ensure_namespace(obj);
        graph.symbol_mut(lst).namespace = Some(ns);
        graph.symbol_mut(member).containing_namespace = Some(ns);
        graph
            .namespace_mut(ns)
            .bind_member(MemberKey::Subscript(SubscriptKey::Index(0)), member);
        rebind(&mut graph, lst, &[], Timestamp::new(1, 0));
        graph.symbol_mut(member).refresh(Timestamp::new(1, 1));

        graph.symbol_mut(member).mark_waiting(Timestamp::new(2, 0));
        assert!(is_waiting(&graph, lst, NO_FLOOR, true));
        assert!(!is_waiting(&graph, lst, NO_FLOOR, false));
    }

    #[test]
    fn test_floor_resets_waiting() {
        let (mut graph, syms) = make_graph(&["x", "y"]);
        let (x, y) = (syms[0], syms[1]);
        rebind(&mut graph, x, &[], Timestamp::new(1, 0));
        rebind(&mut graph, y, &[x], Timestamp::new(2, 0));
        rebind(&mut graph, x, &[], Timestamp::new(3, 0));
        assert!(is_waiting(&graph, y, NO_FLOOR, true));
        assert!(!is_waiting(&graph, y, Timestamp::at_cell(3), true));
    }

    #[test]
    fn test_positional_update_past_position_invisible() {
        let (mut graph, syms) = make_graph(&["x", "y"]);
        let (x, y) = (syms[0], syms[1]);
        rebind(&mut graph, x, &[], Timestamp::new(1, 0));
        rebind(&mut graph, y, &[x], Timestamp::new(2, 0));
        rebind(&mut graph, x, &[], Timestamp::new(5, 0));

        let mut cache = ReadinessCache::new();
        // From position 4 the update at unit 5 has not happened yet.
        assert!(!is_waiting_at_position(&graph, &mut cache, y, 4, true, NO_FLOOR));
        // From position 6 (or in any-order mode) it has.
        assert!(is_waiting_at_position(&graph, &mut cache, y, 6, true, NO_FLOOR));
        assert!(is_waiting_at_position(
            &graph,
            &mut cache,
            y,
            ANY_POSITION,
            true,
            NO_FLOOR
        ));
    }

    #[test]
    fn test_memo_survives_within_counter() {
        let (mut graph, syms) = make_graph(&["x", "y"]);
        let (x, y) = (syms[0], syms[1]);
        rebind(&mut graph, x, &[], Timestamp::new(1, 0));
        rebind(&mut graph, y, &[x], Timestamp::new(2, 0));
        rebind(&mut graph, x, &[], Timestamp::new(3, 0));

        let mut cache = ReadinessCache::new();
        cache.sync(3);
        let first = is_waiting_at_position(&graph, &mut cache, y, ANY_POSITION, true, NO_FLOOR);
        let second = is_waiting_at_position(&graph, &mut cache, y, ANY_POSITION, true, NO_FLOOR);
        assert_eq!(first, second);
        assert!(first);
        // Same counter: memo kept. Advanced counter: memo dropped.
        cache.sync(3);
        assert!(!cache.memo.is_empty());
        cache.sync(4);
        assert!(cache.memo.is_empty());
    }

    #[test]
    fn test_cycle_reads_not_waiting_in_fixpoint() {
        let (mut graph, syms) = make_graph(&["a", "b"]);
        let (a, b) = (syms[0], syms[1]);
        // a and b mutually depend; neither has a fresher parent.
        graph.add_edge(a, b, Timestamp::new(1, 0));
        graph.add_edge(b, a, Timestamp::new(1, 1));
        graph.symbol_mut(a).refresh(Timestamp::new(1, 0));
        graph.symbol_mut(b).refresh(Timestamp::new(1, 1));
        let mut cache = ReadinessCache::new();
        assert!(!is_waiting_at_position(
            &graph,
            &mut cache,
            a,
            ANY_POSITION,
            true,
            NO_FLOOR
        ));
    }

    #[test]
    fn test_query_is_idempotent() {
        let (mut graph, syms) = make_graph(&["x", "y"]);
        let (x, y) = (syms[0], syms[1]);
        rebind(&mut graph, x, &[], Timestamp::new(1, 0));
        rebind(&mut graph, y, &[x], Timestamp::new(2, 0));
        rebind(&mut graph, x, &[], Timestamp::new(3, 0));
        let before = format!("{:?}", graph.symbol(y));
        let waiting1 = is_waiting(&graph, y, NO_FLOOR, true);
        let waiting2 = is_waiting(&graph, y, NO_FLOOR, true);
        assert_eq!(waiting1, waiting2);
        assert_eq!(before, format!("{:?}", graph.symbol(y)));
    }
}

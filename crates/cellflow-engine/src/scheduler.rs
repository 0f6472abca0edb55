//! Readiness classification for a batch of cells.
//!
//! For each checked cell the scheduler re-derives live and dead chains
//! from the stored statements and resolves them against the current graph.
//! A cell whose inputs are stale or unresolvable is *waiting* and not
//! actionable; a cell whose inputs are clean but whose output is out of
//! date is both waiting and *ready* (re-running it now is meaningful). The
//! link maps answer "which cell would unblock you" and "which cell made
//! you ready" for display.
//!
//! Which updates count as "out of date" depends on the active policy:
//! unit-level graph edges, live-binding freshness, or any overwrite of a
//! bound name (strict, which also short-circuits the batch).
//!
//! Reactivity sigils override the policy for the reads that carry them: a
//! `$x` read triggers on any update of `x`, a `$$x` read additionally
//! cascades readiness to cells reading what this one binds, and a `~x`
//! read never blocks or triggers the cell. The cascade frontier is
//! computed to a fixpoint over the batch before any cell is classified
//! and lives only for the duration of one check; checking never writes
//! back into the graph.

use std::sync::Arc;

use cellflow_analyze::compute_liveness;
use cellflow_foundation::{CellId, SymbolId, Timestamp};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cell::CellStore;
use crate::config::SessionConfig;
use crate::graph::DependencyGraph;
use crate::mutation::MutationRegistry;
use crate::resolver::{Resolution, Resolver};
use crate::staleness::{is_waiting_at_position, ReadinessCache, ANY_POSITION};

/// Consistency policy deciding when a cell counts as needing a re-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerPolicy {
    /// A direct unit parent was updated after this cell's last run.
    DependencyOrder,
    /// Some live binding is fresher than this cell's last run.
    Liveness,
    /// Any bound-and-killed name was overwritten afterward; stops scanning
    /// the batch at the first hit.
    Strict,
}

/// Classification of one batch check, plain ids throughout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerResult {
    /// Cells whose output or inputs are out of date.
    pub waiting_cells: IndexSet<CellId>,
    /// Waiting cells whose inputs are clean: re-runnable right now.
    pub ready_cells: IndexSet<CellId>,
    /// Ready cells whose triggering update happened in the current step.
    pub newly_ready_cells: IndexSet<CellId>,
    /// Blocked cell -> cells whose re-run would unblock it.
    pub waiter_links: IndexMap<CellId, IndexSet<CellId>>,
    /// Ready cell -> cells whose re-run made it ready.
    pub readiness_links: IndexMap<CellId, IndexSet<CellId>>,
    /// Set instead of raising: the scheduler is polled continuously.
    pub misconfiguration: Option<String>,
}

/// Per-cell data gathered up front, so the cascade frontier can reach a
/// fixpoint over the whole batch before any cell is classified.
struct PreparedCell {
    unit: u64,
    cell: CellId,
    run_ts: Timestamp,
    pos: u64,
    unit_parents: Vec<SymbolId>,
    /// Resolutions of the live chains.
    inputs: Vec<Resolution>,
    /// Resolutions of the freshly bound chains.
    outputs: Vec<Resolution>,
    unresolved: bool,
}

/// Batch readiness checker over the graph and the cell store.
pub struct Scheduler<'a> {
    graph: &'a mut DependencyGraph,
    cells: &'a CellStore,
    registry: &'a MutationRegistry,
    cache: &'a mut ReadinessCache,
    config: &'a SessionConfig,
    floor: Timestamp,
    counter: u64,
}

impl<'a> Scheduler<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        graph: &'a mut DependencyGraph,
        cells: &'a CellStore,
        registry: &'a MutationRegistry,
        cache: &'a mut ReadinessCache,
        config: &'a SessionConfig,
        floor: Timestamp,
        counter: u64,
    ) -> Self {
        Self {
            graph,
            cells,
            registry,
            cache,
            config,
            floor,
            counter,
        }
    }

    /// Classify a batch of cells. `last_executed` is skipped: its state is
    /// current by definition.
    pub fn check(&mut self, to_check: &[CellId], last_executed: Option<CellId>) -> SchedulerResult {
        let mut result = SchedulerResult::default();
        if self.config.policy == SchedulerPolicy::DependencyOrder
            && !self.config.static_edges
            && !self.config.dynamic_edges
        {
            result.misconfiguration = Some(
                "dependency-order policy with both static and dynamic unit edges disabled".into(),
            );
            return result;
        }
        self.cache.sync(self.counter);

        let mut ordered: Vec<(u64, CellId)> = to_check
            .iter()
            .filter(|cell| Some(**cell) != last_executed)
            .filter_map(|cell| self.cells.latest_unit(*cell).map(|unit| (unit, *cell)))
            .collect();
        ordered.sort_unstable();
        ordered.dedup();

        let mut prepared: Vec<PreparedCell> = Vec::with_capacity(ordered.len());
        for (unit, cell) in ordered {
            let Some(version) = self.cells.version(unit) else {
                continue;
            };
            let stmts = Arc::clone(&version.stmts);
            let run_ts = version.run_ts();
            let mut unit_parents: Vec<SymbolId> = Vec::new();
            if self.config.static_edges {
                for syms in version.static_parents.values() {
                    unit_parents.extend(syms.iter().copied());
                }
            }
            if self.config.dynamic_edges {
                for syms in version.dynamic_parents.values() {
                    unit_parents.extend(syms.iter().copied());
                }
            }

            let pos = self.flow_position(cell);
            let liveness = compute_liveness(&stmts, &IndexSet::new());
            let scope = self.graph.global_scope();

            let mut inputs: Vec<Resolution> = Vec::new();
            let mut unresolved = false;
            for live in &liveness.live {
                let resolution =
                    Resolver::new(self.graph, self.registry).resolve(scope, &live.chain);
                unresolved |= resolution.is_unresolved();
                inputs.push(resolution);
            }
            let outputs: Vec<Resolution> = liveness
                .dead
                .iter()
                .map(|chain| Resolver::new(self.graph, self.registry).resolve(scope, chain))
                .collect();

            prepared.push(PreparedCell {
                unit,
                cell,
                run_ts,
                pos,
                unit_parents,
                inputs,
                outputs,
                unresolved,
            });
        }

        let frontier = self.cascade_frontier(&prepared);

        for prep in &prepared {
            // Input side first: a cell reading stale or unresolvable data
            // is blocked no matter what the policy says.
            let mut blockers: IndexSet<SymbolId> = IndexSet::new();
            for resolution in &prep.inputs {
                for dep in resolution.dependency_refs() {
                    if dep.is_blocked || self.block_recorded(dep.symbol, prep.unit) {
                        continue;
                    }
                    if is_waiting_at_position(
                        self.graph,
                        self.cache,
                        dep.symbol,
                        prep.pos,
                        dep.is_deep,
                        self.floor,
                    ) {
                        blockers.insert(dep.symbol);
                    }
                }
            }
            if prep.unresolved || !blockers.is_empty() {
                debug!(cell = %prep.cell, "cell waiting on stale or unresolved inputs");
                result.waiting_cells.insert(prep.cell);
                let links = self.defining_cells(&blockers, prep.cell);
                if !links.is_empty() {
                    result.waiter_links.insert(prep.cell, links);
                }
                continue;
            }

            let mut triggers: IndexSet<SymbolId> = IndexSet::new();
            let mut cascade_hit = false;
            // Sigil reads are policy-independent: a reactive read triggers
            // on any update, and the frontier carries `$$` readiness
            // through the batch.
            for resolution in &prep.inputs {
                for dep in resolution.dependency_refs() {
                    if dep.is_blocked || self.block_recorded(dep.symbol, prep.unit) {
                        continue;
                    }
                    if frontier.contains(&dep.symbol) {
                        triggers.insert(dep.symbol);
                        cascade_hit = true;
                        continue;
                    }
                    let sym = self.graph.symbol(dep.symbol);
                    if sym
                        .cascading_reactive_unit
                        .is_some_and(|marked| marked > prep.run_ts.cell)
                    {
                        triggers.insert(dep.symbol);
                        continue;
                    }
                    if dep.is_reactive && sym.updated_ts.clamped(self.floor) > prep.run_ts {
                        triggers.insert(dep.symbol);
                    }
                }
            }
            match self.config.policy {
                SchedulerPolicy::DependencyOrder => {
                    for sym in &prep.unit_parents {
                        if self.graph.symbol(*sym).updated_ts.clamped(self.floor) > prep.run_ts {
                            triggers.insert(*sym);
                        }
                    }
                }
                SchedulerPolicy::Liveness => {
                    for resolution in &prep.inputs {
                        for dep in resolution.dependency_refs() {
                            // Shallow container hops track their member's
                            // freshness, not their own.
                            if !dep.is_deep {
                                continue;
                            }
                            if dep.is_blocked || self.block_recorded(dep.symbol, prep.unit) {
                                continue;
                            }
                            let ts = self.graph.symbol(dep.symbol).updated_ts;
                            if ts.clamped(self.floor) > prep.run_ts {
                                triggers.insert(dep.symbol);
                            }
                        }
                    }
                }
                SchedulerPolicy::Strict => {
                    for resolution in &prep.outputs {
                        if let Some(last) = resolution.refs().last() {
                            let ts = self.graph.symbol(last.symbol).updated_ts;
                            if ts.clamped(self.floor) > prep.run_ts && ts.cell != prep.unit {
                                triggers.insert(last.symbol);
                            }
                        }
                    }
                }
            }
            if triggers.is_empty() {
                continue;
            }

            result.waiting_cells.insert(prep.cell);
            result.ready_cells.insert(prep.cell);
            if cascade_hit
                || triggers.iter().any(|sym| {
                    let state = self.graph.symbol(*sym);
                    state.updated_ts.cell == self.counter
                        || state.cascading_reactive_unit == Some(self.counter)
                })
            {
                result.newly_ready_cells.insert(prep.cell);
            }
            let links = self.defining_cells(&triggers, prep.cell);
            if !links.is_empty() {
                result.readiness_links.insert(prep.cell, links);
            }
            if self.config.policy == SchedulerPolicy::Strict {
                break;
            }
        }
        result
    }

    /// Symbols whose readiness cascades onward in this check. Seeded by
    /// `$$` reads (live flags or run-time markers), then propagated to the
    /// symbols cascading cells bind, to a fixpoint so the batch's run
    /// order does not matter. The frontier is local to the check.
    fn cascade_frontier(&self, prepared: &[PreparedCell]) -> IndexSet<SymbolId> {
        let mut frontier: IndexSet<SymbolId> = IndexSet::new();
        loop {
            let before = frontier.len();
            for prep in prepared {
                let cascades = prep
                    .inputs
                    .iter()
                    .flat_map(|resolution| resolution.dependency_refs())
                    .any(|dep| {
                        if dep.is_blocked || self.block_recorded(dep.symbol, prep.unit) {
                            return false;
                        }
                        if frontier.contains(&dep.symbol) {
                            return true;
                        }
                        let sym = self.graph.symbol(dep.symbol);
                        sym.cascading_reactive_unit
                            .is_some_and(|marked| marked > prep.run_ts.cell)
                            || (dep.is_cascading_reactive
                                && sym.updated_ts.clamped(self.floor) > prep.run_ts)
                    });
                if cascades {
                    for resolution in &prep.outputs {
                        if let Some(bound) = resolution.refs().last() {
                            frontier.insert(bound.symbol);
                        }
                    }
                }
            }
            if frontier.len() == before {
                break;
            }
        }
        frontier
    }

    /// Whether this cell's latest run recorded a blocked (`~`) read of the
    /// symbol at runtime. Covers reads the re-resolved chains cannot see,
    /// such as those observed inside calls.
    fn block_recorded(&self, sym: SymbolId, unit: u64) -> bool {
        self.graph.symbol(sym).blocked_units.contains(&unit)
    }

    /// Unit position this cell's readiness is judged from. With flow order
    /// off, every recorded update is visible. With flow order on, cell id
    /// order stands in for layout order: updates recorded by cells placed
    /// after this one have not happened yet from its point of view.
    fn flow_position(&self, cell: CellId) -> u64 {
        if !self.config.flow_order {
            return ANY_POSITION;
        }
        self.cells
            .cells()
            .filter(|other| *other > cell)
            .filter_map(|other| self.cells.latest_unit(other))
            .min()
            .unwrap_or(ANY_POSITION)
    }

    /// Cells whose latest run produced the given symbols' current values.
    fn defining_cells(&self, syms: &IndexSet<SymbolId>, except: CellId) -> IndexSet<CellId> {
        syms.iter()
            .filter_map(|sym| {
                let ts = self.graph.symbol(*sym).updated_ts;
                if !ts.is_initialized() {
                    return None;
                }
                self.cells.version(ts.cell).map(|v| v.cell)
            })
            .filter(|cell| *cell != except)
            .collect()
    }
}

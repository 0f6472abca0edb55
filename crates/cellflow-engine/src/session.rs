//! The session: one engine instance, owned by the embedder.
//!
//! There is no ambient global state; the graph, the cell store, the
//! mutation registry and the readiness cache all live here and every
//! query or update goes through an explicit `&mut Session`. Execution is
//! strictly sequential: `run_cell` consumes one cell's source plus the
//! event trace its instrumented execution produced, and the graph is only
//! mutated between cells or at a recorded statement boundary.
//!
//! # Design
//!
//! `run_cell` works in three passes. Definitions first (functions,
//! classes, lambdas), so calls later in the same cell resolve. Then a
//! static pass over the liveness result records usage and per-unit static
//! edges from what the source *says* it reads. Finally the event trace is
//! replayed in order; runtime reads widen the dependency sets the static
//! pass found, and writes drive the update protocol. A statement whose
//! mutation cannot be modeled has the rest of its registration skipped,
//! leaving the graph in its prior consistent state.

use std::sync::Arc;

use cellflow_analyze::{compute_liveness, LivenessResult};
use cellflow_ast::{walk_stmt_exprs, Stmt, StmtKind, SubscriptKey, SymbolRef};
use cellflow_ast::ExprKind;
use cellflow_foundation::{CellId, ObjId, ScopeId, SymbolId, Timestamp, TypeTag};
use cellflow_parser::parse_statements;
use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info, warn};

use crate::cell::CellStore;
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::event::{Event, Key, ValueRecord, WriteScope};
use crate::graph::DependencyGraph;
use crate::mutation::{DescendantScope, MutationEffect, MutationRegistry};
use crate::namespace::MemberKey;
use crate::resolver::Resolver;
use crate::scheduler::{Scheduler, SchedulerResult};
use crate::slicer::{SliceResult, Slicer};
use crate::staleness::{self, ReadinessCache};
use crate::symbol::{FunctionInfo, SymbolKind};
use crate::update::{apply_update, Update, UpdateKind};

/// What the static pass learned about the cell, consumed while replaying
/// the trace.
#[derive(Debug, Default)]
struct StaticPlan {
    /// Statically-derived dependency symbols per statement.
    parents_by_stmt: IndexMap<u32, IndexSet<SymbolId>>,
    /// Identity-reassignment candidates whose registration is deferred to
    /// the write event, keyed by statement.
    deferred: IndexMap<u32, DeferredReassign>,
}

/// A `a = b`-shaped reassignment held back until the written identity is
/// known.
#[derive(Debug)]
struct DeferredReassign {
    target: String,
    source_name: String,
    source: SymbolId,
    deep: bool,
}

/// Mutable state threaded through one trace replay.
#[derive(Debug, Default)]
struct TraceState {
    /// Symbols consumed at runtime per statement; parents for that
    /// statement's writes.
    stmt_reads: IndexMap<u32, IndexSet<SymbolId>>,
    /// Statements whose remaining registration is skipped.
    skip: IndexSet<u32>,
    /// Open calls that did not push a scope, for `Return` balance.
    opaque_calls: u32,
}

/// One engine instance.
pub struct Session {
    graph: DependencyGraph,
    cells: CellStore,
    registry: MutationRegistry,
    config: SessionConfig,
    cache: ReadinessCache,
    /// Global execution counter; each `run_cell` is one unit.
    counter: u64,
    /// Manual-reset floor: timestamps clamp up to this in staleness math.
    floor: Timestamp,
    /// Active scope per open user-level call, innermost last.
    scope_stack: Vec<ScopeId>,
    last_executed: Option<CellId>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            graph: DependencyGraph::new(),
            cells: CellStore::new(),
            registry: MutationRegistry::with_builtins(),
            config,
            cache: ReadinessCache::new(),
            counter: 0,
            floor: Timestamp::UNINITIALIZED,
            scope_stack: Vec::new(),
            last_executed: None,
        }
    }

    // === execution ===

    /// Record one execution of a cell: parse, analyze, replay the trace.
    pub fn run_cell(&mut self, cell: CellId, source: &str, trace: &[Event]) -> Result<()> {
        self.counter += 1;
        let unit = self.counter;

        let stmts = parse_statements(source).map_err(|errs| Error::Parse {
            cell,
            message: errs
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        })?;
        for ev in trace {
            let stmt = ev.stmt();
            if stmt as usize >= stmts.len() {
                return Err(Error::StatementOutOfRange {
                    stmt,
                    len: stmts.len(),
                });
            }
        }
        let stmts = Arc::new(stmts);
        self.cells.record_run(cell, unit, source, Arc::clone(&stmts));
        info!(cell = %cell, unit, statements = stmts.len(), "cell run recorded");

        self.scope_stack.clear();
        self.register_definitions(unit, &stmts);
        let liveness = compute_liveness(&stmts, &IndexSet::new());
        let plan = self.analyze_reads(cell, unit, &liveness);

        // Per-statement call-site presence, to spot traces that drifted
        // from the recorded source.
        let has_call_site: Vec<bool> = stmts
            .iter()
            .map(|stmt| {
                let mut found = false;
                walk_stmt_exprs(stmt, &mut |expr| {
                    found |= matches!(expr.kind, ExprKind::Call { .. });
                });
                found
            })
            .collect();

        let mut state = TraceState::default();
        for ev in trace {
            if state.skip.contains(&ev.stmt()) {
                continue;
            }
            if let Event::Call { stmt, .. } = ev {
                // Nested calls during an open user-level call are traced
                // against the caller's statement; only a top-level call
                // with no call expression in the source is suspect.
                if self.scope_stack.is_empty()
                    && state.opaque_calls == 0
                    && !has_call_site[*stmt as usize]
                {
                    debug!(stmt = *stmt, "call event on a statement with no call expression");
                }
            }
            match ev {
                Event::Read { stmt, chain, value } => {
                    self.handle_read(cell, unit, *stmt, chain, value.as_ref(), &plan, &mut state);
                }
                Event::Write {
                    stmt,
                    scope,
                    key,
                    value,
                } => self.handle_write(cell, unit, *stmt, *scope, key, value, &plan, &mut state),
                Event::Delete { stmt, scope, key } => {
                    self.handle_delete(unit, *stmt, *scope, key);
                }
                Event::Call {
                    stmt,
                    func,
                    args,
                    kwargs,
                } => self.handle_call(cell, unit, *stmt, func, args, kwargs, &mut state),
                Event::Return { value, .. } => self.handle_return(value, &mut state),
                Event::Mutate {
                    stmt,
                    obj,
                    op,
                    args,
                } => self.handle_mutate(unit, *stmt, *obj, op, args, &mut state),
                Event::LiteralConstruct {
                    stmt,
                    value,
                    elements,
                } => self.handle_literal(unit, *stmt, value, elements),
                Event::Import { stmt, module, obj } => {
                    self.handle_import(unit, *stmt, &stmts, module, *obj);
                }
            }
        }

        self.scope_stack.clear();
        self.last_executed = Some(cell);
        Ok(())
    }

    // === queries ===

    /// Readiness classification for a batch of cells.
    pub fn check_cells(&mut self, cells: &[CellId]) -> SchedulerResult {
        Scheduler::new(
            &mut self.graph,
            &self.cells,
            &self.registry,
            &mut self.cache,
            &self.config,
            self.floor,
            self.counter,
        )
        .check(cells, self.last_executed)
    }

    /// Readiness classification for every known cell.
    pub fn check_all(&mut self) -> SchedulerResult {
        let cells: Vec<CellId> = self.cells.cells().collect();
        self.check_cells(&cells)
    }

    /// Global-scope symbol for a name.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.graph.lookup_name(self.graph.global_scope(), name)
    }

    /// Whether a symbol waits on an upstream update.
    pub fn is_waiting(&self, sym: SymbolId, deep: bool) -> bool {
        staleness::is_waiting(&self.graph, sym, self.floor, deep)
    }

    /// Symbols the value with this identity was computed from.
    pub fn dependencies_of(&self, obj: ObjId) -> Result<IndexSet<SymbolId>> {
        let aliases = self.graph.aliases_of(obj);
        if aliases.is_empty() {
            return Err(Error::UnknownObject(obj));
        }
        Ok(aliases
            .iter()
            .flat_map(|sym| self.graph.symbol(*sym).parents.keys().copied())
            .collect())
    }

    /// Symbols computed from the value with this identity.
    pub fn dependents_of(&self, obj: ObjId) -> Result<IndexSet<SymbolId>> {
        let aliases = self.graph.aliases_of(obj);
        if aliases.is_empty() {
            return Err(Error::UnknownObject(obj));
        }
        Ok(aliases
            .iter()
            .flat_map(|sym| self.graph.symbol(*sym).children.keys().copied())
            .collect())
    }

    /// Minimal source reproducing the value with this identity.
    pub fn reproduce(&self, obj: ObjId) -> Result<SliceResult> {
        let aliases = self.graph.aliases_of(obj);
        if aliases.is_empty() {
            return Err(Error::UnknownObject(obj));
        }
        let seeds: Vec<Timestamp> = aliases
            .iter()
            .map(|sym| self.graph.symbol(*sym).updated_ts)
            .collect();
        Ok(self.slice(&seeds))
    }

    /// Slice arbitrary seed timestamps.
    pub fn slice(&self, seeds: &[Timestamp]) -> SliceResult {
        Slicer::new(&self.graph, &self.cells, &self.config).slice(seeds)
    }

    /// Latest recorded source of a cell.
    pub fn source_of(&self, cell: CellId) -> Result<&str> {
        self.cells
            .latest(cell)
            .map(|v| v.source.as_str())
            .ok_or(Error::UnknownCell(cell))
    }

    /// Manual reset: everything recorded so far counts as fresh.
    pub fn bump_min_timestamp(&mut self) {
        self.floor = Timestamp::at_cell(self.counter);
        info!(floor = %self.floor, "minimum timestamp raised");
    }

    /// Collect symbols of values with no remaining alias. Returns how many
    /// were tombstoned.
    pub fn collect_garbage(&mut self) -> usize {
        self.graph.collect_garbage()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn cells(&self) -> &CellStore {
        &self.cells
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SessionConfig {
        &mut self.config
    }

    pub fn registry_mut(&mut self) -> &mut MutationRegistry {
        &mut self.registry
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    // === static passes ===

    /// Register function, class and lambda definitions so calls later in
    /// the same cell resolve. Bodies are analyzed on call resolution, not
    /// here.
    fn register_definitions(&mut self, unit: u64, stmts: &[Stmt]) {
        for (idx, stmt) in stmts.iter().enumerate() {
            let ts = Timestamp::new(unit, idx as u32);
            match &stmt.kind {
                StmtKind::FuncDef { name, params, body } => {
                    let scope = self.current_scope();
                    let sym = self.graph.ensure_name(scope, name, SymbolKind::Function);
                    let symbol = self.graph.symbol_mut(sym);
                    symbol.kind = SymbolKind::Function;
                    symbol.function = Some(FunctionInfo {
                        params: params.clone(),
                        body: Arc::new(body.clone()),
                    });
                    apply_update(
                        &mut self.graph,
                        &Update {
                            target: sym,
                            kind: UpdateKind::Rebind,
                            parents: IndexSet::new(),
                            ts,
                        },
                    );
                }
                StmtKind::ClassDef { name, .. } => {
                    let scope = self.current_scope();
                    let sym = self.graph.ensure_name(scope, name, SymbolKind::Class);
                    self.graph.symbol_mut(sym).kind = SymbolKind::Class;
                    apply_update(
                        &mut self.graph,
                        &Update {
                            target: sym,
                            kind: UpdateKind::Rebind,
                            parents: IndexSet::new(),
                            ts,
                        },
                    );
                }
                StmtKind::Assign { targets, value } if targets.len() == 1 => {
                    // `f = lambda ...`: attach the body; the write event
                    // performs the rebind.
                    if let ExprKind::Lambda { params, body } = &value.kind {
                        let Some(chain) = targets[0].as_ref_chain() else {
                            continue;
                        };
                        if chain.is_chain() {
                            continue;
                        }
                        let Some(name) = chain.leading_name() else {
                            continue;
                        };
                        let scope = self.current_scope();
                        let name = name.to_string();
                        let sym = self.graph.ensure_name(scope, &name, SymbolKind::Function);
                        let ret = Stmt {
                            kind: StmtKind::Return(Some((**body).clone())),
                            span: body.span,
                        };
                        self.graph.symbol_mut(sym).function = Some(FunctionInfo {
                            params: params.clone(),
                            body: Arc::new(vec![ret]),
                        });
                    }
                }
                _ => {}
            }
        }
    }

    /// Resolve the statically live chains: record usage, static unit
    /// edges and reactive markers, and collect per-statement parents.
    fn analyze_reads(&mut self, cell: CellId, unit: u64, liveness: &LivenessResult) -> StaticPlan {
        let mut plan = StaticPlan::default();
        let scope = self.current_scope();

        for live in &liveness.live {
            // A read of a binding created earlier in this same cell sees
            // the intra-cell value; the runtime trace covers it.
            if live.used_while_dead {
                continue;
            }
            let stmt = live.stmt as u32;
            let ts = Timestamp::new(unit, stmt);
            let candidate = self.config.suppress_identity_reassign.then(|| {
                liveness
                    .reassign_candidates
                    .iter()
                    .find(|c| c.stmt == live.stmt)
            });

            let resolution = Resolver::new(&mut self.graph, &self.registry).resolve(scope, &live.chain);
            if resolution.is_unresolved() {
                debug!(chain = %live.chain, "live chain unresolved; conservative obligation kept");
                continue;
            }

            if let Some(Some(c)) = candidate {
                let is_source = !live.chain.is_chain()
                    && c.source.leading_name() == live.chain.leading_name();
                if is_source {
                    if let (Some(dep), Some(target), Some(source_name)) = (
                        resolution.dependency_refs().last(),
                        c.target.leading_name(),
                        c.source.leading_name(),
                    ) {
                        plan.deferred.insert(
                            stmt,
                            DeferredReassign {
                                target: target.to_string(),
                                source_name: source_name.to_string(),
                                source: dep.symbol,
                                deep: dep.is_deep,
                            },
                        );
                        continue;
                    }
                }
            }

            for dep in resolution.dependency_refs() {
                self.note_static_read(cell, unit, stmt, ts, dep.symbol, dep, &mut plan);
            }
        }
        plan
    }

    #[allow(clippy::too_many_arguments)]
    fn note_static_read(
        &mut self,
        cell: CellId,
        unit: u64,
        stmt: u32,
        ts: Timestamp,
        sym: SymbolId,
        dep: &crate::resolver::ResolvedRef,
        plan: &mut StaticPlan,
    ) {
        self.graph.symbol_mut(sym).record_usage(cell, ts, dep.is_deep);
        if dep.is_cascading_reactive {
            self.graph.symbol_mut(sym).cascading_reactive_unit = Some(unit);
        }
        if dep.is_blocked {
            self.graph.symbol_mut(sym).blocked_units.insert(unit);
        }
        if dep.is_deep {
            plan.parents_by_stmt.entry(stmt).or_default().insert(sym);
        }
        if self.config.static_edges {
            let def = self.graph.symbol(sym).updated_ts;
            if def.is_initialized() {
                self.cells.add_static_edge(unit, def.cell, sym);
            }
        }
    }

    // === trace handlers ===

    #[allow(clippy::too_many_arguments)]
    fn handle_read(
        &mut self,
        cell: CellId,
        unit: u64,
        stmt: u32,
        chain: &SymbolRef,
        value: Option<&ValueRecord>,
        plan: &StaticPlan,
        state: &mut TraceState,
    ) {
        // A deferred reassignment source is registered (or suppressed) by
        // the matching write, not here.
        if let Some(d) = plan.deferred.get(&stmt) {
            if !chain.is_chain() && chain.leading_name() == Some(d.source_name.as_str()) {
                return;
            }
        }

        let ts = Timestamp::new(unit, stmt);
        let scope = self.current_scope();
        let resolution = Resolver::new(&mut self.graph, &self.registry).resolve(scope, chain);
        if resolution.is_unresolved() {
            debug!(chain = %chain, "runtime read did not resolve");
            return;
        }

        // Identity observation: promote an unbound binding, no refresh.
        if let (Some(last), Some(v)) = (resolution.refs().last(), value) {
            if !last.is_unsafe && self.graph.symbol(last.symbol).obj().is_none() {
                self.bind_value(last.symbol, v);
            } else {
                self.graph.note_obj(v.obj, v.type_tag.clone(), v.is_container);
            }
        }

        for dep in resolution.dependency_refs() {
            self.graph
                .symbol_mut(dep.symbol)
                .record_usage(cell, ts, dep.is_deep);
            if dep.is_cascading_reactive {
                self.graph.symbol_mut(dep.symbol).cascading_reactive_unit = Some(unit);
            }
            if dep.is_blocked {
                self.graph.symbol_mut(dep.symbol).blocked_units.insert(unit);
            }
            if dep.is_deep {
                state.stmt_reads.entry(stmt).or_default().insert(dep.symbol);
                if self.config.dynamic_edges {
                    let def = self.graph.symbol(dep.symbol).updated_ts;
                    if def.is_initialized() {
                        self.cells.add_dynamic_edge(unit, def.cell, dep.symbol);
                        self.graph.record_ts_dep(ts, def, true);
                    }
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_write(
        &mut self,
        cell: CellId,
        unit: u64,
        stmt: u32,
        scope_ev: WriteScope,
        key: &Key,
        value: &ValueRecord,
        plan: &StaticPlan,
        state: &mut TraceState,
    ) {
        let ts = Timestamp::new(unit, stmt);
        let target = match scope_ev {
            WriteScope::Lexical => {
                let Key::Name(name) = key else {
                    debug!(stmt, "subscript key on a lexical write ignored");
                    return;
                };
                let scope = self.current_scope();
                self.graph.ensure_name(scope, name, SymbolKind::Default)
            }
            WriteScope::Object(obj) => self.member_symbol(obj, key),
        };

        let mut parents: IndexSet<SymbolId> = plan
            .parents_by_stmt
            .get(&stmt)
            .cloned()
            .unwrap_or_default();
        if let Some(reads) = state.stmt_reads.get(&stmt) {
            parents.extend(reads.iter().copied());
        }

        if let Some(d) = plan.deferred.get(&stmt) {
            let applies =
                matches!((&scope_ev, key), (WriteScope::Lexical, Key::Name(n)) if *n == d.target);
            if applies {
                if self.graph.symbol(target).obj() == Some(value.obj) {
                    // Same identity rebound to the same name: nothing the
                    // graph cares about happened.
                    debug!(name = %d.target, "identity-preserving reassignment suppressed");
                    return;
                }
                parents.insert(d.source);
                self.graph.symbol_mut(d.source).record_usage(cell, ts, d.deep);
                if self.config.static_edges {
                    let def = self.graph.symbol(d.source).updated_ts;
                    if def.is_initialized() {
                        self.cells.add_static_edge(unit, def.cell, d.source);
                    }
                }
            }
        }

        // Propagate against the old binding (and old namespace) first.
        apply_update(
            &mut self.graph,
            &Update {
                target,
                kind: UpdateKind::Rebind,
                parents,
                ts,
            },
        );
        self.bind_value(target, value);
    }

    fn handle_delete(&mut self, unit: u64, stmt: u32, scope_ev: WriteScope, key: &Key) {
        let ts = Timestamp::new(unit, stmt);
        let target = match scope_ev {
            WriteScope::Lexical => {
                let Key::Name(name) = key else {
                    return;
                };
                self.graph.lookup_name(self.current_scope(), name)
            }
            WriteScope::Object(obj) => self.graph.lookup_namespace(obj).and_then(|ns| match key {
                Key::Name(name) => self.graph.namespace(ns).get_attribute(name),
                Key::Subscript(k) => self.graph.namespace(ns).get_subscript(k),
            }),
        };
        let Some(target) = target else {
            debug!(stmt, "delete of an untracked binding ignored");
            return;
        };

        apply_update(
            &mut self.graph,
            &Update {
                target,
                kind: UpdateKind::Delete,
                parents: IndexSet::new(),
                ts,
            },
        );

        match scope_ev {
            WriteScope::Lexical => {
                if let Key::Name(name) = key {
                    self.unbind_lexical(self.current_scope(), name);
                }
            }
            WriteScope::Object(obj) => {
                if let Some(ns) = self.graph.lookup_namespace(obj) {
                    let member_key = member_key_of(key);
                    self.graph.namespace_mut(ns).unbind_member(&member_key);
                    if matches!(key, Key::Subscript(SubscriptKey::Index(_))) {
                        // Removing an index shifts the ones after it.
                        self.graph.namespace_mut(ns).record_structural_change(ts);
                    }
                }
            }
        }
        self.graph.clear_all_edges(target);
        self.graph.symbol_mut(target).tombstone = true;
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_call(
        &mut self,
        cell: CellId,
        unit: u64,
        stmt: u32,
        func: &SymbolRef,
        args: &[ValueRecord],
        kwargs: &[(String, ValueRecord)],
        state: &mut TraceState,
    ) {
        let ts = Timestamp::new(unit, stmt);
        let scope = self.current_scope();
        let resolution = Resolver::new(&mut self.graph, &self.registry).resolve(scope, func);
        let Some(last) = resolution.refs().last().copied() else {
            debug!(chain = %func, "call through unresolved chain");
            state.opaque_calls += 1;
            return;
        };
        let func_sym = last.symbol;
        self.graph.symbol_mut(func_sym).record_usage(cell, ts, true);
        state.stmt_reads.entry(stmt).or_default().insert(func_sym);

        if self.graph.symbol(func_sym).function.is_none() {
            state.opaque_calls += 1;
            return;
        }

        let arg_syms: Vec<SymbolId> = args.iter().map(|v| self.alias_for(v)).collect();
        let kwarg_syms: Vec<(String, SymbolId)> = kwargs
            .iter()
            .map(|(name, v)| (name.clone(), self.alias_for(v)))
            .collect();
        let call = Resolver::new(&mut self.graph, &self.registry)
            .resolve_call(func_sym, &arg_syms, &kwarg_syms, ts, false);
        let Some(call) = call else {
            state.opaque_calls += 1;
            return;
        };

        // Free reads of the callee body count as reads at the call site;
        // this is what carries staleness through function boundaries.
        for (chain, resolution) in &call.free_reads {
            if resolution.is_unresolved() {
                debug!(chain = %chain, "free read of callee did not resolve");
                continue;
            }
            for dep in resolution.dependency_refs() {
                self.graph
                    .symbol_mut(dep.symbol)
                    .record_usage(cell, ts, dep.is_deep);
                if dep.is_deep {
                    state.stmt_reads.entry(stmt).or_default().insert(dep.symbol);
                    if self.config.dynamic_edges {
                        let def = self.graph.symbol(dep.symbol).updated_ts;
                        if def.is_initialized() {
                            self.cells.add_dynamic_edge(unit, def.cell, dep.symbol);
                            self.graph.record_ts_dep(ts, def, true);
                        }
                    }
                }
            }
        }
        self.scope_stack.push(call.call_scope);
    }

    fn handle_return(&mut self, value: &ValueRecord, state: &mut TraceState) {
        self.graph
            .note_obj(value.obj, value.type_tag.clone(), value.is_container);
        if state.opaque_calls > 0 {
            state.opaque_calls -= 1;
        } else {
            self.scope_stack.pop();
        }
    }

    fn handle_mutate(
        &mut self,
        unit: u64,
        stmt: u32,
        obj: ObjId,
        op: &str,
        args: &[ValueRecord],
        state: &mut TraceState,
    ) {
        let ts = Timestamp::new(unit, stmt);
        let Some(info) = self.graph.obj_info(obj).cloned() else {
            debug!(obj = %obj, op, "mutation of an untracked value ignored");
            return;
        };
        let Some(effect) = self.registry.effect(&info.type_tag, op) else {
            debug!(ty = %info.type_tag, op, "operation not registered; treated as non-mutating");
            return;
        };
        match effect {
            MutationEffect::Unmodeled => {
                warn!(ty = %info.type_tag, op, stmt, "unmodeled mutation; statement registration skipped");
                state.skip.insert(stmt);
            }
            MutationEffect::Standard(scope) => self.apply_mutation(obj, scope, args, ts),
            MutationEffect::ArgMutation(idx) => {
                let Some(v) = args.get(idx) else {
                    debug!(op, idx, "argument-mutation index out of range");
                    return;
                };
                self.graph.note_obj(v.obj, v.type_tag.clone(), v.is_container);
                let Some(target) = self.receiver_symbol(v.obj) else {
                    debug!(op, "mutated argument has no tracked alias");
                    return;
                };
                let parents: IndexSet<SymbolId> =
                    self.receiver_symbol(obj).into_iter().collect();
                apply_update(
                    &mut self.graph,
                    &Update {
                        target,
                        kind: UpdateKind::Mutate(DescendantScope::All),
                        parents,
                        ts,
                    },
                );
            }
            // Without a modeled holder, the receiver itself is the most
            // precise target available.
            MutationEffect::CallerMutation => {
                self.apply_mutation(obj, DescendantScope::All, args, ts);
            }
            MutationEffect::NamespaceClear => {
                self.apply_mutation(obj, DescendantScope::All, args, ts);
                if let Some(ns) = self.graph.lookup_namespace(obj) {
                    let members: Vec<SymbolId> = self.graph.namespace(ns).members().collect();
                    for member in members {
                        self.graph.clear_all_edges(member);
                        self.graph.symbol_mut(member).tombstone = true;
                    }
                    let namespace = self.graph.namespace_mut(ns);
                    namespace.attributes.clear();
                    namespace.subscripts.clear();
                    namespace.record_structural_change(ts);
                }
            }
        }
    }

    fn handle_literal(
        &mut self,
        unit: u64,
        stmt: u32,
        value: &ValueRecord,
        elements: &[(Key, ValueRecord)],
    ) {
        let ts = Timestamp::new(unit, stmt);
        self.graph
            .note_obj(value.obj, value.type_tag.clone(), value.is_container);
        let ns = self.graph.ensure_namespace(value.obj);
        let scope = self.current_scope();
        for (key, v) in elements {
            let name = match key {
                Key::Name(n) => n.clone(),
                Key::Subscript(k) => k.to_string(),
            };
            let kind = if key.is_subscript() {
                SymbolKind::Subscript
            } else {
                SymbolKind::Default
            };
            let member = self.graph.create_symbol(name, kind, scope);
            self.graph.symbol_mut(member).containing_namespace = Some(ns);
            self.graph.namespace_mut(ns).bind_member(member_key_of(key), member);
            self.bind_value(member, v);
            self.graph.symbol_mut(member).refresh(ts);
        }
    }

    fn handle_import(&mut self, unit: u64, stmt: u32, stmts: &[Stmt], module: &str, obj: ObjId) {
        let ts = Timestamp::new(unit, stmt);
        let name = match stmts.get(stmt as usize).map(|s| &s.kind) {
            Some(StmtKind::Import { module: m, alias }) => alias
                .clone()
                .unwrap_or_else(|| head_segment(m).to_string()),
            _ => head_segment(module).to_string(),
        };
        let scope = self.current_scope();
        let sym = self.graph.ensure_name(scope, &name, SymbolKind::Import);
        self.graph.symbol_mut(sym).kind = SymbolKind::Import;
        apply_update(
            &mut self.graph,
            &Update {
                target: sym,
                kind: UpdateKind::Rebind,
                parents: IndexSet::new(),
                ts,
            },
        );
        let record = ValueRecord::container(obj, TypeTag::from("module"));
        self.bind_value(sym, &record);
    }

    // === helpers ===

    fn current_scope(&self) -> ScopeId {
        self.scope_stack
            .last()
            .copied()
            .unwrap_or_else(|| self.graph.global_scope())
    }

    /// Bind a symbol to an observed value: identity, namespace, ownership.
    fn bind_value(&mut self, sym: SymbolId, value: &ValueRecord) {
        self.graph
            .note_obj(value.obj, value.type_tag.clone(), value.is_container);
        self.graph.bind_obj(sym, value.obj);
        if value.is_container {
            let ns = self.graph.ensure_namespace(value.obj);
            self.graph.symbol_mut(sym).namespace = Some(ns);
            if self.graph.namespace(ns).owner.is_none() {
                self.graph.namespace_mut(ns).owner = Some(sym);
            }
        } else {
            self.graph.symbol_mut(sym).namespace = None;
        }
    }

    /// Member symbol of a namespace for a write key, created on first
    /// sight.
    fn member_symbol(&mut self, obj: ObjId, key: &Key) -> SymbolId {
        let ns = self.graph.ensure_namespace(obj);
        let existing = match key {
            Key::Name(name) => self.graph.namespace(ns).get_attribute(name),
            Key::Subscript(k) => self.graph.namespace(ns).get_subscript(k),
        };
        if let Some(sym) = existing {
            return sym;
        }
        let name = match key {
            Key::Name(n) => n.clone(),
            Key::Subscript(k) => k.to_string(),
        };
        let kind = if key.is_subscript() {
            SymbolKind::Subscript
        } else {
            SymbolKind::Default
        };
        let scope = self.current_scope();
        let sym = self.graph.create_symbol(name, kind, scope);
        self.graph.symbol_mut(sym).containing_namespace = Some(ns);
        self.graph.namespace_mut(ns).bind_member(member_key_of(key), sym);
        sym
    }

    /// A live symbol aliasing the value, or a fresh anonymous one.
    fn alias_for(&mut self, value: &ValueRecord) -> SymbolId {
        self.graph
            .note_obj(value.obj, value.type_tag.clone(), value.is_container);
        let existing = self
            .graph
            .aliases_of(value.obj)
            .into_iter()
            .find(|sym| !self.graph.symbol(*sym).tombstone);
        if let Some(sym) = existing {
            return sym;
        }
        let scope = self.graph.global_scope();
        let sym = self
            .graph
            .create_symbol("<value>", SymbolKind::Anonymous, scope);
        self.graph.bind_obj(sym, value.obj);
        sym
    }

    /// Symbol standing for a mutated receiver: the namespace owner if it
    /// is alive, else any live alias.
    fn receiver_symbol(&self, obj: ObjId) -> Option<SymbolId> {
        if let Some(owner) = self
            .graph
            .lookup_namespace(obj)
            .and_then(|ns| self.graph.namespace(ns).owner)
        {
            if !self.graph.symbol(owner).tombstone {
                return Some(owner);
            }
        }
        self.graph
            .aliases_of(obj)
            .into_iter()
            .find(|sym| !self.graph.symbol(*sym).tombstone)
    }

    fn apply_mutation(
        &mut self,
        obj: ObjId,
        scope: DescendantScope,
        args: &[ValueRecord],
        ts: Timestamp,
    ) {
        let Some(target) = self.receiver_symbol(obj) else {
            debug!(obj = %obj, "mutated value has no tracked alias");
            return;
        };
        let parents: IndexSet<SymbolId> = args.iter().map(|v| self.alias_for(v)).collect();
        apply_update(
            &mut self.graph,
            &Update {
                target,
                kind: UpdateKind::Mutate(scope),
                parents,
                ts,
            },
        );

        // Appends bind the new index without disturbing existing ones.
        if scope == DescendantScope::AppendedIndex {
            let ns = self
                .graph
                .symbol(target)
                .namespace
                .or_else(|| self.graph.lookup_namespace(obj));
            if let Some(ns) = ns {
                let index = self.graph.namespace(ns).subscripts.len() as i64;
                let key = SubscriptKey::Index(index);
                let member_scope = self.graph.symbol(target).scope;
                let member =
                    self.graph
                        .create_symbol(key.to_string(), SymbolKind::Subscript, member_scope);
                self.graph.symbol_mut(member).containing_namespace = Some(ns);
                self.graph
                    .namespace_mut(ns)
                    .bind_member(MemberKey::Subscript(key), member);
                if let Some(v) = args.first() {
                    self.bind_value(member, v);
                }
                self.graph.symbol_mut(member).refresh(ts);
            }
        }
    }

    /// Remove a name from the innermost scope that binds it.
    fn unbind_lexical(&mut self, start: ScopeId, name: &str) {
        let mut current = Some(start);
        while let Some(id) = current {
            if self.graph.scope(id).get(name).is_some() {
                self.graph.scope_mut(id).unbind(name);
                return;
            }
            current = self.graph.scope(id).parent;
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

fn member_key_of(key: &Key) -> MemberKey {
    match key {
        Key::Name(name) => MemberKey::Attribute(name.clone()),
        Key::Subscript(k) => MemberKey::Subscript(k.clone()),
    }
}

fn head_segment(module: &str) -> &str {
    module.split('.').next().unwrap_or(module)
}

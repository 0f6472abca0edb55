//! The forward liveness pass.
//!
//! Single pass over the statements with a mutable kill context. Order
//! matters inside an assignment: the right-hand side and any left-hand
//! receivers are visited in live context first, and only then are the
//! targets killed, so `x = x + 1` reports `x` live and then dead.
//!
//! Loop, comprehension and lambda targets are dead only inside their own
//! body: the dead set is pushed before the body and popped afterwards.
//! Function and class bodies are not descended; their names are killed at
//! the leaf and the bodies are analyzed on demand when a call is resolved.

use cellflow_ast::{Expr, ExprKind, Stmt, StmtKind, SymbolRef, Target, TargetKind};
use indexmap::IndexSet;

/// One live (read) occurrence of a reference chain.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveRef {
    /// The chain read, carrying its source range.
    pub chain: SymbolRef,
    /// Index of the reading statement within the analyzed block.
    pub stmt: usize,
    /// Whether the read happened as the receiver of an assignment target
    /// (`obj.attr = v` reads `obj`).
    pub is_assign_receiver: bool,
    /// Whether the chain's head was already dead when read. Such a read sees
    /// the value bound earlier in this same block, not the outer one.
    pub used_while_dead: bool,
}

/// A `target = source` statement whose value is a bare single-name chain.
///
/// If the runtime identities of target and source match, the read is a
/// self-assignment like `a = a` and the caller may suppress the live report.
/// The identity check needs the runtime graph, so it is left to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ReassignCandidate {
    pub target: SymbolRef,
    pub source: SymbolRef,
    pub stmt: usize,
}

/// Output of [`compute_liveness`].
#[derive(Debug, Clone, Default)]
pub struct LivenessResult {
    /// Chains read by the block, in source order.
    pub live: Vec<LiveRef>,
    /// Chains freshly bound by the block (positionless keys).
    pub dead: IndexSet<SymbolRef>,
    /// `dead` plus the already-dead set passed in.
    pub modified: IndexSet<SymbolRef>,
    /// Single-dependency reassignments for the identity heuristic.
    pub reassign_candidates: Vec<ReassignCandidate>,
}

/// Run the liveness pass over a statement block.
///
/// `already_dead` carries chains bound earlier in an enclosing analysis
/// (e.g. parameters when analyzing a callee body).
pub fn compute_liveness(stmts: &[Stmt], already_dead: &IndexSet<SymbolRef>) -> LivenessResult {
    let mut pass = Pass {
        live: Vec::new(),
        dead: already_dead.clone(),
        killed: IndexSet::new(),
        reassign_candidates: Vec::new(),
        stmt_idx: 0,
    };
    for (idx, stmt) in stmts.iter().enumerate() {
        pass.stmt_idx = idx;
        pass.visit_stmt(stmt);
    }

    let mut modified = pass.killed.clone();
    modified.extend(already_dead.iter().cloned());
    LivenessResult {
        live: pass.live,
        dead: pass.killed,
        modified,
        reassign_candidates: pass.reassign_candidates,
    }
}

struct Pass {
    live: Vec<LiveRef>,
    /// Current dead context (includes the caller-supplied set).
    dead: IndexSet<SymbolRef>,
    /// Chains killed by this block only.
    killed: IndexSet<SymbolRef>,
    reassign_candidates: Vec<ReassignCandidate>,
    stmt_idx: usize,
}

impl Pass {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Assign { targets, value } => {
                self.note_reassign_candidate(targets, value);
                self.visit_expr(value);
                for target in targets {
                    self.visit_target_receivers(target);
                }
                for target in targets {
                    self.kill_target(target);
                }
            }
            StmtKind::AugAssign { target, value, .. } => {
                // Reads the old value of the target, then rebinds it.
                if let Some(chain) = target.as_ref_chain() {
                    self.record_live(chain, false);
                }
                self.visit_expr(value);
                self.visit_target_receivers(target);
                self.kill_target(target);
            }
            StmtKind::ExprStmt(expr) => self.visit_expr(expr),
            StmtKind::Delete(targets) => {
                for target in targets {
                    self.visit_target_receivers(target);
                    self.kill_target(target);
                }
            }
            StmtKind::Import { module, alias } => {
                // `import a.b` binds the head name `a`; an alias binds itself.
                let bound = alias
                    .clone()
                    .unwrap_or_else(|| module.split('.').next().unwrap_or(module).to_string());
                self.kill_chain(SymbolRef::name(bound));
            }
            StmtKind::FuncDef { name, params, .. } => {
                // Defaults evaluate at definition time; the body does not.
                for param in params {
                    if let Some(default) = &param.default {
                        self.visit_expr(default);
                    }
                }
                self.kill_chain(SymbolRef::name(name.clone()));
            }
            StmtKind::ClassDef { name, .. } => {
                self.kill_chain(SymbolRef::name(name.clone()));
            }
            StmtKind::For { target, iter, body } => {
                self.visit_expr(iter);
                let snapshot = self.dead.clone();
                self.kill_target(target);
                for stmt in body {
                    self.visit_stmt(stmt);
                }
                self.dead = snapshot;
            }
            StmtKind::While { cond, body } => {
                self.visit_expr(cond);
                let snapshot = self.dead.clone();
                for stmt in body {
                    self.visit_stmt(stmt);
                }
                self.dead = snapshot;
            }
            StmtKind::If { cond, body, orelse } => {
                self.visit_expr(cond);
                // Each branch sees the pre-branch dead set; conditional
                // bindings do not kill reads after the statement.
                let snapshot = self.dead.clone();
                for stmt in body {
                    self.visit_stmt(stmt);
                }
                self.dead = snapshot.clone();
                for stmt in orelse {
                    self.visit_stmt(stmt);
                }
                self.dead = snapshot;
            }
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.visit_expr(value);
                }
            }
        }
    }

    /// Visit an expression in live context.
    fn visit_expr(&mut self, expr: &Expr) {
        if let Some(chain) = expr.as_ref_chain() {
            self.record_live(chain, false);
            self.visit_chain_interior(expr);
            return;
        }
        match &expr.kind {
            ExprKind::Binary { left, right, .. } => {
                self.visit_expr(left);
                self.visit_expr(right);
            }
            ExprKind::Unary { operand, .. } => self.visit_expr(operand),
            ExprKind::Tuple(items) | ExprKind::List(items) => {
                for item in items {
                    self.visit_expr(item);
                }
            }
            ExprKind::Dict(entries) => {
                for (key, value) in entries {
                    self.visit_expr(key);
                    self.visit_expr(value);
                }
            }
            ExprKind::ListComp {
                element,
                target,
                source,
                cond,
            } => {
                self.visit_expr(source);
                let snapshot = self.dead.clone();
                self.kill_target(target);
                self.visit_expr(element);
                if let Some(cond) = cond {
                    self.visit_expr(cond);
                }
                self.dead = snapshot;
            }
            ExprKind::Lambda { params, body } => {
                for param in params {
                    if let Some(default) = &param.default {
                        self.visit_expr(default);
                    }
                }
                let snapshot = self.dead.clone();
                for param in params {
                    self.dead
                        .insert(SymbolRef::name(param.name.clone()).without_position());
                }
                self.visit_expr(body);
                self.dead = snapshot;
            }
            // Literals; chain expressions were handled above.
            _ => {}
        }
    }

    /// Visit the non-chain parts nested inside a chain expression: call
    /// arguments and computed subscript indices are reads of their own.
    fn visit_chain_interior(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Attribute { object, .. } => self.visit_chain_interior(object),
            ExprKind::Subscript { object, index } => {
                self.visit_chain_interior(object);
                if !matches!(index.kind, ExprKind::Int(_) | ExprKind::Str(_)) {
                    self.visit_expr(index);
                }
            }
            ExprKind::Call { func, args, kwargs } => {
                self.visit_chain_interior(func);
                for arg in args {
                    self.visit_expr(arg);
                }
                for (_, value) in kwargs {
                    self.visit_expr(value);
                }
            }
            _ => {}
        }
    }

    /// Visit the receivers read by an assignment target (`obj` in
    /// `obj.attr = v` / `obj[k] = v`) and any computed index expressions.
    fn visit_target_receivers(&mut self, target: &Target) {
        match &target.kind {
            TargetKind::Attribute { object, .. } => {
                if let Some(chain) = object.as_ref_chain() {
                    self.record_live(chain, true);
                }
                self.visit_chain_interior(object);
            }
            TargetKind::Subscript { object, index } => {
                if let Some(chain) = object.as_ref_chain() {
                    self.record_live(chain, true);
                }
                self.visit_chain_interior(object);
                if !matches!(index.kind, ExprKind::Int(_) | ExprKind::Str(_)) {
                    self.visit_expr(index);
                }
            }
            TargetKind::Tuple(elems) | TargetKind::List(elems) => {
                for elem in elems {
                    self.visit_target_receivers(elem);
                }
            }
            TargetKind::Starred(inner) => self.visit_target_receivers(inner),
            TargetKind::Name(_) => {}
        }
    }

    fn kill_target(&mut self, target: &Target) {
        match &target.kind {
            TargetKind::Tuple(elems) | TargetKind::List(elems) => {
                for elem in elems {
                    self.kill_target(elem);
                }
            }
            TargetKind::Starred(inner) => self.kill_target(inner),
            _ => {
                if let Some(chain) = target.as_ref_chain() {
                    self.kill_chain(chain);
                }
            }
        }
    }

    fn kill_chain(&mut self, chain: SymbolRef) {
        let key = chain.without_position();
        self.dead.insert(key.clone());
        self.killed.insert(key);
    }

    fn record_live(&mut self, chain: SymbolRef, is_assign_receiver: bool) {
        let used_while_dead = self.dead.contains(&chain.without_position())
            || self.dead.contains(&chain.prefix(1).without_position());
        self.live.push(LiveRef {
            chain,
            stmt: self.stmt_idx,
            is_assign_receiver,
            used_while_dead,
        });
    }

    /// Record `x = y` style statements for the caller's identity check.
    fn note_reassign_candidate(&mut self, targets: &[Target], value: &Expr) {
        if targets.len() != 1 {
            return;
        }
        let TargetKind::Name(_) = targets[0].kind else {
            return;
        };
        // Only a bare single-name value is structurally unambiguous.
        if !matches!(value.kind, ExprKind::Name { .. }) {
            return;
        }
        let (Some(target), Some(source)) = (targets[0].as_ref_chain(), value.as_ref_chain())
        else {
            return;
        };
        self.reassign_candidates.push(ReassignCandidate {
            target,
            source,
            stmt: self.stmt_idx,
        });
    }
}

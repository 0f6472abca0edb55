//! Expression tree walking.
//!
//! One shared pre-order traversal so passes that only inspect nodes do
//! not each duplicate the recursive descent. The visitor is a closure,
//! not a trait: every caller needs the same traversal and owns its own
//! state.

use crate::expr::{Expr, ExprKind};
use crate::stmt::{Stmt, StmtKind, Target, TargetKind};

/// Walk an expression tree in pre-order, calling the visitor for each
/// node before its children. Lambda bodies and comprehension elements are
/// descended; the walker carries no scoping, so passes that care about
/// binding context (liveness) keep their own descent.
pub fn walk_expr<V>(expr: &Expr, visitor: &mut V)
where
    V: FnMut(&Expr),
{
    visitor(expr);

    match &expr.kind {
        ExprKind::Attribute { object, .. } => walk_expr(object, visitor),
        ExprKind::Subscript { object, index } => {
            walk_expr(object, visitor);
            walk_expr(index, visitor);
        }
        ExprKind::Call { func, args, kwargs } => {
            walk_expr(func, visitor);
            for arg in args {
                walk_expr(arg, visitor);
            }
            for (_, value) in kwargs {
                walk_expr(value, visitor);
            }
        }
        ExprKind::Binary { left, right, .. } => {
            walk_expr(left, visitor);
            walk_expr(right, visitor);
        }
        ExprKind::Unary { operand, .. } => walk_expr(operand, visitor),
        ExprKind::Tuple(items) | ExprKind::List(items) => {
            for item in items {
                walk_expr(item, visitor);
            }
        }
        ExprKind::Dict(entries) => {
            for (key, value) in entries {
                walk_expr(key, visitor);
                walk_expr(value, visitor);
            }
        }
        ExprKind::ListComp {
            element,
            source,
            cond,
            ..
        } => {
            walk_expr(source, visitor);
            walk_expr(element, visitor);
            if let Some(cond) = cond {
                walk_expr(cond, visitor);
            }
        }
        ExprKind::Lambda { params, body } => {
            for param in params {
                if let Some(default) = &param.default {
                    walk_expr(default, visitor);
                }
            }
            walk_expr(body, visitor);
        }
        ExprKind::Name { .. }
        | ExprKind::Int(_)
        | ExprKind::Float(_)
        | ExprKind::Str(_)
        | ExprKind::Bool(_)
        | ExprKind::NoneLit => {}
    }
}

/// Walk every expression a statement evaluates when it executes, in
/// source order. Control-flow bodies (`for`/`while`/`if`) are descended;
/// function and class bodies are not, matching when they actually run.
pub fn walk_stmt_exprs<V>(stmt: &Stmt, visitor: &mut V)
where
    V: FnMut(&Expr),
{
    match &stmt.kind {
        StmtKind::Assign { targets, value } => {
            walk_expr(value, visitor);
            for target in targets {
                walk_target_exprs(target, visitor);
            }
        }
        StmtKind::AugAssign { target, value, .. } => {
            walk_expr(value, visitor);
            walk_target_exprs(target, visitor);
        }
        StmtKind::ExprStmt(expr) => walk_expr(expr, visitor),
        StmtKind::Delete(targets) => {
            for target in targets {
                walk_target_exprs(target, visitor);
            }
        }
        StmtKind::Import { .. } => {}
        StmtKind::FuncDef { params, .. } => {
            // Defaults evaluate at definition time; the body does not.
            for param in params {
                if let Some(default) = &param.default {
                    walk_expr(default, visitor);
                }
            }
        }
        StmtKind::ClassDef { .. } => {}
        StmtKind::For { target, iter, body } => {
            walk_expr(iter, visitor);
            walk_target_exprs(target, visitor);
            for stmt in body {
                walk_stmt_exprs(stmt, visitor);
            }
        }
        StmtKind::While { cond, body } => {
            walk_expr(cond, visitor);
            for stmt in body {
                walk_stmt_exprs(stmt, visitor);
            }
        }
        StmtKind::If { cond, body, orelse } => {
            walk_expr(cond, visitor);
            for stmt in body {
                walk_stmt_exprs(stmt, visitor);
            }
            for stmt in orelse {
                walk_stmt_exprs(stmt, visitor);
            }
        }
        StmtKind::Return(value) => {
            if let Some(value) = value {
                walk_expr(value, visitor);
            }
        }
    }
}

/// Receiver and index expressions inside an assignment target.
fn walk_target_exprs<V>(target: &Target, visitor: &mut V)
where
    V: FnMut(&Expr),
{
    match &target.kind {
        TargetKind::Attribute { object, .. } => walk_expr(object, visitor),
        TargetKind::Subscript { object, index } => {
            walk_expr(object, visitor);
            walk_expr(index, visitor);
        }
        TargetKind::Tuple(elems) | TargetKind::List(elems) => {
            for elem in elems {
                walk_target_exprs(elem, visitor);
            }
        }
        TargetKind::Starred(inner) => walk_target_exprs(inner, visitor),
        TargetKind::Name(_) => {}
    }
}

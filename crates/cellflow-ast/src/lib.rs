// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! AST types for the cellflow cell language
//!
//! This crate contains the syntactic model consumed by the liveness
//! analyzer and the resolver: reference chains (`Atom`/`SymbolRef`) and the
//! statement/expression AST produced by the parser.

pub mod atom;
pub mod expr;
pub mod refs;
pub mod span;
pub mod stmt;
pub mod walk;

pub use atom::{Atom, AtomKind, SubscriptKey};
pub use expr::{BinaryOp, Expr, ExprKind, Param, Sigil, UnaryOp};
pub use refs::SymbolRef;
pub use span::Span;
pub use stmt::{Stmt, StmtKind, Target, TargetKind};
pub use walk::{walk_expr, walk_stmt_exprs};

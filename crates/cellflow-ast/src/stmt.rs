//! Statement AST for the cell language

use crate::atom::{Atom, SubscriptKey};
use crate::expr::{Expr, ExprKind, Param};
use crate::refs::SymbolRef;
use crate::span::Span;

/// An assignment target with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub kind: TargetKind,
    pub span: Span,
}

/// Assignment target kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetKind {
    /// `x = ...`
    Name(String),
    /// `obj.attr = ...`; the receiver is read, not bound.
    Attribute { object: Box<Expr>, attr: String },
    /// `obj[key] = ...`; the receiver is read, not bound.
    Subscript { object: Box<Expr>, index: Box<Expr> },
    /// `(a, b) = ...`
    Tuple(Vec<Target>),
    /// `[a, b] = ...`
    List(Vec<Target>),
    /// `*rest`
    Starred(Box<Target>),
}

impl Target {
    /// Create a target node.
    pub fn new(kind: TargetKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Convert a simple (non-compound) target into the chain it binds.
    ///
    /// Tuple/list/star targets have no single chain; callers recurse per
    /// element instead.
    pub fn as_ref_chain(&self) -> Option<SymbolRef> {
        let chain = match &self.kind {
            TargetKind::Name(id) => SymbolRef::name(id.clone()),
            TargetKind::Attribute { object, attr } => object
                .as_ref_chain()?
                .appended(Atom::attribute(attr.clone())),
            TargetKind::Subscript { object, index } => {
                let key = match &index.kind {
                    ExprKind::Int(i) => SubscriptKey::Index(*i),
                    ExprKind::Str(s) => SubscriptKey::Str(s.clone()),
                    _ => SubscriptKey::Computed,
                };
                object.as_ref_chain()?.appended(Atom::subscript(key))
            }
            _ => return None,
        };
        Some(chain.with_range(self.span))
    }

    /// The receiver expression read when assigning through this target.
    ///
    /// `obj.attr = v` and `obj[k] = v` read `obj`; plain names read nothing.
    pub fn receiver(&self) -> Option<&Expr> {
        match &self.kind {
            TargetKind::Attribute { object, .. } | TargetKind::Subscript { object, .. } => {
                Some(object)
            }
            _ => None,
        }
    }
}

/// A statement with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

/// Statement kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `t = value` (or chained `a = b = value`).
    Assign { targets: Vec<Target>, value: Expr },
    /// `t op= value`; reads and rebinds the target.
    AugAssign {
        target: Target,
        op: crate::expr::BinaryOp,
        value: Expr,
    },
    /// Bare expression statement.
    ExprStmt(Expr),
    /// `del t, ...`
    Delete(Vec<Target>),
    /// `import module` / `import module as alias`
    Import {
        module: String,
        alias: Option<String>,
    },
    /// `def name(params) { body }`; body analyzed on call resolution.
    FuncDef {
        name: String,
        params: Vec<Param>,
        body: Vec<Stmt>,
    },
    /// `class Name { body }`
    ClassDef { name: String, body: Vec<Stmt> },
    /// `for target in iter { body }`
    For {
        target: Target,
        iter: Expr,
        body: Vec<Stmt>,
    },
    /// `while cond { body }`
    While { cond: Expr, body: Vec<Stmt> },
    /// `if cond { body } else { orelse }`
    If {
        cond: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    /// `return` / `return expr`
    Return(Option<Expr>),
}

impl Stmt {
    /// Create a statement node.
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Sigil;

    fn name_expr(id: &str) -> Expr {
        Expr::new(
            ExprKind::Name {
                id: id.to_string(),
                sigil: Sigil::None,
            },
            Span::DUMMY,
        )
    }

    #[test]
    fn test_name_target_chain() {
        let target = Target::new(TargetKind::Name("x".to_string()), Span::DUMMY);
        assert_eq!(target.as_ref_chain().unwrap().to_string(), "x");
        assert!(target.receiver().is_none());
    }

    #[test]
    fn test_subscript_target_has_receiver() {
        let target = Target::new(
            TargetKind::Subscript {
                object: Box::new(name_expr("xs")),
                index: Box::new(Expr::new(ExprKind::Int(0), Span::DUMMY)),
            },
            Span::DUMMY,
        );
        assert_eq!(target.as_ref_chain().unwrap().to_string(), "xs[0]");
        assert!(target.receiver().is_some());
    }

    #[test]
    fn test_compound_target_has_no_single_chain() {
        let target = Target::new(
            TargetKind::Tuple(vec![
                Target::new(TargetKind::Name("a".to_string()), Span::DUMMY),
                Target::new(TargetKind::Name("b".to_string()), Span::DUMMY),
            ]),
            Span::DUMMY,
        );
        assert!(target.as_ref_chain().is_none());
    }
}

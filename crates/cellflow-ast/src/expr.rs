//! Expression AST for the cell language

use crate::atom::{Atom, SubscriptKey};
use crate::refs::SymbolRef;
use crate::span::Span;

/// Reactivity sigil lexed in front of a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sigil {
    #[default]
    None,
    /// `$name`
    Reactive,
    /// `$$name`
    Cascading,
    /// `~name`
    Blocking,
}

/// Binary operators (comparisons included).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    In,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// A function or lambda parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
    pub span: Span,
}

/// An expression with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

/// Expression kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// A (possibly sigil-tagged) name.
    Name { id: String, sigil: Sigil },
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    NoneLit,
    /// `object.attr`
    Attribute { object: Box<Expr>, attr: String },
    /// `object[index]`
    Subscript { object: Box<Expr>, index: Box<Expr> },
    /// `func(args, kw=...)`
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Tuple(Vec<Expr>),
    List(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    /// `[element for target in source if cond]`
    ListComp {
        element: Box<Expr>,
        target: Box<crate::stmt::Target>,
        source: Box<Expr>,
        cond: Option<Box<Expr>>,
    },
    /// `lambda params: body`
    Lambda { params: Vec<Param>, body: Box<Expr> },
}

impl Expr {
    /// Create an expression node.
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Convert a name/attribute/subscript/call spine into a reference chain.
    ///
    /// Returns `None` for expressions that are not chains (literals,
    /// operators, displays). Computed subscript indices become
    /// [`SubscriptKey::Computed`] links; chains through them still resolve,
    /// just not to a specific member.
    pub fn as_ref_chain(&self) -> Option<SymbolRef> {
        let chain = match &self.kind {
            ExprKind::Name { id, sigil } => {
                let atom = Atom::name(id.clone());
                let atom = match sigil {
                    Sigil::None => atom,
                    Sigil::Reactive => atom.reactive(),
                    Sigil::Cascading => atom.cascading_reactive(),
                    Sigil::Blocking => atom.blocked(),
                };
                SymbolRef::from_atoms(vec![atom])
            }
            ExprKind::Attribute { object, attr } => object
                .as_ref_chain()?
                .appended(Atom::attribute(attr.clone())),
            ExprKind::Subscript { object, index } => {
                let key = match &index.kind {
                    ExprKind::Int(i) => SubscriptKey::Index(*i),
                    ExprKind::Str(s) => SubscriptKey::Str(s.clone()),
                    _ => SubscriptKey::Computed,
                };
                object.as_ref_chain()?.appended(Atom::subscript(key))
            }
            ExprKind::Call { func, .. } => func.as_ref_chain()?.appended(Atom::call()),
            _ => return None,
        };
        Some(chain.with_range(self.span))
    }
}

//! Reference chains
//!
//! A `SymbolRef` is an ordered sequence of atoms plus an optional lexical
//! scope and source range. The same type serves two roles:
//!
//! - **graph key**: chains stripped of position (`without_position`) key the
//!   edge maps of the dependency graph; equality and hashing use atoms only.
//! - **positional identifier**: chains carrying a source range identify a
//!   specific occurrence; two positional chains also compare scope and range.
//!
//! Mixing the two roles in one map is not supported: normalize with
//! [`SymbolRef::without_position`] before using chains as keys.

use std::fmt;
use std::hash::{Hash, Hasher};

use cellflow_foundation::ScopeId;

use crate::atom::{Atom, AtomKind, SubscriptKey};
use crate::span::Span;

/// An ordered reference chain with optional position information.
#[derive(Debug, Clone, Eq)]
pub struct SymbolRef {
    atoms: Vec<Atom>,
    /// Lexical scope the chain was observed in, if known.
    pub scope: Option<ScopeId>,
    /// Source range of the occurrence, if this is a positional identifier.
    pub range: Option<Span>,
}

impl SymbolRef {
    /// Chain from a list of atoms.
    pub fn from_atoms(atoms: Vec<Atom>) -> Self {
        Self {
            atoms,
            scope: None,
            range: None,
        }
    }

    /// Single-name chain.
    pub fn name(id: impl Into<String>) -> Self {
        Self::from_atoms(vec![Atom::name(id)])
    }

    /// Copy with one more atom appended.
    pub fn appended(&self, atom: Atom) -> Self {
        let mut atoms = self.atoms.clone();
        atoms.push(atom);
        Self {
            atoms,
            scope: self.scope,
            range: self.range,
        }
    }

    /// Copy carrying a lexical scope.
    pub fn with_scope(mut self, scope: ScopeId) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Copy carrying a source range (turns this into a positional identifier).
    pub fn with_range(mut self, range: Span) -> Self {
        self.range = Some(range);
        self
    }

    /// Copy stripped of scope and range, suitable as a graph key.
    pub fn without_position(&self) -> Self {
        Self {
            atoms: self.atoms.clone(),
            scope: None,
            range: None,
        }
    }

    /// The atoms of the chain in order.
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Number of links.
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// Whether the chain has no links.
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// The head name of the chain, if it starts with a name.
    pub fn leading_name(&self) -> Option<&str> {
        match self.atoms.first().map(|a| &a.kind) {
            Some(AtomKind::Name(s)) => Some(s),
            _ => None,
        }
    }

    /// Whether the chain goes past its head (attribute/subscript/call links).
    pub fn is_chain(&self) -> bool {
        self.atoms.len() > 1
    }

    /// Whether any link carries a reactive tag.
    pub fn is_reactive(&self) -> bool {
        self.atoms.iter().any(|a| a.is_reactive)
    }

    /// Whether any link carries a cascading-reactive tag.
    pub fn is_cascading_reactive(&self) -> bool {
        self.atoms.iter().any(|a| a.is_cascading_reactive)
    }

    /// Whether any link carries a blocking tag.
    pub fn is_blocking(&self) -> bool {
        self.atoms.iter().any(|a| a.is_blocking)
    }

    /// Copy of the chain truncated to its first `n` links.
    pub fn prefix(&self, n: usize) -> Self {
        Self {
            atoms: self.atoms[..n.min(self.atoms.len())].to_vec(),
            scope: self.scope,
            range: self.range,
        }
    }

    /// Subscript key of the last link, if it is a subscript.
    pub fn last_subscript_key(&self) -> Option<&SubscriptKey> {
        match self.atoms.last().map(|a| &a.kind) {
            Some(AtomKind::Subscript(k)) => Some(k),
            _ => None,
        }
    }
}

impl PartialEq for SymbolRef {
    fn eq(&self, other: &Self) -> bool {
        if self.atoms != other.atoms {
            return false;
        }
        // Scope and range participate only when both sides are positional.
        match (self.range, other.range) {
            (Some(a), Some(b)) => a == b && self.scope == other.scope,
            _ => true,
        }
    }
}

impl Hash for SymbolRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.atoms.hash(state);
    }
}

impl fmt::Display for SymbolRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for atom in &self.atoms {
            write!(f, "{}", atom)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_key_equality_ignores_scope() {
        let a = SymbolRef::name("x").with_scope(ScopeId::new(0));
        let b = SymbolRef::name("x").with_scope(ScopeId::new(5));
        assert_eq!(a, b);
    }

    #[test]
    fn test_positional_equality_uses_range() {
        let a = SymbolRef::name("x").with_range(Span::new(0, 1));
        let b = SymbolRef::name("x").with_range(Span::new(4, 5));
        assert_ne!(a, b);
        // A positional chain still matches a bare graph key.
        assert_eq!(a, SymbolRef::name("x"));
    }

    #[test]
    fn test_display_chain() {
        let chain = SymbolRef::name("obj")
            .appended(Atom::attribute("field"))
            .appended(Atom::subscript(SubscriptKey::Index(0)))
            .appended(Atom::call());
        assert_eq!(chain.to_string(), "obj.field[0]()");
        assert!(chain.is_chain());
        assert_eq!(chain.leading_name(), Some("obj"));
    }

    #[test]
    fn test_prefix() {
        let chain = SymbolRef::name("a").appended(Atom::attribute("b"));
        assert_eq!(chain.prefix(1), SymbolRef::name("a"));
    }
}

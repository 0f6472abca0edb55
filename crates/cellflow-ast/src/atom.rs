//! Single links of a reference chain
//!
//! An `Atom` is one step of a syntactic chain like `obj.field[0]()`: a
//! name, an attribute access, a subscript, or a call marker. Atoms carry
//! the reactivity tags lexed from `$`/`$$`/`~` sigils. They are immutable;
//! the tag transforms return a copy with one flag flipped.

use std::fmt;

/// A subscript key as far as it is statically known.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubscriptKey {
    /// Integer literal index, e.g. `xs[0]`.
    Index(i64),
    /// String literal key, e.g. `d["k"]`.
    Str(String),
    /// Key computed at runtime; resolvable only dynamically.
    Computed,
}

impl fmt::Display for SubscriptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptKey::Index(i) => write!(f, "{}", i),
            SubscriptKey::Str(s) => write!(f, "{:?}", s),
            SubscriptKey::Computed => write!(f, "<dyn>"),
        }
    }
}

/// The kind of chain link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AtomKind {
    /// A bare name; only valid as the head of a chain.
    Name(String),
    /// An attribute access on the previous link.
    Attribute(String),
    /// A subscript access on the previous link.
    Subscript(SubscriptKey),
    /// A call on the previous link. Resolution stops here.
    Call,
}

/// One link in a reference chain, with reactivity tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Atom {
    pub kind: AtomKind,
    /// Tagged `$name`: updates to the binding re-trigger readers.
    pub is_reactive: bool,
    /// Tagged `$$name`: reactivity also cascades through dependents.
    pub is_cascading_reactive: bool,
    /// Tagged `~name`: blocks reactivity from propagating past this link.
    pub is_blocking: bool,
}

impl Atom {
    fn untagged(kind: AtomKind) -> Self {
        Self {
            kind,
            is_reactive: false,
            is_cascading_reactive: false,
            is_blocking: false,
        }
    }

    /// A name link.
    pub fn name(id: impl Into<String>) -> Self {
        Self::untagged(AtomKind::Name(id.into()))
    }

    /// An attribute link.
    pub fn attribute(attr: impl Into<String>) -> Self {
        Self::untagged(AtomKind::Attribute(attr.into()))
    }

    /// A subscript link.
    pub fn subscript(key: SubscriptKey) -> Self {
        Self::untagged(AtomKind::Subscript(key))
    }

    /// A call marker link.
    pub fn call() -> Self {
        Self::untagged(AtomKind::Call)
    }

    /// Whether this link is a call marker.
    pub fn is_callpoint(&self) -> bool {
        matches!(self.kind, AtomKind::Call)
    }

    /// Whether this link is a subscript access.
    pub fn is_subscript(&self) -> bool {
        matches!(self.kind, AtomKind::Subscript(_))
    }

    /// The identifier this link binds, if any.
    pub fn identifier(&self) -> Option<&str> {
        match &self.kind {
            AtomKind::Name(s) | AtomKind::Attribute(s) => Some(s),
            _ => None,
        }
    }

    /// Copy with the reactive tag set.
    pub fn reactive(&self) -> Self {
        Self {
            is_reactive: true,
            ..self.clone()
        }
    }

    /// Copy with the cascading-reactive (and reactive) tags set.
    pub fn cascading_reactive(&self) -> Self {
        Self {
            is_reactive: true,
            is_cascading_reactive: true,
            ..self.clone()
        }
    }

    /// Copy with the blocking tag set.
    pub fn blocked(&self) -> Self {
        Self {
            is_blocking: true,
            ..self.clone()
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_cascading_reactive {
            write!(f, "$$")?;
        } else if self.is_reactive {
            write!(f, "$")?;
        }
        if self.is_blocking {
            write!(f, "~")?;
        }
        match &self.kind {
            AtomKind::Name(s) => write!(f, "{}", s),
            AtomKind::Attribute(s) => write!(f, ".{}", s),
            AtomKind::Subscript(k) => write!(f, "[{}]", k),
            AtomKind::Call => write!(f, "()"),
        }
    }
}

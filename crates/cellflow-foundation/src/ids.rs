//! Typed identifiers for graph entities
//!
//! All graph entities are identified by typed integer wrappers. Arena-held
//! entities (symbols, scopes, namespaces) use `u32` indices into their
//! arenas; logical cells and runtime identity tokens use `u64` counters
//! issued by the embedder. Wrapping them in distinct types keeps the many
//! id-keyed maps in the engine from mixing keys up.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl $name {
            /// Create an id from a raw arena index.
            pub fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// The arena slot this id addresses.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

macro_rules! define_token_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl $name {
            /// Create an id from a raw token value.
            pub fn new(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

define_arena_id!(
    /// Index of a symbol in the symbol arena
    SymbolId
);

define_arena_id!(
    /// Index of a lexical scope in the scope arena
    ScopeId
);

define_arena_id!(
    /// Index of a namespace in the namespace arena
    NamespaceId
);

define_token_id!(
    /// Logical cell identifier assigned by the embedder
    ///
    /// Stable across re-executions of the same cell; each re-execution
    /// produces a new unit version under the same `CellId`.
    CellId
);

define_token_id!(
    /// Identity token for a runtime value
    ///
    /// Issued by the instrumentation layer; the engine never inspects the
    /// value itself, only its identity.
    ObjId
);

/// Runtime type tag for a value, as reported by the instrumentation layer.
///
/// Keys the mutation-behavior registry together with an operation name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeTag(pub String);

impl TypeTag {
    /// Create a type tag from a type name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TypeTag {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_id_index() {
        let id = SymbolId::new(7);
        assert_eq!(id.index(), 7);
        assert_eq!(id.to_string(), "7");
    }

    #[test]
    fn test_ids_are_distinct_types() {
        // Compile-time property; just exercise construction and equality.
        assert_eq!(CellId::from(3), CellId::new(3));
        assert_ne!(ObjId::new(1), ObjId::new(2));
    }

    #[test]
    fn test_type_tag() {
        let tag = TypeTag::from("list");
        assert_eq!(tag.as_str(), "list");
        assert_eq!(tag, TypeTag::new("list"));
    }
}

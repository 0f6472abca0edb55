//! The consumed event contract.
//!
//! The instrumentation layer that observes the running program is out of
//! scope; it hands the engine a trace of these events per executed cell.
//! Every event carries the statement index it occurred at and enough value
//! identity for the resolver to bind it.

use cellflow_ast::{SubscriptKey, SymbolRef};
use cellflow_foundation::{ObjId, TypeTag};

/// Identity and shape of a runtime value, as observed by instrumentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRecord {
    /// Identity token. The engine never sees the value itself.
    pub obj: ObjId,
    /// Runtime type tag; keys the mutation registry.
    pub type_tag: TypeTag,
    /// Whether the value has internal structure worth a namespace.
    pub is_container: bool,
}

impl ValueRecord {
    /// Record for a plain (non-container) value.
    pub fn scalar(obj: ObjId, type_tag: impl Into<TypeTag>) -> Self {
        Self {
            obj,
            type_tag: type_tag.into(),
            is_container: false,
        }
    }

    /// Record for a container value.
    pub fn container(obj: ObjId, type_tag: impl Into<TypeTag>) -> Self {
        Self {
            obj,
            type_tag: type_tag.into(),
            is_container: true,
        }
    }
}

/// Where a write or delete lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteScope {
    /// The active lexical scope.
    Lexical,
    /// The namespace of the value with this identity (attribute/subscript
    /// writes through a receiver).
    Object(ObjId),
}

/// Binding key within a write scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A name or attribute.
    Name(String),
    /// A subscript.
    Subscript(SubscriptKey),
}

impl Key {
    /// Whether this is a subscript key.
    pub fn is_subscript(&self) -> bool {
        matches!(self, Key::Subscript(_))
    }
}

/// One observed execution event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A chain was read. `value` carries the identity the chain resolved to
    /// at runtime, when instrumentation could capture it.
    Read {
        stmt: u32,
        chain: SymbolRef,
        value: Option<ValueRecord>,
    },
    /// A binding was created or replaced.
    Write {
        stmt: u32,
        scope: WriteScope,
        key: Key,
        value: ValueRecord,
    },
    /// A binding was removed.
    Delete {
        stmt: u32,
        scope: WriteScope,
        key: Key,
    },
    /// A call began.
    Call {
        stmt: u32,
        func: SymbolRef,
        args: Vec<ValueRecord>,
        kwargs: Vec<(String, ValueRecord)>,
    },
    /// The innermost call returned.
    Return { stmt: u32, value: ValueRecord },
    /// A value was mutated in place.
    Mutate {
        stmt: u32,
        obj: ObjId,
        op: String,
        args: Vec<ValueRecord>,
    },
    /// A literal container was constructed.
    LiteralConstruct {
        stmt: u32,
        value: ValueRecord,
        elements: Vec<(Key, ValueRecord)>,
    },
    /// A module was imported.
    Import {
        stmt: u32,
        module: String,
        obj: ObjId,
    },
}

impl Event {
    /// Statement index the event occurred at.
    pub fn stmt(&self) -> u32 {
        match self {
            Event::Read { stmt, .. }
            | Event::Write { stmt, .. }
            | Event::Delete { stmt, .. }
            | Event::Call { stmt, .. }
            | Event::Return { stmt, .. }
            | Event::Mutate { stmt, .. }
            | Event::LiteralConstruct { stmt, .. }
            | Event::Import { stmt, .. } => *stmt,
        }
    }
}

//! Mutation-behavior registry.
//!
//! The engine never inspects runtime values, so whether `obj.op(...)` is a
//! mutation is decided by a closed lookup table keyed by
//! `(type tag, operation name)`. The table ships pre-populated with the
//! builtin container operations; embedders extend it for third-party types
//! whose source is not analyzed.

use std::collections::HashMap;

use cellflow_foundation::TypeTag;

/// Which descendants of the mutated value an operation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescendantScope {
    /// Every member may have changed (e.g. `list.reverse`).
    All,
    /// Only the freshly appended index (e.g. `list.append`).
    AppendedIndex,
    /// Only the member named by the given argument position
    /// (e.g. `dict.pop(key)` touches `d[key]`).
    KeyArg(usize),
}

/// Effect classification for a registered operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationEffect {
    /// The receiver is mutated.
    Standard(DescendantScope),
    /// An argument is mutated, not the receiver (e.g. `list.sort` called as
    /// `sorted_insert(lst, x)` style helpers).
    ArgMutation(usize),
    /// The enclosing caller's value is mutated (e.g. in-place operators
    /// routed through a method on another object).
    CallerMutation,
    /// The receiver's namespace is emptied (e.g. `dict.clear`).
    NamespaceClear,
    /// Known operation with unmodeled behavior; registration is skipped and
    /// logged.
    Unmodeled,
}

/// Lookup table of mutation effects.
#[derive(Debug, Clone, Default)]
pub struct MutationRegistry {
    effects: HashMap<(TypeTag, String), MutationEffect>,
}

impl MutationRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the builtin container operations.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (ty, op, effect) in BUILTIN_EFFECTS {
            registry.register(TypeTag::from(*ty), *op, *effect);
        }
        registry
    }

    /// Register or override an effect.
    pub fn register(&mut self, ty: TypeTag, op: impl Into<String>, effect: MutationEffect) {
        self.effects.insert((ty, op.into()), effect);
    }

    /// Look up the effect for an operation on a type.
    pub fn effect(&self, ty: &TypeTag, op: &str) -> Option<MutationEffect> {
        self.effects.get(&(ty.clone(), op.to_string())).copied()
    }

    /// Whether the operation is a known mutation of its receiver.
    pub fn is_mutating(&self, ty: &TypeTag, op: &str) -> bool {
        matches!(
            self.effect(ty, op),
            Some(
                MutationEffect::Standard(_)
                    | MutationEffect::NamespaceClear
                    | MutationEffect::CallerMutation
            )
        )
    }
}

const BUILTIN_EFFECTS: &[(&str, &str, MutationEffect)] = &[
    // list
    (
        "list",
        "append",
        MutationEffect::Standard(DescendantScope::AppendedIndex),
    ),
    (
        "list",
        "extend",
        MutationEffect::Standard(DescendantScope::AppendedIndex),
    ),
    (
        "list",
        "insert",
        MutationEffect::Standard(DescendantScope::All),
    ),
    (
        "list",
        "pop",
        MutationEffect::Standard(DescendantScope::All),
    ),
    (
        "list",
        "remove",
        MutationEffect::Standard(DescendantScope::All),
    ),
    (
        "list",
        "sort",
        MutationEffect::Standard(DescendantScope::All),
    ),
    (
        "list",
        "reverse",
        MutationEffect::Standard(DescendantScope::All),
    ),
    ("list", "clear", MutationEffect::NamespaceClear),
    // dict
    (
        "dict",
        "update",
        MutationEffect::Standard(DescendantScope::All),
    ),
    (
        "dict",
        "pop",
        MutationEffect::Standard(DescendantScope::KeyArg(0)),
    ),
    (
        "dict",
        "setdefault",
        MutationEffect::Standard(DescendantScope::KeyArg(0)),
    ),
    ("dict", "popitem", MutationEffect::Standard(DescendantScope::All)),
    ("dict", "clear", MutationEffect::NamespaceClear),
    // set
    ("set", "add", MutationEffect::Standard(DescendantScope::All)),
    (
        "set",
        "discard",
        MutationEffect::Standard(DescendantScope::All),
    ),
    (
        "set",
        "remove",
        MutationEffect::Standard(DescendantScope::All),
    ),
    (
        "set",
        "update",
        MutationEffect::Standard(DescendantScope::All),
    ),
    ("set", "pop", MutationEffect::Standard(DescendantScope::All)),
    ("set", "clear", MutationEffect::NamespaceClear),
];

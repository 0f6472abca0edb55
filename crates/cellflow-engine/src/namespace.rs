//! Namespaces: the internal structure of composite values.
//!
//! A namespace is keyed by the identity token of the value it mirrors.
//! Identity tokens can be reused by the runtime after a value dies, so each
//! namespace carries a generation; a lookup that hits a tombstoned or
//! regenerated entry does not resolve (stale-reuse guard).

use cellflow_ast::SubscriptKey;
use cellflow_foundation::{NamespaceId, ObjId, SymbolId, Timestamp};
use indexmap::IndexMap;

/// Attribute/subscript structure of one runtime value.
#[derive(Debug, Clone)]
pub struct Namespace {
    pub id: NamespaceId,
    /// Identity of the mirrored value.
    pub obj: ObjId,
    /// Generation of the identity token at creation time.
    pub generation: u64,
    /// Symbol whose binding owns this value, if known.
    pub owner: Option<SymbolId>,
    pub attributes: IndexMap<String, SymbolId>,
    pub subscripts: IndexMap<SubscriptKey, SymbolId>,
    /// Freshest update anywhere beneath this namespace.
    pub max_descendent_ts: Timestamp,
    /// Class namespace this instance namespace inherits entries from.
    pub cloned_from: Option<NamespaceId>,
    /// When positional structure last changed (insert/remove/reorder).
    /// Integer subscripts resolved before this are unsafe.
    pub last_structural_ts: Timestamp,
    pub tombstone: bool,
}

impl Namespace {
    pub fn new(id: NamespaceId, obj: ObjId, generation: u64) -> Self {
        Self {
            id,
            obj,
            generation,
            owner: None,
            attributes: IndexMap::new(),
            subscripts: IndexMap::new(),
            max_descendent_ts: Timestamp::UNINITIALIZED,
            cloned_from: None,
            last_structural_ts: Timestamp::UNINITIALIZED,
            tombstone: false,
        }
    }

    /// Look up a member symbol in this namespace only (no class walk).
    pub fn get_attribute(&self, name: &str) -> Option<SymbolId> {
        self.attributes.get(name).copied()
    }

    /// Look up a subscript member.
    pub fn get_subscript(&self, key: &SubscriptKey) -> Option<SymbolId> {
        self.subscripts.get(key).copied()
    }

    /// Bind a member under a key.
    pub fn bind_member(&mut self, key: MemberKey, symbol: SymbolId) -> Option<SymbolId> {
        match key {
            MemberKey::Attribute(name) => self.attributes.insert(name, symbol),
            MemberKey::Subscript(key) => self.subscripts.insert(key, symbol),
        }
    }

    /// Remove a member binding.
    pub fn unbind_member(&mut self, key: &MemberKey) -> Option<SymbolId> {
        match key {
            MemberKey::Attribute(name) => self.attributes.shift_remove(name),
            MemberKey::Subscript(key) => self.subscripts.shift_remove(key),
        }
    }

    /// All member symbols, attributes then subscripts.
    pub fn members(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.attributes
            .values()
            .chain(self.subscripts.values())
            .copied()
    }

    /// Record an update at `ts` somewhere beneath this namespace.
    pub fn record_descendent_update(&mut self, ts: Timestamp) {
        self.max_descendent_ts = self.max_descendent_ts.max_of(ts);
    }

    /// Record a structural change (member added/removed/reordered) at `ts`.
    pub fn record_structural_change(&mut self, ts: Timestamp) {
        self.last_structural_ts = self.last_structural_ts.max_of(ts);
        self.record_descendent_update(ts);
    }
}

/// Owned member key, the write-side counterpart of attribute/subscript
/// lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberKey {
    Attribute(String),
    Subscript(SubscriptKey),
}

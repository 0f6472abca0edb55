//! Reference-chain resolution.
//!
//! Walks a `SymbolRef` against the scope/namespace graph: the head atom in
//! the lexical scope chain, every later atom in the namespace of the
//! previous binding's value. Resolution stops at the first call marker or
//! the first link that cannot be followed.
//!
//! A head name never fails to resolve: an unknown name creates an
//! uninitialized symbol on the spot (implicit creation on first observed
//! read). Deeper links can fail two ways, and the difference matters:
//! an *unresolved* chain is a conservative live obligation the caller must
//! keep, while an *unsafe* link (key known absent, stale positional index)
//! is excluded from the dependency set entirely.

use cellflow_analyze::compute_liveness;
use cellflow_ast::{Atom, AtomKind, SubscriptKey, SymbolRef};
use cellflow_foundation::{NamespaceId, ScopeId, SymbolId, Timestamp};
use indexmap::IndexSet;
use tracing::debug;

use crate::graph::DependencyGraph;
use crate::mutation::MutationRegistry;
use crate::scope::ScopeKind;
use crate::symbol::SymbolKind;

/// One resolved link of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRef {
    pub symbol: SymbolId,
    /// Index of the atom this binding came from.
    pub atom_idx: usize,
    /// The next atom calls this binding's value.
    pub is_called: bool,
    /// The whole value is consumed (last link, called link, or a container
    /// read through a computed key).
    pub is_deep: bool,
    /// The next atom is a call to a registered mutating operation.
    pub is_mutating: bool,
    /// Resolves, but to data known to be absent or stale; not a dependency.
    pub is_unsafe: bool,
    pub is_reactive: bool,
    pub is_cascading_reactive: bool,
    /// A blocking marker upstream suppresses reactivity from here on.
    pub is_blocked: bool,
    /// Final link of the resolution.
    pub is_last: bool,
}

/// Outcome of resolving one chain.
#[derive(Debug, Clone)]
pub enum Resolution {
    Resolved(Vec<ResolvedRef>),
    /// The chain could not be bound past some link; the whole chain is a
    /// conservative live obligation.
    Unresolved(SymbolRef),
}

impl Resolution {
    /// The resolved bindings, empty when unresolved.
    pub fn refs(&self) -> &[ResolvedRef] {
        match self {
            Resolution::Resolved(refs) => refs,
            Resolution::Unresolved(_) => &[],
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, Resolution::Unresolved(_))
    }

    /// Bindings that may participate as dependencies (unsafe links
    /// excluded).
    pub fn dependency_refs(&self) -> impl Iterator<Item = &ResolvedRef> {
        self.refs().iter().filter(|r| !r.is_unsafe)
    }
}

/// Result of resolving a user-level call: the per-call scope, the bound
/// parameter symbols, and the callee's free reads attributed to the call
/// site.
#[derive(Debug)]
pub struct CallResolution {
    pub call_scope: ScopeId,
    pub params: Vec<(String, SymbolId)>,
    /// Chains the callee body reads from outside its own scope, resolved.
    pub free_reads: Vec<(SymbolRef, Resolution)>,
}

/// Chain walker over the graph.
pub struct Resolver<'a> {
    graph: &'a mut DependencyGraph,
    registry: &'a MutationRegistry,
}

impl<'a> Resolver<'a> {
    pub fn new(graph: &'a mut DependencyGraph, registry: &'a MutationRegistry) -> Self {
        Self { graph, registry }
    }

    /// Resolve a chain against a lexical scope.
    pub fn resolve(&mut self, scope: ScopeId, chain: &SymbolRef) -> Resolution {
        let atoms = chain.atoms();
        let Some(head_name) = chain.leading_name() else {
            return Resolution::Unresolved(chain.clone());
        };

        let mut refs: Vec<ResolvedRef> = Vec::new();
        let mut reactive = false;
        let mut cascading = false;
        let mut blocked = false;

        let head = self
            .graph
            .ensure_name(scope, head_name, SymbolKind::Default);
        let mut current = head;
        apply_tags(&atoms[0], &mut reactive, &mut cascading, &mut blocked);
        refs.push(ResolvedRef {
            symbol: head,
            atom_idx: 0,
            is_called: false,
            is_deep: false,
            is_mutating: false,
            is_unsafe: false,
            is_reactive: reactive && !blocked,
            is_cascading_reactive: cascading && !blocked,
            is_blocked: blocked,
            is_last: false,
        });

        let mut idx = 1;
        while idx < atoms.len() {
            let atom = &atoms[idx];
            apply_tags(atom, &mut reactive, &mut cascading, &mut blocked);

            match &atom.kind {
                AtomKind::Call => {
                    // Resolution stops at the first call marker; the called
                    // value is consumed whole.
                    if let Some(last) = refs.last_mut() {
                        last.is_called = true;
                        last.is_deep = true;
                    }
                    break;
                }
                AtomKind::Name(_) => {
                    // A name past the head is malformed; treat as opaque.
                    return Resolution::Unresolved(chain.clone());
                }
                AtomKind::Attribute(name) => {
                    let Some(obj) = self.graph.symbol(current).obj() else {
                        debug!(chain = %chain, "chain through unbound value; unresolved");
                        return Resolution::Unresolved(chain.clone());
                    };
                    let ns = self.graph.lookup_namespace(obj);
                    let member = ns.and_then(|ns| self.lookup_attribute(ns, name));
                    match member {
                        Some(member) => {
                            // A mutating method call consumes the receiver
                            // mutably, not the member.
                            if let Some(AtomKind::Call) = atoms.get(idx + 1).map(|a| &a.kind) {
                                let mutating = self
                                    .graph
                                    .obj_info(obj)
                                    .map(|info| self.registry.is_mutating(&info.type_tag, name))
                                    .unwrap_or(false);
                                if mutating {
                                    if let Some(receiver) = refs.last_mut() {
                                        receiver.is_mutating = true;
                                    }
                                }
                            }
                            current = member;
                            refs.push(self.make_ref(member, idx, reactive, cascading, blocked));
                        }
                        None => {
                            // Absent from instance and class: for scalar
                            // values this is a chain that cannot be trusted.
                            let non_container = self
                                .graph
                                .obj_info(obj)
                                .is_some_and(|info| !info.is_container);
                            if ns.is_some() && non_container {
                                if let Some(last) = refs.last_mut() {
                                    last.is_unsafe = true;
                                    last.is_last = true;
                                }
                                return Resolution::Resolved(refs);
                            }
                            return Resolution::Unresolved(chain.clone());
                        }
                    }
                }
                AtomKind::Subscript(key) => {
                    let Some(obj) = self.graph.symbol(current).obj() else {
                        return Resolution::Unresolved(chain.clone());
                    };
                    let Some(ns_id) = self.graph.lookup_namespace(obj) else {
                        return Resolution::Unresolved(chain.clone());
                    };
                    if matches!(key, SubscriptKey::Computed) {
                        // Dynamic key: the container itself is consumed.
                        if let Some(last) = refs.last_mut() {
                            last.is_deep = true;
                        }
                        break;
                    }
                    match self.graph.namespace(ns_id).get_subscript(key) {
                        Some(member) => {
                            // A positional index resolved before the last
                            // structural change points at moved data.
                            let stale_index = matches!(key, SubscriptKey::Index(_))
                                && self.graph.namespace(ns_id).last_structural_ts
                                    > self.graph.symbol(member).updated_ts;
                            current = member;
                            let mut rref =
                                self.make_ref(member, idx, reactive, cascading, blocked);
                            rref.is_unsafe = stale_index;
                            refs.push(rref);
                        }
                        None => {
                            // Key known absent from a tracked namespace.
                            if let Some(last) = refs.last_mut() {
                                last.is_unsafe = true;
                                last.is_last = true;
                            }
                            debug!(chain = %chain, key = %key, "absent subscript key; unsafe");
                            return Resolution::Resolved(refs);
                        }
                    }
                }
            }
            idx += 1;
        }

        if let Some(last) = refs.last_mut() {
            last.is_last = true;
            // The final binding consumes its whole value.
            if idx >= atoms.len() {
                last.is_deep = true;
            }
        }
        Resolution::Resolved(refs)
    }

    /// Resolve a user-level call: bind arguments to parameters in a fresh
    /// call scope and compute the callee's free reads, attributed to the
    /// call site (no dynamic re-tracing).
    ///
    /// `skip_receiver` skips a leading receiver parameter (method calls).
    pub fn resolve_call(
        &mut self,
        func: SymbolId,
        args: &[SymbolId],
        kwargs: &[(String, SymbolId)],
        ts: Timestamp,
        skip_receiver: bool,
    ) -> Option<CallResolution> {
        let info = self.graph.symbol(func).function.clone()?;
        let defining_scope = self.graph.symbol(func).scope;
        let call_scope = self
            .graph
            .create_scope(Some(defining_scope), ScopeKind::Call);

        let mut params: Vec<(String, SymbolId)> = Vec::new();
        let param_list: Vec<_> = info
            .params
            .iter()
            .skip(usize::from(skip_receiver))
            .collect();

        for (pos, param) in param_list.iter().enumerate() {
            let sym = self
                .graph
                .create_symbol(&param.name, SymbolKind::Default, call_scope);
            self.graph.scope_mut(call_scope).bind(&param.name, sym);

            let arg = args.get(pos).copied().or_else(|| {
                kwargs
                    .iter()
                    .find(|(name, _)| name == &param.name)
                    .map(|(_, sym)| *sym)
            });
            if let Some(arg) = arg {
                self.graph.add_edge(arg, sym, ts);
                if let Some(obj) = self.graph.symbol(arg).obj() {
                    self.graph.bind_obj(sym, obj);
                }
                self.graph.symbol_mut(sym).refresh(ts);
            }
            params.push((param.name.clone(), sym));
        }

        // Free names are everything the body reads that is not a parameter.
        let param_dead: IndexSet<SymbolRef> = params
            .iter()
            .map(|(name, _)| SymbolRef::name(name.clone()))
            .collect();
        let liveness = compute_liveness(&info.body, &param_dead);

        let mut free_reads = Vec::new();
        for live in &liveness.live {
            if live.used_while_dead {
                continue; // parameter or locally bound inside the body
            }
            let resolution = self.resolve(call_scope, &live.chain);
            free_reads.push((live.chain.clone(), resolution));
        }

        Some(CallResolution {
            call_scope,
            params,
            free_reads,
        })
    }

    fn make_ref(
        &self,
        symbol: SymbolId,
        atom_idx: usize,
        reactive: bool,
        cascading: bool,
        blocked: bool,
    ) -> ResolvedRef {
        ResolvedRef {
            symbol,
            atom_idx,
            is_called: false,
            is_deep: false,
            is_mutating: false,
            is_unsafe: false,
            is_reactive: reactive && !blocked,
            is_cascading_reactive: cascading && !blocked,
            is_blocked: blocked,
            is_last: false,
        }
    }

    /// Attribute lookup walking the instance namespace and then the class
    /// namespace it was cloned from.
    fn lookup_attribute(&self, ns: NamespaceId, name: &str) -> Option<SymbolId> {
        let mut current = Some(ns);
        let mut seen = IndexSet::new();
        while let Some(id) = current {
            if !seen.insert(id) {
                break;
            }
            let ns = self.graph.namespace(id);
            if let Some(sym) = ns.get_attribute(name) {
                return Some(sym);
            }
            current = ns.cloned_from;
        }
        None
    }
}

/// Carry reactivity forward: once a link is tagged, the rest of the chain
/// is reactive unless a blocking marker overrides it.
fn apply_tags(atom: &Atom, reactive: &mut bool, cascading: &mut bool, blocked: &mut bool) {
    *reactive |= atom.is_reactive;
    *cascading |= atom.is_cascading_reactive;
    *blocked |= atom.is_blocking;
}

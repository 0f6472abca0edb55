//! Integration test harness for cellflow.
//!
//! Drives a [`Session`] the way an embedder would: record cell runs with
//! hand-built event traces, then query staleness and readiness. Event
//! construction is verbose, so the helpers here cover the shapes the
//! tests need; value identities are plain `u64` tokens chosen per test.

use cellflow_ast::{Atom, SubscriptKey, SymbolRef};
use cellflow_engine::{
    Event, Key, SchedulerResult, Session, SessionConfig, ValueRecord, WriteScope,
};
use cellflow_foundation::{CellId, ObjId, SymbolId};

/// A scripted notebook driving one session.
pub struct Notebook {
    session: Session,
}

impl Notebook {
    pub fn new() -> Self {
        Self {
            session: Session::new(),
        }
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            session: Session::with_config(config),
        }
    }

    /// Record one cell run.
    ///
    /// # Panics
    ///
    /// Panics if the source fails to parse or the trace is malformed;
    /// the tests script both by hand.
    pub fn run(&mut self, cell: u64, source: &str, trace: Vec<Event>) {
        self.session
            .run_cell(CellId::new(cell), source, &trace)
            .unwrap_or_else(|err| panic!("cell {cell} failed: {err}"));
    }

    /// Readiness classification for the given cells.
    pub fn check(&mut self, cells: &[u64]) -> SchedulerResult {
        let ids: Vec<CellId> = cells.iter().copied().map(CellId::new).collect();
        self.session.check_cells(&ids)
    }

    /// Global-scope symbol for a name.
    ///
    /// # Panics
    ///
    /// Panics if the name is not bound.
    pub fn symbol(&self, name: &str) -> SymbolId {
        self.session
            .lookup(name)
            .unwrap_or_else(|| panic!("no symbol named {name}"))
    }

    /// Whether the named global binding waits on an upstream update,
    /// consuming the whole value.
    pub fn waiting(&self, name: &str) -> bool {
        self.session.is_waiting(self.symbol(name), true)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}

impl Default for Notebook {
    fn default() -> Self {
        Self::new()
    }
}

/// Scalar value record with the given identity token.
pub fn scalar(obj: u64) -> ValueRecord {
    ValueRecord::scalar(ObjId::new(obj), "int")
}

/// List value record with the given identity token.
pub fn list(obj: u64) -> ValueRecord {
    ValueRecord::container(ObjId::new(obj), "list")
}

/// Lexical write of a name.
pub fn assign(stmt: u32, name: &str, value: ValueRecord) -> Event {
    Event::Write {
        stmt,
        scope: WriteScope::Lexical,
        key: Key::Name(name.into()),
        value,
    }
}

/// Read of a bare name.
pub fn read(stmt: u32, name: &str) -> Event {
    Event::Read {
        stmt,
        chain: SymbolRef::name(name),
        value: None,
    }
}

/// Read of a positional member, e.g. `lst[0]`.
pub fn read_index(stmt: u32, name: &str, index: i64) -> Event {
    Event::Read {
        stmt,
        chain: SymbolRef::name(name).appended(Atom::subscript(SubscriptKey::Index(index))),
        value: None,
    }
}

/// Subscript write through a container identity, e.g. `lst[0] = v`.
pub fn write_index(stmt: u32, container: u64, index: i64, value: ValueRecord) -> Event {
    Event::Write {
        stmt,
        scope: WriteScope::Object(ObjId::new(container)),
        key: Key::Subscript(SubscriptKey::Index(index)),
        value,
    }
}

/// Construction of a list literal with positional elements.
pub fn list_literal(stmt: u32, obj: u64, elements: Vec<ValueRecord>) -> Event {
    Event::LiteralConstruct {
        stmt,
        value: list(obj),
        elements: elements
            .into_iter()
            .enumerate()
            .map(|(i, v)| (Key::Subscript(SubscriptKey::Index(i as i64)), v))
            .collect(),
    }
}

/// Call of a bare function name with positional arguments.
pub fn call(stmt: u32, func: &str, args: Vec<ValueRecord>) -> Event {
    Event::Call {
        stmt,
        func: SymbolRef::name(func),
        args,
        kwargs: vec![],
    }
}

/// Return from the innermost open call.
pub fn ret(stmt: u32, value: ValueRecord) -> Event {
    Event::Return { stmt, value }
}

/// In-place mutation of the value with the given identity.
pub fn mutate(stmt: u32, obj: u64, op: &str, args: Vec<ValueRecord>) -> Event {
    Event::Mutate {
        stmt,
        obj: ObjId::new(obj),
        op: op.into(),
        args,
    }
}

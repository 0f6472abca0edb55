//! The cellflow engine.
//!
//! Tracks what re-executable units of code (cells) compute from each
//! other and answers, after every run, which cells now hold results
//! computed from out-of-date inputs. The engine consumes parsed source
//! plus an execution event trace per cell run; it never executes code
//! and never inspects runtime values beyond opaque identity tokens.
//!
//! Entry point is [`Session`]: record runs with [`Session::run_cell`],
//! then ask [`Session::check_cells`] which cells are waiting or ready,
//! [`Session::is_waiting`] for a single binding, or
//! [`Session::reproduce`] for the minimal source slice behind a value.

mod cell;
mod config;
mod error;
mod event;
mod graph;
mod mutation;
mod namespace;
mod resolver;
mod scheduler;
mod scope;
mod session;
mod slicer;
mod staleness;
mod symbol;
mod update;

pub use cell::{CellStore, CellVersion};
pub use config::SessionConfig;
pub use error::{Error, Result};
pub use event::{Event, Key, ValueRecord, WriteScope};
pub use graph::{DependencyGraph, ObjInfo};
pub use mutation::{DescendantScope, MutationEffect, MutationRegistry};
pub use namespace::{MemberKey, Namespace};
pub use resolver::{CallResolution, Resolution, ResolvedRef, Resolver};
pub use scheduler::{Scheduler, SchedulerPolicy, SchedulerResult};
pub use scope::{Scope, ScopeKind};
pub use session::Session;
pub use slicer::{SliceResult, Slicer};
pub use staleness::{is_waiting, is_waiting_at_position, ReadinessCache, ANY_POSITION};
pub use symbol::{Binding, FunctionInfo, Symbol, SymbolKind};
pub use update::{apply_update, Update, UpdateKind};

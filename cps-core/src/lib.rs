//! Value, environment and heap-bookkeeping primitives for a CPS
//! trampoline runtime.
//!
//! This crate owns the data the GC operates on (`value`, `environment`,
//! `closure`, `heap`, `arena`) and the fatal-error reporting path
//! (`error`) every other module funnels into. GC *policy* — when to run a
//! minor or major collection, how evacuation and marking actually walk
//! the graph — lives in `cps_runtime`, one layer up.

pub mod arena;
pub mod closure;
pub mod control;
pub mod environment;
pub mod error;
pub mod heap;
pub mod value;

pub use closure::{Arity, Code, ClosureRecord, OneFn, TwoFn};
pub use control::Control;
pub use environment::{
    install_layout_table, EnvId, EnvLayoutEntry, EnvLayoutTable, EnvRecord, IdentifierId,
};
pub use error::{fatal, FatalKind};
pub use heap::HeapBookkeeper;
pub use value::{void_singleton, Header, IntRecord, Mark, StringRecord, Tag, Value, VoidRecord};

use std::ptr::NonNull;

/// Allocate a stack-resident integer record and return it as a `Value`.
#[must_use]
pub fn make_int_on_stack(value: i64) -> Value {
    let record = IntRecord {
        header: Header::new(Tag::Int, true),
        value,
    };
    Value::Int(arena::alloc_on_stack(record))
}

/// Allocate a stack-resident void record and return it as a `Value`.
///
/// Distinct from [`void_singleton`], which is always heap-resident: this
/// exists so tests and demos can construct the "many stack-resident voids"
/// shape spec §8 scenario S6 describes, to exercise the minor GC's
/// dedup-to-the-singleton evacuation policy (spec §4.4).
#[must_use]
pub fn make_void_on_stack() -> Value {
    let record = VoidRecord {
        header: Header::new(Tag::Void, true),
    };
    Value::Void(arena::alloc_on_stack(record))
}

/// Allocate a stack-resident string record and return it as a `Value`.
#[must_use]
pub fn make_string_on_stack(data: impl Into<Box<str>>) -> Value {
    let record = StringRecord {
        header: Header::new(Tag::String, true),
        data: data.into(),
    };
    Value::String(arena::alloc_on_stack(record))
}

/// Allocate a stack-resident environment record and return it as a
/// `Value::Env`. Exposed mainly for GC-internal and test code; ordinary
/// compiled code should only ever reach an environment through its owning
/// closure (SPEC_FULL.md §4.1).
#[must_use]
pub fn make_env_on_stack(env: EnvRecord) -> NonNull<EnvRecord> {
    arena::alloc_on_stack(env)
}

/// Allocate a stack-resident closure record.
#[must_use]
pub fn make_closure_on_stack(closure: ClosureRecord) -> Value {
    Value::Closure(arena::alloc_on_stack(closure))
}

/// Directly heap-allocate and register an integer record, bypassing the
/// stack arena entirely (spec §4.1's `gc_alloc` path, used when compiled
/// code knows a value will outlive the current minor GC cycle — in
/// practice, only the runtime's own bootstrap code uses this; ordinary
/// compiled output always allocates on the stack and lets the minor GC
/// promote survivors).
#[must_use]
pub fn gc_alloc_int(n: i64) -> Value {
    let mut record = Box::new(IntRecord {
        header: Header::new(Tag::Int, false),
        value: n,
    });
    let ptr = NonNull::from(record.as_mut());
    let value = Value::Int(ptr);
    heap::with_bookkeeper(|bk| {
        bk.own(value, record);
    });
    value
}

//! Value representation for the CPS runtime.
//!
//! Every value carries a `Header` (tag + GC mark + stack/heap residency
//! flag) ahead of its payload, matching spec §3.1. Compound values
//! (closures, environments, strings) are reached through a raw pointer;
//! integers and the void singleton carry the same header so the GC can
//! treat every variant uniformly.

use std::cell::Cell;
use std::fmt;
use std::ptr::NonNull;
use std::sync::OnceLock;

use crate::closure::ClosureRecord;
use crate::environment::EnvRecord;

/// Discriminates the five value variants (spec §3.1).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Tag {
    Closure = 0,
    Env = 1,
    Int = 2,
    Void = 3,
    String = 4,
}

/// Tri-color GC mark state (spec §3.1, §4.5).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Mark {
    White,
    Grey,
    Black,
}

/// The common prefix every heap/stack record carries.
///
/// `mark` and `on_stack` use `Cell` because the GC rewrites them in place
/// on records it does not otherwise own exclusively (a `Value` is a
/// shared, `Copy` pointer-like handle, not a unique owner).
pub struct Header {
    pub tag: Tag,
    pub mark: Cell<Mark>,
    pub on_stack: Cell<bool>,
}

impl Header {
    #[must_use]
    pub fn new(tag: Tag, on_stack: bool) -> Self {
        Header {
            tag,
            mark: Cell::new(Mark::White),
            on_stack: Cell::new(on_stack),
        }
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Header")
            .field("tag", &self.tag)
            .field("mark", &self.mark.get())
            .field("on_stack", &self.on_stack.get())
            .finish()
    }
}

/// A 64-bit signed integer record (spec §3.2). Immutable.
pub struct IntRecord {
    pub header: Header,
    pub value: i64,
}

/// The void record (spec §3.3). Every `on_stack` void eventually
/// evacuates to the single process-wide singleton.
pub struct VoidRecord {
    pub header: Header,
}

/// An immutable, heap-or-stack resident string (spec §3.4).
pub struct StringRecord {
    pub header: Header,
    pub data: Box<str>,
}

/// A value: a tagged, `Copy` handle to one of the five record kinds.
///
/// This is deliberately pointer-based (rather than an inline enum with
/// owned payloads) so that the minor/major GC can treat "the thing this
/// `Value` designates" uniformly regardless of whether it currently lives
/// in the stack arena or on the heap bookkeeper.
#[derive(Clone, Copy)]
pub enum Value {
    Closure(NonNull<ClosureRecord>),
    Env(NonNull<EnvRecord>),
    Int(NonNull<IntRecord>),
    Void(NonNull<VoidRecord>),
    String(NonNull<StringRecord>),
}

impl Value {
    /// Tag of the record this value designates.
    #[must_use]
    pub fn tag(self) -> Tag {
        match self {
            Value::Closure(_) => Tag::Closure,
            Value::Env(_) => Tag::Env,
            Value::Int(_) => Tag::Int,
            Value::Void(_) => Tag::Void,
            Value::String(_) => Tag::String,
        }
    }

    /// Whether the designated record currently lives in the stack arena.
    #[must_use]
    pub fn is_on_stack(self) -> bool {
        // SAFETY: every variant's pointer targets a record whose first
        // field is a `Header`; the record was either just allocated by
        // this crate's constructors or evacuated by the GC, both of which
        // keep the pointer valid for the lifetime of the enclosing value
        // graph (see invariant I1 in spec §3.1 and cps_core::arena).
        unsafe {
            match self {
                Value::Closure(p) => p.as_ref().header.on_stack.get(),
                Value::Env(p) => p.as_ref().header.on_stack.get(),
                Value::Int(p) => p.as_ref().header.on_stack.get(),
                Value::Void(p) => p.as_ref().header.on_stack.get(),
                Value::String(p) => p.as_ref().header.on_stack.get(),
            }
        }
    }

    /// Raw address, used only as an opaque identity key for the GC's
    /// evacuated-pointer map and mark bookkeeping. Never dereferenced as
    /// an address by anything outside this crate.
    #[must_use]
    pub fn identity(self) -> usize {
        match self {
            Value::Closure(p) => p.as_ptr() as usize,
            Value::Env(p) => p.as_ptr() as usize,
            Value::Int(p) => p.as_ptr() as usize,
            Value::Void(p) => p.as_ptr() as usize,
            Value::String(p) => p.as_ptr() as usize,
        }
    }

    /// Current mark color.
    #[must_use]
    pub fn mark(self) -> Mark {
        // SAFETY: see `is_on_stack`.
        unsafe {
            match self {
                Value::Closure(p) => p.as_ref().header.mark.get(),
                Value::Env(p) => p.as_ref().header.mark.get(),
                Value::Int(p) => p.as_ref().header.mark.get(),
                Value::Void(p) => p.as_ref().header.mark.get(),
                Value::String(p) => p.as_ref().header.mark.get(),
            }
        }
    }

    /// Set the mark color in place.
    pub fn set_mark(self, mark: Mark) {
        // SAFETY: see `is_on_stack`.
        unsafe {
            match self {
                Value::Closure(p) => p.as_ref().header.mark.set(mark),
                Value::Env(p) => p.as_ref().header.mark.set(mark),
                Value::Int(p) => p.as_ref().header.mark.set(mark),
                Value::Void(p) => p.as_ref().header.mark.set(mark),
                Value::String(p) => p.as_ref().header.mark.set(mark),
            }
        }
    }

    #[must_use]
    pub fn as_int(self) -> Option<i64> {
        match self {
            Value::Int(p) => Some(unsafe { p.as_ref() }.value),
            _ => None,
        }
    }

    /// Clones the string's contents out rather than borrowing them: a
    /// `Value` carries no lifetime of its own, and the record behind it
    /// can be relocated or freed by a later GC cycle, so there is no
    /// sound way to hand back a borrow tied to anything shorter than
    /// `'static` and no sound way to hand back `'static` either.
    #[must_use]
    pub fn as_string(self) -> Option<String> {
        match self {
            // SAFETY: a reachable `Value::String` points at a live
            // `StringRecord` for the duration of this call.
            Value::String(p) => Some(unsafe { p.as_ref() }.data.to_string()),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_closure(self) -> bool {
        matches!(self, Value::Closure(_))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Closure(p) => write!(f, "Closure({:?})", p.as_ptr()),
            Value::Env(p) => write!(f, "Env({:?})", p.as_ptr()),
            Value::Int(p) => write!(f, "Int({})", unsafe { p.as_ref() }.value),
            Value::Void(p) => write!(f, "Void({:?})", p.as_ptr()),
            Value::String(p) => write!(f, "String({:?})", unsafe { &p.as_ref().data }),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

// SAFETY: the singleton pointer is produced once via `Box::leak`, never
// freed, and only ever read; the runtime is single-threaded per spec §5,
// but `OnceLock` requires `Sync` regardless, which a raw pointer is not by
// default. We assert the single-threaded contract here rather than pay
// for atomics we don't need.
struct VoidPtr(NonNull<VoidRecord>);
unsafe impl Sync for VoidPtr {}
unsafe impl Send for VoidPtr {}

static VOID_SINGLETON_BOX: OnceLock<VoidPtr> = OnceLock::new();

/// The process-wide void singleton (spec §3.3). Every evacuated void
/// value collapses to this one record.
#[must_use]
pub fn void_singleton() -> Value {
    let ptr = VOID_SINGLETON_BOX
        .get_or_init(|| {
            let record = Box::new(VoidRecord {
                header: Header::new(Tag::Void, false),
            });
            VoidPtr(NonNull::from(Box::leak(record)))
        })
        .0;
    Value::Void(ptr)
}

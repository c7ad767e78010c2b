//! The thunk type, the two-level GC, and the trampoline/call protocol for
//! a CPS runtime core.
//!
//! Built on top of `cps_core`'s value/environment/heap primitives. This
//! crate owns everything that decides *when* a value moves from the
//! stack arena to the heap, *when* heap garbage is reclaimed, and *how*
//! control returns to a single native loop instead of recursing forever.

pub mod config;
pub mod gc;
pub mod thunk;
pub mod trampoline;

pub use thunk::Thunk;
pub use trampoline::{call_one, call_two, halt, run_gc_cycle, start};

//! The two-level garbage collector (spec §4).
//!
//! `minor` evacuates the reachable graph from the stack arena to the
//! heap (Cheney-style copying); `major` mark-sweeps the heap itself.
//! Spec §4.4 runs them back to back on every GC cycle the trampoline
//! triggers — see `cps_runtime::trampoline::run_gc_cycle`.

pub mod major;
pub mod minor;

//! The trampoline and call protocol (spec §5, §9 Design Note option c).
//!
//! Grounded in `examples/original_source/src/core/base.c`'s
//! `call_closure_one` / `call_closure_two` (headroom check, then either a
//! direct call or install-and-longjmp) and `scheme_start` (the
//! `setjmp`-rooted loop that re-dispatches after every `run_minor_gc`).
//! The Rust translation replaces `setjmp`/`longjmp` with the
//! `Control::Bounce` tagged return spec §9 sanctions as option (c): a
//! direct call is an ordinary, non-tail-call-optimized Rust call that
//! grows the native stack exactly as the original did; `Control` only
//! materializes once `has_headroom` reports none left, and propagates
//! back up through every intervening `return call_one(...)` /
//! `return call_two(...)` frame to this module's loop.

use std::cell::Cell;
use std::io::Write;

use cps_core::closure::Code;
use cps_core::{fatal, Control, FatalKind, Value};

use crate::config::{stack_soft_limit_bytes, STACK_SAFETY_MARGIN_BYTES};
use crate::gc::{major, minor};
use crate::thunk::{self, Thunk};

thread_local! {
    // Process-wide in the sense spec §5 means it (this runtime runs one
    // compiled program per OS thread and never migrates a call chain
    // across threads), but kept thread-local rather than a bare global so
    // that running many independent programs (e.g. the test suite, which
    // gives each `#[test]` its own OS thread) never lets one thread's
    // stack address be mistaken for another's base.
    static STACK_BASE: Cell<Option<usize>> = const { Cell::new(None) };
}

/// A stand-in for "the current stack pointer": the address of a local
/// variable is close enough to serve as a headroom proxy, exactly as
/// `__builtin_frame_address(0)` does in the original.
fn approximate_stack_pointer() -> usize {
    let probe: u8 = 0;
    std::ptr::addr_of!(probe) as usize
}

fn record_stack_base() {
    STACK_BASE.with(|cell| {
        if cell.get().is_none() {
            cell.set(Some(approximate_stack_pointer()));
        }
    });
}

/// Whether at least `STACK_SAFETY_MARGIN_BYTES` of native stack remain
/// before the OS soft limit (spec §4.6). Stacks on the platforms this
/// runtime targets grow downward, so headroom shrinks as the current
/// address moves below the recorded base.
fn has_headroom() -> bool {
    let base = STACK_BASE.with(|cell| {
        if let Some(base) = cell.get() {
            base
        } else {
            let base = approximate_stack_pointer();
            cell.set(Some(base));
            base
        }
    });
    let current = approximate_stack_pointer();
    let used = base.saturating_sub(current);
    let limit = stack_soft_limit_bytes();
    used.saturating_add(STACK_SAFETY_MARGIN_BYTES) < limit
}

/// Call a one-argument closure, or suspend the call as a thunk if stack
/// headroom is exhausted.
///
/// Compiled tail calls to a one-argument closure are written as `return
/// call_one(...)`, so the *caller's* frame is reused by the time this
/// returns — the only frames that accumulate on the fast path are the
/// ones between successive tail calls' call sites, which is exactly the
/// native-stack growth spec §5 expects the headroom check to bound.
pub fn call_one(closure: Value, k: Value) -> Control {
    if !has_headroom() {
        thunk::install_one(closure, k);
        return Control::Bounce;
    }
    match closure {
        Value::Closure(p) => {
            // SAFETY: a `Value::Closure` always points at a valid
            // `ClosureRecord` for as long as it is reachable, which this
            // call's caller has already established.
            let record = unsafe { p.as_ref() };
            match record.code {
                Code::One(f) => f(record.env_value(), k),
                Code::Two(_) => fatal(
                    FatalKind::TypeError,
                    "call_one invoked on a two-argument closure",
                ),
            }
        }
        _ => fatal(FatalKind::TypeError, "call_one target is not a closure"),
    }
}

/// Call a two-argument closure, or suspend the call as a thunk.
pub fn call_two(closure: Value, rand: Value, cont: Value) -> Control {
    if !has_headroom() {
        thunk::install_two(closure, rand, cont);
        return Control::Bounce;
    }
    match closure {
        Value::Closure(p) => {
            // SAFETY: see `call_one`.
            let record = unsafe { p.as_ref() };
            match record.code {
                Code::Two(f) => f(record.env_value(), rand, cont),
                Code::One(_) => fatal(
                    FatalKind::TypeError,
                    "call_two invoked on a one-argument closure",
                ),
            }
        }
        _ => fatal(FatalKind::TypeError, "call_two target is not a closure"),
    }
}

/// Re-dispatch whatever thunk is currently installed (used only by the
/// trampoline loop, right after a GC cycle has rewritten it in place).
fn dispatch(thunk: Thunk) -> Control {
    match thunk {
        Thunk::One { closure, arg } => call_one(closure, arg),
        Thunk::Two { closure, arg, cont } => call_two(closure, arg, cont),
    }
}

/// Run one full GC cycle: evacuate the stack arena to the heap, then
/// mark-sweep the heap (spec §4.4 — the two phases always run together).
pub fn run_gc_cycle() {
    minor::run_minor_gc();
    major::run_major_gc();
}

/// The trampoline entry point. Installs `initial` as the first thunk and
/// loops: dispatch, and whenever the dispatch bounces (stack headroom was
/// exhausted somewhere on the fast path), run a GC cycle and dispatch the
/// rewritten thunk again. Never returns — termination happens only via
/// `halt`'s `std::process::exit`.
///
/// Takes a `Thunk` directly, rather than a fixed `(closure, arg)` pair,
/// because the entry point's arity is whatever the compiled program's
/// top-level closure expects — one argument for a plain `(halt)`-style
/// program, two for anything that takes an operand before its
/// continuation.
pub fn start(initial: Thunk) -> ! {
    record_stack_base();
    thunk::replace(initial);
    loop {
        let current = thunk::take();
        let Control::Bounce = dispatch(current);
        run_gc_cycle();
    }
}

/// The sole built-in closure target: prints `Halt` (no trailing newline,
/// matching `examples/original_source/src/core/base.c`'s `halt_func`) and
/// terminates the process successfully. Never produces a `Control` value.
pub fn halt(_env: Value, _k: Value) -> Control {
    print!("Halt");
    let _ = std::io::stdout().flush();
    std::process::exit(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_headroom_is_true_immediately_after_recording_base() {
        record_stack_base();
        assert!(has_headroom());
    }
}

//! The suspended-call record (spec §3.7, §5): the sole GC root.
//!
//! Grounded in `examples/original_source/src/core/base.h`'s `struct
//! thunk` (a closure plus a union of `{ rand }` / `{ rand, cont }`
//! depending on arity). The trampoline installs exactly one thunk before
//! returning `Control::Bounce`, and consumes exactly one thunk per bounce
//! (spec §5's "consumed exactly once" invariant); both GC levels root
//! their traversal at whatever thunk is currently installed.

use cps_core::{fatal, FatalKind, Value};
use std::cell::RefCell;

/// A suspended call, arity-tagged exactly like the closure it targets.
#[derive(Debug, Clone, Copy)]
pub enum Thunk {
    One { closure: Value, arg: Value },
    Two { closure: Value, arg: Value, cont: Value },
}

impl Thunk {
    /// The `Value`s this thunk roots — what both GC levels trace from.
    #[must_use]
    pub fn roots(self) -> Vec<Value> {
        match self {
            Thunk::One { closure, arg } => vec![closure, arg],
            Thunk::Two { closure, arg, cont } => vec![closure, arg, cont],
        }
    }
}

thread_local! {
    static CURRENT_THUNK: RefCell<Option<Thunk>> = const { RefCell::new(None) };
}

/// Install a one-argument thunk, replacing whatever was previously
/// installed (there is never more than one outstanding thunk — spec §5).
pub fn install_one(closure: Value, arg: Value) {
    CURRENT_THUNK.with(|cell| *cell.borrow_mut() = Some(Thunk::One { closure, arg }));
}

/// Install a two-argument thunk.
pub fn install_two(closure: Value, arg: Value, cont: Value) {
    CURRENT_THUNK.with(|cell| *cell.borrow_mut() = Some(Thunk::Two { closure, arg, cont }));
}

/// Read the currently installed thunk without consuming it (used by both
/// GC levels to find their root set between a bounce and the trampoline's
/// next dispatch).
#[must_use]
pub fn peek() -> Thunk {
    CURRENT_THUNK.with(|cell| *cell.borrow()).unwrap_or_else(|| {
        fatal(
            FatalKind::ImpossibleControlFlow,
            "GC ran with no thunk installed",
        )
    })
}

/// Overwrite the installed thunk in place — used by the minor GC to
/// rewrite a thunk's fields to the post-evacuation `Value`s once the
/// stack-resident values it pointed at have moved to the heap.
pub fn replace(thunk: Thunk) {
    CURRENT_THUNK.with(|cell| *cell.borrow_mut() = Some(thunk));
}

/// Consume the installed thunk, leaving none installed. Fatal if none is
/// installed: the trampoline only ever calls this right after a
/// `Control::Bounce`, which is only ever produced after installing
/// exactly one thunk (spec §5).
#[must_use]
pub fn take() -> Thunk {
    CURRENT_THUNK
        .with(|cell| cell.borrow_mut().take())
        .unwrap_or_else(|| {
            fatal(
                FatalKind::ImpossibleControlFlow,
                "trampoline bounced with no installed thunk",
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cps_core::void_singleton;

    #[test]
    fn install_peek_take_roundtrip() {
        let v = void_singleton();
        install_one(v, v);
        let peeked = peek();
        assert_eq!(peeked.roots().len(), 2);
        let taken = take();
        assert_eq!(taken.roots().len(), 2);
    }

    #[test]
    #[should_panic(expected = "no thunk installed")]
    fn peek_without_install_is_fatal() {
        // Each test runs in its own thread under the default test harness,
        // so the thread-local starts empty here.
        let _ = peek();
    }
}

//! The stack-resident value arena (spec §4.1, §4.2, invariant I1).
//!
//! Grounded in the teacher's `runtime/src/arena.rs`: a thread-local
//! `bumpalo::Bump`, reset periodically. Here the reset point is exact
//! rather than threshold-driven — the minor GC resets the arena exactly
//! once per cycle, immediately after evacuation completes (SPEC_FULL.md
//! §4.4), because at that point invariant I1 guarantees nothing reachable
//! still points into it.
//!
//! Bumpalo guarantees an allocated `T` is never moved or freed until the
//! arena itself is reset, which is what lets raw pointers derived from
//! `alloc_on_stack` stay valid for the lifetime of a minor GC cycle
//! despite further allocations happening in between.

use std::cell::RefCell;
use std::ptr::NonNull;

use bumpalo::Bump;

thread_local! {
    static ARENA: RefCell<Bump> = RefCell::new(Bump::new());
}

/// Allocate `value` in the stack arena and return a stable raw pointer to
/// it. The pointer remains valid until the next `reset`.
pub fn alloc_on_stack<T>(value: T) -> NonNull<T> {
    ARENA.with(|arena| {
        let arena = arena.borrow();
        let reference: &mut T = arena.alloc(value);
        // SAFETY: `bumpalo::Bump::alloc` never returns a null or dangling
        // reference.
        unsafe { NonNull::new_unchecked(reference as *mut T) }
    })
}

/// Reset the arena, invalidating every pointer previously returned by
/// `alloc_on_stack`. Callers must only invoke this once nothing live
/// still references arena-resident memory (i.e. right after a minor GC's
/// evacuation phase completes).
pub fn reset() {
    ARENA.with(|arena| arena.borrow_mut().reset());
}

/// Bytes currently allocated in the arena, exposed for tests and for the
/// minor GC's own diagnostics.
#[must_use]
pub fn allocated_bytes() -> usize {
    ARENA.with(|arena| arena.borrow().allocated_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_then_reset_shrinks_usage() {
        reset();
        let before = allocated_bytes();
        let _p = alloc_on_stack(42_i64);
        assert!(allocated_bytes() > before);
        reset();
        assert_eq!(allocated_bytes(), 0);
    }
}

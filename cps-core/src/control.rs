//! The trampoline's return protocol (spec §9 Design Note, option c).
//!
//! Rust has no portable `setjmp`/`longjmp`, so compiled code does not
//! return "the next thing to call" by unwinding a C stack frame. Instead,
//! every compiled function returns `Control`. On the fast path a tail
//! call is compiled as `return call_one(...)` / `return call_two(...)`:
//! an ordinary (not tail-call-optimized) Rust call that grows the native
//! stack exactly as the original `setjmp`-based design does. `Control`
//! only carries information once the stack-headroom check trips; that
//! value then propagates up through every intervening frame, unwound by
//! ordinary `return` statements, back to the trampoline loop in
//! `cps_runtime::trampoline`.
//!
//! This type lives in `cps-core` (rather than `cps-runtime`, where the
//! trampoline loop itself lives) because `ClosureRecord::code` — a
//! `cps-core` type — must name it in its function pointer signatures.

/// The only control-flow signal a compiled function can return.
///
/// A unit-like `Bounce` marker is enough: the thunk that describes what
/// to call next is recorded separately, in the process-wide current-thunk
/// slot (`cps_runtime::thunk`), before `Control::Bounce` is returned. This
/// matches the original's `longjmp`, which also carries no payload of its
/// own — the `jmp_buf` target reads the already-installed thunk once
/// control arrives back at `scheme_start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Bounce,
}

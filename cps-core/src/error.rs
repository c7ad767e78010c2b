//! Fatal error reporting.
//!
//! Every runtime error is fatal (spec §7): there is no recovery path
//! visible to compiled code. This mirrors the teacher's thread-local error
//! state (`runtime/src/error.rs`) except that instead of letting the
//! caller poll for and clear an error, the report path prints a
//! diagnostic and aborts the process immediately.

use std::cell::RefCell;

thread_local! {
    /// Last fatal message recorded before abort, kept for tests that want
    /// to assert on the diagnostic without actually tearing down the
    /// process (see `cps_core::error::test_support`).
    static LAST_FATAL: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Categories from spec §7, kept so call sites stay self-documenting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalKind {
    TypeError,
    EnvironmentError,
    GcInvariantViolation,
    AllocatorFailure,
    ImpossibleControlFlow,
}

impl FatalKind {
    const fn label(self) -> &'static str {
        match self {
            Self::TypeError => "type error",
            Self::EnvironmentError => "environment error",
            Self::GcInvariantViolation => "GC invariant violation",
            Self::AllocatorFailure => "allocator failure",
            Self::ImpossibleControlFlow => "impossible control flow",
        }
    }
}

/// Print a diagnostic to stderr and abort the process.
///
/// Never returns; the `!` type lets call sites use this in expression
/// position (`fatal(..)` as the tail of a match arm that must produce some
/// other type).
#[cold]
#[track_caller]
pub fn fatal(kind: FatalKind, message: impl Into<String>) -> ! {
    let message = message.into();
    let location = std::panic::Location::caller();
    let diagnostic = format!(
        "runtime error ({}) at {}:{}: {}",
        kind.label(),
        location.file(),
        location.line(),
        message
    );
    eprintln!("{diagnostic}");
    LAST_FATAL.with(|cell| *cell.borrow_mut() = Some(diagnostic));
    if cfg!(test) {
        // Tests assert on the diagnostic; panicking (instead of aborting
        // the whole test binary) lets `#[should_panic]` observe it.
        panic!("{message}");
    }
    std::process::abort();
}

/// Test-only accessor for the last recorded fatal diagnostic.
#[cfg(test)]
pub fn last_fatal() -> Option<String> {
    LAST_FATAL.with(|cell| cell.borrow().clone())
}

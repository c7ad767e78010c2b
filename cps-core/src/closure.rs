//! Closures: a function pointer bundled with its owning environment
//! (spec §3.6).
//!
//! Mirrors the shape of `original_source/src/core/base.h`'s `struct
//! closure` (a tagged union of one-argument/two-argument function
//! pointers plus an `env_id` and an `env` pointer), adapted to a Rust
//! enum instead of a C union so the arity is checked at the call site
//! rather than trusted blindly.

use std::ptr::NonNull;

use crate::environment::{EnvId, EnvRecord};
use crate::value::{Header, Tag, Value};

/// The arity a compiled closure accepts, matching spec §3.6's ONE/TWO
/// distinction (continuation-only vs. operand-plus-continuation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    One,
    Two,
}

/// A one-argument compiled function: receives its own environment and a
/// single operand (by convention, a continuation for a thunk with no
/// payload, e.g. `halt`).
pub type OneFn = fn(Value, Value) -> crate::control::Control;

/// A two-argument compiled function: receives its own environment, an
/// operand, and a continuation.
pub type TwoFn = fn(Value, Value, Value) -> crate::control::Control;

/// The function pointer half of a closure, arity-tagged so a call site
/// can never invoke a `TwoFn` with one argument or vice versa.
#[derive(Clone, Copy)]
pub enum Code {
    One(OneFn),
    Two(TwoFn),
}

impl Code {
    #[must_use]
    pub fn arity(self) -> Arity {
        match self {
            Code::One(_) => Arity::One,
            Code::Two(_) => Arity::Two,
        }
    }
}

/// A closure record: code pointer, the `env_id` of the environment shape
/// it expects, and the environment it actually owns (spec §3.6).
pub struct ClosureRecord {
    pub header: Header,
    pub env_id: EnvId,
    pub code: Code,
    pub env: NonNull<EnvRecord>,
}

impl ClosureRecord {
    /// Build a new closure, stack-resident by default.
    #[must_use]
    pub fn new(env_id: EnvId, code: Code, env: NonNull<EnvRecord>) -> Self {
        ClosureRecord {
            header: Header::new(Tag::Closure, true),
            env_id,
            code,
            env,
        }
    }

    #[must_use]
    pub fn arity(&self) -> Arity {
        self.code.arity()
    }

    /// The environment this closure owns, as a `Value` — the *only*
    /// sanctioned way an `EnvRecord` is reached (SPEC_FULL.md §4.1):
    /// nothing outside a closure's own `env` field should ever hold a
    /// bare `Value::Env`.
    #[must_use]
    pub fn env_value(&self) -> Value {
        Value::Env(self.env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::Control;
    use crate::environment::EnvId;

    fn dummy_one(_env: Value, _k: Value) -> Control {
        Control::Bounce
    }

    #[test]
    fn arity_matches_code_variant() {
        let env = Box::leak(Box::new(EnvRecord::new(EnvId(0), vec![])));
        let closure = ClosureRecord::new(EnvId(0), Code::One(dummy_one), NonNull::from(env));
        assert_eq!(closure.arity(), Arity::One);
        assert!(closure.env_value().tag() == Tag::Env);
    }
}

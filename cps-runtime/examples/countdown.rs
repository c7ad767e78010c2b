//! Hand-assembled "compiled output" exercising deep tail recursion (spec
//! §8 scenario S3). Plays the role a real CPS compiler backend would:
//! every closure here is built directly against the runtime ABI instead
//! of being generated from source text, since parsing/codegen are out of
//! scope (SPEC_FULL.md §1).
//!
//! Counts down from an iteration count (first CLI argument, default
//! 1_000_000) to zero via a self-recursive two-argument closure, then
//! calls `halt`. Exercises both the stack-headroom bounce and the
//! promote-then-collect GC cycle many times over in a single run.

use cps_core::environment::{EnvId, EnvLayoutEntry, EnvLayoutTable, IdentifierId};
use cps_core::{
    make_closure_on_stack, make_env_on_stack, make_int_on_stack, void_singleton, ClosureRecord,
    Code, Control, EnvRecord, Value,
};
use cps_runtime::Thunk;

/// The static table a real compiler backend would emit alongside this
/// program (spec §6): `count_down`'s environment shape (`env_id` 0) reads
/// exactly one identifier — its own self-reference slot. Installed below
/// before the trampoline starts; the major and minor GC both consult it
/// to decide which slots of an `env_id`-0 frame are live (spec §4.3,
/// §4.5 step 2).
fn env_layout_table() -> EnvLayoutTable {
    let mut table = EnvLayoutTable::new();
    table.insert(EnvLayoutEntry {
        env_id: EnvId(0),
        var_ids: vec![IdentifierId(0)],
    });
    table.insert(EnvLayoutEntry {
        env_id: EnvId(1),
        var_ids: vec![],
    });
    table
}

/// `(env, n, cont)`: if `n` is zero, invoke `cont`; otherwise tail-call
/// back into itself with `n - 1` and the same continuation. The closure
/// reaches itself through its own environment's slot 0 — a
/// self-referential environment, deliberately, to exercise cycle-safe
/// evacuation (spec §8 property 2).
fn count_down(env: Value, n: Value, cont: Value) -> Control {
    let remaining = n
        .as_int()
        .unwrap_or_else(|| cps_core::fatal(cps_core::FatalKind::TypeError, "count_down expects an Int"));
    if remaining == 0 {
        return cps_runtime::call_one(cont, void_singleton());
    }
    let self_closure = match env {
        Value::Env(p) => unsafe { p.as_ref() }.get(0),
        _ => cps_core::fatal(
            cps_core::FatalKind::EnvironmentError,
            "count_down's own environment is not an Env value",
        ),
    };
    let next = make_int_on_stack(remaining - 1);
    cps_runtime::call_two(self_closure, next, cont)
}

fn main() {
    let iterations: i64 = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(1_000_000);

    cps_core::environment::install_layout_table(env_layout_table());

    let env_ptr = make_env_on_stack(EnvRecord::new(EnvId(0), vec![void_singleton()]));
    let closure = ClosureRecord::new(EnvId(0), Code::Two(count_down), env_ptr);
    let closure_value = make_closure_on_stack(closure);
    // Patch the environment's self-reference slot now that the closure
    // (and thus its own address) exists.
    unsafe { env_ptr.as_mut() }.set(0, closure_value);

    let halt_env = make_env_on_stack(EnvRecord::new(EnvId(1), vec![]));
    let halt_closure = ClosureRecord::new(EnvId(1), Code::One(cps_runtime::halt), halt_env);
    let halt_value = make_closure_on_stack(halt_closure);

    cps_runtime::start(Thunk::Two {
        closure: closure_value,
        arg: make_int_on_stack(iterations),
        cont: halt_value,
    });
}

//! Minimal two-argument closure: apply identity to a value, then halt
//! (spec §8 scenario S2). The smallest program that exercises the
//! ONE/TWO arity split without any recursion at all.

use cps_core::environment::EnvId;
use cps_core::{
    make_closure_on_stack, make_env_on_stack, make_int_on_stack, ClosureRecord, Code, Control,
    EnvRecord, Value,
};
use cps_runtime::Thunk;

/// `(env, x, cont)`: tail-calls `cont` with `x` unchanged.
fn identity(_env: Value, x: Value, cont: Value) -> Control {
    cps_runtime::call_one(cont, x)
}

fn main() {
    let id_env = make_env_on_stack(EnvRecord::new(EnvId(0), vec![]));
    let id_closure = ClosureRecord::new(EnvId(0), Code::Two(identity), id_env);
    let id_value = make_closure_on_stack(id_closure);

    let halt_env = make_env_on_stack(EnvRecord::new(EnvId(1), vec![]));
    let halt_closure = ClosureRecord::new(EnvId(1), Code::One(cps_runtime::halt), halt_env);
    let halt_value = make_closure_on_stack(halt_closure);

    cps_runtime::start(Thunk::Two {
        closure: id_value,
        arg: make_int_on_stack(42),
        cont: halt_value,
    });
}

//! The smallest possible program: the entry point *is* `halt` (spec §8
//! scenario S1). No GC cycle ever runs; this exists to pin down the
//! trampoline's zero-work path and `halt`'s exact output.

use cps_core::environment::EnvId;
use cps_core::{make_closure_on_stack, make_env_on_stack, void_singleton, ClosureRecord, Code, EnvRecord};
use cps_runtime::Thunk;

fn main() {
    let env = make_env_on_stack(EnvRecord::new(EnvId(0), vec![]));
    let halt_closure = ClosureRecord::new(EnvId(0), Code::One(cps_runtime::halt), env);
    let halt_value = make_closure_on_stack(halt_closure);

    cps_runtime::start(Thunk::One {
        closure: halt_value,
        arg: void_singleton(),
    });
}

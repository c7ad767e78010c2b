//! Two distinct closures sharing a single environment record (spec §8
//! scenario S4 / property 1, sharing preservation). `ping` and `pong`
//! alternate tail calls, each reaching the other through the *same*
//! environment pointer, which the minor GC's evacuated-pointer map must
//! deduplicate rather than copying twice. The shared environment also
//! carries the literal string S4 describes, so both closures read the
//! same heap string after it is evacuated.

use cps_core::environment::{EnvId, EnvLayoutEntry, EnvLayoutTable, IdentifierId};
use cps_core::{
    make_closure_on_stack, make_env_on_stack, make_int_on_stack, make_string_on_stack,
    void_singleton, ClosureRecord, Code, Control, EnvRecord, Value,
};
use cps_runtime::Thunk;

const PING_SLOT: usize = 0;
const PONG_SLOT: usize = 1;
const GREETING_SLOT: usize = 2;

fn ping(env: Value, n: Value, cont: Value) -> Control {
    bounce(env, n, cont, PONG_SLOT)
}

fn pong(env: Value, n: Value, cont: Value) -> Control {
    bounce(env, n, cont, PING_SLOT)
}

/// Shared body: slot 0 holds `ping`, slot 1 holds `pong`; each calls the
/// *other* by reading `partner_slot` out of the (shared) environment.
/// Every bounce also re-reads the shared greeting string, exercising
/// `Value::as_string` against a slot two distinct closures capture in
/// common (spec §8 scenario S4).
fn bounce(env: Value, n: Value, cont: Value, partner_slot: usize) -> Control {
    let remaining = n.as_int().unwrap_or_else(|| {
        cps_core::fatal(cps_core::FatalKind::TypeError, "bounce expects an Int")
    });
    let env_ref = match env {
        Value::Env(p) => unsafe { p.as_ref() },
        _ => cps_core::fatal(
            cps_core::FatalKind::EnvironmentError,
            "ping/pong's own environment is not an Env value",
        ),
    };
    let greeting = env_ref.get(GREETING_SLOT).as_string();
    debug_assert_eq!(greeting.as_deref(), Some("abc"));
    if remaining == 0 {
        return cps_runtime::call_one(cont, void_singleton());
    }
    let partner = env_ref.get(partner_slot);
    let next = make_int_on_stack(remaining - 1);
    cps_runtime::call_two(partner, next, cont)
}

fn main() {
    let mut layout = EnvLayoutTable::new();
    layout.insert(EnvLayoutEntry {
        env_id: EnvId(0),
        var_ids: vec![IdentifierId(0), IdentifierId(1), IdentifierId(2)],
    });
    layout.insert(EnvLayoutEntry {
        env_id: EnvId(1),
        var_ids: vec![],
    });
    cps_core::install_layout_table(layout);

    let shared_env = make_env_on_stack(EnvRecord::new(
        EnvId(0),
        vec![
            void_singleton(),
            void_singleton(),
            make_string_on_stack("abc"),
        ],
    ));
    let ping_closure = ClosureRecord::new(EnvId(0), Code::Two(ping), shared_env);
    let ping_value = make_closure_on_stack(ping_closure);
    let pong_closure = ClosureRecord::new(EnvId(0), Code::Two(pong), shared_env);
    let pong_value = make_closure_on_stack(pong_closure);

    unsafe { shared_env.as_mut() }.set(PING_SLOT, ping_value);
    unsafe { shared_env.as_mut() }.set(PONG_SLOT, pong_value);

    let halt_env = make_env_on_stack(EnvRecord::new(EnvId(1), vec![]));
    let halt_closure = ClosureRecord::new(EnvId(1), Code::One(cps_runtime::halt), halt_env);
    let halt_value = make_closure_on_stack(halt_closure);

    cps_runtime::start(Thunk::Two {
        closure: ping_value,
        arg: make_int_on_stack(1000),
        cont: halt_value,
    });
}

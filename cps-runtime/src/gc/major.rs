//! The major GC: tri-color mark-sweep over the heap (spec §4.5).
//!
//! Grounded in `examples/original_source/src/core/gc.c`'s `gc_major` /
//! `mark_closure`: marking dispatches generically per tag
//! (`gc_func_map`), except that an environment is never marked through
//! the generic entry point — `mark_closure` there directly sets
//! `clos->env->base.mark = BLACK`, bypassing the tag dispatch table
//! entirely, which is the same asymmetry SPEC_FULL.md §4.1 preserves here
//! (`mark_env` is a `RUNTIME_ERROR` stub in the original).
//!
//! This pass runs breadth-first via an explicit grey queue rather than
//! recursively, so a long chain of nested closures cannot blow the native
//! stack during a collection — the one place where depth is genuinely
//! unbounded and letting the *collector itself* recurse would undercut
//! the whole point of the stack-headroom discipline the trampoline
//! enforces everywhere else.

use std::collections::VecDeque;

use cps_core::value::Mark;
use cps_core::{fatal, FatalKind, Value};

use crate::thunk;

fn mark_children(value: Value, grey: &mut VecDeque<Value>) {
    match value {
        Value::Closure(p) => {
            // SAFETY: reachable closures are always valid for the
            // lifetime of a GC cycle (nothing frees a record mid-cycle).
            let closure = unsafe { p.as_ref() };
            // The owning environment is marked directly, not through
            // `grey_or_enqueue`, matching SPEC_FULL.md §4.1: a bare Env
            // never enters the generic mark queue.
            // SAFETY: see above.
            let env = unsafe { closure.env.as_ref() };
            if env.header.mark.get() == Mark::White {
                env.header.mark.set(Mark::Grey);
                // Only the slots `global_env_table[env_id]` declares live
                // are traced (spec §4.5 step 2) — a slot outside that row
                // is never marked, so an otherwise-unreachable value
                // sitting in it is swept like any other garbage.
                for slot in env.traced_slots() {
                    grey_or_enqueue(slot, grey);
                }
                env.header.mark.set(Mark::Black);
            }
        }
        Value::Env(_) => fatal(
            FatalKind::GcInvariantViolation,
            "bare Env reached the generic major-GC mark entry point",
        ),
        Value::Int(_) | Value::Void(_) | Value::String(_) => {
            // Leaf records: no children to trace.
        }
    }
}

fn grey_or_enqueue(value: Value, grey: &mut VecDeque<Value>) {
    if value.tag() == cps_core::Tag::Env {
        fatal(
            FatalKind::GcInvariantViolation,
            "bare Env reached the generic major-GC mark entry point",
        );
    }
    if value.mark() == Mark::White {
        value.set_mark(Mark::Grey);
        grey.push_back(value);
    }
}

/// Run one major GC cycle: mark everything reachable from the currently
/// installed thunk, then sweep the heap bookkeeper.
///
/// Expected to run immediately after a minor GC has promoted the thunk's
/// roots to the heap (spec §4.4/§4.5) — marking a still-stack-resident
/// value is not itself forbidden, but running major GC without a
/// preceding minor GC would mark nothing on the heap and sweep away
/// everything, which is never the intended usage in this runtime.
pub fn run_major_gc() {
    let mut grey: VecDeque<Value> = VecDeque::new();
    for root in thunk::peek().roots() {
        grey_or_enqueue(root, &mut grey);
    }
    while let Some(value) = grey.pop_front() {
        mark_children(value, &mut grey);
        value.set_mark(Mark::Black);
    }
    cps_core::heap::with_bookkeeper(cps_core::heap::HeapBookkeeper::sweep);
}

#[cfg(test)]
mod tests {
    use super::*;
    use cps_core::environment::EnvId;
    use cps_core::{make_int_on_stack, EnvRecord};

    #[test]
    fn unreferenced_heap_value_is_swept() {
        let env = EnvRecord::new(EnvId(0), vec![]);
        let env_ptr = cps_core::make_env_on_stack(env);
        let closure = cps_core::ClosureRecord::new(
            EnvId(0),
            cps_core::Code::One(|_env, _k| cps_core::Control::Bounce),
            env_ptr,
        );
        let closure_value = cps_core::make_closure_on_stack(closure);
        // Heap-resident but never installed as a root: pure garbage.
        let _garbage = cps_core::gc_alloc_int(99);

        thunk::install_one(closure_value, make_int_on_stack(1));
        crate::gc::minor::run_minor_gc();
        let before = cps_core::heap::with_bookkeeper(cps_core::heap::HeapBookkeeper::live_count);
        run_major_gc();
        let after = cps_core::heap::with_bookkeeper(cps_core::heap::HeapBookkeeper::live_count);
        assert!(after < before, "unreferenced heap value should be collected");
    }

    /// SPEC_FULL.md §4.1 (Open Question 1): a bare `Value::Env` reaching
    /// the generic mark entry point (as opposed to being marked directly
    /// by its owning closure) is a GC invariant violation.
    #[test]
    #[should_panic(expected = "bare Env reached")]
    fn bare_env_as_a_root_is_fatal() {
        let env_ptr = cps_core::make_env_on_stack(EnvRecord::new(EnvId(0), vec![]));
        thunk::install_one(cps_core::Value::Env(env_ptr), make_int_on_stack(1));
        run_major_gc();
    }

    /// Spec §8 scenario S5: a closure's environment contains an integer
    /// at a slot its `env_id` layout does not declare. That integer is
    /// never traced, so one major GC frees it even though it is still
    /// physically sitting in the (live) environment's slot array.
    #[test]
    fn untraced_slot_integer_is_freed_after_major_gc() {
        let mut table = cps_core::EnvLayoutTable::new();
        table.insert(cps_core::EnvLayoutEntry {
            env_id: EnvId(55),
            var_ids: vec![cps_core::IdentifierId(0)],
        });
        cps_core::install_layout_table(table);

        let listed = make_int_on_stack(1);
        let unlisted = cps_core::gc_alloc_int(42);
        let env = EnvRecord::new(EnvId(55), vec![listed, unlisted]);
        let env_ptr = cps_core::make_env_on_stack(env);
        let closure = cps_core::ClosureRecord::new(EnvId(55), cps_core::Code::One(noop_one), env_ptr);
        let closure_value = cps_core::make_closure_on_stack(closure);

        thunk::install_one(closure_value, make_int_on_stack(1));
        crate::gc::minor::run_minor_gc();
        let before = cps_core::heap::with_bookkeeper(cps_core::heap::HeapBookkeeper::live_count);
        run_major_gc();
        let after = cps_core::heap::with_bookkeeper(cps_core::heap::HeapBookkeeper::live_count);
        assert!(
            after < before,
            "an integer outside the declared var_ids must be collected"
        );

        cps_core::install_layout_table(cps_core::EnvLayoutTable::new());
    }

    fn noop_one(_env: cps_core::Value, _k: cps_core::Value) -> cps_core::Control {
        cps_core::Control::Bounce
    }
}

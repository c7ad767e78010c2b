//! The minor GC: Cheney-style stack-to-heap evacuation (spec §4.2).
//!
//! Grounded in `examples/original_source/src/core/gc.c`'s `gc_minor` /
//! `gc_toheap` family: a generic per-tag evacuation dispatch
//! (`gc_func_map`), an old-pointer-to-new-pointer map (there: a `ptr_bst`
//! binary search tree; here: `HashMap`, since we don't need in-order
//! traversal), and a pending-update mechanism so the breadth-first copy
//! can terminate on cycles and preserve sharing (`queue_ptr_toupdate_pair_enqueue_checked`
//! skips objects already resident on the heap, exactly mirrored below by
//! `is_on_stack` checks before every evacuation).
//!
//! Values are shallow-copied onto the heap and recorded in the evacuated
//! map *before* their children are traced, which is what lets a cycle
//! (an environment slot that (transitively) points back to the
//! environment's own owning closure) terminate instead of recursing
//! forever.

use std::collections::{HashMap, VecDeque};
use std::ptr::NonNull;

use cps_core::closure::ClosureRecord;
use cps_core::environment::EnvRecord;
use cps_core::value::{Header, Tag};
use cps_core::{fatal, void_singleton, FatalKind, IntRecord, StringRecord, Value};

use crate::thunk::{self, Thunk};

struct MinorGc {
    evacuated_values: HashMap<usize, Value>,
    evacuated_envs: HashMap<usize, NonNull<EnvRecord>>,
    pending_envs: VecDeque<(NonNull<EnvRecord>, NonNull<EnvRecord>)>,
}

impl MinorGc {
    fn new() -> Self {
        MinorGc {
            evacuated_values: HashMap::new(),
            evacuated_envs: HashMap::new(),
            pending_envs: VecDeque::new(),
        }
    }

    /// Evacuate a generic value. Per SPEC_FULL.md §4.1 (Open Question 1),
    /// a bare `Value::Env` reaching this generic entry point — rather
    /// than through `evacuate_closure`'s dedicated path — is a GC
    /// invariant violation.
    fn evacuate_value(&mut self, old: Value) -> Value {
        if !old.is_on_stack() {
            return old;
        }
        if let Some(&new) = self.evacuated_values.get(&old.identity()) {
            return new;
        }
        let new = match old {
            Value::Env(_) => fatal(
                FatalKind::GcInvariantViolation,
                "bare Env reached the generic minor-GC evacuation entry point",
            ),
            Value::Int(p) => self.evacuate_int(p),
            Value::Void(_) => void_singleton(),
            Value::String(p) => self.evacuate_string(p),
            Value::Closure(p) => self.evacuate_closure(p),
        };
        self.evacuated_values.insert(old.identity(), new);
        new
    }

    fn evacuate_int(&mut self, old: NonNull<IntRecord>) -> Value {
        // SAFETY: `old` is stack-resident and reachable, so it was either
        // allocated this cycle or is still inside the arena from before
        // the last reset.
        let value = unsafe { old.as_ref() }.value;
        let mut record = Box::new(IntRecord {
            header: Header::new(Tag::Int, false),
            value,
        });
        let ptr = NonNull::from(record.as_mut());
        let new = Value::Int(ptr);
        cps_core::heap::with_bookkeeper(|bk| {
            bk.own(new, record);
        });
        new
    }

    fn evacuate_string(&mut self, old: NonNull<StringRecord>) -> Value {
        // SAFETY: see `evacuate_int`.
        let data = unsafe { old.as_ref() }.data.clone();
        let mut record = Box::new(StringRecord {
            header: Header::new(Tag::String, false),
            data,
        });
        let ptr = NonNull::from(record.as_mut());
        let new = Value::String(ptr);
        cps_core::heap::with_bookkeeper(|bk| {
            bk.own(new, record);
        });
        new
    }

    fn evacuate_closure(&mut self, old: NonNull<ClosureRecord>) -> Value {
        // SAFETY: see `evacuate_int`.
        let old_ref = unsafe { old.as_ref() };
        let new_env = self.evacuate_env(old_ref.env);
        let mut record = Box::new(ClosureRecord::new(old_ref.env_id, old_ref.code, new_env));
        record.header.on_stack.set(false);
        let ptr = NonNull::from(record.as_mut());
        let new = Value::Closure(ptr);
        cps_core::heap::with_bookkeeper(|bk| {
            bk.own(new, record);
        });
        new
    }

    /// Evacuate an environment record. This is the *only* sanctioned way
    /// an `EnvRecord` is evacuated (SPEC_FULL.md §4.1): it is reached
    /// exclusively from `evacuate_closure`, never from `evacuate_value`.
    ///
    /// Shallow-copies the slot array immediately and records the mapping
    /// before queuing the slot values themselves for a later fixup pass —
    /// this is what makes a self-referential environment (one whose own
    /// slots eventually point back to it, see spec §8 property 2) safe to
    /// evacuate without unbounded recursion.
    fn evacuate_env(&mut self, old: NonNull<EnvRecord>) -> NonNull<EnvRecord> {
        let old_addr = old.as_ptr() as usize;
        if let Some(&new) = self.evacuated_envs.get(&old_addr) {
            return new;
        }
        // SAFETY: see `evacuate_int`.
        let old_ref = unsafe { old.as_ref() };
        if !old_ref.header.on_stack.get() {
            self.evacuated_envs.insert(old_addr, old);
            return old;
        }
        let shallow_slots: Vec<Value> = old_ref.slots().collect();
        let mut record = Box::new(EnvRecord::new(old_ref.env_id, shallow_slots));
        record.header.on_stack.set(false);
        let new_ptr = NonNull::from(record.as_mut());
        self.evacuated_envs.insert(old_addr, new_ptr);
        self.pending_envs.push_back((old, new_ptr));
        let new_value = Value::Env(new_ptr);
        cps_core::heap::with_bookkeeper(|bk| {
            bk.own(new_value, record);
        });
        new_ptr
    }

    /// Drain the pending-update queue: for every shallow-copied
    /// environment, evacuate its (still from-space) slot values and write
    /// the resulting to-space values back in. New pending work discovered
    /// along the way (nested closures, shared environments) is processed
    /// breadth-first until the queue is empty.
    fn drain_pending(&mut self) {
        while let Some((old, mut new)) = self.pending_envs.pop_front() {
            // SAFETY: see `evacuate_int`.
            // Only the leading slots the layout table declares live for
            // this env_id are evacuated (spec §4.3's root-coverage walk);
            // anything past that was already shallow-copied verbatim by
            // `evacuate_env` and is left untouched — it may now dangle
            // into the reset stack arena, which is fine because the
            // compiler contract is to never read it (spec §9).
            let traced = unsafe { old.as_ref() }.traced_slot_count();
            for index in 0..traced {
                let old_slot = unsafe { old.as_ref() }.get(index);
                let new_slot = self.evacuate_value(old_slot);
                // SAFETY: `new` is exclusively owned by this GC cycle
                // until the bookkeeper hands it out again; no other
                // reference to it exists yet.
                unsafe { new.as_mut() }.set(index, new_slot);
            }
        }
    }
}

/// Run one minor GC cycle: evacuate everything reachable from the
/// currently installed thunk, rewrite the thunk in place to point at the
/// evacuated (heap-resident) values, then reset the stack arena.
///
/// Per invariant I1 (spec §4.2), resetting the arena here is sound
/// precisely because nothing reachable still points into it once
/// evacuation (including the pending-queue fixup pass) completes.
pub fn run_minor_gc() {
    let mut gc = MinorGc::new();
    let new_thunk = match thunk::peek() {
        Thunk::One { closure, arg } => Thunk::One {
            closure: gc.evacuate_value(closure),
            arg: gc.evacuate_value(arg),
        },
        Thunk::Two { closure, arg, cont } => Thunk::Two {
            closure: gc.evacuate_value(closure),
            arg: gc.evacuate_value(arg),
            cont: gc.evacuate_value(cont),
        },
    };
    gc.drain_pending();
    thunk::replace(new_thunk);
    cps_core::arena::reset();
}

#[cfg(test)]
mod tests {
    use super::*;
    use cps_core::environment::EnvId;
    use cps_core::{make_env_on_stack, make_int_on_stack};

    #[test]
    fn evacuating_an_int_moves_it_off_stack() {
        let mut gc = MinorGc::new();
        let v = make_int_on_stack(7);
        assert!(v.is_on_stack());
        let moved = gc.evacuate_value(v);
        assert!(!moved.is_on_stack());
        assert_eq!(moved.as_int(), Some(7));
    }

    #[test]
    fn shared_env_evacuates_once() {
        let env_ptr = make_env_on_stack(EnvRecord::new(EnvId(0), vec![make_int_on_stack(1)]));
        let mut gc = MinorGc::new();
        let first = gc.evacuate_env(env_ptr);
        let second = gc.evacuate_env(env_ptr);
        assert_eq!(first, second, "sharing must be preserved across evacuation");
    }

    /// Spec §8 scenario S6: 1,000 stack-resident voids all evacuate to the
    /// single process-wide singleton rather than being duplicated.
    #[test]
    fn evacuating_many_voids_deduplicates_to_the_singleton() {
        let mut gc = MinorGc::new();
        let singleton = void_singleton();
        for _ in 0..1_000 {
            let stack_void = cps_core::make_void_on_stack();
            let evacuated = gc.evacuate_value(stack_void);
            assert_eq!(evacuated.identity(), singleton.identity());
        }
    }

    /// SPEC_FULL.md §4.1 (Open Question 1): a bare `Value::Env` reaching
    /// the generic evacuation entry point is a GC invariant violation, not
    /// a normal evacuation path.
    #[test]
    #[should_panic(expected = "bare Env reached")]
    fn bare_env_at_generic_entry_point_is_fatal() {
        let env_ptr = make_env_on_stack(EnvRecord::new(EnvId(0), vec![]));
        let mut gc = MinorGc::new();
        let _ = gc.evacuate_value(Value::Env(env_ptr));
    }

    /// A slot outside the installed layout table's declared `var_ids` is
    /// shallow-copied as part of the environment's structural copy but
    /// never itself evacuated — it is left pointing at whatever it
    /// pointed to pre-GC, stack-resident or not.
    #[test]
    fn untraced_slot_is_not_evacuated() {
        let mut table = cps_core::EnvLayoutTable::new();
        table.insert(cps_core::EnvLayoutEntry {
            env_id: EnvId(66),
            var_ids: vec![],
        });
        cps_core::install_layout_table(table);

        let on_stack_int = make_int_on_stack(9);
        let env_ptr = make_env_on_stack(EnvRecord::new(EnvId(66), vec![on_stack_int]));
        let mut gc = MinorGc::new();
        let new_env = gc.evacuate_env(env_ptr);
        gc.drain_pending();

        // SAFETY: `new_env` was just constructed by this GC cycle.
        let untraced = unsafe { new_env.as_ref() }.get(0);
        assert!(
            untraced.is_on_stack(),
            "a slot outside var_ids must not be touched by evacuation"
        );

        cps_core::install_layout_table(cps_core::EnvLayoutTable::new());
    }
}

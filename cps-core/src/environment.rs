//! Flat, copy-on-extend environments (spec §3.5).
//!
//! Unlike the original C implementation's chained `env_elem` (a `prev`
//! pointer plus a growable `nexts` vector — see `original_source/src/core/base.h`),
//! this runtime uses the flat layout spec §3.5 actually asks for: each
//! environment is a fixed-size slot array indexed by `IdentifierId`, with
//! the mapping from `EnvId` to the set of live `IdentifierId`s supplied
//! once, statically, by the compiler as an `EnvLayoutTable`.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::{fatal, FatalKind};
use crate::value::{Header, Tag, Value};

/// A compiler-assigned environment shape identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvId(pub u32);

/// A compiler-assigned slot identifier, unique within an `EnvId`'s layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentifierId(pub u32);

/// One row of the static layout table: which identifiers a given
/// environment shape carries, in slot order.
#[derive(Debug, Clone)]
pub struct EnvLayoutEntry {
    pub env_id: EnvId,
    pub var_ids: Vec<IdentifierId>,
}

/// The compiler-supplied table mapping `env_id -> var_ids` (spec §3.5).
/// Built once, before any compiled code runs, and never mutated
/// afterwards.
#[derive(Debug, Default)]
pub struct EnvLayoutTable {
    rows: HashMap<EnvId, Vec<IdentifierId>>,
}

impl EnvLayoutTable {
    #[must_use]
    pub fn new() -> Self {
        EnvLayoutTable {
            rows: HashMap::new(),
        }
    }

    pub fn insert(&mut self, entry: EnvLayoutEntry) {
        self.rows.insert(entry.env_id, entry.var_ids);
    }

    #[must_use]
    pub fn slot_count(&self, env_id: EnvId) -> Option<usize> {
        self.rows.get(&env_id).map(Vec::len)
    }

    #[must_use]
    pub fn slot_index(&self, env_id: EnvId, var_id: IdentifierId) -> Option<usize> {
        self.rows
            .get(&env_id)
            .and_then(|ids| ids.iter().position(|id| *id == var_id))
    }
}

thread_local! {
    static LAYOUT_TABLE: RefCell<EnvLayoutTable> = RefCell::new(EnvLayoutTable::new());
}

/// Install the compiler-supplied layout table (spec §3.5/§6). A real
/// program installs this once, before any compiled code runs. Code that
/// never installs one gets the default empty table, which makes every
/// `env_id` fall back to "every slot is live" (see `EnvRecord::traced_slot_count`) —
/// the behavior this runtime had before layout-filtered tracing existed.
pub fn install_layout_table(table: EnvLayoutTable) {
    LAYOUT_TABLE.with(|cell| *cell.borrow_mut() = table);
}

fn with_layout_table<R>(f: impl FnOnce(&EnvLayoutTable) -> R) -> R {
    LAYOUT_TABLE.with(|cell| f(&cell.borrow()))
}

/// A flat environment frame: `header` plus a fixed-size, copy-on-extend
/// slot array. `env_id` records which `EnvLayoutTable` row describes this
/// frame's shape. The slot array may be wider than that row declares —
/// e.g. stale bindings left over from an extension chain — and the GC
/// consults the installed layout table to find exactly how many of the
/// leading slots are live (spec §4.3, §4.5 step 2).
pub struct EnvRecord {
    pub header: Header,
    pub env_id: EnvId,
    slots: Vec<Value>,
}

impl EnvRecord {
    /// Construct a new environment frame with `slots.len()` live slots,
    /// on the stack arena by default (`on_stack = true`); the minor GC
    /// flips this to `false` on evacuation.
    #[must_use]
    pub fn new(env_id: EnvId, slots: Vec<Value>) -> Self {
        EnvRecord {
            header: Header::new(Tag::Env, true),
            env_id,
            slots,
        }
    }

    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Read a slot by position. Out-of-range reads are an environment
    /// error (spec §7): the compiler is contractually responsible for
    /// only ever indexing slots its own `var_ids` row declares (Open
    /// Question #2, resolved in SPEC_FULL.md §4.2 — unused slots are
    /// simply never indexed, not runtime-checked against the layout
    /// table).
    #[must_use]
    #[track_caller]
    pub fn get(&self, index: usize) -> Value {
        match self.slots.get(index) {
            Some(value) => *value,
            None => fatal(
                FatalKind::EnvironmentError,
                format!(
                    "slot index {index} out of range for env_id {:?} (len {})",
                    self.env_id,
                    self.slots.len()
                ),
            ),
        }
    }

    /// Overwrite a slot in place. Environments are copy-on-extend at
    /// construction time but individual slots may still be assigned
    /// (e.g. `set!`-style mutation compiled down to a slot write).
    #[track_caller]
    pub fn set(&mut self, index: usize, value: Value) {
        match self.slots.get_mut(index) {
            Some(slot) => *slot = value,
            None => fatal(
                FatalKind::EnvironmentError,
                format!(
                    "slot index {index} out of range for env_id {:?} (len {})",
                    self.env_id,
                    self.slots.len()
                ),
            ),
        }
    }

    /// Iterate over every physical slot, live or not. Used only for the
    /// structural (shallow) copy a minor GC evacuation makes of an
    /// environment's shape — never for tracing, which must go through
    /// [`EnvRecord::traced_slots`] instead.
    pub fn slots(&self) -> impl Iterator<Item = Value> + '_ {
        self.slots.iter().copied()
    }

    /// How many of this frame's leading slots the installed
    /// `EnvLayoutTable` declares live for `self.env_id`. Falls back to
    /// every slot when the table has no row for this `env_id` at all —
    /// code that constructs environments without ever installing a table
    /// (most tests, some demos) keeps tracing everything, exactly as
    /// before layout filtering existed.
    #[must_use]
    pub fn traced_slot_count(&self) -> usize {
        with_layout_table(|table| match table.slot_count(self.env_id) {
            Some(declared) => declared.min(self.slots.len()),
            None => self.slots.len(),
        })
    }

    /// Iterate over exactly the slots `global_env_table[env_id]` declares
    /// live (spec §4.3's root-coverage walk, §4.5 step 2). Slots beyond
    /// this are physically present in the array but dead as far as any GC
    /// pass is concerned — the compiler's contract is to never read them
    /// (spec §9), so nothing here needs to validate that at runtime.
    pub fn traced_slots(&self) -> impl Iterator<Item = Value> + '_ {
        self.slots[..self.traced_slot_count()].iter().copied()
    }

    /// Build a new, extended environment by copying `parent`'s slots and
    /// appending `extra` — the "copy-on-extend" construction spec §3.5
    /// describes for introducing a new scope.
    #[must_use]
    pub fn extend(parent: &EnvRecord, env_id: EnvId, extra: &[Value]) -> Self {
        let mut slots = Vec::with_capacity(parent.slots.len() + extra.len());
        slots.extend(parent.slots.iter().copied());
        slots.extend_from_slice(extra);
        EnvRecord::new(env_id, slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::void_singleton;

    #[test]
    fn layout_table_round_trips() {
        let mut table = EnvLayoutTable::new();
        table.insert(EnvLayoutEntry {
            env_id: EnvId(1),
            var_ids: vec![IdentifierId(0), IdentifierId(1)],
        });
        assert_eq!(table.slot_count(EnvId(1)), Some(2));
        assert_eq!(table.slot_index(EnvId(1), IdentifierId(1)), Some(1));
        assert_eq!(table.slot_count(EnvId(2)), None);
    }

    #[test]
    fn get_and_set_roundtrip() {
        let mut env = EnvRecord::new(EnvId(0), vec![void_singleton(), void_singleton()]);
        assert_eq!(env.slot_count(), 2);
        let v = void_singleton();
        env.set(0, v);
        assert_eq!(env.get(0).identity(), v.identity());
    }

    #[test]
    fn extend_copies_parent_slots() {
        let parent = EnvRecord::new(EnvId(0), vec![void_singleton()]);
        let child = EnvRecord::extend(&parent, EnvId(1), &[void_singleton(), void_singleton()]);
        assert_eq!(child.slot_count(), 3);
    }

    #[test]
    #[should_panic(expected = "slot index")]
    fn out_of_range_get_is_fatal() {
        let env = EnvRecord::new(EnvId(0), vec![]);
        let _ = env.get(0);
    }

    #[test]
    fn traced_slots_falls_back_to_every_slot_without_a_table() {
        let env = EnvRecord::new(EnvId(77), vec![void_singleton(), void_singleton()]);
        assert_eq!(env.traced_slot_count(), 2);
        assert_eq!(env.traced_slots().count(), 2);
    }

    #[test]
    fn traced_slots_are_filtered_by_the_installed_table() {
        let mut table = EnvLayoutTable::new();
        table.insert(EnvLayoutEntry {
            env_id: EnvId(78),
            var_ids: vec![IdentifierId(0)],
        });
        install_layout_table(table);

        let env = EnvRecord::new(EnvId(78), vec![void_singleton(), void_singleton()]);
        assert_eq!(env.traced_slot_count(), 1);
        assert_eq!(env.traced_slots().count(), 1);
        assert_eq!(env.slots().count(), 2, "the full slot array is untouched");

        // Reset so later tests on this thread see the default empty table.
        install_layout_table(EnvLayoutTable::new());
    }
}

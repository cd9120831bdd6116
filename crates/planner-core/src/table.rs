//! Open-addressed hash table with linear probing, deletion tombstones, and
//! dynamic resizing — the cache's storage layer. Keying, policy (impatience
//! comparison, blessing) and signature computation live one layer up in
//! [`crate::cache`]; this module only knows about slots, probe sequences,
//! and the load-factor invariant.

use planner_digest::Signature;

use crate::problem::Problem;
use crate::registry::SolverHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Valid,
    Deleted,
}

/// One hash table slot. Only the fields of a `Valid` slot are meaningful;
/// `Empty`/`Deleted` slots carry stale contents the table is free to
/// overwrite on the next insert.
pub struct Slot<P: Problem> {
    pub state: SlotState,
    pub signature: Signature,
    pub flags: u32,
    /// `None` represents a memoized planning *failure*: "no solver found
    /// for this signature under these flags".
    pub solver: Option<SolverHandle<P>>,
}

impl<P: Problem> Slot<P> {
    fn empty() -> Self {
        Self {
            state: SlotState::Empty,
            signature: [0; 4],
            flags: 0,
            solver: None,
        }
    }
}

/// Upper bound on table size for `cnt` valid entries: load factor stays
/// above 1/3 (a fresh table always has at least 30 slots of headroom).
pub fn ub(cnt: u32) -> u32 {
    3 * (cnt + 10)
}

/// Lower bound on table size for `cnt` valid entries: load factor stays
/// below 2/3.
pub fn lb(cnt: u32) -> u32 {
    ub(cnt) / 2
}

/// The open-addressed slot array plus the probe/insert/rehash mechanics.
/// `cnt` (the live, non-deleted entry count the bounds are computed from)
/// is owned by the caller ([`crate::cache::Cache`]) since tombstones keep
/// `cnt` and "number of non-empty slots" from coinciding.
pub struct HashTable<P: Problem> {
    slots: Vec<Slot<P>>,
}

impl<P: Problem> HashTable<P> {
    /// Builds a table sized for zero entries (`ub(0)` slots, all empty) —
    /// the size a freshly constructed planner starts with.
    pub fn new() -> Self {
        let size = ub(0) as usize;
        Self {
            slots: (0..size).map(|_| Slot::empty()).collect(),
        }
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    fn probe_start(&self, sig: &Signature) -> usize {
        sig[0] as usize % self.slots.len()
    }

    /// Finds the slot holding `sig`, if any valid slot does. Probing starts
    /// at `sig[0] mod size` and proceeds linearly; termination is
    /// guaranteed by the load-factor invariant (there is always at least
    /// one empty slot).
    pub fn lookup(&self, sig: &Signature) -> Option<usize> {
        let start = self.probe_start(sig);
        let n = self.slots.len();
        for step in 0..n {
            let i = (start + step) % n;
            match self.slots[i].state {
                SlotState::Empty => return None,
                SlotState::Valid if &self.slots[i].signature == sig => return Some(i),
                SlotState::Valid | SlotState::Deleted => continue,
            }
        }
        unreachable!("probe sequence revisited its start: load-factor invariant violated");
    }

    pub fn get(&self, index: usize) -> &Slot<P> {
        &self.slots[index]
    }

    /// Overwrites a known slot in place (used when the caller already has
    /// the index from a prior [`HashTable::lookup`]).
    pub fn overwrite(&mut self, index: usize, flags: u32, solver: Option<SolverHandle<P>>) {
        let slot = &mut self.slots[index];
        debug_assert_eq!(slot.state, SlotState::Valid);
        slot.flags = flags;
        slot.solver = solver;
    }

    /// Finds the first non-valid slot starting from `sig`'s probe start
    /// (empty or tombstoned) and writes a fresh entry into it. Returns the
    /// index written.
    pub fn insert_new(
        &mut self,
        sig: Signature,
        flags: u32,
        solver: Option<SolverHandle<P>>,
    ) -> usize {
        let start = self.probe_start(&sig);
        let n = self.slots.len();
        for step in 0..n {
            let i = (start + step) % n;
            if self.slots[i].state != SlotState::Valid {
                self.slots[i] = Slot {
                    state: SlotState::Valid,
                    signature: sig,
                    flags,
                    solver,
                };
                return i;
            }
        }
        unreachable!("no non-valid slot found: load-factor invariant violated");
    }

    /// Marks a valid slot as a tombstone.
    pub fn delete(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        slot.state = SlotState::Deleted;
        slot.solver = None;
    }

    /// Iterates every currently valid slot.
    pub fn valid_slots(&self) -> impl Iterator<Item = &Slot<P>> {
        self.slots.iter().filter(|s| s.state == SlotState::Valid)
    }

    /// Rebuilds the table at `new_size`, re-inserting every valid slot and
    /// dropping tombstones — the sole tombstone-reclamation path.
    pub fn rebuild(&mut self, new_size: usize) {
        let mut fresh: Vec<Slot<P>> = (0..new_size).map(|_| Slot::empty()).collect();
        std::mem::swap(&mut self.slots, &mut fresh);
        let old = fresh;
        for slot in old.into_iter() {
            if slot.state == SlotState::Valid {
                let start = slot.signature[0] as usize % self.slots.len();
                let n = self.slots.len();
                for step in 0..n {
                    let i = (start + step) % n;
                    if self.slots[i].state != SlotState::Valid {
                        self.slots[i] = Slot {
                            state: SlotState::Valid,
                            signature: slot.signature,
                            flags: slot.flags,
                            solver: slot.solver,
                        };
                        break;
                    }
                }
            }
        }
    }
}

impl<P: Problem> Default for HashTable<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct P;
    impl Problem for P {
        fn hash(&self, _digest: &mut planner_digest::Digest) {}
        fn precision_bytes(&self) -> u32 {
            8
        }
    }

    #[test]
    fn bounds_hold_at_zero() {
        let t: HashTable<P> = HashTable::new();
        assert!(lb(0) <= t.size() as u32 && (t.size() as u32) < ub(0));
    }

    #[test]
    fn insert_then_lookup_finds_it() {
        let mut t: HashTable<P> = HashTable::new();
        let sig = [7, 0, 0, 0];
        let idx = t.insert_new(sig, 0, None);
        assert_eq!(t.lookup(&sig), Some(idx));
    }

    #[test]
    fn lookup_past_tombstones_still_terminates_and_finds() {
        let mut t: HashTable<P> = HashTable::new();
        let start = 5u32;
        let n = t.size() as u32;
        // Fill every slot in the probe chain ahead of `target` with
        // tombstones sharing the same probe start, forcing lookup to walk
        // through them.
        for i in 0..5 {
            let sig = [start, i, 0, 0];
            t.insert_new(sig, 0, None);
        }
        let target = [start, 99, 0, 0];
        let idx = t.insert_new(target, 0, None);
        for i in 0..5 {
            let sig = [start, i, 0, 0];
            let found = t.lookup(&sig).unwrap();
            t.delete(found);
        }
        let _ = n;
        assert_eq!(t.lookup(&target), Some(idx));
    }
}

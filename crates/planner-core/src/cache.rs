//! Content-addressed plan cache: digest-based signature computation
//! (component A), wrapped around the open-addressed [`HashTable`]
//! (component C), governed by the impatience/blessing merge policy
//! (component D).

use planner_digest::{Digest, Signature};

use crate::alloc_tag::AllocTag;
use crate::flags::{impatience, is_blessed, BLESSING};
use crate::problem::Problem;
use crate::registry::SolverHandle;
use crate::table::{lb, ub, HashTable};

/// What [`Cache::forget`] discards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Amnesia {
    /// Discard every entry.
    Everything,
    /// Discard every entry that is not blessed.
    Accursed,
}

/// Computes the four-word signature for `(problem, flags, thread_count)`.
/// Order is compatibility-critical: precision width, then the equivalence
/// bits of `flags`, then thread count, then the problem's own bytes.
pub fn compute_signature<P: Problem>(problem: &P, flags: u32, thread_count: u32) -> Signature {
    let mut digest = Digest::new();
    digest.feed_uint(problem.precision_bytes());
    digest.feed_uint(flags & crate::flags::EQV_MASK);
    digest.feed_uint(thread_count);
    problem.hash(&mut digest);
    digest.finish()
}

/// The signature-indexed plan cache, including bookkeeping counters the
/// planner reports (`cnt`, `access`, `hit`, `nrehash`).
pub struct Cache<P: Problem> {
    table: HashTable<P>,
    cnt: u32,
    pub access: u64,
    pub hit: u64,
    pub nrehash: u64,
}

impl<P: Problem> Default for Cache<P> {
    fn default() -> Self {
        Self {
            table: HashTable::new(),
            cnt: 0,
            access: 0,
            hit: 0,
            nrehash: 0,
        }
    }
}

impl<P: Problem> Cache<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table_size(&self) -> usize {
        self.table.size()
    }

    pub fn len(&self) -> u32 {
        self.cnt
    }

    pub fn is_empty(&self) -> bool {
        self.cnt == 0
    }

    /// Raw signature lookup: does `access`/`hit` bookkeeping but applies no
    /// policy (the policy-filtered version is [`Cache::lookup`]).
    fn hlookup(&mut self, sig: &Signature) -> Option<usize> {
        self.access += 1;
        let found = self.table.lookup(sig);
        if found.is_some() {
            self.hit += 1;
        }
        found
    }

    /// Resizes the table if the load-factor invariant is currently
    /// violated; otherwise a no-op. Called after every change to `cnt`.
    fn rehash(&mut self) {
        let size = self.table.size() as u32;
        let (bl, bu) = (lb(self.cnt), ub(self.cnt));
        if bl <= size && size < bu {
            return;
        }
        let new_size = ((bl + bu + 1) / 2) as usize;
        self.table.rebuild(new_size);
        self.nrehash += 1;
        #[cfg(feature = "tracing")]
        tracing::trace!(
            tag = AllocTag::Table.as_str(),
            new_size,
            cnt = self.cnt,
            "rehash"
        );
        #[cfg(not(feature = "tracing"))]
        let _ = AllocTag::Table;
    }

    /// Inserts `(sig, flags, solver)` under the merge policy:
    /// - a strictly more impatient existing entry blocks the update;
    /// - otherwise the new entry inherits the old entry's blessing bit and
    ///   overwrites in place;
    /// - a fresh signature grows `cnt`, possibly triggers a rehash, then is
    ///   written into a newly probed slot.
    pub fn hinsert(&mut self, sig: Signature, mut flags: u32, solver: Option<SolverHandle<P>>) {
        if let Some(existing) = self.hlookup(&sig) {
            let existing_flags = self.table.get(existing).flags;
            if impatience(flags) > impatience(existing_flags) {
                return;
            }
            if is_blessed(existing_flags) {
                flags |= BLESSING;
            }
            self.table.overwrite(existing, flags, solver);
        } else {
            self.cnt += 1;
            self.rehash();
            self.table.insert_new(sig, flags, solver);
        }
    }

    /// Computes the signature for `(problem, flags, thread_count)` and
    /// inserts under that key.
    pub fn insert(
        &mut self,
        problem: &P,
        flags: u32,
        thread_count: u32,
        solver: Option<SolverHandle<P>>,
    ) {
        let sig = compute_signature(problem, flags, thread_count);
        self.hinsert(sig, flags, solver);
    }

    /// Looks up `problem` under `(flags, thread_count)`, returning a hit
    /// only when the caller's impatience is at least as generous as the
    /// impatience the cached entry was built under.
    pub fn lookup(
        &mut self,
        problem: &P,
        flags: u32,
        thread_count: u32,
    ) -> Option<Option<SolverHandle<P>>> {
        let sig = compute_signature(problem, flags, thread_count);
        let idx = self.hlookup(&sig)?;
        let slot = self.table.get(idx);
        if impatience(flags) >= impatience(slot.flags) {
            Some(slot.solver.clone())
        } else {
            None
        }
    }

    /// Discards entries per `mode`, then rehashes to physically reclaim the
    /// tombstones (and possibly shrink the table).
    pub fn forget(&mut self, mode: Amnesia) {
        let mut to_delete = Vec::new();
        for i in 0..self.table.size() {
            let slot = self.table.get(i);
            if slot.state == crate::table::SlotState::Valid {
                let discard = match mode {
                    Amnesia::Everything => true,
                    Amnesia::Accursed => !is_blessed(slot.flags),
                };
                if discard {
                    to_delete.push(i);
                }
            }
        }
        for i in to_delete {
            self.table.delete(i);
            self.cnt -= 1;
        }
        self.rehash();
    }

    /// All currently blessed, valid entries with a non-null solver — the
    /// set the wisdom codec exports.
    pub fn blessed_entries(&self) -> impl Iterator<Item = (&Signature, u32, &SolverHandle<P>)> {
        self.table.valid_slots().filter_map(|slot| {
            if is_blessed(slot.flags) {
                slot.solver
                    .as_ref()
                    .map(|sp| (&slot.signature, slot.flags, sp))
            } else {
                None
            }
        })
    }
}

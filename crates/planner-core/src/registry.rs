//! Solver registry: an append-only collection of `(solver, registrar_name,
//! registration_id, name_hash)` entries, keyed for lookup by
//! `(registrar_name, registration_id)`.

use std::rc::Rc;

use crate::alloc_tag::AllocTag;
use crate::problem::{Problem, Solver};

/// Maximum length of a registrar name. The wisdom grammar bounds names to
/// one byte less, reserving room for a trailing sentinel; the round number
/// is compatibility-critical for the wisdom grammar, not an implementation
/// detail.
pub const MAX_REGISTRAR_NAME: usize = 64;

/// djb2-style string hash used to short-circuit full string comparison
/// during registry lookup.
fn hash_registrar_name(s: &str) -> u32 {
    let mut h: u32 = 0xDEAD_BEEF;
    for b in s.bytes() {
        h = h.wrapping_mul(17).wrapping_add(b as u32);
    }
    h = h.wrapping_mul(17);
    h
}

/// One registered solver: its identity `(registrar_name, registration_id)`,
/// a cheap lookup accelerator, and the solver itself.
pub struct SolverDesc<P: Problem> {
    pub solver: Rc<dyn Solver<P>>,
    pub registrar_name: String,
    pub registration_id: u32,
    name_hash: u32,
}

impl<P: Problem> SolverDesc<P> {
    /// Builds a descriptor directly, bypassing the registry. Used by other
    /// modules' unit tests that need a `SolverHandle` without standing up a
    /// full [`Registry`]; production code always goes through
    /// [`Registry::register_solver`].
    #[cfg(test)]
    pub(crate) fn new_for_test(solver: Rc<dyn Solver<P>>, registration_id: u32) -> Self {
        let registrar_name = "test".to_string();
        let name_hash = hash_registrar_name(&registrar_name);
        Self {
            solver,
            registrar_name,
            registration_id,
            name_hash,
        }
    }

    fn matches(&self, name: &str, id: u32) -> bool {
        self.registration_id == id
            && self.name_hash == hash_registrar_name(name)
            && self.registrar_name == name
    }
}

/// A registered solver's identity plus a handle to invoke it; this is what
/// flows through the cache (as the cached `solver_ref`) and through
/// `inferior_mkplan`'s hint/result parameters.
pub type SolverHandle<P> = Rc<SolverDesc<P>>;

/// Append-only solver registry.
pub struct Registry<P: Problem> {
    solvers: Vec<SolverHandle<P>>,
    /// Name threaded onto every solver registered while `with_registrar`'s
    /// closure is running.
    cur_registrar_name: Option<String>,
    cur_registration_id: u32,
}

impl<P: Problem> Default for Registry<P> {
    fn default() -> Self {
        Self {
            solvers: Vec::new(),
            cur_registrar_name: None,
            cur_registration_id: 0,
        }
    }
}

impl<P: Problem> Registry<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `register` with the registrar name installed, so every call to
    /// [`Registry::register_solver`] made from within it is tagged with
    /// `name`. The name can never be left dangling by a caller who forgot to
    /// clear it: it is always restored on return, including on early return.
    pub fn with_registrar<F, R>(&mut self, name: &str, register: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        let previous = self.cur_registrar_name.replace(name.to_string());
        let result = register(self);
        self.cur_registrar_name = previous;
        result
    }

    /// Appends `solver` to the registry under the currently installed
    /// registrar name. Panics if called outside [`Registry::with_registrar`]
    /// or if the name is `>= MAX_REGISTRAR_NAME` bytes.
    pub fn register_solver(&mut self, solver: Rc<dyn Solver<P>>) -> SolverHandle<P> {
        let registrar_name = self
            .cur_registrar_name
            .clone()
            .expect("register_solver called outside with_registrar");
        assert!(
            registrar_name.len() < MAX_REGISTRAR_NAME,
            "registrar name {registrar_name:?} is too long for the wisdom grammar"
        );
        let registration_id = self.cur_registration_id;
        self.cur_registration_id += 1;
        let name_hash = hash_registrar_name(&registrar_name);

        #[cfg(feature = "tracing")]
        tracing::trace!(
            tag = AllocTag::Descriptor.as_str(),
            registrar = %registrar_name,
            id = registration_id,
            "register_solver"
        );
        #[cfg(not(feature = "tracing"))]
        let _ = AllocTag::Descriptor;

        let desc = Rc::new(SolverDesc {
            solver,
            registrar_name,
            registration_id,
            name_hash,
        });
        self.solvers.push(desc.clone());
        desc
    }

    /// Resolves a `(name, id)` pair to its descriptor, as needed when
    /// re-binding wisdom entries at import time. Compares `id` first (a
    /// plain integer compare), then the name hash, then the full string —
    /// cheapest check first.
    pub fn lookup(&self, name: &str, id: u32) -> Option<SolverHandle<P>> {
        self.solvers
            .iter()
            .find(|desc| desc.matches(name, id))
            .cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SolverHandle<P>> {
        self.solvers.iter()
    }

    pub fn len(&self) -> usize {
        self.solvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solvers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::Plan;
    use planner_digest::Digest;

    struct DummyProblem;
    impl Problem for DummyProblem {
        fn hash(&self, digest: &mut Digest) {
            digest.feed_bytes(b"dummy");
        }
        fn precision_bytes(&self) -> u32 {
            8
        }
    }

    struct DummySolver;
    impl Solver<DummyProblem> for DummySolver {
        fn mkplan(
            &self,
            _problem: &DummyProblem,
            _planner: &mut crate::Planner<DummyProblem>,
        ) -> Option<Plan> {
            None
        }
    }

    #[test]
    fn register_and_lookup_round_trips() {
        let mut reg: Registry<DummyProblem> = Registry::new();
        let desc = reg.with_registrar("dft-direct", |r| {
            r.register_solver(Rc::new(DummySolver))
        });
        let found = reg
            .lookup(&desc.registrar_name, desc.registration_id)
            .expect("registered solver must be found");
        assert_eq!(found.registration_id, desc.registration_id);
        assert!(reg.lookup("dft-direct", 999).is_none());
        assert!(reg.lookup("nonexistent", 0).is_none());
    }

    #[test]
    fn distinct_families_get_independent_ids() {
        let mut reg: Registry<DummyProblem> = Registry::new();
        let a0 = reg.with_registrar("a", |r| r.register_solver(Rc::new(DummySolver)));
        let a1 = reg.with_registrar("a", |r| r.register_solver(Rc::new(DummySolver)));
        let b0 = reg.with_registrar("b", |r| r.register_solver(Rc::new(DummySolver)));
        assert_eq!(a0.registration_id, 0);
        assert_eq!(a1.registration_id, 1);
        assert_eq!(b0.registration_id, 2);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    #[should_panic(expected = "outside with_registrar")]
    fn register_outside_scope_panics() {
        let mut reg: Registry<DummyProblem> = Registry::new();
        reg.register_solver(Rc::new(DummySolver));
    }
}

//! Planner lifecycle and the plan-construction driver: construction, the
//! memoizing `mkplan` entry point, the flag-preserving `slv_mkplan` helper,
//! `evaluate_plan`, and teardown.

use std::rc::Rc;

use crate::alloc_tag::AllocTag;
use crate::cache::{Amnesia, Cache};
use crate::flags::PlannerFlags;
use crate::problem::{Plan, Problem, Solver};
use crate::registry::{Registry, SolverHandle};
use crate::wisdom::{self, Printer, Scanner, WisdomError};

/// The pluggable per-family search routine: given the current hint (the
/// descriptor the cache remembers for this signature, if any), enumerate
/// candidate solvers, honor planner flags, and produce both the plan and
/// the descriptor that built it. Any recursive `mkplan`/`slv_mkplan` calls
/// it makes may freely mutate `planner.flags`/`planner.thread_count`; the
/// driver is responsible for save/restore around solver calls, not this
/// routine.
///
/// Stored as an `Rc<dyn Fn>` rather than a `Box<dyn FnMut>`: a solver may
/// recurse back into `Planner::mkplan` on a sub-problem (split-radix on
/// half the length, say), and that recursive call needs this very routine
/// again while the outer call is still holding it. Cloning the `Rc` is
/// cheap and sidesteps taking the field out of `self` (which would hand
/// the recursive call a placeholder instead of the real routine). Callers
/// needing internal state should close over a `Cell`/`RefCell`.
pub type InferiorMkplan<P> = Rc<
    dyn Fn(&mut Planner<P>, &P, Option<SolverHandle<P>>) -> (Option<Plan>, Option<SolverHandle<P>>),
>;

type Hook<P> = Box<dyn FnMut(Option<&Plan>, &P, bool)>;
type MeasureExecutionTime<P> = Box<dyn FnMut(&Plan, &P) -> f64>;

fn no_hook<P: Problem>() -> Hook<P> {
    Box::new(|_plan, _problem, _optimal| {})
}

fn zero_cost<P: Problem>() -> MeasureExecutionTime<P> {
    Box::new(|_plan, _problem| 0.0)
}

/// The memoizing planner. Generic over the problem type `P`; solvers are
/// stored as `Rc<dyn Solver<P>>` behind their registry descriptor, so a
/// single planner can hold heterogeneous solver implementations, one
/// descriptor per registered family.
pub struct Planner<P: Problem> {
    registry: Registry<P>,
    cache: Cache<P>,
    pub flags: PlannerFlags,
    pub thread_count: u32,
    pub nplan: u64,
    pub nprob: u64,
    inferior_mkplan: InferiorMkplan<P>,
    hook: Hook<P>,
    measure_execution_time: MeasureExecutionTime<P>,
    destroy_hook: Option<Box<dyn FnOnce()>>,
}

impl<P: Problem> Planner<P> {
    /// Constructs a planner around `inferior_mkplan`, the caller-supplied
    /// search routine. The cache starts pre-sized to `ub(0)` slots so the
    /// table always has room before the first insert.
    pub fn new(inferior_mkplan: InferiorMkplan<P>, flags: PlannerFlags) -> Self {
        #[cfg(feature = "tracing")]
        tracing::trace!(tag = AllocTag::Planner.as_str(), "make_planner");
        #[cfg(not(feature = "tracing"))]
        let _ = AllocTag::Planner;

        Self {
            registry: Registry::new(),
            cache: Cache::new(),
            flags,
            thread_count: 1,
            nplan: 0,
            nprob: 0,
            inferior_mkplan,
            hook: no_hook(),
            measure_execution_time: zero_cost(),
            destroy_hook: None,
        }
    }

    /// A planner whose search routine tries the cached hint first, then
    /// every registered solver in registration order, returning the first
    /// one that produces a plan. Convenient for tests and the wisdom CLI;
    /// real callers with family-specific search strategies should use
    /// [`Planner::new`] directly.
    pub fn with_default_search(flags: PlannerFlags) -> Self {
        Self::new(
            Rc::new(|planner: &mut Planner<P>, problem: &P, hint| {
                if let Some(desc) = &hint {
                    if let Some(plan) = planner.slv_mkplan(problem, desc) {
                        return (Some(plan), Some(desc.clone()));
                    }
                }
                let candidates: Vec<_> = planner.registry().iter().cloned().collect();
                for desc in candidates {
                    if hint.as_ref().is_some_and(|h| Rc::ptr_eq(h, &desc)) {
                        continue; // already tried above
                    }
                    if let Some(plan) = planner.slv_mkplan(problem, &desc) {
                        return (Some(plan), Some(desc));
                    }
                }
                (None, None)
            }),
            flags,
        )
    }

    pub fn registry(&self) -> &Registry<P> {
        &self.registry
    }

    /// Registers every solver `register` adds under `name`. Thin wrapper
    /// over [`Registry::with_registrar`].
    pub fn with_registrar<F, R>(&mut self, name: &str, register: F) -> R
    where
        F: FnOnce(&mut Registry<P>) -> R,
    {
        self.registry.with_registrar(name, register)
    }

    /// Installs the observer hook, called after every [`Planner::mkplan`]
    /// (with `optimal = true`) and every [`Planner::evaluate_plan`] (with
    /// `optimal = false`).
    pub fn set_hook(&mut self, hook: impl FnMut(Option<&Plan>, &P, bool) + 'static) {
        self.hook = Box::new(hook);
    }

    /// Installs the (opaque, externally supplied) plan execution timer used
    /// by [`Planner::evaluate_plan`] when not running under `ESTIMATE`.
    pub fn set_measure_execution_time(&mut self, measure: impl FnMut(&Plan, &P) -> f64 + 'static) {
        self.measure_execution_time = Box::new(measure);
    }

    /// Registers a callback to run once, at drop, before the planner's own
    /// state is torn down — lets an embedder free auxiliary state it keeps
    /// alongside the planner.
    pub fn set_destroy_hook(&mut self, hook: impl FnOnce() + 'static) {
        self.destroy_hook = Some(Box::new(hook));
    }

    pub fn access_count(&self) -> u64 {
        self.cache.access
    }

    pub fn hit_count(&self) -> u64 {
        self.cache.hit
    }

    pub fn rehash_count(&self) -> u64 {
        self.cache.nrehash
    }

    pub fn cache_len(&self) -> u32 {
        self.cache.len()
    }

    pub fn cache(&self) -> &Cache<P> {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut Cache<P> {
        &mut self.cache
    }

    /// The memoizing planner entry point: look up a cached hint, delegate
    /// to the search routine, re-cache the chosen descriptor (even on
    /// failure — negative results are memoized too), notify the hook.
    pub fn mkplan(&mut self, problem: &P) -> Option<Plan> {
        self.nprob += 1;

        let hint = self.cache.lookup(problem, self.flags.bits(), self.thread_count).flatten();

        // Clone the `Rc`, not take-and-restore: a solver invoked below may
        // itself call back into `mkplan` on a sub-problem, and that call
        // needs this same search routine, not a placeholder.
        let search = Rc::clone(&self.inferior_mkplan);
        let (plan, chosen) = search(self, problem, hint);

        self.cache
            .insert(problem, self.flags.bits(), self.thread_count, chosen);

        if let Some(plan) = &plan {
            (self.hook)(Some(plan), problem, true);
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(nprob = self.nprob, hit = plan.is_some(), "mkplan");

        plan
    }

    /// Delegates to `solver`'s own `mkplan`, saving and restoring
    /// `flags`/`thread_count` around the call so that whatever the solver's
    /// own nested planning does to them never leaks back to this frame.
    pub fn slv_mkplan(&mut self, problem: &P, solver: &SolverHandle<P>) -> Option<Plan> {
        let saved_flags = self.flags;
        let saved_thread_count = self.thread_count;
        let plan = solver.solver.mkplan(problem, self);
        self.flags = saved_flags;
        self.thread_count = saved_thread_count;
        plan
    }

    /// Assigns `plan` a cost if it doesn't have one yet (or the planner
    /// isn't `impatient`), then notifies the hook with `optimal = false`.
    pub fn evaluate_plan(&mut self, plan: &mut Plan, problem: &P) {
        if !self.flags.impatient || plan.pcost == 0.0 {
            self.nplan += 1;
            if self.flags.estimate {
                plan.pcost = (plan.ops.add + plan.ops.mul + 2 * plan.ops.fma + plan.ops.other)
                    as f64;
            } else {
                plan.pcost = (self.measure_execution_time)(plan, problem);
            }
        }
        (self.hook)(Some(plan), problem, false);
    }

    /// Discards cache entries per `mode`. See [`Cache::forget`].
    pub fn forget(&mut self, mode: Amnesia) {
        self.cache.forget(mode);
    }

    /// Exports every blessed cache entry as wisdom. Thin wrapper over
    /// [`wisdom::export_wisdom`] that reaches straight at `self.cache`,
    /// kept here so callers don't have to import the codec module
    /// themselves for the common case.
    pub fn export_wisdom(&self, printer: &mut dyn Printer) {
        wisdom::export_wisdom(&self.cache, printer);
    }

    /// Imports wisdom, re-resolving each entry against this planner's own
    /// registry. A method rather than a free function taking `&mut
    /// Planner`/`&Planner` separately: `self.cache` and `self.registry` are
    /// disjoint fields, so borrowing them individually here is allowed even
    /// though borrowing `self` as both `&mut` and `&` in one call expression
    /// would not be.
    pub fn import_wisdom(&mut self, scanner: &mut dyn Scanner) -> Result<(), WisdomError> {
        wisdom::import_wisdom(&mut self.cache, &self.registry, scanner)
    }
}

impl<P: Problem> Drop for Planner<P> {
    fn drop(&mut self) {
        if let Some(hook) = self.destroy_hook.take() {
            hook();
        }
        // Table, registry (and with it every solver's `Rc` refcount) are
        // released by their own `Drop` impls as the struct's fields drop, in
        // field order, without needing to hand-sequence the teardown.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::BLESSING;
    use crate::problem::OpCounts;
    use planner_digest::Digest;
    use std::cell::RefCell;

    #[derive(Clone)]
    struct Len(u32);
    impl Problem for Len {
        fn hash(&self, digest: &mut Digest) {
            digest.feed_uint(self.0);
        }
        fn precision_bytes(&self) -> u32 {
            8
        }
    }

    struct Fixed {
        label: &'static str,
        accepts: fn(u32) -> bool,
    }
    impl Solver<Len> for Fixed {
        fn mkplan(&self, problem: &Len, _planner: &mut Planner<Len>) -> Option<Plan> {
            if (self.accepts)(problem.0) {
                Some(Plan::new(OpCounts::default()))
            } else {
                None
            }
        }
        fn name(&self) -> &str {
            self.label
        }
    }

    /// Memoize and reuse.
    #[test]
    fn memoize_and_reuse() {
        let mut planner: Planner<Len> = Planner::with_default_search(
            PlannerFlags::default().with_impatience(2),
        );
        planner.with_registrar("family", |r| {
            r.register_solver(Rc::new(Fixed {
                label: "A",
                accepts: |n| n == 999, // never matches
            }));
            r.register_solver(Rc::new(Fixed {
                label: "B",
                accepts: |_| true,
            }));
        });

        let p1 = Len(16);
        let plan1 = planner.mkplan(&p1);
        assert!(plan1.is_some());
        assert_eq!(planner.nprob, 1);
        assert_eq!(planner.access_count(), 1);
        assert_eq!(planner.hit_count(), 0);

        let plan2 = planner.mkplan(&p1);
        assert!(plan2.is_some());
        assert_eq!(planner.nprob, 2);
        assert_eq!(planner.access_count(), 2);
        assert_eq!(planner.hit_count(), 1);
    }

    /// Impatience refinement.
    #[test]
    fn impatience_refinement_overwrites_cache() {
        let built_with: RefCell<Vec<u32>> = RefCell::new(Vec::new());
        let mut planner: Planner<Len> = Planner::with_default_search(
            PlannerFlags::default().with_impatience(5),
        );
        planner.with_registrar("family", |r| {
            r.register_solver(Rc::new(Fixed {
                label: "any",
                accepts: |_| true,
            }));
        });

        let p2 = Len(32);
        planner.mkplan(&p2); // built at impatience 5
        let _ = &built_with;

        planner.flags = planner.flags.with_impatience(1); // more patient
        assert!(planner.cache.lookup(&p2, planner.flags.bits(), 1).is_none());

        planner.mkplan(&p2); // overwrites with an impatience-1 entry

        planner.flags = planner.flags.with_impatience(5);
        assert!(planner.cache.lookup(&p2, planner.flags.bits(), 1).is_some());
    }

    /// Bless and forget.
    #[test]
    fn bless_and_forget_accursed() {
        let mut planner: Planner<Len> = Planner::with_default_search(PlannerFlags::default());
        planner.cache.insert(&Len(1), 0, 1, None);
        planner.cache.insert(&Len(2), 0, 1, None);
        planner.cache.insert(&Len(3), 0, 1, None);
        // Bless entry 2 via hinsert (OR-ing the bless bit), as the policy
        // requires — direct field mutation would bypass it.
        let sig2 = crate::cache::compute_signature(&Len(2), 0, 1);
        planner.cache.hinsert(sig2, BLESSING, None);

        planner.forget(Amnesia::Accursed);
        assert_eq!(planner.cache_len(), 1);
        assert!(planner.cache.lookup(&Len(2), 0, 1).is_some());
        assert!(planner.cache.lookup(&Len(1), 0, 1).is_none());
    }

    #[test]
    fn negative_results_are_memoized() {
        let mut planner: Planner<Len> = Planner::with_default_search(PlannerFlags::default());
        planner.with_registrar("family", |r| {
            r.register_solver(Rc::new(Fixed {
                label: "never",
                accepts: |_| false,
            }));
        });
        let p = Len(7);
        assert!(planner.mkplan(&p).is_none());
        assert_eq!(planner.cache_len(), 1); // the failure itself is memoized
        assert!(planner.mkplan(&p).is_none());
        assert_eq!(planner.access_count(), 2);
        assert_eq!(planner.hit_count(), 1);
    }

    #[test]
    fn destroy_hook_runs_once_on_drop() {
        let ran = Rc::new(RefCell::new(false));
        let ran_inner = ran.clone();
        {
            let mut planner: Planner<Len> = Planner::with_default_search(PlannerFlags::default());
            planner.set_destroy_hook(move || {
                *ran_inner.borrow_mut() = true;
            });
        }
        assert!(*ran.borrow());
    }
}

//! A toy problem/solver pair standing in for "compute a length-N transform
//! over a buffer of a given precision": just enough structure to exercise
//! the planner end to end (registry, cache, wisdom) without pulling in an
//! actual transform kernel, which is explicitly out of this crate's scope.

use std::rc::Rc;

use planner_core::{Digest, OpCounts, Plan, Planner, PlannerFlags, Problem, Solver};

#[derive(Debug, Clone, Copy)]
pub struct Transform {
    pub length: u32,
    pub precision_bytes: u32,
}

impl Problem for Transform {
    fn hash(&self, digest: &mut Digest) {
        digest.feed_uint(self.length);
    }

    fn precision_bytes(&self) -> u32 {
        self.precision_bytes
    }
}

/// Handles any length by brute force; always succeeds, at quadratic cost.
pub struct DirectSolver;

impl Solver<Transform> for DirectSolver {
    fn mkplan(&self, problem: &Transform, _planner: &mut Planner<Transform>) -> Option<Plan> {
        let n = problem.length as u64;
        Some(Plan::new(OpCounts {
            add: n * n,
            mul: n * n,
            fma: 0,
            other: 0,
        }))
    }

    fn name(&self) -> &str {
        "direct"
    }
}

/// Handles only power-of-two lengths, recursing on half the problem through
/// the planner's own memoizing entry point to demonstrate flag preservation
/// across recursive calls.
pub struct SplitRadixSolver;

impl Solver<Transform> for SplitRadixSolver {
    fn mkplan(&self, problem: &Transform, planner: &mut Planner<Transform>) -> Option<Plan> {
        if problem.length <= 1 || !problem.length.is_power_of_two() {
            return None;
        }
        if problem.length == 2 {
            return Some(Plan::new(OpCounts {
                add: 2,
                mul: 0,
                fma: 0,
                other: 0,
            }));
        }

        let half = Transform {
            length: problem.length / 2,
            precision_bytes: problem.precision_bytes,
        };
        let saved_impatience = planner.flags.impatience;
        planner.flags.impatience = saved_impatience.saturating_add(1); // sub-plans may search less hard
        let sub = planner.mkplan(&half);
        planner.flags.impatience = saved_impatience;

        let sub = sub?;
        let n = problem.length as u64;
        Some(Plan::new(OpCounts {
            add: sub.ops.add * 2 + n,
            mul: sub.ops.mul * 2 + n / 2,
            fma: sub.ops.fma * 2,
            other: sub.ops.other * 2,
        }))
    }

    fn name(&self) -> &str {
        "split-radix"
    }
}

/// Builds a planner with both solvers registered under one registrar name,
/// matching how a real transform library groups a handful of algorithmic
/// variants behind a single family.
pub fn make_planner(flags: PlannerFlags) -> Planner<Transform> {
    let mut planner = Planner::with_default_search(flags);
    planner.with_registrar("radix", |r| {
        r.register_solver(Rc::new(SplitRadixSolver));
        r.register_solver(Rc::new(DirectSolver));
    });
    planner
}

//! # planner-core
//!
//! The memoizing plan-selection engine at the heart of a self-tuning
//! numerical transform library: a solver registry, a signature-indexed
//! cache with an impatience/blessing merge policy, a textual wisdom
//! import/export protocol, and a thin plan-construction driver.
//!
//! This crate owns the cache and registry machinery only. Concrete
//! problems, solvers, and plans are supplied by the caller through the
//! [`Problem`]/[`Solver`] traits and the [`Plan`] type; the digest itself
//! lives in `planner-digest`.

#![deny(unsafe_code)]

pub mod alloc_tag;
pub mod cache;
pub mod flags;
pub mod planner;
pub mod problem;
pub mod registry;
pub mod table;
pub mod wisdom;

pub use cache::Amnesia;
pub use flags::PlannerFlags;
pub use planner::{InferiorMkplan, Planner};
pub use problem::{OpCounts, Plan, Problem, Solver};
pub use registry::{Registry, SolverDesc, SolverHandle};
pub use wisdom::{export_wisdom, import_wisdom, Printer, Scanner, StringPrinter, StringScanner, WisdomError};

pub use planner_digest::{Digest, Signature};

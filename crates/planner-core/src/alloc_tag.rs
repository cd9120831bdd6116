//! Allocation accounting tags.
//!
//! Allocations are tagged by category (`PLANNERS`, `HASHT`, `SLVDESCS`, ...)
//! purely so a debug build can report which subsystem a given block of
//! memory belongs to; it has no bearing on layout or lifetime. This is kept
//! as a zero-cost label attached
//! at the handful of allocation sites, surfaced only through `tracing`
//! instrumentation (see [`crate::cache::Cache`] and [`crate::registry::Registry`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocTag {
    /// The planner struct itself.
    Planner,
    /// The hash table's slot array.
    Table,
    /// A solver descriptor.
    Descriptor,
    /// A solver reference taken at registration.
    Solver,
}

impl AllocTag {
    pub fn as_str(self) -> &'static str {
        match self {
            AllocTag::Planner => "planner",
            AllocTag::Table => "table",
            AllocTag::Descriptor => "descriptor",
            AllocTag::Solver => "solver",
        }
    }
}

//! Planning module for task decisions.
//!
//! This module holds the pure parts of reconciliation: the diff engine that
//! compares existing and requested settings, the version policy for
//! versioned objects and the table that maps observations to actions.

mod diff;
mod plan;
mod version;

pub use diff::{project, CompareResult, DiffEngine, DiffEntry, Difference};
pub use plan::{decide, Decision, Observation, TargetState, TaskAction, VersionStrategy};
pub use version::{
    highest, SemVer, VersionDecision, VersionPolicy, VersionRequest, DEFAULT_INITIAL_VERSION,
};

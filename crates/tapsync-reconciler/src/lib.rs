//! Mirror-session reconciliation.
//!
//! Computes the desired set of mirrored endpoints from the live inventory,
//! diffs it against active mirror sessions, and applies the minimal
//! create/delete set to converge. Newly created sessions each emit one
//! enrichment work item for the metadata sync worker.

pub mod plan;
pub mod reconciler;

pub use plan::{compute_plan, next_session_number, occupied_session_numbers, SkipReason};
pub use reconciler::{ReconcileError, ReconcileSummary, SessionReconciler};

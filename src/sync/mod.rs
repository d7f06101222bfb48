//! Sync engine for tracked stacks
//!
//! Same three phases as merge:
//! 1. Gather - fetch, reset bases, reconcile landed branches (effectful)
//! 2. Plan - create `SyncPlan` (pure, testable)
//! 3. Execute - restack and push in plan order (effectful)

mod execute;
mod plan;
mod reconcile;

pub use execute::{BranchOutcome, SyncOptions, SyncReport, preview_sync, run_sync};
pub use plan::{SkipReason, SyncPlan, SyncStep, create_sync_plan};
pub use reconcile::{ReconcileReport, reconcile_landed};

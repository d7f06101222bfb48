//! Merge engine for stacked review requests
//!
//! Three-phase pattern shared with sync:
//! 1. Gather - fetch PR details and readiness (effectful, read-only)
//! 2. Plan - create `MergePlan` (pure, testable)
//! 3. Execute - land, retire, and restack (effectful)

mod execute;
mod gather;
mod plan;

pub use execute::{MergeExecutionResult, execute_merge};
pub use gather::{gather_merge_candidates, merge_chain};
pub use plan::{
    MergeCandidate, MergeConfidence, MergePlan, MergePlanOptions, MergeStep, ReviewInfo,
    create_merge_plan,
};

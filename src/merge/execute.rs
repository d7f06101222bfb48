//! Merge execution - effectful operations
//!
//! Takes a `MergePlan` (created by the pure planning functions), lands each
//! review request via the platform API, and restacks the landed branch's
//! children before moving on to the next step.

use crate::conflict::RewriteOperation;
use crate::engine::{
    ConflictPause, EngineContext, RestackOutcome, restack_branch, retarget_children,
    retire_branch, return_to_branch,
};
use crate::error::{Error, Result};
use crate::merge::plan::{MergeConfidence, MergePlan, MergeStep};
use crate::stack::Forest;
use tracing::{info, warn};

/// Result of merge execution
#[derive(Debug, Clone, Default)]
pub struct MergeExecutionResult {
    /// Branches whose review request landed (or had already landed), in order
    pub merged_branches: Vec<(String, u64)>,
    /// Children rebased onto their new parent
    pub restacked: Vec<String>,
    /// Rebase of a child that stopped on conflicts
    pub paused: Option<ConflictPause>,
    /// Branch checked out at the end
    pub returned_to: Option<String>,
}

impl MergeExecutionResult {
    /// Check if every planned step finished
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.paused.is_none()
    }

    /// Check if at least one review request was landed
    #[must_use]
    pub const fn has_merges(&self) -> bool {
        !self.merged_branches.is_empty()
    }
}

/// Execute the merge plan (EFFECTFUL)
///
/// Steps run strictly in order. A failed landing aborts with an error;
/// a conflicted child rebase pauses and ends the run with the pause recorded.
pub async fn execute_merge(
    ctx: &mut EngineContext<'_>,
    plan: &MergePlan,
) -> Result<MergeExecutionResult> {
    if ctx.vcs.rebase_in_progress()? {
        return Err(Error::RebaseInProgress);
    }
    if let Some(stale) = ctx.store.checkpoint()? {
        warn!(branch = %stale.branch, "clearing stale conflict checkpoint");
        ctx.store.set_checkpoint(None)?;
    }

    let mut result = MergeExecutionResult::default();
    let start = ctx.vcs.current_branch()?;

    // Where to land once the chain is gone: nearest ancestor, then the base
    let forest = Forest::load(&*ctx.store)?;
    let mut fallbacks: Vec<String> = Vec::new();
    if let Some(start) = &start {
        fallbacks.extend(forest.ancestors(start).unwrap_or_default().into_iter().rev());
        fallbacks.extend(forest.base_of(start).unwrap_or_default());
    }
    for step in &plan.steps {
        fallbacks.extend(forest.base_of(step.branch()).unwrap_or_default());
    }

    ctx.progress
        .on_message(&format!("Fetching {}", ctx.remote))
        .await;
    ctx.vcs.fetch(ctx.remote)?;

    for step in &plan.steps {
        let branch = step.branch().to_string();
        let pr_number = step.pr_number();

        match step {
            MergeStep::Land {
                pr_title,
                method,
                confidence,
                ..
            } => {
                if let Some(pause) = restack_before_landing(ctx, &branch, &mut result).await? {
                    result.paused = Some(pause);
                    return Ok(result);
                }
                if let MergeConfidence::Uncertain(reason) = confidence {
                    ctx.progress
                        .on_warning(&format!("PR #{pr_number}: {reason}; trying anyway"))
                        .await;
                }
                ctx.progress
                    .on_message(&format!("Merging PR #{pr_number}: {pr_title}"))
                    .await;

                let merge_result = ctx.platform.merge_pr(pr_number, *method).await?;
                if !merge_result.merged {
                    return Err(Error::MergeFailed {
                        number: pr_number,
                        message: merge_result
                            .message
                            .unwrap_or_else(|| "merge was not performed".to_string()),
                    });
                }
                let sha_display = merge_result.sha.as_deref().unwrap_or("(no sha)");
                ctx.progress
                    .on_message(&format!("Merged PR #{pr_number}: {sha_display}"))
                    .await;
                info!(branch = %branch, pr_number, %method, "landed");

                // The new base must contain the landed commit before restacking
                ctx.vcs.fetch(ctx.remote)?;
            }
            MergeStep::AlreadyLanded { .. } => {
                ctx.progress
                    .on_message(&format!("PR #{pr_number} is already merged"))
                    .await;
            }
        }

        result.merged_branches.push((branch.clone(), pr_number));

        if let Some(pause) = settle_landed(ctx, &branch, &fallbacks, &mut result).await? {
            result.paused = Some(pause);
            return Ok(result);
        }
    }

    let candidates = start
        .iter()
        .chain(fallbacks.iter())
        .map(String::as_str);
    result.returned_to = return_to_branch(ctx.vcs, candidates)?;

    Ok(result)
}

/// Restack a branch that still carries a cut point from an earlier retired
/// parent, so its review request no longer contains the parent's commits.
async fn restack_before_landing(
    ctx: &mut EngineContext<'_>,
    branch: &str,
    result: &mut MergeExecutionResult,
) -> Result<Option<ConflictPause>> {
    if ctx.store.cut_point(branch)?.is_none() || !ctx.vcs.branch_exists(branch)? {
        return Ok(None);
    }
    let Some(parent) = Forest::load(&*ctx.store)?.parent(branch).map(String::from) else {
        return Ok(None);
    };

    ctx.progress
        .on_message(&format!("{branch} still carries its old parent; restacking first"))
        .await;
    match restack_branch(ctx, branch, &parent, RewriteOperation::Merge).await? {
        RestackOutcome::UpToDate | RestackOutcome::Rebased => {
            result.restacked.push(branch.to_string());
            Ok(None)
        }
        RestackOutcome::Paused(pause) => Ok(Some(pause)),
    }
}

/// Re-parent children of a landed branch, retire it, and restack the
/// children onto the new parent.
async fn settle_landed(
    ctx: &mut EngineContext<'_>,
    branch: &str,
    fallbacks: &[String],
    result: &mut MergeExecutionResult,
) -> Result<Option<ConflictPause>> {
    let forest = Forest::load(&*ctx.store)?;
    let new_parent = forest.parent(branch).map(String::from);

    let children = retarget_children(ctx, branch, new_parent.as_deref()).await?;

    let checkout_target = new_parent
        .clone()
        .or_else(|| fallbacks.iter().find(|f| f.as_str() != branch).cloned())
        .or_else(|| children.first().cloned())
        .unwrap_or_default();
    retire_branch(ctx, branch, &checkout_target).await?;

    let Some(new_parent) = new_parent else {
        return Ok(None);
    };

    for child in children {
        if !ctx.vcs.branch_exists(&child)? {
            ctx.progress
                .on_warning(&format!("{child} does not exist locally; not restacking"))
                .await;
            continue;
        }
        match restack_branch(ctx, &child, &new_parent, RewriteOperation::Merge).await? {
            RestackOutcome::UpToDate | RestackOutcome::Rebased => result.restacked.push(child),
            RestackOutcome::Paused(pause) => return Ok(Some(pause)),
        }
    }

    Ok(None)
}

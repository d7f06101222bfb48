//! Folding a branch into its parent
//!
//! The branch's commits land on the parent, its children are re-parented
//! onto the parent and restacked, and the branch is deleted along with its
//! metadata. Only a tracked parent can receive a fold; bases are changed
//! through review requests.

use crate::conflict::RewriteOperation;
use crate::engine::{
    ConflictPause, EngineContext, RestackOutcome, push_branch, restack_branch, retarget_children,
    retire_branch, return_to_branch,
};
use crate::error::{Error, Result};
use crate::stack::Forest;
use tracing::{info, warn};

/// Options for [`fold_branch`]
#[derive(Debug, Clone, Copy)]
pub struct FoldOptions {
    /// Land the branch's commits on the parent as a single commit
    pub squash: bool,
    /// Close the folded branch's review request
    pub close_review: bool,
}

impl Default for FoldOptions {
    fn default() -> Self {
        Self {
            squash: true,
            close_review: true,
        }
    }
}

/// What a fold changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoldReport {
    /// Branch that received the commits
    pub parent: String,
    /// Children re-parented onto `parent`
    pub children: Vec<String>,
    /// Children rebased and pushed
    pub restacked: Vec<String>,
    /// Review request that was closed
    pub closed_review: Option<u64>,
    /// Child rebase that stopped on conflicts
    pub paused: Option<ConflictPause>,
}

/// Fold `branch` into its parent.
///
/// Every precondition is checked before anything is written. The branch must
/// sit on its parent's current tip, so the merge itself never conflicts.
pub async fn fold_branch(
    ctx: &mut EngineContext<'_>,
    branch: &str,
    options: FoldOptions,
) -> Result<FoldReport> {
    if ctx.vcs.rebase_in_progress()? {
        return Err(Error::RebaseInProgress);
    }

    let forest = Forest::load(&*ctx.store)?;
    let tracked = forest
        .get(branch)
        .cloned()
        .ok_or_else(|| Error::BranchNotTracked(branch.to_string()))?;
    if tracked.frozen {
        return Err(Error::BranchFrozen(branch.to_string()));
    }
    let parent = tracked
        .parent
        .clone()
        .filter(|p| forest.is_tracked(p))
        .ok_or_else(|| Error::NoParent(branch.to_string()))?;
    if forest.get(&parent).is_some_and(|p| p.frozen) {
        return Err(Error::BranchFrozen(parent));
    }
    if let Some(frozen) = forest
        .children(branch)
        .iter()
        .find(|c| forest.get(c).is_some_and(|b| b.frozen))
    {
        return Err(Error::BranchFrozen(frozen.clone()));
    }
    for name in [branch, parent.as_str()] {
        if !ctx.vcs.branch_exists(name)? {
            return Err(Error::BranchNotFound(name.to_string()));
        }
    }
    if !ctx.vcs.is_ancestor(&parent, branch)? {
        return Err(Error::NotStacked {
            branch: branch.to_string(),
            parent,
        });
    }

    let mut report = FoldReport {
        parent: parent.clone(),
        ..FoldReport::default()
    };

    ctx.vcs.checkout(&parent)?;
    if ctx.vcs.is_ancestor(branch, &parent)? {
        ctx.progress
            .on_message(&format!("{branch} has no commits of its own"))
            .await;
    } else {
        ctx.progress
            .on_message(&format!("Folding {branch} into {parent}"))
            .await;
        let message = format!("Fold {branch} into {parent}");
        ctx.vcs.merge_branch(branch, options.squash, &message)?;
        push_branch(ctx, &parent).await?;
    }

    report.children = retarget_children(ctx, branch, Some(&parent)).await?;

    if options.close_review
        && let Some(number) = tracked.review_id
    {
        match ctx.platform.close_pr(number).await {
            Ok(()) => {
                ctx.progress
                    .on_message(&format!("Closed PR #{number}"))
                    .await;
                report.closed_review = Some(number);
            }
            Err(e) => {
                warn!(number, error = %e, "failed to close review");
                ctx.progress
                    .on_warning(&format!("Could not close PR #{number}: {e}"))
                    .await;
            }
        }
    }

    retire_branch(ctx, branch, &parent).await?;
    info!(branch, parent = %parent, squash = options.squash, "folded");

    for child in report.children.clone() {
        if !ctx.vcs.branch_exists(&child)? {
            ctx.progress
                .on_warning(&format!("{child} does not exist locally; not restacking"))
                .await;
            continue;
        }
        match restack_branch(ctx, &child, &parent, RewriteOperation::Fold).await? {
            RestackOutcome::UpToDate | RestackOutcome::Rebased => report.restacked.push(child),
            RestackOutcome::Paused(pause) => {
                report.paused = Some(pause);
                return Ok(report);
            }
        }
    }

    return_to_branch(ctx.vcs, [parent.as_str()])?;
    Ok(report)
}

//! Building blocks shared by the sync, merge and move engines
//!
//! Every helper narrates through the context's [`ProgressCallback`]. Review
//! retargeting and local branch deletion are best effort: failures become
//! warnings and the run continues.

use crate::conflict::{ConflictCheckpoint, RewriteOperation};
use crate::error::{Error, Result};
use crate::platform::PlatformService;
use crate::progress::ProgressCallback;
use crate::stack::{Forest, set_parent};
use crate::tracking::MetadataStore;
use crate::vcs::{PushOptions, RebaseOutcome, Vcs};
use tracing::{debug, info, warn};

/// Collaborators an engine run needs
pub struct EngineContext<'a> {
    /// Repository
    pub vcs: &'a mut dyn Vcs,
    /// Stack metadata
    pub store: &'a mut dyn MetadataStore,
    /// Review hosting
    pub platform: &'a dyn PlatformService,
    /// Remote to fetch from and push to
    pub remote: &'a str,
    /// Narration sink
    pub progress: &'a dyn ProgressCallback,
}

/// A rebase that stopped on conflicts and was checkpointed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictPause {
    /// Persisted checkpoint
    pub checkpoint: ConflictCheckpoint,
    /// Conflicted paths
    pub files: Vec<String>,
}

/// Result of restacking one branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestackOutcome {
    /// Already contained its target; pushed without rebasing
    UpToDate,
    /// Rebased and pushed
    Rebased,
    /// Stopped on conflicts
    Paused(ConflictPause),
}

/// The ref a branch should be rebased onto: `<remote>/<parent>` when the
/// remote-tracking ref exists, otherwise the local parent.
pub fn rebase_target(vcs: &dyn Vcs, remote: &str, parent: &str) -> Result<String> {
    if vcs.remote_branch_exists(remote, parent)? {
        Ok(format!("{remote}/{parent}"))
    } else {
        Ok(parent.to_string())
    }
}

/// Publish a branch: create the upstream on first push, otherwise force with
/// lease so concurrent remote updates are rejected.
pub async fn push_branch(ctx: &mut EngineContext<'_>, branch: &str) -> Result<()> {
    publish(ctx.vcs, ctx.remote, ctx.progress, branch).await
}

/// [`push_branch`] for callers without a full [`EngineContext`].
pub async fn publish(
    vcs: &mut dyn Vcs,
    remote: &str,
    progress: &dyn ProgressCallback,
    branch: &str,
) -> Result<()> {
    let options = if vcs.remote_branch_exists(remote, branch)? {
        PushOptions::safe_force()
    } else {
        PushOptions::new_branch()
    };
    debug!(branch, ?options, "pushing");
    vcs.push(remote, branch, options)?;
    progress
        .on_message(&format!("Pushed {branch} to {remote}"))
        .await;
    Ok(())
}

/// Bring `branch` up to date with `parent` and push it.
///
/// A pending cut point recorded for `branch` becomes the `--onto` upstream,
/// so after a parent was squash-landed or folded only the branch's own
/// commits are replayed. The cut point is consumed once the rebase completes;
/// a paused rebase keeps it for the next run.
pub async fn restack_branch(
    ctx: &mut EngineContext<'_>,
    branch: &str,
    parent: &str,
    operation: RewriteOperation,
) -> Result<RestackOutcome> {
    let onto = rebase_target(&*ctx.vcs, ctx.remote, parent)?;
    let upstream = ctx.store.cut_point(branch)?;

    // Up to date only if the old base's commits are part of the target too
    let cut_is_covered = match upstream.as_deref() {
        Some(upstream) => ctx.vcs.is_ancestor(upstream, &onto)?,
        None => true,
    };
    if cut_is_covered && ctx.vcs.is_ancestor(&onto, branch)? {
        debug!(branch, onto = %onto, "already up to date");
        if upstream.is_some() {
            ctx.store.set_cut_point(branch, None)?;
        }
        push_branch(ctx, branch).await?;
        return Ok(RestackOutcome::UpToDate);
    }

    ctx.progress
        .on_message(&format!("Rebasing {branch} onto {onto}"))
        .await;
    ctx.vcs.checkout(branch)?;

    match ctx.vcs.rebase_onto(&onto, upstream.as_deref())? {
        RebaseOutcome::Completed => {
            info!(branch, onto = %onto, "rebased");
            if upstream.is_some() {
                ctx.store.set_cut_point(branch, None)?;
            }
            push_branch(ctx, branch).await?;
            Ok(RestackOutcome::Rebased)
        }
        RebaseOutcome::Conflict(files) => {
            let checkpoint = ConflictCheckpoint::new(branch, &onto, upstream, operation);
            ctx.store.set_checkpoint(Some(checkpoint.clone()))?;
            warn!(branch, onto = %onto, ?files, "rebase paused on conflicts");
            Ok(RestackOutcome::Paused(ConflictPause { checkpoint, files }))
        }
    }
}

/// Commit `branch` was built on when its parent was `previous`.
///
/// Prefers whichever of `<remote>/<previous>` and the local `previous` is an
/// ancestor of `branch`, taking the newer one when both are. Returns `None`
/// when `previous` exists neither locally nor on the remote.
pub fn fork_point(
    vcs: &dyn Vcs,
    remote: &str,
    branch: &str,
    previous: &str,
) -> Result<Option<String>> {
    let mut candidates = Vec::with_capacity(2);
    if vcs.remote_branch_exists(remote, previous)? {
        candidates.push(format!("{remote}/{previous}"));
    }
    if vcs.branch_exists(previous)? {
        candidates.push(previous.to_string());
    }
    let Some(first) = candidates.first().cloned() else {
        return Ok(None);
    };

    let mut best: Option<String> = None;
    for candidate in candidates {
        if !vcs.is_ancestor(&candidate, branch)? {
            continue;
        }
        best = match best {
            Some(current) if vcs.is_ancestor(&candidate, &current)? => Some(current),
            _ => Some(candidate),
        };
    }

    let chosen = best.unwrap_or(first);
    Ok(Some(vcs.rev_parse(&chosen)?))
}

/// Result of [`move_branch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Parent before the move
    pub previous: Option<String>,
    /// How the rebase onto the new parent went
    pub restack: RestackOutcome,
}

/// Re-parent `branch` onto `onto`, rebase its own commits there, and
/// retarget its review request.
///
/// Descendants keep their parent and are restacked by the next sync.
pub async fn move_branch(
    ctx: &mut EngineContext<'_>,
    branch: &str,
    onto: &str,
) -> Result<MoveOutcome> {
    if ctx.vcs.rebase_in_progress()? {
        return Err(Error::RebaseInProgress);
    }
    if !ctx.vcs.branch_exists(onto)? {
        return Err(Error::BranchNotFound(onto.to_string()));
    }
    if !ctx.vcs.branch_exists(branch)? {
        return Err(Error::BranchNotFound(branch.to_string()));
    }

    let previous = set_parent(ctx.store, branch, Some(onto))?;
    ctx.progress
        .on_message(&format!("Re-parented {branch} onto {onto}"))
        .await;

    if let Some(previous) = previous.as_deref() {
        let cut = fork_point(&*ctx.vcs, ctx.remote, branch, previous)?;
        debug!(branch, previous, ?cut, "move cut point");
        ctx.store.set_cut_point(branch, cut)?;
    }

    let restack = restack_branch(ctx, branch, onto, RewriteOperation::Move).await?;

    let review = ctx.store.get(branch)?.and_then(|b| b.review_id);
    if let Some(number) = review {
        retarget_review(ctx, number, onto).await;
    }

    Ok(MoveOutcome { previous, restack })
}

/// Re-point every tracked child of `landed` at `new_parent` and retarget
/// their review requests. Returns the children that were re-parented.
///
/// While `landed` still exists locally its tip is recorded as each child's
/// cut point, so the children's next restack replays only their own commits.
pub async fn retarget_children(
    ctx: &mut EngineContext<'_>,
    landed: &str,
    new_parent: Option<&str>,
) -> Result<Vec<String>> {
    let forest = Forest::load(&*ctx.store)?;
    let children: Vec<String> = forest
        .children(landed)
        .iter()
        .filter(|c| forest.is_tracked(c))
        .cloned()
        .collect();

    let old_tip = if ctx.vcs.branch_exists(landed)? {
        Some(ctx.vcs.rev_parse(landed)?)
    } else {
        None
    };

    for child in &children {
        set_parent(ctx.store, child, new_parent)?;
        if let Some(tip) = &old_tip {
            ctx.store.set_cut_point(child, Some(tip.clone()))?;
        }
        let target = new_parent.unwrap_or("(none)");
        ctx.progress
            .on_message(&format!("Re-parented {child} onto {target}"))
            .await;

        let review = forest.get(child).and_then(|b| b.review_id);
        if let (Some(number), Some(base)) = (review, new_parent) {
            retarget_review(ctx, number, base).await;
        }
    }

    Ok(children)
}

/// Best-effort review base update.
pub async fn retarget_review(ctx: &EngineContext<'_>, number: u64, base: &str) {
    match ctx.platform.update_pr_base(number, base).await {
        Ok(_) => {
            ctx.progress
                .on_message(&format!("Updated PR #{number} base to {base}"))
                .await;
        }
        Err(e) => {
            warn!(number, base, error = %e, "failed to update review base");
            ctx.progress
                .on_warning(&format!("Could not update PR #{number} base to {base}: {e}"))
                .await;
        }
    }
}

/// Delete a landed branch locally and drop its metadata.
///
/// If it is checked out, `fallback` is checked out first. The local delete
/// is best effort; metadata removal is not.
pub async fn retire_branch(
    ctx: &mut EngineContext<'_>,
    branch: &str,
    fallback: &str,
) -> Result<()> {
    if ctx.vcs.branch_exists(branch)? {
        if ctx.vcs.current_branch()?.as_deref() == Some(branch) {
            ctx.vcs.checkout(fallback)?;
        }
        if let Err(e) = ctx.vcs.delete_branch(branch, true) {
            warn!(branch, error = %e, "failed to delete local branch");
            ctx.progress
                .on_warning(&format!("Could not delete local branch {branch}: {e}"))
                .await;
        }
    }
    ctx.store.remove(branch)?;
    ctx.progress
        .on_message(&format!("Removed landed branch {branch}"))
        .await;
    Ok(())
}

/// Check out the first candidate that still exists. Returns it, if any.
pub fn return_to_branch<'c>(
    vcs: &mut dyn Vcs,
    candidates: impl IntoIterator<Item = &'c str>,
) -> Result<Option<String>> {
    for candidate in candidates {
        if !vcs.branch_exists(candidate)? {
            continue;
        }
        if vcs.current_branch()?.as_deref() != Some(candidate) {
            vcs.checkout(candidate)?;
        }
        return Ok(Some(candidate.to_string()));
    }
    Ok(None)
}

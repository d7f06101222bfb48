//! Guarded metadata mutations
//!
//! Every function checks its preconditions against a fresh snapshot before
//! writing, so a failed call leaves the store untouched.

use super::{Forest, would_cycle};
use crate::error::{Error, Result};
use crate::tracking::{MetadataStore, TrackedBranch};
use crate::vcs::Vcs;
use tracing::info;

/// Start tracking `branch` on top of `parent`.
pub fn track(
    vcs: &dyn Vcs,
    store: &mut dyn MetadataStore,
    branch: &str,
    parent: Option<&str>,
) -> Result<TrackedBranch> {
    if !vcs.branch_exists(branch)? {
        return Err(Error::BranchNotFound(branch.to_string()));
    }
    let parent = parent.filter(|p| !p.is_empty());
    if let Some(parent) = parent
        && !vcs.branch_exists(parent)?
    {
        return Err(Error::BranchNotFound(parent.to_string()));
    }

    let forest = Forest::load(store)?;
    if forest.is_tracked(branch) {
        return Err(Error::AlreadyTracked(branch.to_string()));
    }
    guard_cycle(&forest, branch, parent)?;

    let tracked = TrackedBranch::new(branch, parent.map(String::from));
    store.put(tracked.clone())?;
    info!(branch, parent = ?parent, "tracking branch");
    Ok(tracked)
}

/// Create `branch` at the tip of `parent`, check it out, and track it there.
///
/// `parent` may be an untracked base such as the trunk.
pub fn create(
    vcs: &mut dyn Vcs,
    store: &mut dyn MetadataStore,
    branch: &str,
    parent: &str,
) -> Result<TrackedBranch> {
    let branch = branch.trim();
    if branch.is_empty() {
        return Err(Error::Tracking("branch name cannot be empty".to_string()));
    }
    if vcs.branch_exists(branch)? {
        return Err(Error::BranchExists(branch.to_string()));
    }
    if !vcs.branch_exists(parent)? {
        return Err(Error::BranchNotFound(parent.to_string()));
    }

    // Metadata left behind by a deleted branch of the same name
    let forest = Forest::load(store)?;
    if forest.is_tracked(branch) {
        return Err(Error::AlreadyTracked(branch.to_string()));
    }
    guard_cycle(&forest, branch, Some(parent))?;

    vcs.create_branch(branch, parent)?;
    vcs.checkout(branch)?;

    let tracked = TrackedBranch::new(branch, Some(parent.to_string()));
    store.put(tracked.clone())?;
    info!(branch, parent, "created branch");
    Ok(tracked)
}

/// Stop tracking `branch`, and with `recursive` every descendant too.
///
/// Children of a non-recursive untrack keep their parent pointer, so they
/// become roots sitting on the now-untracked branch. Returns the removed
/// names, deepest first.
pub fn untrack(
    store: &mut dyn MetadataStore,
    branch: &str,
    recursive: bool,
) -> Result<Vec<String>> {
    let forest = Forest::load(store)?;
    if !forest.is_tracked(branch) {
        return Err(Error::BranchNotTracked(branch.to_string()));
    }

    let mut targets = if recursive {
        forest.descendants(branch)
    } else {
        Vec::new()
    };
    targets.reverse();
    targets.push(branch.to_string());

    for name in &targets {
        store.remove(name)?;
    }
    info!(branch, removed = targets.len(), "untracked");
    Ok(targets)
}

/// Set or clear the frozen flag.
pub fn set_frozen(store: &mut dyn MetadataStore, branch: &str, frozen: bool) -> Result<()> {
    let mut tracked = store
        .get(branch)?
        .ok_or_else(|| Error::BranchNotTracked(branch.to_string()))?;
    tracked.frozen = frozen;
    store.put(tracked)
}

/// Re-parent a tracked branch, returning the previous parent.
pub fn set_parent(
    store: &mut dyn MetadataStore,
    branch: &str,
    parent: Option<&str>,
) -> Result<Option<String>> {
    let forest = Forest::load(store)?;
    let mut tracked = forest
        .get(branch)
        .cloned()
        .ok_or_else(|| Error::BranchNotTracked(branch.to_string()))?;
    if tracked.frozen {
        return Err(Error::BranchFrozen(branch.to_string()));
    }

    let parent = parent.filter(|p| !p.is_empty());
    guard_cycle(&forest, branch, parent)?;

    let previous = std::mem::replace(&mut tracked.parent, parent.map(String::from));
    store.put(tracked)?;
    info!(branch, from = ?previous, to = ?parent, "re-parented");
    Ok(previous)
}

/// Record (or clear) the review request linked to a branch.
pub fn link_review(store: &mut dyn MetadataStore, branch: &str, review: Option<u64>) -> Result<()> {
    let mut tracked = store
        .get(branch)?
        .ok_or_else(|| Error::BranchNotTracked(branch.to_string()))?;
    tracked.review_id = review.filter(|n| *n > 0);
    store.put(tracked)
}

fn guard_cycle(forest: &Forest, branch: &str, parent: Option<&str>) -> Result<()> {
    if would_cycle(forest, branch, parent)? {
        return Err(Error::WouldCycle {
            branch: branch.to_string(),
            parent: parent.unwrap_or_default().to_string(),
        });
    }
    Ok(())
}

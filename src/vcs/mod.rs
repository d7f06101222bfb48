//! Version-control collaborator
//!
//! Engines never shell out directly; they go through [`Vcs`] so tests can
//! substitute a scripted repository.

mod git;

pub use git::GitCli;

use crate::error::{Error, Result};
use crate::types::GitRemote;
use std::path::PathBuf;

/// Result of a rebase or rebase continuation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebaseOutcome {
    /// The rewrite finished
    Completed,
    /// The rewrite stopped on conflicts in these paths
    Conflict(Vec<String>),
}

/// Options for [`Vcs::push`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushOptions {
    /// Create the upstream tracking ref (`-u`)
    pub set_upstream: bool,
    /// Force, but reject if the remote moved since the last fetch
    pub force_with_lease: bool,
}

impl PushOptions {
    /// First publication of a branch
    pub const fn new_branch() -> Self {
        Self {
            set_upstream: true,
            force_with_lease: false,
        }
    }

    /// Republication of rewritten history
    pub const fn safe_force() -> Self {
        Self {
            set_upstream: false,
            force_with_lease: true,
        }
    }
}

/// Capabilities the engines need from the repository
pub trait Vcs {
    /// Shared git directory (common dir for linked worktrees)
    fn git_dir(&self) -> Result<PathBuf>;

    /// Currently checked-out branch, `None` when HEAD is detached
    fn current_branch(&self) -> Result<Option<String>>;

    /// Whether a local branch exists
    fn branch_exists(&self, branch: &str) -> Result<bool>;

    /// Whether `<remote>/<branch>` exists as a remote-tracking ref
    fn remote_branch_exists(&self, remote: &str, branch: &str) -> Result<bool>;

    /// Resolve a revision to a commit id
    fn rev_parse(&self, rev: &str) -> Result<String>;

    /// Whether `ancestor` is reachable from `descendant`
    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool>;

    /// Switch to a branch
    fn checkout(&mut self, branch: &str) -> Result<()>;

    /// Create a local branch at `start` without checking it out
    fn create_branch(&mut self, branch: &str, start: &str) -> Result<()>;

    /// Delete a local branch
    fn delete_branch(&mut self, branch: &str, force: bool) -> Result<()>;

    /// Merge `branch` into the current branch.
    ///
    /// With `squash` the changes land as one new commit with `message`;
    /// otherwise the current branch is fast-forwarded and the call fails if
    /// that is not possible.
    fn merge_branch(&mut self, branch: &str, squash: bool, message: &str) -> Result<()>;

    /// Fetch all refs from a remote, pruning deleted ones
    fn fetch(&mut self, remote: &str) -> Result<()>;

    /// Reset a local branch to exactly match `<remote>/<branch>`
    fn reset_to_remote(&mut self, remote: &str, branch: &str) -> Result<()>;

    /// Rebase the current branch onto `onto`.
    ///
    /// With `upstream`, only commits after `upstream` are replayed
    /// (`git rebase --onto <onto> <upstream>`).
    fn rebase_onto(&mut self, onto: &str, upstream: Option<&str>) -> Result<RebaseOutcome>;

    /// Finish a paused rebase after the user staged resolutions
    fn continue_rebase(&mut self) -> Result<RebaseOutcome>;

    /// Whether a rebase is paused in the working copy
    fn rebase_in_progress(&self) -> Result<bool>;

    /// Paths with unresolved conflicts
    fn conflicted_files(&self) -> Result<Vec<String>>;

    /// Push a branch
    fn push(&mut self, remote: &str, branch: &str, options: PushOptions) -> Result<()>;

    /// Configured remotes
    fn remotes(&self) -> Result<Vec<GitRemote>>;

    /// Config entries whose key starts with `prefix`
    fn config_entries(&self, prefix: &str) -> Result<Vec<(String, String)>>;
}

/// Pick the remote to operate on.
///
/// An explicitly requested remote must exist; otherwise `origin` wins, then
/// the first configured remote.
pub fn select_remote(remotes: &[GitRemote], preferred: Option<&str>) -> Result<GitRemote> {
    if let Some(name) = preferred {
        return remotes
            .iter()
            .find(|r| r.name == name)
            .cloned()
            .ok_or_else(|| Error::RemoteNotFound(name.to_string()));
    }

    remotes
        .iter()
        .find(|r| r.name == "origin")
        .or_else(|| remotes.first())
        .cloned()
        .ok_or(Error::NoSupportedRemotes)
}

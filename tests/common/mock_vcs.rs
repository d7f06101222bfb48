//! In-memory git model for engine tests
//!
//! Commits form single-parent chains identified by short names. Rebases
//! replay a branch's own commits onto the target and mint new ids, so
//! ancestry checks behave the way they do against a real repository.
//!
//! The remote server and the `origin/*` tracking refs are kept apart: a
//! fetch copies the server into the tracking refs, and a lease-guarded push
//! is rejected when the server moved since then.

#![allow(dead_code)]

use stak::error::{Error, Result};
use stak::types::GitRemote;
use stak::vcs::{PushOptions, RebaseOutcome, Vcs};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;

/// Call record for `push`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushCall {
    pub remote: String,
    pub branch: String,
    pub options: PushOptions,
}

/// Call record for `merge_branch`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeCall {
    pub into: String,
    pub branch: String,
    pub squash: bool,
}

/// Call record for `rebase_onto`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebaseCall {
    pub branch: String,
    pub onto: String,
    pub upstream: Option<String>,
}

#[derive(Debug, Clone)]
struct PausedRebase {
    branch: String,
    onto: String,
    commits: Vec<String>,
}

/// Mock repository
#[derive(Debug, Default)]
pub struct MockVcs {
    parents: HashMap<String, Option<String>>,
    local: HashMap<String, String>,
    remote: HashMap<String, String>,
    tracking: HashMap<String, String>,
    current: Option<String>,
    next_id: u32,
    // Conflict scripting
    conflicts: HashMap<String, Vec<String>>,
    paused: Option<PausedRebase>,
    unresolved: Vec<String>,
    // Remote branches to advance on each fetch
    fetch_script: VecDeque<Vec<String>>,
    // Remote branches someone else pushes right after the next fetch
    races: Vec<String>,
    undeletable: HashSet<String>,
    // Call tracking
    pub fetches: usize,
    pub pushes: Vec<PushCall>,
    pub rebases: Vec<RebaseCall>,
    pub checkouts: Vec<String>,
    pub deleted: Vec<String>,
    pub merges: Vec<MergeCall>,
    pub rejected_pushes: Vec<String>,
}

impl MockVcs {
    /// Repository with `main` at a root commit, pushed to `origin`
    pub fn new() -> Self {
        let mut vcs = Self::default();
        let root = vcs.commit(None);
        vcs.local.insert("main".to_string(), root.clone());
        vcs.remote.insert("main".to_string(), root.clone());
        vcs.tracking.insert("main".to_string(), root);
        vcs.current = Some("main".to_string());
        vcs
    }

    fn commit(&mut self, parent: Option<String>) -> String {
        self.next_id += 1;
        let id = format!("c{}", self.next_id);
        self.parents.insert(id.clone(), parent);
        id
    }

    /// Create `branch` with `commits` new commits on top of `base`, and push it
    pub fn branch(&mut self, branch: &str, base: &str, commits: usize) -> &mut Self {
        let mut tip = self.resolve(base).expect("base exists");
        for _ in 0..commits {
            tip = self.commit(Some(tip));
        }
        self.local.insert(branch.to_string(), tip.clone());
        self.remote.insert(branch.to_string(), tip.clone());
        self.tracking.insert(branch.to_string(), tip);
        self
    }

    /// Add a local commit to `branch` and push it
    pub fn add_commit(&mut self, branch: &str) -> String {
        let tip = self.local[branch].clone();
        let id = self.commit(Some(tip));
        self.local.insert(branch.to_string(), id.clone());
        self.remote.insert(branch.to_string(), id.clone());
        self.tracking.insert(branch.to_string(), id.clone());
        id
    }

    /// Add a local commit to `branch` without pushing it
    pub fn commit_locally(&mut self, branch: &str) -> String {
        let tip = self.local[branch].clone();
        let id = self.commit(Some(tip));
        self.local.insert(branch.to_string(), id.clone());
        id
    }

    /// Someone else pushes a commit to `branch` on the remote; visible after a fetch
    pub fn advance_remote(&mut self, branch: &str) -> String {
        let tip = self.remote[branch].clone();
        let id = self.commit(Some(tip));
        self.remote.insert(branch.to_string(), id.clone());
        id
    }

    /// Advance these remote branches on the next fetch (one entry per fetch)
    pub fn on_fetch(&mut self, advance: &[&str]) -> &mut Self {
        self.fetch_script
            .push_back(advance.iter().map(ToString::to_string).collect());
        self
    }

    /// Someone else pushes to `branch` just after the next fetch, so a
    /// lease taken from that fetch is stale
    pub fn race_after_fetch(&mut self, branch: &str) -> &mut Self {
        self.races.push(branch.to_string());
        self
    }

    /// Deleting `branch` fails
    pub fn fail_delete(&mut self, branch: &str) {
        self.undeletable.insert(branch.to_string());
    }

    /// Check out without recording
    pub fn set_current(&mut self, branch: &str) {
        self.current = Some(branch.to_string());
    }

    /// The next rebase of `branch` stops on conflicts in `files`
    pub fn script_conflict(&mut self, branch: &str, files: &[&str]) {
        self.conflicts.insert(
            branch.to_string(),
            files.iter().map(ToString::to_string).collect(),
        );
    }

    /// Simulate `git add` of every conflicted file
    pub fn resolve_conflicts(&mut self) {
        self.unresolved.clear();
    }

    /// Local tip of `branch`
    pub fn tip(&self, branch: &str) -> Option<&str> {
        self.local.get(branch).map(String::as_str)
    }

    /// Remote tip of `branch`
    pub fn remote_tip(&self, branch: &str) -> Option<&str> {
        self.remote.get(branch).map(String::as_str)
    }

    /// Commits on `branch` that `base` does not have
    pub fn count_commits(&self, base: &str, branch: &str) -> usize {
        let base = self.resolve(base).expect("base exists");
        let tip = self.resolve(branch).expect("branch exists");
        let excluded: HashSet<String> = self.history(&base).into_iter().collect();
        self.history(&tip)
            .into_iter()
            .take_while(|c| !excluded.contains(c))
            .count()
    }

    /// Branches pushed, in order
    pub fn pushed_branches(&self) -> Vec<String> {
        self.pushes.iter().map(|p| p.branch.clone()).collect()
    }

    /// Branches rebased, in order
    pub fn rebased_branches(&self) -> Vec<String> {
        self.rebases.iter().map(|r| r.branch.clone()).collect()
    }

    fn resolve(&self, rev: &str) -> Option<String> {
        if let Some(name) = rev.strip_prefix("origin/") {
            return self.tracking.get(name).cloned();
        }
        if let Some(tip) = self.local.get(rev) {
            return Some(tip.clone());
        }
        self.parents.contains_key(rev).then(|| rev.to_string())
    }

    fn history(&self, tip: &str) -> Vec<String> {
        let mut chain = vec![tip.to_string()];
        let mut current = tip.to_string();
        while let Some(Some(parent)) = self.parents.get(&current) {
            chain.push(parent.clone());
            current = parent.clone();
        }
        chain
    }

    fn replay(&mut self, branch: &str, onto: &str, commits: &[String]) {
        let mut tip = onto.to_string();
        for _ in commits.iter().rev() {
            tip = self.commit(Some(tip));
        }
        self.local.insert(branch.to_string(), tip);
    }
}

impl Vcs for MockVcs {
    fn git_dir(&self) -> Result<PathBuf> {
        Ok(PathBuf::from("/mock/.git"))
    }

    fn current_branch(&self) -> Result<Option<String>> {
        Ok(self.current.clone())
    }

    fn branch_exists(&self, branch: &str) -> Result<bool> {
        Ok(self.local.contains_key(branch))
    }

    fn remote_branch_exists(&self, remote: &str, branch: &str) -> Result<bool> {
        Ok(remote == "origin" && self.tracking.contains_key(branch))
    }

    fn rev_parse(&self, rev: &str) -> Result<String> {
        self.resolve(rev)
            .ok_or_else(|| Error::Git(format!("unknown revision {rev}")))
    }

    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        let ancestor = self.rev_parse(ancestor)?;
        let descendant = self.rev_parse(descendant)?;
        Ok(self.history(&descendant).contains(&ancestor))
    }

    fn checkout(&mut self, branch: &str) -> Result<()> {
        if !self.local.contains_key(branch) {
            return Err(Error::Git(format!("pathspec '{branch}' did not match")));
        }
        self.checkouts.push(branch.to_string());
        self.current = Some(branch.to_string());
        Ok(())
    }

    fn create_branch(&mut self, branch: &str, start: &str) -> Result<()> {
        if self.local.contains_key(branch) {
            return Err(Error::Git(format!("a branch named '{branch}' already exists")));
        }
        let tip = self.rev_parse(start)?;
        self.local.insert(branch.to_string(), tip);
        Ok(())
    }

    fn delete_branch(&mut self, branch: &str, _force: bool) -> Result<()> {
        if self.undeletable.contains(branch) {
            return Err(Error::Git(format!("unable to delete '{branch}': permission denied")));
        }
        if self.current.as_deref() == Some(branch) {
            return Err(Error::Git(format!("cannot delete checked out branch '{branch}'")));
        }
        if self.local.remove(branch).is_none() {
            return Err(Error::Git(format!("branch '{branch}' not found")));
        }
        self.deleted.push(branch.to_string());
        Ok(())
    }

    fn merge_branch(&mut self, branch: &str, squash: bool, _message: &str) -> Result<()> {
        let into = self
            .current
            .clone()
            .ok_or_else(|| Error::Git("detached HEAD".to_string()))?;
        let source = self.rev_parse(branch)?;
        let tip = self.local[&into].clone();
        self.merges.push(MergeCall {
            into: into.clone(),
            branch: branch.to_string(),
            squash,
        });

        let merged = if squash {
            self.commit(Some(tip))
        } else if self.history(&source).contains(&tip) {
            source
        } else {
            return Err(Error::Git("Not possible to fast-forward, aborting.".to_string()));
        };
        self.local.insert(into, merged);
        Ok(())
    }

    fn fetch(&mut self, _remote: &str) -> Result<()> {
        self.fetches += 1;
        if let Some(advance) = self.fetch_script.pop_front() {
            for branch in advance {
                self.advance_remote(&branch);
            }
        }
        self.tracking.clone_from(&self.remote);
        for branch in std::mem::take(&mut self.races) {
            self.advance_remote(&branch);
        }
        Ok(())
    }

    fn reset_to_remote(&mut self, _remote: &str, branch: &str) -> Result<()> {
        let tip = self
            .tracking
            .get(branch)
            .cloned()
            .ok_or_else(|| Error::Git(format!("origin/{branch} not found")))?;
        self.local.insert(branch.to_string(), tip);
        Ok(())
    }

    fn rebase_onto(&mut self, onto: &str, upstream: Option<&str>) -> Result<RebaseOutcome> {
        let branch = self
            .current
            .clone()
            .ok_or_else(|| Error::Git("detached HEAD".to_string()))?;
        self.rebases.push(RebaseCall {
            branch: branch.clone(),
            onto: onto.to_string(),
            upstream: upstream.map(String::from),
        });

        let onto_tip = self.rev_parse(onto)?;
        let cut = self.rev_parse(upstream.unwrap_or(onto))?;
        let excluded: HashSet<String> = self.history(&cut).into_iter().collect();
        let tip = self.local[&branch].clone();
        let own: Vec<String> = self
            .history(&tip)
            .into_iter()
            .take_while(|c| !excluded.contains(c))
            .collect();

        if let Some(files) = self.conflicts.remove(&branch) {
            self.paused = Some(PausedRebase {
                branch,
                onto: onto_tip,
                commits: own,
            });
            self.unresolved.clone_from(&files);
            return Ok(RebaseOutcome::Conflict(files));
        }

        self.replay(&branch, &onto_tip, &own);
        Ok(RebaseOutcome::Completed)
    }

    fn continue_rebase(&mut self) -> Result<RebaseOutcome> {
        let paused = self
            .paused
            .take()
            .ok_or_else(|| Error::Git("no rebase in progress".to_string()))?;
        self.replay(&paused.branch, &paused.onto, &paused.commits);
        self.current = Some(paused.branch);
        Ok(RebaseOutcome::Completed)
    }

    fn rebase_in_progress(&self) -> Result<bool> {
        Ok(self.paused.is_some())
    }

    fn conflicted_files(&self) -> Result<Vec<String>> {
        Ok(self.unresolved.clone())
    }

    fn push(&mut self, remote: &str, branch: &str, options: PushOptions) -> Result<()> {
        let tip = self
            .local
            .get(branch)
            .cloned()
            .ok_or_else(|| Error::Git(format!("src refspec {branch} does not match any")))?;
        self.pushes.push(PushCall {
            remote: remote.to_string(),
            branch: branch.to_string(),
            options,
        });

        let server = self.remote.get(branch).cloned();
        let rejected = match &server {
            None => false,
            Some(_) if options.force_with_lease => server != self.tracking.get(branch).cloned(),
            Some(server) => !self.history(&tip).contains(server),
        };
        if rejected {
            self.rejected_pushes.push(branch.to_string());
            return Err(Error::Git(format!(
                "failed to push some refs: {branch} (stale info)"
            )));
        }

        self.remote.insert(branch.to_string(), tip.clone());
        self.tracking.insert(branch.to_string(), tip);
        Ok(())
    }

    fn remotes(&self) -> Result<Vec<GitRemote>> {
        Ok(vec![GitRemote {
            name: "origin".to_string(),
            url: "git@github.com:test/repo.git".to_string(),
        }])
    }

    fn config_entries(&self, _prefix: &str) -> Result<Vec<(String, String)>> {
        Ok(Vec::new())
    }
}

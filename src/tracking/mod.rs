//! Stack metadata: which branches are tracked, their parents and review links.
//!
//! Metadata lives outside the commit history, keyed by branch name. The
//! [`MetadataStore`] trait is the only way engines read or write it; every
//! call is atomic on its own and there are no multi-call transactions.

mod storage;

pub use storage::{FileStore, load_tracking, resolve_git_dir, save_tracking, tracking_path};

use crate::conflict::ConflictCheckpoint;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current on-disk format version.
pub const TRACKING_VERSION: u32 = 1;

/// Git config prefix used by the legacy untyped metadata format.
pub const LEGACY_CONFIG_PREFIX: &str = "stack.branch.";

/// Metadata for a single tracked branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedBranch {
    /// Branch name (the map key on disk).
    #[serde(skip)]
    pub name: String,
    /// Parent branch. `None` means the branch is a root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Linked review request number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_id: Option<u64>,
    /// Frozen branches are never rebased or re-parented by the engines.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub frozen: bool,
}

impl TrackedBranch {
    /// Create a tracked branch with the given parent.
    pub fn new(name: impl Into<String>, parent: Option<String>) -> Self {
        Self {
            name: name.into(),
            parent: parent.filter(|p| !p.is_empty()),
            review_id: None,
            frozen: false,
        }
    }

    /// Builder-style review link.
    #[must_use]
    pub fn with_review(mut self, review_id: u64) -> Self {
        self.review_id = (review_id > 0).then_some(review_id);
        self
    }

    /// Builder-style frozen flag.
    #[must_use]
    pub const fn frozen(mut self, frozen: bool) -> Self {
        self.frozen = frozen;
        self
    }
}

/// Everything persisted by stak for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingState {
    /// Format version.
    #[serde(default)]
    pub version: u32,
    /// Tracked branches by name.
    #[serde(default)]
    pub branches: BTreeMap<String, TrackedBranch>,
    /// Paused rewrite awaiting `stak sync --continue`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<ConflictCheckpoint>,
    /// Branch -> old tip of its retired or folded parent, cut at on the next
    /// restack so commits that already landed are not replayed.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cut_points: BTreeMap<String, String>,
}

impl Default for TrackingState {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackingState {
    /// Create an empty state at the current version.
    pub const fn new() -> Self {
        Self {
            version: TRACKING_VERSION,
            branches: BTreeMap::new(),
            checkpoint: None,
            cut_points: BTreeMap::new(),
        }
    }

    /// Build a state from a list of branches.
    pub fn from_branches(branches: impl IntoIterator<Item = TrackedBranch>) -> Self {
        let mut state = Self::new();
        for branch in branches {
            state.track(branch);
        }
        state
    }

    /// Look up a branch.
    pub fn get(&self, name: &str) -> Option<&TrackedBranch> {
        self.branches.get(name)
    }

    /// Whether a branch is tracked.
    pub fn is_tracked(&self, name: &str) -> bool {
        self.branches.contains_key(name)
    }

    /// Insert or replace a branch.
    pub fn track(&mut self, branch: TrackedBranch) {
        self.branches.insert(branch.name.clone(), branch);
    }

    /// Remove a branch and any pending cut point, returning its metadata.
    pub fn untrack(&mut self, name: &str) -> Option<TrackedBranch> {
        self.cut_points.remove(name);
        self.branches.remove(name)
    }

    /// Record or clear the pending cut point of `name`.
    pub fn set_cut_point(&mut self, name: &str, commit: Option<String>) {
        match commit {
            Some(commit) => {
                self.cut_points.insert(name.to_string(), commit);
            }
            None => {
                self.cut_points.remove(name);
            }
        }
    }

    /// Names of all tracked branches, sorted.
    pub fn tracked_names(&self) -> Vec<&str> {
        self.branches.keys().map(String::as_str).collect()
    }

    /// Restore invariants after deserialization (map keys are the names).
    pub(crate) fn normalize(&mut self) {
        for (name, branch) in &mut self.branches {
            branch.name.clone_from(name);
            if branch.parent.as_deref() == Some("") {
                branch.parent = None;
            }
            if branch.review_id == Some(0) {
                branch.review_id = None;
            }
        }
        if self.version == 0 {
            self.version = TRACKING_VERSION;
        }
    }
}

/// Durable per-branch metadata store.
pub trait MetadataStore {
    /// Load a snapshot of all metadata.
    fn load(&self) -> Result<TrackingState>;

    /// Read one branch.
    fn get(&self, name: &str) -> Result<Option<TrackedBranch>> {
        Ok(self.load()?.get(name).cloned())
    }

    /// Insert or replace one branch.
    fn put(&mut self, branch: TrackedBranch) -> Result<()>;

    /// Delete one branch; returns whether it existed.
    fn remove(&mut self, name: &str) -> Result<bool>;

    /// Read the conflict checkpoint.
    fn checkpoint(&self) -> Result<Option<ConflictCheckpoint>> {
        Ok(self.load()?.checkpoint)
    }

    /// Write or clear the conflict checkpoint.
    fn set_checkpoint(&mut self, checkpoint: Option<ConflictCheckpoint>) -> Result<()>;

    /// Old base `name` must be cut at on its next restack.
    fn cut_point(&self, name: &str) -> Result<Option<String>> {
        Ok(self.load()?.cut_points.get(name).cloned())
    }

    /// Write or clear the cut point of `name`.
    fn set_cut_point(&mut self, name: &str, commit: Option<String>) -> Result<()>;
}

/// In-memory store, used by tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: TrackingState,
}

impl MemoryStore {
    /// Create a store holding `state`.
    pub const fn new(state: TrackingState) -> Self {
        Self { state }
    }

    /// Borrow the current state.
    pub const fn state(&self) -> &TrackingState {
        &self.state
    }
}

impl MetadataStore for MemoryStore {
    fn load(&self) -> Result<TrackingState> {
        Ok(self.state.clone())
    }

    fn put(&mut self, branch: TrackedBranch) -> Result<()> {
        self.state.track(branch);
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<bool> {
        Ok(self.state.untrack(name).is_some())
    }

    fn set_checkpoint(&mut self, checkpoint: Option<ConflictCheckpoint>) -> Result<()> {
        self.state.checkpoint = checkpoint;
        Ok(())
    }

    fn set_cut_point(&mut self, name: &str, commit: Option<String>) -> Result<()> {
        self.state.set_cut_point(name, commit);
        Ok(())
    }
}

/// Convert legacy `stack.branch.<name>.<field>` git config entries.
///
/// Branch names may contain dots, so the field is split off the right.
/// Unknown fields are ignored.
pub fn import_legacy_config(entries: &[(String, String)]) -> Result<TrackingState> {
    let mut state = TrackingState::new();

    for (key, value) in entries {
        let Some(rest) = key.strip_prefix(LEGACY_CONFIG_PREFIX) else {
            continue;
        };
        let Some((name, field)) = rest.rsplit_once('.') else {
            continue;
        };
        if name.is_empty() {
            continue;
        }

        let entry = state
            .branches
            .entry(name.to_string())
            .or_insert_with(|| TrackedBranch::new(name, None));
        let value = value.trim();

        match field {
            "parent" => entry.parent = (!value.is_empty()).then(|| value.to_string()),
            "pr-number" => {
                let number: u64 = value.parse().map_err(|_| {
                    Error::Tracking(format!("invalid PR number for branch {name}: {value}"))
                })?;
                entry.review_id = (number > 0).then_some(number);
            }
            "frozen" => entry.frozen = value == "true",
            _ => {}
        }
    }

    Ok(state)
}

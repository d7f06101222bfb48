//! Persistence for tracking state in `<git-dir>/stak/`.

use super::{MetadataStore, TRACKING_VERSION, TrackedBranch, TrackingState};
use crate::conflict::ConflictCheckpoint;
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name for stak metadata within the git dir.
const STAK_DIR: &str = "stak";

/// Filename for tracking state.
const TRACKING_FILE: &str = "stack.toml";

/// Resolve the git directory for a repository root, handling linked worktrees.
///
/// In a linked worktree `.git` is a plain file containing `gitdir: <path>`.
/// That per-worktree directory in turn has a `commondir` file pointing at the
/// shared repository, which is where metadata must live so every worktree
/// sees the same stacks.
///
/// Falls back to `<root>/.git` if resolution fails.
pub fn resolve_git_dir(repo_root: &Path) -> PathBuf {
    let dot_git = repo_root.join(".git");

    if !dot_git.is_file() {
        return dot_git;
    }

    let Ok(contents) = fs::read_to_string(&dot_git) else {
        return dot_git;
    };
    let Some(target) = contents.trim().strip_prefix("gitdir:") else {
        return dot_git;
    };

    let mut worktree_dir = PathBuf::from(target.trim());
    if worktree_dir.is_relative() {
        worktree_dir = repo_root.join(worktree_dir);
    }
    if !worktree_dir.is_dir() {
        // Pointer is dangling; return as-is to surface the error later
        return dot_git;
    }

    let common = worktree_dir.join("commondir");
    let resolved = match fs::read_to_string(&common) {
        Ok(rel) => {
            let rel = PathBuf::from(rel.trim());
            if rel.is_relative() {
                worktree_dir.join(rel)
            } else {
                rel
            }
        }
        Err(_) => worktree_dir,
    };

    fs::canonicalize(&resolved).unwrap_or(resolved)
}

/// Get path to the tracking state file.
pub fn tracking_path(git_dir: &Path) -> PathBuf {
    git_dir.join(STAK_DIR).join(TRACKING_FILE)
}

/// Load tracking state from disk.
///
/// Returns an empty `TrackingState` if the file doesn't exist.
pub fn load_tracking(git_dir: &Path) -> Result<TrackingState> {
    let path = tracking_path(git_dir);

    if !path.exists() {
        return Ok(TrackingState::new());
    }

    let content = fs::read_to_string(&path)
        .map_err(|e| Error::Tracking(format!("failed to read {}: {e}", path.display())))?;

    let mut state: TrackingState = toml::from_str(&content)
        .map_err(|e| Error::Tracking(format!("failed to parse {}: {e}", path.display())))?;

    if state.version > TRACKING_VERSION {
        return Err(Error::Tracking(format!(
            "{} was written by a newer stak (format version {}, supported {TRACKING_VERSION})",
            path.display(),
            state.version
        )));
    }

    state.normalize();
    Ok(state)
}

/// Save tracking state to disk.
///
/// Creates the `stak/` directory if needed. The file is written to a temporary
/// sibling and renamed into place so readers never see a partial write.
pub fn save_tracking(git_dir: &Path, state: &TrackingState) -> Result<()> {
    let path = tracking_path(git_dir);
    let Some(dir) = path.parent() else {
        return Err(Error::Internal(format!(
            "tracking path has no parent: {}",
            path.display()
        )));
    };

    if !dir.exists() {
        fs::create_dir_all(dir)
            .map_err(|e| Error::Tracking(format!("failed to create {}: {e}", dir.display())))?;
    }

    let mut state_to_save = state.clone();
    state_to_save.version = TRACKING_VERSION;

    let content = toml::to_string_pretty(&state_to_save)
        .map_err(|e| Error::Tracking(format!("failed to serialize tracking state: {e}")))?;

    let content_with_header = format!(
        "# stak stack metadata\n# Auto-generated - manual edits may be overwritten\n\n{content}"
    );

    let tmp = path.with_extension("toml.tmp");
    fs::write(&tmp, content_with_header)
        .map_err(|e| Error::Tracking(format!("failed to write {}: {e}", tmp.display())))?;
    fs::rename(&tmp, &path)
        .map_err(|e| Error::Tracking(format!("failed to replace {}: {e}", path.display())))?;

    debug!(path = %path.display(), branches = state.branches.len(), "saved tracking state");
    Ok(())
}

/// Metadata store backed by `<git-dir>/stak/stack.toml`.
#[derive(Debug, Clone)]
pub struct FileStore {
    git_dir: PathBuf,
}

impl FileStore {
    /// Store rooted at an already-resolved git dir.
    pub fn new(git_dir: impl Into<PathBuf>) -> Self {
        Self {
            git_dir: git_dir.into(),
        }
    }

    /// Store for the repository whose working tree is at `repo_root`.
    pub fn for_repo(repo_root: &Path) -> Self {
        Self::new(resolve_git_dir(repo_root))
    }

    /// Whether the metadata file exists yet.
    pub fn exists(&self) -> bool {
        tracking_path(&self.git_dir).exists()
    }

    /// Path of the metadata file.
    pub fn path(&self) -> PathBuf {
        tracking_path(&self.git_dir)
    }

    /// Replace the whole state (used by migration).
    pub fn save(&self, state: &TrackingState) -> Result<()> {
        save_tracking(&self.git_dir, state)
    }

    fn update(&self, f: impl FnOnce(&mut TrackingState)) -> Result<()> {
        let mut state = load_tracking(&self.git_dir)?;
        f(&mut state);
        save_tracking(&self.git_dir, &state)
    }
}

impl MetadataStore for FileStore {
    fn load(&self) -> Result<TrackingState> {
        load_tracking(&self.git_dir)
    }

    fn put(&mut self, branch: TrackedBranch) -> Result<()> {
        self.update(|state| state.track(branch))
    }

    fn remove(&mut self, name: &str) -> Result<bool> {
        let mut state = load_tracking(&self.git_dir)?;
        if state.untrack(name).is_none() {
            return Ok(false);
        }
        save_tracking(&self.git_dir, &state)?;
        Ok(true)
    }

    fn set_checkpoint(&mut self, checkpoint: Option<ConflictCheckpoint>) -> Result<()> {
        self.update(|state| state.checkpoint = checkpoint)
    }

    fn set_cut_point(&mut self, name: &str, commit: Option<String>) -> Result<()> {
        self.update(|state| state.set_cut_point(name, commit))
    }
}

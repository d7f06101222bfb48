//! Conflict checkpoint and the continue protocol
//!
//! When a rebase stops on conflicts, the engine persists a
//! [`ConflictCheckpoint`] and the invocation ends. `continue` finishes that
//! single rewrite and force-pushes it; it never resumes the rest of the
//! original plan. Re-running sync or merge picks up the remaining branches.

use crate::engine::publish;
use crate::error::{Error, Result};
use crate::progress::ProgressCallback;
use crate::tracking::MetadataStore;
use crate::vcs::{RebaseOutcome, Vcs};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Which operation paused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewriteOperation {
    /// `stak sync`
    Sync,
    /// `stak merge`
    Merge,
    /// `stak move`
    Move,
    /// `stak fold`
    Fold,
}

impl RewriteOperation {
    /// Command that picks up the branches a pause left behind.
    ///
    /// Move and fold only rewrite one level; sync handles the rest.
    pub const fn resume_command(self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Sync | Self::Move | Self::Fold => "sync",
        }
    }
}

impl std::fmt::Display for RewriteOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sync => write!(f, "sync"),
            Self::Merge => write!(f, "merge"),
            Self::Move => write!(f, "move"),
            Self::Fold => write!(f, "fold"),
        }
    }
}

/// A rewrite paused on conflicts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictCheckpoint {
    /// Branch being rebased
    pub branch: String,
    /// Rebase target
    pub onto: String,
    /// Old base passed to `--onto`, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<String>,
    /// Operation that was running
    pub operation: RewriteOperation,
    /// When the pause happened
    pub started_at: DateTime<Utc>,
}

impl ConflictCheckpoint {
    /// Checkpoint stamped with the current time.
    pub fn new(
        branch: impl Into<String>,
        onto: impl Into<String>,
        upstream: Option<String>,
        operation: RewriteOperation,
    ) -> Self {
        Self {
            branch: branch.into(),
            onto: onto.into(),
            upstream,
            operation,
            started_at: Utc::now(),
        }
    }
}

/// State of the conflict protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolState {
    /// No rewrite is paused
    Running,
    /// A rebase is paused in the working copy
    Paused {
        /// Persisted checkpoint; `None` if the rebase was started outside stak
        checkpoint: Option<ConflictCheckpoint>,
    },
}

/// Where the protocol currently stands.
pub fn protocol_state(vcs: &dyn Vcs, store: &dyn MetadataStore) -> Result<ProtocolState> {
    if vcs.rebase_in_progress()? {
        Ok(ProtocolState::Paused {
            checkpoint: store.checkpoint()?,
        })
    } else {
        Ok(ProtocolState::Running)
    }
}

/// Outcome of a successful continue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinueReport {
    /// Branch whose rewrite was finished and pushed
    pub branch: String,
    /// Operation to re-run for the remaining branches
    pub operation: Option<RewriteOperation>,
}

/// Finish a paused rewrite after the user resolved and staged conflicts.
///
/// Only git and the metadata store are involved, so recovery works without
/// review-hosting credentials.
pub async fn continue_after_conflict(
    vcs: &mut dyn Vcs,
    store: &mut dyn MetadataStore,
    remote: &str,
    progress: &dyn ProgressCallback,
) -> Result<ContinueReport> {
    let checkpoint = store.checkpoint()?;

    if !vcs.rebase_in_progress()? {
        if let Some(stale) = checkpoint {
            warn!(branch = %stale.branch, "clearing checkpoint without a paused rebase");
            store.set_checkpoint(None)?;
        }
        return Err(Error::NothingToContinue);
    }

    let files = vcs.conflicted_files()?;
    if !files.is_empty() {
        return Err(Error::UnresolvedConflicts { files });
    }

    progress.on_message("Continuing rebase").await;
    match vcs.continue_rebase()? {
        RebaseOutcome::Conflict(files) => {
            let (branch, onto) = checkpoint.map_or_else(
                || ("HEAD".to_string(), "(unknown)".to_string()),
                |c| (c.branch, c.onto),
            );
            Err(Error::RebaseConflict {
                branch,
                onto,
                files,
            })
        }
        RebaseOutcome::Completed => {
            let branch = match &checkpoint {
                Some(c) => c.branch.clone(),
                None => vcs.current_branch()?.ok_or_else(|| {
                    Error::Internal("rebase finished on a detached HEAD".to_string())
                })?,
            };

            // The finished rebase consumed the cut point
            store.set_cut_point(&branch, None)?;
            publish(vcs, remote, progress, &branch).await?;
            store.set_checkpoint(None)?;
            info!(branch = %branch, "finished paused rebase");

            Ok(ContinueReport {
                branch,
                operation: checkpoint.map(|c| c.operation),
            })
        }
    }
}

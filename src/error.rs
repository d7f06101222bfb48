//! Error types for stak

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Broad class of an error, used to pick the exit status and retry guidance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Nothing was mutated; fix the precondition and retry
    Precondition,
    /// A rewrite is paused on conflicts; resolve and run `stak sync --continue`
    Conflict,
    /// Unretryable condition that needs human judgement
    Fatal,
    /// A collaborator (git, hosting API, filesystem) failed
    Infrastructure,
}

/// Errors produced by stak
#[derive(Debug, Error)]
pub enum Error {
    /// Branch has no stack metadata
    #[error("branch '{0}' is not tracked; run 'stak track {0}' first")]
    BranchNotTracked(String),

    /// Branch already has stack metadata
    #[error("branch '{0}' is already tracked")]
    AlreadyTracked(String),

    /// Branch does not exist in the repository
    #[error("branch '{0}' does not exist")]
    BranchNotFound(String),

    /// Branch name is already taken
    #[error("branch '{0}' already exists")]
    BranchExists(String),

    /// Branch sits directly on a base, or is a root
    #[error("branch '{0}' has no tracked parent to fold into")]
    NoParent(String),

    /// Branch does not sit on top of its parent's current tip
    #[error("'{branch}' is not on top of '{parent}'; run 'stak sync' first")]
    NotStacked {
        /// Branch being folded
        branch: String,
        /// Its parent
        parent: String,
    },

    /// Branch is frozen and must not be rewritten or re-parented
    #[error("branch '{0}' is frozen; run 'stak unfreeze {0}' to allow changes")]
    BranchFrozen(String),

    /// Proposed parent would make the stack cyclic
    #[error("cannot set parent of '{branch}' to '{parent}': would create a cycle")]
    WouldCycle {
        /// Branch being re-parented
        branch: String,
        /// Proposed parent
        parent: String,
    },

    /// Stored metadata already contains a cycle
    #[error("stack metadata is corrupt: parent chain loops through '{0}'")]
    CorruptCycle(String),

    /// Branch has no linked review request
    #[error("branch '{0}' has no review request; run 'stak pr' first")]
    NoReviewRequest(String),

    /// Review request lacks approval
    #[error("PR #{number} ({branch}) is not approved")]
    NotApproved {
        /// Branch name
        branch: String,
        /// Review request number
        number: u64,
    },

    /// Review request checks are failing or still running
    #[error("PR #{number} ({branch}) has failing or pending checks")]
    ChecksFailing {
        /// Branch name
        branch: String,
        /// Review request number
        number: u64,
    },

    /// Review request cannot be landed for another definitive reason
    #[error("PR #{number} ({branch}) cannot be merged: {}", reasons.join(", "))]
    MergeBlocked {
        /// Branch name
        branch: String,
        /// Review request number
        number: u64,
        /// Blocking reasons reported by the platform
        reasons: Vec<String>,
    },

    /// Review request was closed without being merged
    #[error("PR #{number} ({branch}) was closed without merging")]
    ReviewClosed {
        /// Branch name
        branch: String,
        /// Review request number
        number: u64,
    },

    /// Platform accepted the merge call but did not merge
    #[error("failed to merge PR #{number}: {message}")]
    MergeFailed {
        /// Review request number
        number: u64,
        /// Message from the platform
        message: String,
    },

    /// A rebase stopped on textual conflicts
    #[error("rebase of '{branch}' onto '{onto}' stopped on conflicts in: {}", files.join(", "))]
    RebaseConflict {
        /// Branch being rebased
        branch: String,
        /// Rebase target
        onto: String,
        /// Conflicted paths
        files: Vec<String>,
    },

    /// `continue` was called while conflicts remain
    #[error("conflicts are still unresolved in: {}", files.join(", "))]
    UnresolvedConflicts {
        /// Paths that still carry conflicts
        files: Vec<String>,
    },

    /// `continue` was called with no paused rewrite
    #[error("no rebase in progress; nothing to continue")]
    NothingToContinue,

    /// A new operation was started while a rewrite is paused
    #[error("a rebase is already in progress; resolve it and run 'stak sync --continue'")]
    RebaseInProgress,

    /// Git command failure
    #[error("git error: {0}")]
    Git(String),

    /// Tracking metadata could not be read or written
    #[error("tracking error: {0}")]
    Tracking(String),

    /// Configuration file error
    #[error("config error: {0}")]
    Config(String),

    /// Requested remote does not exist
    #[error("remote '{0}' not found")]
    RemoteNotFound(String),

    /// No remote points at a supported platform
    #[error("no supported remotes found (GitHub or GitLab)")]
    NoSupportedRemotes,

    /// Authentication failure
    #[error("authentication error: {0}")]
    Auth(String),

    /// GitHub API failure
    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    /// GitLab API failure
    #[error("GitLab API error: {0}")]
    GitLabApi(String),

    /// Generic platform failure
    #[error("platform error: {0}")]
    Platform(String),

    /// Internal invariant violation
    #[error("internal error: {0}")]
    Internal(String),

    /// IO failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify this error
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::BranchNotTracked(_)
            | Self::AlreadyTracked(_)
            | Self::BranchNotFound(_)
            | Self::BranchExists(_)
            | Self::NoParent(_)
            | Self::NotStacked { .. }
            | Self::BranchFrozen(_)
            | Self::WouldCycle { .. }
            | Self::NoReviewRequest(_)
            | Self::NotApproved { .. }
            | Self::ChecksFailing { .. }
            | Self::MergeBlocked { .. }
            | Self::RebaseInProgress
            | Self::RemoteNotFound(_)
            | Self::NoSupportedRemotes
            | Self::Auth(_) => ErrorCategory::Precondition,
            Self::RebaseConflict { .. } | Self::UnresolvedConflicts { .. } => {
                ErrorCategory::Conflict
            }
            Self::CorruptCycle(_)
            | Self::ReviewClosed { .. }
            | Self::MergeFailed { .. }
            | Self::NothingToContinue
            | Self::Internal(_) => ErrorCategory::Fatal,
            Self::Git(_)
            | Self::Tracking(_)
            | Self::Config(_)
            | Self::GitHubApi(_)
            | Self::GitLabApi(_)
            | Self::Platform(_)
            | Self::Io(_) => ErrorCategory::Infrastructure,
        }
    }

    /// Process exit status for this error
    pub const fn exit_code(&self) -> u8 {
        match self.category() {
            ErrorCategory::Conflict => 2,
            _ => 1,
        }
    }
}

impl From<octocrab::Error> for Error {
    fn from(err: octocrab::Error) -> Self {
        Self::GitHubApi(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Platform(err.to_string())
    }
}

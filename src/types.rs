//! Core types for stak

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A pull request / merge request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    /// PR/MR number
    pub number: u64,
    /// Web URL for the PR/MR
    pub html_url: String,
    /// Base branch name
    pub base_ref: String,
    /// Head branch name
    pub head_ref: String,
    /// PR/MR title
    pub title: String,
    /// Whether PR is a draft
    pub is_draft: bool,
}

/// A comment on a pull request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrComment {
    /// Comment ID
    pub id: u64,
    /// Comment body text
    pub body: String,
}

/// A git remote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitRemote {
    /// Remote name (e.g., "origin")
    pub name: String,
    /// Remote URL
    pub url: String,
}

/// Detected platform type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    /// GitHub or GitHub Enterprise
    GitHub,
    /// GitLab or self-hosted GitLab
    GitLab,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GitHub => write!(f, "GitHub"),
            Self::GitLab => write!(f, "GitLab"),
        }
    }
}

/// Platform configuration
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Platform type
    pub platform: Platform,
    /// Repository owner (user, organization, or GitLab group path)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Custom host (None for github.com/gitlab.com)
    pub host: Option<String>,
}

// =============================================================================
// Review state and landing
// =============================================================================

/// PR state (open, closed, merged)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrState {
    /// PR is open and can be merged
    Open,
    /// PR was closed without merging
    Closed,
    /// PR was merged
    Merged,
}

impl std::fmt::Display for PrState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Merged => write!(f, "merged"),
        }
    }
}

/// Extended PR details
///
/// Carries the state needed by reconciliation and landing, plus the body used
/// as the squash commit message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestDetails {
    /// PR/MR number
    pub number: u64,
    /// PR/MR title
    pub title: String,
    /// PR/MR body/description
    pub body: Option<String>,
    /// Current state of the PR
    pub state: PrState,
    /// Whether PR is a draft
    pub is_draft: bool,
    /// Whether PR can be merged (no conflicts)
    pub mergeable: Option<bool>,
    /// Head branch name
    pub head_ref: String,
    /// Base branch name
    pub base_ref: String,
    /// Web URL for the PR/MR
    pub html_url: String,
}

/// Merge readiness check result
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct MergeReadiness {
    /// Whether the PR has been approved by reviewers
    pub is_approved: bool,
    /// Whether CI checks have passed
    pub ci_passed: bool,
    /// Whether the PR can be merged (no conflicts)
    /// - `Some(true)` = mergeable
    /// - `Some(false)` = has conflicts
    /// - `None` = unknown (GitHub still computing)
    pub is_mergeable: Option<bool>,
    /// Whether the PR is a draft
    pub is_draft: bool,
    /// Human-readable reasons why the PR cannot be merged (definitive blockers)
    pub blocking_reasons: Vec<String>,
    /// Reasons why merge status is uncertain (unknown states, not definitive blockers)
    pub uncertainties: Vec<String>,
}

impl MergeReadiness {
    /// Check if there are definitive blockers preventing merge.
    ///
    /// Returns `true` if the PR definitely cannot be merged:
    /// - Not approved
    /// - CI failing
    /// - Is a draft
    /// - Has confirmed merge conflicts (`is_mergeable == Some(false)`)
    pub const fn is_blocked(&self) -> bool {
        !self.is_approved
            || !self.ci_passed
            || self.is_draft
            || matches!(self.is_mergeable, Some(false))
    }

    /// Returns the first uncertainty reason, if any.
    pub fn uncertainty(&self) -> Option<&str> {
        self.uncertainties.first().map(String::as_str)
    }
}

/// Result of a merge operation
#[derive(Debug, Clone)]
pub struct MergeResult {
    /// Whether the merge was successful
    pub merged: bool,
    /// The SHA of the merge commit (if successful)
    pub sha: Option<String>,
    /// Message from the merge operation (especially on failure)
    pub message: Option<String>,
}

/// Merge strategy/method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    /// Squash all commits into one
    #[default]
    Squash,
    /// Create a merge commit
    Merge,
    /// Rebase commits onto base branch
    Rebase,
}

impl std::fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Squash => write!(f, "squash"),
            Self::Merge => write!(f, "merge"),
            Self::Rebase => write!(f, "rebase"),
        }
    }
}

impl FromStr for MergeMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "squash" => Ok(Self::Squash),
            "merge" => Ok(Self::Merge),
            "rebase" => Ok(Self::Rebase),
            other => Err(format!(
                "unknown merge method '{other}' (expected squash, merge, or rebase)"
            )),
        }
    }
}

//! Merge planning - pure functions for creating merge plans
//!
//! No I/O happens here. The whole chain is validated before anything is
//! landed, so a precondition failure leaves the repository untouched.

use crate::error::{Error, Result};
use crate::types::{MergeMethod, MergeReadiness, PrState, PullRequestDetails};

/// Review request state gathered for one branch
#[derive(Debug, Clone)]
pub struct ReviewInfo {
    /// Full PR details including title, body, state
    pub details: PullRequestDetails,
    /// Readiness check results; only gathered for open requests
    pub readiness: Option<MergeReadiness>,
}

/// One branch of the chain to land, as gathered by the caller
#[derive(Debug, Clone)]
pub struct MergeCandidate {
    /// Branch name
    pub branch: String,
    /// Its parent at gather time
    pub parent: Option<String>,
    /// Whether the branch itself is frozen
    pub frozen: bool,
    /// Tracked children that are frozen
    pub frozen_children: Vec<String>,
    /// Linked review request, if any
    pub review: Option<ReviewInfo>,
}

/// Confidence level for a merge attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeConfidence {
    /// All conditions verified - merge should succeed
    Certain,
    /// Some conditions unknown - merge may fail
    Uncertain(String),
}

/// A single step in the merge plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeStep {
    /// Land this review request, then restack its children
    Land {
        /// Branch name
        branch: String,
        /// PR number
        pr_number: u64,
        /// PR title (for display)
        pr_title: String,
        /// Merge method to use
        method: MergeMethod,
        /// Confidence level for this merge
        confidence: MergeConfidence,
    },
    /// Already landed elsewhere; only retire the branch and restack children
    AlreadyLanded {
        /// Branch name
        branch: String,
        /// PR number
        pr_number: u64,
    },
}

impl MergeStep {
    /// Get the branch name for this step
    pub fn branch(&self) -> &str {
        match self {
            Self::Land { branch, .. } | Self::AlreadyLanded { branch, .. } => branch,
        }
    }

    /// Review request number for this step
    pub const fn pr_number(&self) -> u64 {
        match self {
            Self::Land { pr_number, .. } | Self::AlreadyLanded { pr_number, .. } => *pr_number,
        }
    }
}

impl std::fmt::Display for MergeStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Land {
                pr_number,
                pr_title,
                method,
                confidence,
                ..
            } => {
                let prefix = match confidence {
                    MergeConfidence::Certain => "merge",
                    MergeConfidence::Uncertain(_) => "merge (uncertain)",
                };
                write!(f, "{prefix} PR #{pr_number} ({method}): {pr_title}")
            }
            Self::AlreadyLanded { branch, pr_number } => {
                write!(f, "PR #{pr_number} ({branch}) already merged; clean up")
            }
        }
    }
}

/// Options for merge planning
#[derive(Debug, Clone, Copy, Default)]
pub struct MergePlanOptions {
    /// Strategy passed through to the hosting platform
    pub method: MergeMethod,
    /// Do not require approval and passing checks
    pub skip_checks: bool,
}

/// Merge plan - the functional core output
///
/// Created by `create_merge_plan()` (pure) and executed by
/// `execute_merge()` (effectful). Steps are in landing order.
#[derive(Debug, Clone, Default)]
pub struct MergePlan {
    /// Ordered steps, root first
    pub steps: Vec<MergeStep>,
}

impl MergePlan {
    /// Check if the plan has no steps
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Count review requests that will actually be landed
    #[must_use]
    pub fn land_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, MergeStep::Land { .. }))
            .count()
    }
}

/// Create a merge plan (PURE - no I/O, easily testable)
///
/// `chain` must be in root-to-leaf order. The first candidate that fails a
/// precondition aborts planning with that error.
pub fn create_merge_plan(
    chain: &[MergeCandidate],
    options: &MergePlanOptions,
) -> Result<MergePlan> {
    let mut steps = Vec::with_capacity(chain.len());

    for candidate in chain {
        steps.push(plan_step(candidate, options)?);
    }

    Ok(MergePlan { steps })
}

fn plan_step(candidate: &MergeCandidate, options: &MergePlanOptions) -> Result<MergeStep> {
    let branch = &candidate.branch;
    let Some(review) = &candidate.review else {
        return Err(Error::NoReviewRequest(branch.clone()));
    };
    let number = review.details.number;

    match review.details.state {
        PrState::Closed => {
            return Err(Error::ReviewClosed {
                branch: branch.clone(),
                number,
            });
        }
        PrState::Merged | PrState::Open => {}
    }

    // Landing re-parents children, which a frozen child forbids
    if candidate.frozen {
        return Err(Error::BranchFrozen(branch.clone()));
    }
    if let Some(child) = candidate.frozen_children.first() {
        return Err(Error::BranchFrozen(child.clone()));
    }

    if review.details.state == PrState::Merged {
        return Ok(MergeStep::AlreadyLanded {
            branch: branch.clone(),
            pr_number: number,
        });
    }

    let readiness = review.readiness.as_ref().ok_or_else(|| {
        Error::Internal(format!("merge readiness for PR #{number} was not gathered"))
    })?;

    if !options.skip_checks {
        if !readiness.is_approved {
            return Err(Error::NotApproved {
                branch: branch.clone(),
                number,
            });
        }
        if !readiness.ci_passed {
            return Err(Error::ChecksFailing {
                branch: branch.clone(),
                number,
            });
        }
    }

    let mut reasons = Vec::new();
    if readiness.is_draft || review.details.is_draft {
        reasons.push("PR is a draft".to_string());
    }
    if readiness.is_mergeable == Some(false) {
        reasons.push("PR has merge conflicts".to_string());
    }
    if !reasons.is_empty() {
        return Err(Error::MergeBlocked {
            branch: branch.clone(),
            number,
            reasons,
        });
    }

    let confidence = readiness
        .uncertainty()
        .map_or(MergeConfidence::Certain, |reason| {
            MergeConfidence::Uncertain(reason.to_string())
        });

    Ok(MergeStep::Land {
        branch: branch.clone(),
        pr_number: number,
        pr_title: review.details.title.clone(),
        method: options.method,
        confidence,
    })
}

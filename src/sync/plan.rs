//! Sync planning - pure functions
//!
//! The plan is a topological sort over parent edges, so a parent is always
//! handled before its children. Every tracked branch appears exactly once.

use crate::stack::Forest;
use std::collections::{BTreeSet, HashMap, VecDeque};

/// Why a branch will not be synced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Excluded from mutation
    Frozen,
    /// Tracked but absent from the repository
    MissingLocal,
    /// Its parent is missing, skipped, or failed
    UnmetDependency {
        /// The parent that could not be used
        parent: String,
    },
    /// Part of a parent loop in stored metadata
    Cycle,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Frozen => write!(f, "frozen"),
            Self::MissingLocal => write!(f, "branch does not exist locally"),
            Self::UnmetDependency { parent } => write!(f, "parent {parent} is unavailable"),
            Self::Cycle => write!(f, "parent chain forms a cycle"),
        }
    }
}

/// One branch's planned action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStep {
    /// Rebase onto the parent's latest state and push
    Restack {
        /// Branch to restack
        branch: String,
        /// Its parent
        parent: String,
    },
    /// No parent; nothing to rebase onto
    Trivial {
        /// Root branch
        branch: String,
    },
    /// Left alone
    Skip {
        /// Skipped branch
        branch: String,
        /// Why
        reason: SkipReason,
    },
}

impl SyncStep {
    /// Branch this step is about
    pub fn branch(&self) -> &str {
        match self {
            Self::Restack { branch, .. } | Self::Trivial { branch } | Self::Skip { branch, .. } => {
                branch
            }
        }
    }
}

impl std::fmt::Display for SyncStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Restack { branch, parent } => write!(f, "restack {branch} onto {parent}"),
            Self::Trivial { branch } => write!(f, "{branch} has no parent"),
            Self::Skip { branch, reason } => write!(f, "skip {branch}: {reason}"),
        }
    }
}

/// Ordered sync steps
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Parents before children
    pub steps: Vec<SyncStep>,
}

impl SyncPlan {
    /// Whether nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of branches that will be restacked
    pub fn restack_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, SyncStep::Restack { .. }))
            .count()
    }
}

/// Create the sync plan (PURE)
///
/// `available` holds every branch that exists locally, tracked or not.
#[must_use]
pub fn create_sync_plan(forest: &Forest, available: &BTreeSet<String>) -> SyncPlan {
    let mut steps = Vec::with_capacity(forest.len());
    let mut blocked: HashMap<String, bool> = HashMap::new();

    // Entry points: tracked branches whose parent is absent or untracked
    let mut queue: VecDeque<String> = forest.roots().into_iter().map(String::from).collect();

    while let Some(branch) = queue.pop_front() {
        let Some(tracked) = forest.get(&branch) else {
            continue;
        };

        let step = match tracked.parent.as_deref() {
            _ if !available.contains(&branch) => Some(SkipReason::MissingLocal),
            _ if tracked.frozen => Some(SkipReason::Frozen),
            None => None,
            Some(parent) => {
                let parent_unusable = if forest.is_tracked(parent) {
                    blocked.get(parent).copied().unwrap_or(true)
                } else {
                    !available.contains(parent)
                };
                parent_unusable.then(|| SkipReason::UnmetDependency {
                    parent: parent.to_string(),
                })
            }
        }
        .map_or_else(
            || match tracked.parent.clone() {
                Some(parent) => SyncStep::Restack {
                    branch: branch.clone(),
                    parent,
                },
                None => SyncStep::Trivial {
                    branch: branch.clone(),
                },
            },
            |reason| SyncStep::Skip {
                branch: branch.clone(),
                reason,
            },
        );

        // A frozen branch still exists and can serve as a base for its children
        let unusable = matches!(
            step,
            SyncStep::Skip {
                reason: SkipReason::MissingLocal | SkipReason::UnmetDependency { .. },
                ..
            }
        );
        blocked.insert(branch.clone(), unusable);
        steps.push(step);

        for child in forest.children(&branch) {
            if forest.is_tracked(child) {
                queue.push_back(child.clone());
            }
        }
    }

    // Anything unreached sits on a parent loop
    for tracked in forest.branches() {
        if !blocked.contains_key(&tracked.name) {
            steps.push(SyncStep::Skip {
                branch: tracked.name.clone(),
                reason: SkipReason::Cycle,
            });
        }
    }

    SyncPlan { steps }
}

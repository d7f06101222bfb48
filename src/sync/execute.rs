//! Sync execution - effectful operations

use super::plan::{SkipReason, SyncPlan, SyncStep, create_sync_plan};
use super::reconcile::{ReconcileReport, reconcile_landed};
use crate::comments::update_stack_comments;
use crate::conflict::RewriteOperation;
use crate::engine::{
    ConflictPause, EngineContext, RestackOutcome, restack_branch, return_to_branch,
};
use crate::error::{Error, Result};
use crate::stack::Forest;
use crate::tracking::MetadataStore;
use crate::vcs::Vcs;
use std::collections::{BTreeSet, HashSet};
use tracing::{info, warn};

/// Sync options
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// Refresh the stack comment on every linked review request
    pub stack_comments: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            stack_comments: true,
        }
    }
}

/// What happened to one branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchOutcome {
    /// Up to date with its parent and pushed
    Synced {
        /// Whether a rebase was needed
        rebased: bool,
    },
    /// Not touched
    Skipped(SkipReason),
    /// Rebase or push failed for a reason other than conflicts
    Failed(String),
    /// Rebase stopped on conflicts
    Paused(ConflictPause),
    /// Never reached because an earlier branch paused
    Pending,
}

/// Result of a sync run
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Reconciliation results
    pub reconcile: ReconcileReport,
    /// Per-branch outcomes in plan order
    pub outcomes: Vec<(String, BranchOutcome)>,
    /// Branch checked out at the end
    pub returned_to: Option<String>,
}

impl SyncReport {
    /// The conflict pause, if the run stopped on one
    pub fn paused(&self) -> Option<&ConflictPause> {
        self.outcomes.iter().find_map(|(_, o)| match o {
            BranchOutcome::Paused(pause) => Some(pause),
            _ => None,
        })
    }

    /// Number of branches that needed a rebase
    pub fn rebased_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, BranchOutcome::Synced { rebased: true }))
            .count()
    }

    /// Branches that failed outright
    pub fn failures(&self) -> Vec<(&str, &str)> {
        self.outcomes
            .iter()
            .filter_map(|(b, o)| match o {
                BranchOutcome::Failed(msg) => Some((b.as_str(), msg.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Whether every branch was synced or deliberately skipped
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|(_, o)| {
            matches!(o, BranchOutcome::Synced { .. } | BranchOutcome::Skipped(SkipReason::Frozen))
        })
    }
}

/// Locally existing branches among the tracked set and its bases.
fn available_branches(vcs: &dyn Vcs, forest: &Forest) -> Result<BTreeSet<String>> {
    let mut available = BTreeSet::new();
    let candidates = forest
        .branches()
        .map(|b| b.name.clone())
        .chain(forest.bases());
    for name in candidates {
        if vcs.branch_exists(&name)? {
            available.insert(name);
        }
    }
    Ok(available)
}

/// Plan a sync against the current local state without mutating anything.
pub fn preview_sync(vcs: &dyn Vcs, store: &dyn MetadataStore) -> Result<SyncPlan> {
    let forest = Forest::load(store)?;
    let available = available_branches(vcs, &forest)?;
    Ok(create_sync_plan(&forest, &available))
}

/// Fetch, reconcile landed branches, and restack every tracked branch.
pub async fn run_sync(ctx: &mut EngineContext<'_>, options: SyncOptions) -> Result<SyncReport> {
    if ctx.vcs.rebase_in_progress()? {
        return Err(Error::RebaseInProgress);
    }
    if let Some(stale) = ctx.store.checkpoint()? {
        warn!(branch = %stale.branch, "clearing stale conflict checkpoint");
        ctx.store.set_checkpoint(None)?;
    }

    let start = ctx.vcs.current_branch()?;

    ctx.progress
        .on_message(&format!("Fetching {}", ctx.remote))
        .await;
    ctx.vcs.fetch(ctx.remote)?;

    let forest = Forest::load(&*ctx.store)?;
    let bases = forest.bases();
    for base in &bases {
        if ctx.vcs.remote_branch_exists(ctx.remote, base)? && ctx.vcs.branch_exists(base)? {
            ctx.vcs.reset_to_remote(ctx.remote, base)?;
            ctx.progress
                .on_message(&format!("Updated {base} to {}/{base}", ctx.remote))
                .await;
        } else {
            ctx.progress
                .on_warning(&format!(
                    "{base} has no counterpart on {}; using the local branch",
                    ctx.remote
                ))
                .await;
        }
    }

    // Nearest surviving ancestor of the start branch, then its base
    let mut fallbacks: Vec<String> = Vec::new();
    let mut home_base = None;
    if let Some(start) = &start {
        fallbacks.extend(forest.ancestors(start).unwrap_or_default().into_iter().rev());
        home_base = forest.base_of(start).unwrap_or_default();
    }
    let fallback = home_base
        .or_else(|| bases.first().cloned())
        .or_else(|| start.clone())
        .unwrap_or_default();
    fallbacks.push(fallback.clone());
    fallbacks.extend(bases.iter().cloned());

    let reconcile = reconcile_landed(ctx, &fallback).await?;

    let forest = Forest::load(&*ctx.store)?;
    let available = available_branches(&*ctx.vcs, &forest)?;
    let plan = create_sync_plan(&forest, &available);
    info!(steps = plan.steps.len(), restacks = plan.restack_count(), "sync plan");

    let mut report = SyncReport {
        reconcile,
        ..SyncReport::default()
    };
    let mut unusable: HashSet<String> = HashSet::new();
    let mut paused = false;

    for step in &plan.steps {
        let branch = step.branch().to_string();
        if paused {
            report.outcomes.push((branch, BranchOutcome::Pending));
            continue;
        }

        let outcome = match step {
            SyncStep::Skip { reason, .. } => {
                if !matches!(reason, SkipReason::Frozen) {
                    unusable.insert(branch.clone());
                }
                ctx.progress
                    .on_message(&format!("Skipping {branch}: {reason}"))
                    .await;
                BranchOutcome::Skipped(reason.clone())
            }
            SyncStep::Trivial { .. } => BranchOutcome::Synced { rebased: false },
            SyncStep::Restack { parent, .. } if unusable.contains(parent) => {
                unusable.insert(branch.clone());
                let reason = SkipReason::UnmetDependency {
                    parent: parent.clone(),
                };
                ctx.progress
                    .on_message(&format!("Skipping {branch}: {reason}"))
                    .await;
                BranchOutcome::Skipped(reason)
            }
            SyncStep::Restack { parent, .. } => {
                match restack_branch(ctx, &branch, parent, RewriteOperation::Sync).await {
                    Ok(RestackOutcome::UpToDate) => BranchOutcome::Synced { rebased: false },
                    Ok(RestackOutcome::Rebased) => BranchOutcome::Synced { rebased: true },
                    Ok(RestackOutcome::Paused(pause)) => {
                        paused = true;
                        BranchOutcome::Paused(pause)
                    }
                    Err(e) => {
                        warn!(branch = %branch, error = %e, "sync failed");
                        ctx.progress
                            .on_warning(&format!("Failed to sync {branch}: {e}"))
                            .await;
                        unusable.insert(branch.clone());
                        BranchOutcome::Failed(e.to_string())
                    }
                }
            }
        };
        report.outcomes.push((branch, outcome));
    }

    // A paused rebase keeps the conflicted branch checked out
    if !paused {
        let candidates = start
            .iter()
            .chain(fallbacks.iter())
            .map(String::as_str);
        report.returned_to = return_to_branch(ctx.vcs, candidates)?;

        if options.stack_comments {
            let forest = Forest::load(&*ctx.store)?;
            update_stack_comments(ctx, &forest).await;
        }
    }

    Ok(report)
}

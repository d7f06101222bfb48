//! Landed-branch reconciliation
//!
//! Runs once per sync, before any rebasing, so nothing is rebased onto a
//! branch that is about to be retired.

use crate::engine::{EngineContext, retarget_children, retire_branch};
use crate::error::Result;
use crate::stack::{Forest, link_review};
use crate::types::PrState;
use tracing::{debug, info, warn};

/// What reconciliation changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Branches whose review landed and that were retired, in order
    pub landed: Vec<String>,
    /// Landed branches kept because a child is frozen
    pub kept: Vec<String>,
    /// Review requests newly linked to branches
    pub linked: Vec<(String, u64)>,
}

/// Retire every tracked branch whose review request has landed.
///
/// Branches are visited parents first, so a chain of landed branches
/// collapses onto the nearest surviving ancestor. `fallback` is checked out
/// when a retired branch is the current one and it has no parent.
///
/// Each re-parented child gets the retired branch's old tip as a persisted
/// cut point, which its next restack consumes.
pub async fn reconcile_landed(
    ctx: &mut EngineContext<'_>,
    fallback: &str,
) -> Result<ReconcileReport> {
    let mut report = ReconcileReport::default();
    let forest = Forest::load(&*ctx.store)?;

    let mut order: Vec<(usize, String)> = Vec::with_capacity(forest.len());
    for branch in forest.branches() {
        let depth = match forest.ancestors(&branch.name) {
            Ok(chain) => chain.len(),
            // Cycle members are left for the planner to classify
            Err(_) => continue,
        };
        order.push((depth, branch.name.clone()));
    }
    order.sort();

    for (_, branch) in order {
        let forest = Forest::load(&*ctx.store)?;
        let Some(tracked) = forest.get(&branch).cloned() else {
            continue;
        };

        let Some(number) = tracked.review_id else {
            link_open_review(ctx, &branch, &mut report).await?;
            continue;
        };

        let details = match ctx.platform.get_pr_details(number).await {
            Ok(details) => details,
            Err(e) => {
                warn!(branch = %branch, number, error = %e, "could not read review state");
                ctx.progress
                    .on_warning(&format!("Could not check PR #{number} for {branch}: {e}"))
                    .await;
                continue;
            }
        };

        match details.state {
            PrState::Open => continue,
            PrState::Closed => {
                ctx.progress
                    .on_warning(&format!(
                        "PR #{number} for {branch} was closed without merging; leaving it tracked"
                    ))
                    .await;
                continue;
            }
            PrState::Merged => {}
        }

        let frozen_children: Vec<&str> = forest
            .children(&branch)
            .iter()
            .filter(|c| forest.get(c).is_some_and(|b| b.frozen))
            .map(String::as_str)
            .collect();
        if !frozen_children.is_empty() {
            ctx.progress
                .on_warning(&format!(
                    "PR #{number} for {branch} landed, but {} is frozen; not retiring {branch}",
                    frozen_children.join(", ")
                ))
                .await;
            report.kept.push(branch.clone());
            continue;
        }

        ctx.progress
            .on_message(&format!("PR #{number} for {branch} has landed"))
            .await;

        let new_parent = tracked.parent.as_deref();
        retarget_children(ctx, &branch, new_parent).await?;

        retire_branch(ctx, &branch, new_parent.unwrap_or(fallback)).await?;
        info!(branch = %branch, number, "retired landed branch");
        report.landed.push(branch);
    }

    Ok(report)
}

/// Link an open review request whose head is `branch`, if one exists.
async fn link_open_review(
    ctx: &mut EngineContext<'_>,
    branch: &str,
    report: &mut ReconcileReport,
) -> Result<()> {
    match ctx.platform.find_existing_pr(branch).await {
        Ok(Some(pr)) => {
            link_review(ctx.store, branch, Some(pr.number))?;
            ctx.progress
                .on_message(&format!("Linked {branch} to PR #{}", pr.number))
                .await;
            report.linked.push((branch.to_string(), pr.number));
        }
        Ok(None) => debug!(branch, "no review request to link"),
        Err(e) => {
            warn!(branch, error = %e, "review lookup failed");
            ctx.progress
                .on_warning(&format!("Could not look up a PR for {branch}: {e}"))
                .await;
        }
    }
    Ok(())
}

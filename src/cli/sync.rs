//! Sync command - restack every tracked branch onto its parent

use crate::cli::context::{CommandContext, LocalRepo};
use crate::cli::style::{CHECK, CROSS, Stylize, arrow};
use crate::cli::{CliProgress, print_conflict_help};
use anstream::println;
use stak::conflict::{ContinueReport, RewriteOperation, continue_after_conflict};
use stak::error::{Error, Result};
use stak::sync::{
    BranchOutcome, SyncOptions, SyncPlan, SyncReport, SyncStep, preview_sync,
    run_sync as sync_stack,
};

/// Options for the sync command
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncCommandOptions {
    /// Dry run - show what would be done without making changes
    pub dry_run: bool,
}

/// Run the sync command
pub async fn run_sync(
    path: &std::path::Path,
    remote: Option<&str>,
    options: SyncCommandOptions,
) -> Result<()> {
    if options.dry_run {
        let repo = LocalRepo::open(path)?;
        let plan = preview_sync(&repo.git, &repo.store)?;
        print_sync_preview(&plan);
        return Ok(());
    }

    let mut ctx = CommandContext::new(path, remote).await?;
    let stack_comments = ctx.repo.config.stack_comments;
    let progress = CliProgress::compact();

    println!("{} {}", "Syncing stacks on".emphasis(), ctx.remote_name.accent());
    let report = sync_stack(&mut ctx.engine(&progress), SyncOptions { stack_comments }).await?;

    print_sync_summary(&report);

    if let Some(pause) = report.paused() {
        print_conflict_help(pause);
        return Err(Error::RebaseConflict {
            branch: pause.checkpoint.branch.clone(),
            onto: pause.checkpoint.onto.clone(),
            files: pause.files.clone(),
        });
    }

    if let Some((branch, message)) = report.failures().first() {
        return Err(Error::Git(format!("failed to sync {branch}: {message}")));
    }
    if !report.is_success() {
        // Skipped for unmet dependencies; the summary names them
        return Err(Error::Tracking(
            "some branches could not be synced".to_string(),
        ));
    }
    Ok(())
}

/// Run `sync --continue`
///
/// Needs only git, so it works without review-hosting credentials.
pub async fn run_continue(path: &std::path::Path, remote: Option<&str>) -> Result<()> {
    let mut repo = LocalRepo::open(path)?;
    let remote = repo.remote(remote)?;
    let progress = CliProgress::compact();

    let ContinueReport { branch, operation } =
        continue_after_conflict(&mut repo.git, &mut repo.store, &remote.name, &progress).await?;

    println!();
    println!("{} Finished rebasing {}", CHECK.success(), branch.accent());
    let rerun = operation.map_or("sync", RewriteOperation::resume_command);
    println!(
        "{}",
        format!("Run 'stak {rerun}' again to process the remaining branches.").muted()
    );
    Ok(())
}

fn print_sync_summary(report: &SyncReport) {
    println!();
    for (branch, number) in &report.reconcile.linked {
        println!("  {} linked {} to PR #{number}", arrow(), branch.accent());
    }
    for branch in &report.reconcile.landed {
        println!("  {} {} landed and was removed", CHECK.success(), branch.accent());
    }

    for (branch, outcome) in &report.outcomes {
        match outcome {
            BranchOutcome::Synced { rebased: true } => {
                println!("  {} {} rebased", CHECK.success(), branch.accent());
            }
            BranchOutcome::Synced { rebased: false } => {
                println!("  {} {} {}", CHECK.success(), branch.accent(), "up to date".muted());
            }
            BranchOutcome::Skipped(reason) => {
                println!("  {} {} skipped: {}", arrow(), branch.accent(), reason.muted());
            }
            BranchOutcome::Failed(message) => {
                println!("  {} {} failed: {}", CROSS.failure(), branch.accent(), message.warn());
            }
            BranchOutcome::Paused(_) => {
                println!("  {} {} paused on conflicts", CROSS.warn(), branch.accent());
            }
            BranchOutcome::Pending => {
                println!("  {} {} {}", arrow(), branch.accent(), "not reached".muted());
            }
        }
    }

    if report.paused().is_none() {
        println!();
        println!(
            "{} {} rebased, {} landed",
            format!("{CHECK} Sync complete:").success(),
            report.rebased_count().accent(),
            report.reconcile.landed.len().accent()
        );
        if let Some(branch) = &report.returned_to {
            println!("{}", format!("Now on {branch}").muted());
        }
    }
}

/// Print the plan for --dry-run
fn print_sync_preview(plan: &SyncPlan) {
    println!("{}:", "Sync plan".emphasis());
    println!();

    if plan.is_empty() {
        println!("  {}", "No branches tracked".muted());
        println!();
        return;
    }

    for step in &plan.steps {
        match step {
            SyncStep::Skip { .. } => println!("  {} {}", arrow(), step.muted()),
            _ => println!("  {} {}", arrow(), step),
        }
    }

    println!();
    println!(
        "{}",
        "Landed review requests are detected at run time. Run without --dry-run to execute.".muted()
    );
}

//! Merge command - land review requests bottom-up

use crate::cli::context::CommandContext;
use crate::cli::style::{CHECK, Stylize, WARN, arrow, check, spinner_style};
use crate::cli::{CliProgress, print_conflict_help};
use anstream::println;
use indicatif::ProgressBar;
use stak::error::{Error, Result};
use stak::merge::{
    MergeConfidence, MergeExecutionResult, MergePlan, MergePlanOptions, MergeStep,
    create_merge_plan, execute_merge, gather_merge_candidates, merge_chain,
};
use stak::stack::Forest;
use stak::types::MergeMethod;
use std::path::Path;
use std::time::Duration;

/// Options for the merge command
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    /// Land the whole ancestor chain, not just the current branch
    pub all: bool,
    /// Strategy override; defaults to config
    pub method: Option<MergeMethod>,
    /// Do not require approval and passing checks
    pub skip_checks: bool,
    /// Dry run - show what would be merged without making changes
    pub dry_run: bool,
}

/// Run the merge command
pub async fn run_merge(path: &Path, remote: Option<&str>, options: MergeOptions) -> Result<()> {
    // =========================================================================
    // Phase 1: GATHER - Collect all data upfront
    // =========================================================================

    let mut ctx = CommandContext::new(path, remote).await?;
    let current = ctx.repo.branch_or_current(None)?;
    let forest = Forest::load(&ctx.repo.store)?;
    let chain = merge_chain(&forest, &current, options.all)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(spinner_style());
    spinner.set_message(format!("Checking {} review request(s)...", chain.len()));
    spinner.enable_steady_tick(Duration::from_millis(80));

    let candidates = match gather_merge_candidates(&forest, ctx.platform.as_ref(), &chain).await {
        Ok(candidates) => candidates,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e);
        }
    };
    spinner.finish_with_message(format!(
        "{} Checked {} review request(s)",
        check(),
        candidates.len()
    ));

    // =========================================================================
    // Phase 2: PLAN - Pure function, fails before anything is mutated
    // =========================================================================

    let plan_options = MergePlanOptions {
        method: options.method.unwrap_or(ctx.repo.config.merge_method),
        skip_checks: options.skip_checks,
    };
    let merge_plan = create_merge_plan(&candidates, &plan_options)?;

    // =========================================================================
    // Phase 3: EXECUTE - Effectful operations
    // =========================================================================

    if options.dry_run {
        report_merge_dry_run(&merge_plan);
        return Ok(());
    }

    println!(
        "{} {}",
        "Merging".emphasis(),
        format!("{} PR(s)...", merge_plan.land_count()).accent()
    );

    let progress = CliProgress::compact();
    let result = execute_merge(&mut ctx.engine(&progress), &merge_plan).await?;

    print_merge_summary(&result);

    if let Some(pause) = &result.paused {
        print_conflict_help(pause);
        return Err(Error::RebaseConflict {
            branch: pause.checkpoint.branch.clone(),
            onto: pause.checkpoint.onto.clone(),
            files: pause.files.clone(),
        });
    }
    Ok(())
}

/// Print merge summary
fn print_merge_summary(result: &MergeExecutionResult) {
    println!();
    if result.is_success() {
        println!("{} Merge complete!", check());
    } else {
        println!("{} Merge partially complete", WARN.warn());
    }

    if result.has_merges() {
        let merged: Vec<String> = result
            .merged_branches
            .iter()
            .map(|(branch, number)| format!("{branch} (#{number})"))
            .collect();
        println!("   Merged: {}", merged.join(", ").accent());
    }
    if !result.restacked.is_empty() {
        println!("   Restacked: {}", result.restacked.join(", ").accent());
    }
    if let Some(branch) = &result.returned_to {
        println!("   {}", format!("Now on {branch}").muted());
    }
}

/// Report what would be merged (dry run)
fn report_merge_dry_run(plan: &MergePlan) {
    println!("{}:", "Merge plan".emphasis());
    println!();

    if plan.is_empty() {
        println!("  {}", "No PRs to process".muted());
        println!();
        return;
    }

    for step in &plan.steps {
        match step {
            MergeStep::Land {
                branch,
                pr_number,
                pr_title,
                method,
                confidence,
            } => {
                match confidence {
                    MergeConfidence::Certain => {
                        println!(
                            "  {} PR #{}: {}",
                            format!("{CHECK} Would {method}").success(),
                            pr_number,
                            pr_title
                        );
                    }
                    MergeConfidence::Uncertain(reason) => {
                        println!(
                            "  {} PR #{}: {}",
                            format!("? Would attempt {method}").warn(),
                            pr_number,
                            pr_title
                        );
                        println!("    {WARN} {}", reason.muted());
                    }
                }
                println!("    Branch: {}", branch.accent());
            }
            MergeStep::AlreadyLanded { branch, pr_number } => {
                println!(
                    "  {} PR #{} ({}) already merged",
                    arrow(),
                    pr_number,
                    branch.accent()
                );
            }
        }
    }

    println!();
    println!("{}", "Run without --dry-run to execute.".muted());
}

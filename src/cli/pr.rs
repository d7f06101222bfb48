//! PR command - publish the current branch and open or update its review

use crate::cli::CliProgress;
use crate::cli::context::CommandContext;
use crate::cli::style::{CHECK, Stylize, hyperlink};
use anstream::println;
use stak::comments::update_stack_comments;
use stak::engine::push_branch;
use stak::error::{Error, Result};
use stak::stack::{Forest, link_review};
use std::path::Path;

/// Options for the pr command
#[derive(Debug, Clone, Default)]
pub struct PrOptions {
    /// Title for a new request, or the new title of an existing one
    pub title: Option<String>,
    /// Body for a new request, or the new body of an existing one
    pub body: Option<String>,
    /// Open new requests as drafts
    pub draft: bool,
}

/// Run the pr command
pub async fn run_pr(path: &Path, remote: Option<&str>, options: PrOptions) -> Result<()> {
    let mut ctx = CommandContext::new(path, remote).await?;
    let branch = ctx.repo.branch_or_current(None)?;
    let stack_comments = ctx.repo.config.stack_comments;

    let forest = Forest::load(&ctx.repo.store)?;
    let tracked = forest
        .get(&branch)
        .ok_or_else(|| Error::BranchNotTracked(branch.clone()))?;
    let base = tracked.parent.clone().ok_or_else(|| {
        Error::Tracking(format!(
            "{branch} has no parent; run 'stak move {branch} --onto <parent>' first"
        ))
    })?;

    let progress = CliProgress::compact();
    let mut engine = ctx.engine(&progress);
    if engine.vcs.rebase_in_progress()? {
        return Err(Error::RebaseInProgress);
    }

    push_branch(&mut engine, &branch).await?;

    let pr = match engine.platform.find_existing_pr(&branch).await? {
        Some(existing) => {
            let mut pr = existing;
            if pr.base_ref != base {
                pr = engine.platform.update_pr_base(pr.number, &base).await?;
                println!("  Retargeted PR #{} to {}", pr.number.accent(), base.accent());
            }
            if options.title.is_some() || options.body.is_some() {
                pr = engine
                    .platform
                    .update_pr(pr.number, options.title.as_deref(), options.body.as_deref())
                    .await?;
                println!("  Updated PR #{}", pr.number.accent());
            }
            pr
        }
        None => {
            let title = options.title.as_deref().unwrap_or(&branch);
            let pr = engine
                .platform
                .create_pr_with_options(
                    &branch,
                    &base,
                    title,
                    options.body.as_deref(),
                    options.draft,
                )
                .await?;
            let kind = if pr.is_draft { "draft PR" } else { "PR" };
            println!("{} Created {kind} #{}", CHECK.success(), pr.number.accent());
            pr
        }
    };

    if tracked.review_id != Some(pr.number) {
        link_review(engine.store, &branch, Some(pr.number))?;
    }
    println!("  {}", hyperlink(&pr.html_url, &pr.html_url));

    if stack_comments {
        let forest = Forest::load(&*engine.store)?;
        update_stack_comments(&engine, &forest).await;
    }
    Ok(())
}

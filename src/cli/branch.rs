//! Branch lifecycle commands - create, fold

use crate::cli::context::{CommandContext, LocalRepo};
use crate::cli::style::{CHECK, Stylize, WARN};
use crate::cli::{CliProgress, print_conflict_help};
use anstream::println;
use dialoguer::{Confirm, Input};
use stak::error::{Error, Result};
use stak::fold::{FoldOptions, FoldReport, fold_branch};
use stak::stack::{Forest, create};
use std::path::Path;

/// Run the create command
pub fn run_create(path: &Path, name: Option<&str>, parent: Option<&str>) -> Result<()> {
    let mut repo = LocalRepo::open(path)?;
    let parent = repo.branch_or_current(parent)?;

    let name = match name {
        Some(name) => name.to_string(),
        None => Input::<String>::new()
            .with_prompt("New branch name")
            .interact_text()
            .map_err(|e| Error::Internal(format!("Failed to read branch name: {e}")))?,
    };

    let created = create(&mut repo.git, &mut repo.store, &name, &parent)?;
    println!(
        "{} Created {} on {}",
        CHECK.success(),
        created.name.accent(),
        parent.accent()
    );
    println!(
        "{}",
        "Commit your changes, then run 'stak pr' to open a review request.".muted()
    );
    Ok(())
}

/// Options for the fold command
#[derive(Debug, Clone, Copy, Default)]
pub struct FoldCommandOptions {
    /// Fast-forward the parent instead of squashing
    pub no_squash: bool,
    /// Skip the confirmation prompt
    pub yes: bool,
}

/// Run the fold command
pub async fn run_fold(
    path: &Path,
    remote: Option<&str>,
    branch: Option<&str>,
    options: FoldCommandOptions,
) -> Result<()> {
    let mut ctx = CommandContext::new(path, remote).await?;
    let branch = ctx.repo.branch_or_current(branch)?;

    if !options.yes {
        let forest = Forest::load(&ctx.repo.store)?;
        let parent = forest
            .parent(&branch)
            .ok_or_else(|| Error::NoParent(branch.clone()))?;
        let children = forest.children(&branch).len();
        let prompt = if children == 0 {
            format!("Fold {branch} into {parent} and delete {branch}?")
        } else {
            format!(
                "Fold {branch} into {parent}, move {children} child branch(es) onto it, \
                 and delete {branch}?"
            )
        };
        let confirmed = Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|e| Error::Internal(format!("Failed to read confirmation: {e}")))?;
        if !confirmed {
            println!("{}", "Aborted".muted());
            return Ok(());
        }
    }

    let progress = CliProgress::compact();
    let fold = FoldOptions {
        squash: !options.no_squash,
        close_review: true,
    };
    let FoldReport {
        parent,
        children,
        restacked,
        paused,
        ..
    } = fold_branch(&mut ctx.engine(&progress), &branch, fold).await?;

    println!();
    println!(
        "{} Folded {} into {}",
        CHECK.success(),
        branch.accent(),
        parent.accent()
    );
    for child in &restacked {
        println!("  {} {} now sits on {}", CHECK.success(), child.accent(), parent);
    }

    if let Some(pause) = paused {
        print_conflict_help(&pause);
        return Err(Error::RebaseConflict {
            branch: pause.checkpoint.branch,
            onto: pause.checkpoint.onto,
            files: pause.files,
        });
    }

    for child in children.iter().filter(|c| !restacked.contains(c)) {
        println!("  {} {} {}", WARN.warn(), child.accent(), "was not restacked".warn());
    }
    Ok(())
}

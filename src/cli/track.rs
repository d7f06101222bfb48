//! Tracking commands - track, untrack, freeze, unfreeze, move

use crate::cli::context::{CommandContext, LocalRepo};
use crate::cli::style::{CHECK, Stylize, WARN};
use crate::cli::{CliProgress, print_conflict_help};
use anstream::println;
use dialoguer::Confirm;
use stak::engine::{MoveOutcome, RestackOutcome, move_branch};
use stak::error::{Error, Result};
use stak::stack::{Forest, link_review, set_frozen, track, untrack};
use stak::vcs::Vcs;
use std::path::Path;

/// Run the track command
pub async fn run_track(
    path: &Path,
    remote: Option<&str>,
    branch: Option<&str>,
    parent: Option<&str>,
) -> Result<()> {
    let mut repo = LocalRepo::open(path)?;
    let branch = repo.branch_or_current(branch)?;
    let current = repo.git.current_branch()?;

    let parent = parent
        .map(String::from)
        .or_else(|| repo.config.trunk.clone())
        .or_else(|| current.filter(|c| *c != branch));

    let tracked = track(&repo.git, &mut repo.store, &branch, parent.as_deref())?;
    match &tracked.parent {
        Some(parent) => println!(
            "{} Tracking {} on {}",
            CHECK.success(),
            branch.accent(),
            parent.accent()
        ),
        None => println!("{} Tracking {} as a root", CHECK.success(), branch.accent()),
    }

    // Linking an existing review request is a convenience, not a requirement
    match CommandContext::new(path, remote).await {
        Ok(mut ctx) => match ctx.platform.find_existing_pr(&branch).await {
            Ok(Some(pr)) => {
                link_review(&mut ctx.repo.store, &branch, Some(pr.number))?;
                println!("  Linked to PR #{}", pr.number.accent());
            }
            Ok(None) => {}
            Err(e) => println!(
                "  {} {}",
                WARN.warn(),
                format!("Could not look up PRs: {e}").warn()
            ),
        },
        Err(e) => println!(
            "  {} {}",
            WARN.warn(),
            format!("Not linking a PR: {e}").muted()
        ),
    }
    Ok(())
}

/// Options for the untrack command
#[derive(Debug, Clone, Copy, Default)]
pub struct UntrackOptions {
    /// Also untrack every descendant
    pub recursive: bool,
    /// Close linked review requests
    pub close_pr: bool,
    /// Skip the confirmation prompt
    pub yes: bool,
}

/// Run the untrack command
pub async fn run_untrack(
    path: &Path,
    remote: Option<&str>,
    branch: Option<&str>,
    options: UntrackOptions,
) -> Result<()> {
    let repo = LocalRepo::open(path)?;
    let branch = repo.branch_or_current(branch)?;
    let forest = Forest::load(&repo.store)?;
    if !forest.is_tracked(&branch) {
        return Err(Error::BranchNotTracked(branch));
    }

    let descendants: Vec<String> = forest
        .descendants(&branch)
        .into_iter()
        .filter(|d| forest.is_tracked(d))
        .collect();
    if !descendants.is_empty() && !options.yes {
        let prompt = if options.recursive {
            format!("Untrack {branch} and {} descendant(s)?", descendants.len())
        } else {
            format!(
                "{branch} has {} tracked descendant(s) that will become roots. Continue?",
                descendants.len()
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

    let ctx = if options.close_pr {
        Some(CommandContext::new(path, remote).await?)
    } else {
        None
    };
    let mut store = repo.store;

    let reviews: Vec<(String, u64)> = std::iter::once(&branch)
        .chain(descendants.iter().filter(|_| options.recursive))
        .filter_map(|b| Some((b.clone(), forest.get(b)?.review_id?)))
        .collect();

    let removed = untrack(&mut store, &branch, options.recursive)?;
    for name in &removed {
        println!("{} Untracked {}", CHECK.success(), name.accent());
    }

    if let Some(ctx) = &ctx {
        for (name, number) in reviews {
            match ctx.platform.close_pr(number).await {
                Ok(()) => println!("  Closed PR #{} ({})", number.accent(), name),
                Err(e) => println!(
                    "  {} {}",
                    WARN.warn(),
                    format!("Could not close PR #{number}: {e}").warn()
                ),
            }
        }
    }
    Ok(())
}

/// Run freeze or unfreeze
pub fn run_freeze(path: &Path, branch: Option<&str>, frozen: bool) -> Result<()> {
    let mut repo = LocalRepo::open(path)?;
    let branch = repo.branch_or_current(branch)?;
    set_frozen(&mut repo.store, &branch, frozen)?;
    let verb = if frozen { "Froze" } else { "Unfroze" };
    println!("{} {verb} {}", CHECK.success(), branch.accent());
    Ok(())
}

/// Run the move command
pub async fn run_move(
    path: &Path,
    remote: Option<&str>,
    branch: Option<&str>,
    onto: &str,
) -> Result<()> {
    let mut ctx = CommandContext::new(path, remote).await?;
    let branch = ctx.repo.branch_or_current(branch)?;

    let progress = CliProgress::compact();
    let MoveOutcome { previous, restack } =
        move_branch(&mut ctx.engine(&progress), &branch, onto).await?;

    if let RestackOutcome::Paused(pause) = restack {
        print_conflict_help(&pause);
        return Err(Error::RebaseConflict {
            branch: pause.checkpoint.branch,
            onto: pause.checkpoint.onto,
            files: pause.files,
        });
    }

    let from = previous.map_or_else(|| "no parent".to_string(), |p| p.accent());
    println!(
        "{} Moved {} from {from} onto {}",
        CHECK.success(),
        branch.accent(),
        onto.accent()
    );
    println!(
        "{}",
        "Descendants are restacked by the next 'stak sync'.".muted()
    );
    Ok(())
}

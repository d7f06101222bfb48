//! stak CLI

mod cli;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use stak::types::MergeMethod;
use tracing_subscriber::EnvFilter;

/// Stacked branches for Git with GitHub/GitLab support
#[derive(Parser)]
#[command(name = "stak", version, about, long_about = None)]
struct Cli {
    /// Path to the repository (defaults to current directory)
    #[arg(short, long, global = true)]
    path: Option<PathBuf>,

    /// Git remote to use (defaults to config, then `origin`)
    #[arg(short, long, global = true)]
    remote: Option<String>,

    /// Log debug details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebase every tracked branch onto its parent and clean up landed ones
    Sync {
        /// Finish a rebase paused on conflicts
        #[arg(long = "continue", conflicts_with = "dry_run")]
        continue_: bool,

        /// Show the plan without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Land review requests bottom-up and restack what sits above them
    #[command(visible_alias = "land")]
    Merge {
        /// Land the whole chain from the base up to the current branch
        #[arg(long)]
        all: bool,

        /// Merge strategy: squash, merge, or rebase
        #[arg(long)]
        method: Option<MergeMethod>,

        /// Do not require approval and passing checks
        #[arg(long)]
        skip_checks: bool,

        /// Show the plan without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Create a branch stacked on the current one
    Create {
        /// Name of the new branch (prompted for when omitted)
        name: Option<String>,

        /// Parent branch (defaults to the current branch)
        #[arg(long)]
        parent: Option<String>,
    },

    /// Merge a branch into its parent and move its children onto the parent
    Fold {
        /// Branch to fold (defaults to the current branch)
        branch: Option<String>,

        /// Fast-forward the parent instead of squashing
        #[arg(long)]
        no_squash: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Start tracking a branch
    Track {
        /// Branch to track (defaults to the current branch)
        branch: Option<String>,

        /// Parent branch (defaults to the configured trunk)
        #[arg(long)]
        parent: Option<String>,
    },

    /// Stop tracking a branch
    Untrack {
        /// Branch to untrack (defaults to the current branch)
        branch: Option<String>,

        /// Also untrack every descendant
        #[arg(long)]
        recursive: bool,

        /// Close the linked review requests
        #[arg(long)]
        close_pr: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Exclude a branch from every rewrite
    Freeze {
        /// Branch to freeze (defaults to the current branch)
        branch: Option<String>,
    },

    /// Allow a frozen branch to be rewritten again
    Unfreeze {
        /// Branch to unfreeze (defaults to the current branch)
        branch: Option<String>,
    },

    /// Re-parent a branch and rebase it onto its new parent
    Move {
        /// Branch to move (defaults to the current branch)
        branch: Option<String>,

        /// New parent
        #[arg(long)]
        onto: String,
    },

    /// Push the current branch and create or update its review request
    Pr {
        /// Title (defaults to the branch name for new requests)
        #[arg(long)]
        title: Option<String>,

        /// Body
        #[arg(long)]
        body: Option<String>,

        /// Open as a draft
        #[arg(long)]
        draft: bool,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("STAK_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let path = match cli
        .path
        .map_or_else(std::env::current_dir, Ok)
        .context("could not determine the working directory")
    {
        Ok(path) => path,
        Err(e) => {
            cli::print_error(&e);
            return ExitCode::FAILURE;
        }
    };
    let remote = cli.remote.as_deref();

    let result = match cli.command {
        Commands::Sync { continue_, dry_run } => {
            if continue_ {
                cli::sync::run_continue(&path, remote).await
            } else {
                cli::sync::run_sync(&path, remote, cli::sync::SyncCommandOptions { dry_run }).await
            }
        }
        Commands::Merge {
            all,
            method,
            skip_checks,
            dry_run,
        } => {
            cli::merge::run_merge(
                &path,
                remote,
                cli::merge::MergeOptions {
                    all,
                    method,
                    skip_checks,
                    dry_run,
                },
            )
            .await
        }
        Commands::Create { name, parent } => {
            cli::branch::run_create(&path, name.as_deref(), parent.as_deref())
        }
        Commands::Fold {
            branch,
            no_squash,
            yes,
        } => {
            cli::branch::run_fold(
                &path,
                remote,
                branch.as_deref(),
                cli::branch::FoldCommandOptions { no_squash, yes },
            )
            .await
        }
        Commands::Track { branch, parent } => {
            cli::track::run_track(&path, remote, branch.as_deref(), parent.as_deref()).await
        }
        Commands::Untrack {
            branch,
            recursive,
            close_pr,
            yes,
        } => {
            cli::track::run_untrack(
                &path,
                remote,
                branch.as_deref(),
                cli::track::UntrackOptions {
                    recursive,
                    close_pr,
                    yes,
                },
            )
            .await
        }
        Commands::Freeze { branch } => cli::track::run_freeze(&path, branch.as_deref(), true),
        Commands::Unfreeze { branch } => cli::track::run_freeze(&path, branch.as_deref(), false),
        Commands::Move { branch, onto } => {
            cli::track::run_move(&path, remote, branch.as_deref(), &onto).await
        }
        Commands::Pr { title, body, draft } => {
            cli::pr::run_pr(
                &path,
                remote,
                cli::pr::PrOptions { title, body, draft },
            )
            .await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            cli::print_error(&anyhow::Error::from(err));
            ExitCode::from(code)
        }
    }
}

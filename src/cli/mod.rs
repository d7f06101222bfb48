//! CLI command implementations

pub mod branch;
pub mod context;
pub mod merge;
pub mod pr;
pub mod style;
pub mod sync;
pub mod track;

use anstream::{eprintln, println};
use async_trait::async_trait;
use stak::engine::ConflictPause;
use stak::progress::ProgressCallback;
use style::{Stylize, WARN, arrow};

/// Prints engine narration, one line per step
#[derive(Debug, Clone, Copy, Default)]
pub struct CliProgress;

impl CliProgress {
    /// Narration with one indented line per step
    pub const fn compact() -> Self {
        Self
    }
}

#[async_trait]
impl ProgressCallback for CliProgress {
    async fn on_message(&self, message: &str) {
        println!("  {} {message}", arrow());
    }

    async fn on_warning(&self, message: &str) {
        println!("  {} {}", WARN.warn(), message.warn());
    }
}

/// Print an error and its causes to stderr.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {err}", "error:".failure());
    for cause in err.chain().skip(1) {
        eprintln!("  {} {cause}", "caused by:".muted());
    }
}

/// Explain how to get out of a paused rebase.
pub fn print_conflict_help(pause: &ConflictPause) {
    println!();
    println!(
        "{} Rebase of {} onto {} stopped on conflicts:",
        WARN.warn(),
        pause.checkpoint.branch.accent(),
        pause.checkpoint.onto.accent()
    );
    for file in &pause.files {
        println!("    {}", file.warn());
    }
    println!();
    println!("  Resolve the conflicts, stage them with {}, then run:", "git add".emphasis());
    println!("    {}", "stak sync --continue".emphasis());
    let rerun = pause.checkpoint.operation.resume_command();
    println!(
        "  {}",
        format!("Afterwards re-run 'stak {rerun}' for the remaining branches.").muted()
    );
}

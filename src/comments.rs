//! Stack comment on review requests
//!
//! Each linked review request carries one comment, found by
//! [`STACK_COMMENT_MARKER`], listing the stack it belongs to.

use crate::engine::EngineContext;
use crate::error::Result;
use crate::platform::PlatformService;
use crate::stack::Forest;
use std::fmt::Write as _;
use tracing::{debug, warn};

/// Hidden marker identifying the comment stak owns
pub const STACK_COMMENT_MARKER: &str = "<!-- stak:stack -->";

fn label(forest: &Forest, branch: &str) -> String {
    match forest.get(branch).and_then(|b| b.review_id) {
        Some(number) => format!("#{number} `{branch}`"),
        None => format!("`{branch}`"),
    }
}

fn push_line(out: &mut String, depth: usize, text: &str) {
    let _ = writeln!(out, "{}- {text}", "  ".repeat(depth));
}

fn push_descendants(out: &mut String, forest: &Forest, branch: &str, depth: usize) {
    for child in forest.children(branch) {
        if forest.is_tracked(child) {
            push_line(out, depth, &label(forest, child));
            push_descendants(out, forest, child, depth + 1);
        }
    }
}

/// Markdown body of the stack comment for `branch`.
///
/// Lists the base, the tracked ancestors, the branch itself in bold, and
/// its descendants as a nested list.
pub fn render_stack_comment(forest: &Forest, branch: &str) -> Result<String> {
    let mut out = String::new();
    out.push_str(STACK_COMMENT_MARKER);
    out.push_str("\n### Stack\n\n");

    let mut depth = 0;
    if let Some(base) = forest.base_of(branch)? {
        push_line(&mut out, depth, &format!("`{base}`"));
        depth += 1;
    }
    for ancestor in forest.ancestors(branch)? {
        push_line(&mut out, depth, &label(forest, &ancestor));
        depth += 1;
    }
    push_line(&mut out, depth, &format!("**{}** (this PR)", label(forest, branch)));
    push_descendants(&mut out, forest, branch, depth + 1);

    out.push_str("\n_Managed by stak._\n");
    Ok(out)
}

/// Create the stack comment on a review request, or update it in place.
pub async fn upsert_stack_comment(
    platform: &dyn PlatformService,
    pr_number: u64,
    body: &str,
) -> Result<()> {
    let comments = platform.list_pr_comments(pr_number).await?;
    match comments
        .iter()
        .find(|c| c.body.contains(STACK_COMMENT_MARKER))
    {
        Some(existing) if existing.body == body => {
            debug!(pr_number, "stack comment unchanged");
            Ok(())
        }
        Some(existing) => {
            platform
                .update_pr_comment(pr_number, existing.id, body)
                .await
        }
        None => platform.create_pr_comment(pr_number, body).await,
    }
}

/// Refresh the stack comment on every linked review request.
///
/// Failures are narrated as warnings and never abort the caller.
pub async fn update_stack_comments(ctx: &EngineContext<'_>, forest: &Forest) {
    for branch in forest.branches() {
        let Some(number) = branch.review_id else {
            continue;
        };
        let outcome = match render_stack_comment(forest, &branch.name) {
            Ok(body) => upsert_stack_comment(ctx.platform, number, &body).await,
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            warn!(branch = %branch.name, number, error = %e, "stack comment update failed");
            ctx.progress
                .on_warning(&format!("Could not update stack comment on PR #{number}: {e}"))
                .await;
        }
    }
}

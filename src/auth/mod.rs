//! Authentication for GitHub and GitLab
//!
//! Tokens come from environment variables first, then the platform CLI
//! (`gh` or `glab`).

mod github;
mod gitlab;

pub use github::{GitHubAuthConfig, get_github_auth};
pub use gitlab::{GitLabAuthConfig, get_gitlab_auth};

/// Source of authentication token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSource {
    /// Token from CLI tool (gh or glab)
    Cli,
    /// Token from environment variable
    EnvVar,
}

impl std::fmt::Display for AuthSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "cli"),
            Self::EnvVar => write!(f, "environment"),
        }
    }
}

/// First non-empty value among `keys`, looked up through `lookup`.
fn token_from(keys: &[&str], lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    keys.iter()
        .filter_map(|key| lookup(*key))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

/// Run a CLI that prints a token on stdout; `None` if it's missing or fails.
async fn token_from_cli(program: &str, args: &[&str]) -> Option<String> {
    let output = tokio::process::Command::new(program)
        .args(args)
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        tracing::debug!(program, status = ?output.status.code(), "token CLI failed");
        return None;
    }
    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!token.is_empty()).then_some(token)
}

//! GitHub token discovery

use super::{AuthSource, token_from, token_from_cli};
use crate::error::{Error, Result};
use tracing::debug;

/// Environment variables checked, in order
const ENV_KEYS: &[&str] = &["GITHUB_TOKEN", "GH_TOKEN"];

/// Resolved GitHub credentials
#[derive(Debug, Clone)]
pub struct GitHubAuthConfig {
    /// API token
    pub token: String,
    /// Where the token came from
    pub source: AuthSource,
    /// Enterprise host, `None` for github.com
    pub host: Option<String>,
}

/// Find a GitHub token: `GITHUB_TOKEN`, `GH_TOKEN`, then `gh auth token`.
pub async fn get_github_auth(host: Option<&str>) -> Result<GitHubAuthConfig> {
    if let Some(token) = token_from(ENV_KEYS, |k| std::env::var(k).ok()) {
        debug!("using GitHub token from environment");
        return Ok(GitHubAuthConfig {
            token,
            source: AuthSource::EnvVar,
            host: host.map(String::from),
        });
    }

    let mut args = vec!["auth", "token"];
    if let Some(h) = host {
        args.extend(["--hostname", h]);
    }
    match token_from_cli("gh", &args).await {
        Some(token) => {
            debug!("using GitHub token from gh CLI");
            Ok(GitHubAuthConfig {
                token,
                source: AuthSource::Cli,
                host: host.map(String::from),
            })
        }
        None => Err(Error::Auth(
            "no GitHub token found; set GITHUB_TOKEN or run 'gh auth login'".to_string(),
        )),
    }
}

//! GitLab token discovery

use super::{AuthSource, token_from, token_from_cli};
use crate::error::{Error, Result};
use tracing::debug;

const ENV_KEYS: &[&str] = &["GITLAB_TOKEN", "GL_TOKEN"];

/// Resolved GitLab credentials
#[derive(Debug, Clone)]
pub struct GitLabAuthConfig {
    /// Personal access token
    pub token: String,
    /// Where the token came from
    pub source: AuthSource,
    /// Host name, e.g. `gitlab.com`
    pub host: String,
}

/// Find a GitLab token: `GITLAB_TOKEN`, `GL_TOKEN`, then `glab config get token`.
pub async fn get_gitlab_auth(host: Option<&str>) -> Result<GitLabAuthConfig> {
    let host = host.unwrap_or("gitlab.com").to_string();

    if let Some(token) = token_from(ENV_KEYS, |k| std::env::var(k).ok()) {
        debug!("using GitLab token from environment");
        return Ok(GitLabAuthConfig {
            token,
            source: AuthSource::EnvVar,
            host,
        });
    }

    match token_from_cli("glab", &["config", "get", "token", "--host", &host]).await {
        Some(token) => {
            debug!("using GitLab token from glab CLI");
            Ok(GitLabAuthConfig {
                token,
                source: AuthSource::Cli,
                host,
            })
        }
        None => Err(Error::Auth(
            "no GitLab token found; set GITLAB_TOKEN or run 'glab auth login'".to_string(),
        )),
    }
}

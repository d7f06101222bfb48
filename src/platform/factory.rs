//! Build the platform service for a parsed remote

use super::{GitHubService, GitLabService, PlatformService};
use crate::auth::{get_github_auth, get_gitlab_auth};
use crate::error::Result;
use crate::types::{Platform, PlatformConfig};
use tracing::debug;

/// Authenticate and construct the service for `config`.
pub async fn create_platform_service(
    config: &PlatformConfig,
) -> Result<Box<dyn PlatformService>> {
    debug!(
        platform = %config.platform,
        owner = %config.owner,
        repo = %config.repo,
        "creating platform service"
    );
    match config.platform {
        Platform::GitHub => {
            let auth = get_github_auth(config.host.as_deref()).await?;
            debug!(source = %auth.source, "authenticated with GitHub");
            Ok(Box::new(GitHubService::new(
                &auth.token,
                config.owner.clone(),
                config.repo.clone(),
                config.host.clone(),
            )?))
        }
        Platform::GitLab => {
            let auth = get_gitlab_auth(config.host.as_deref()).await?;
            debug!(source = %auth.source, "authenticated with GitLab");
            Ok(Box::new(GitLabService::new(
                auth.token,
                config.owner.clone(),
                config.repo.clone(),
                config.host.clone(),
            )?))
        }
    }
}

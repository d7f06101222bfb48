//! Review-hosting services for GitHub and GitLab
//!
//! Engines talk to the hosting service only through [`PlatformService`].

mod detection;
mod factory;
mod github;
mod gitlab;

pub use detection::{HostOverrides, detect_platform, parse_repo_info};
pub use factory::create_platform_service;
pub use github::GitHubService;
pub use gitlab::GitLabService;

use crate::error::Result;
use crate::types::{
    MergeMethod, MergeReadiness, MergeResult, PlatformConfig, PrComment, PullRequest,
    PullRequestDetails,
};
use async_trait::async_trait;

/// Review request operations shared by GitHub and GitLab
#[async_trait]
pub trait PlatformService: Send + Sync {
    /// Find the open review request whose head is `head_branch`
    async fn find_existing_pr(&self, head_branch: &str) -> Result<Option<PullRequest>>;

    /// Create a new, non-draft review request without a body.
    ///
    /// Delegates to [`create_pr_with_options`]; implementors override that.
    ///
    /// [`create_pr_with_options`]: Self::create_pr_with_options
    async fn create_pr(&self, head: &str, base: &str, title: &str) -> Result<PullRequest> {
        self.create_pr_with_options(head, base, title, None, false)
            .await
    }

    /// Create a new review request.
    async fn create_pr_with_options(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: Option<&str>,
        draft: bool,
    ) -> Result<PullRequest>;

    /// Change the target branch of a review request
    async fn update_pr_base(&self, pr_number: u64, new_base: &str) -> Result<PullRequest>;

    /// Edit title and/or body. `None` leaves a field unchanged.
    async fn update_pr(
        &self,
        pr_number: u64,
        title: Option<&str>,
        body: Option<&str>,
    ) -> Result<PullRequest>;

    /// Close a review request without landing it
    async fn close_pr(&self, pr_number: u64) -> Result<()>;

    /// List comments on a review request
    async fn list_pr_comments(&self, pr_number: u64) -> Result<Vec<PrComment>>;

    /// Comment on a review request
    async fn create_pr_comment(&self, pr_number: u64, body: &str) -> Result<()>;

    /// Edit an existing comment
    async fn update_pr_comment(&self, pr_number: u64, comment_id: u64, body: &str) -> Result<()>;

    /// Repository this service talks to
    fn config(&self) -> &PlatformConfig;

    /// State, draft flag, refs, and body of a review request
    async fn get_pr_details(&self, pr_number: u64) -> Result<PullRequestDetails>;

    /// Approval, check status, draft, and conflict state
    async fn check_merge_readiness(&self, pr_number: u64) -> Result<MergeReadiness>;

    /// Land a review request with the given strategy.
    ///
    /// Squash landings use the title as commit title and the body as message.
    async fn merge_pr(&self, pr_number: u64, method: MergeMethod) -> Result<MergeResult>;
}

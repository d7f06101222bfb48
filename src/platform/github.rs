//! GitHub platform service implementation

use crate::error::{Error, Result};
use crate::platform::PlatformService;
use crate::types::{
    MergeMethod, MergeReadiness, MergeResult, Platform, PlatformConfig, PrComment, PrState,
    PullRequest, PullRequestDetails,
};
use async_trait::async_trait;
use octocrab::Octocrab;
use octocrab::models::pulls::ReviewState;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::debug;

#[derive(Deserialize)]
struct CombinedStatus {
    state: String,
    total_count: u32,
}

#[derive(Deserialize)]
struct CheckRunsResponse {
    total_count: u32,
    check_runs: Vec<CheckRun>,
}

#[derive(Deserialize)]
struct CheckRun {
    status: String,
    conclusion: Option<String>,
}

/// GitHub service using octocrab, with raw requests for CI status
pub struct GitHubService {
    client: Octocrab,
    config: PlatformConfig,
    token: String,
    http_client: Client,
    /// API base for raw requests, without scheme
    api_host: String,
}

impl GitHubService {
    /// Create a new GitHub service
    pub fn new(token: &str, owner: String, repo: String, host: Option<String>) -> Result<Self> {
        let mut builder = Octocrab::builder().personal_token(token.to_string());

        let api_host = if let Some(ref h) = host {
            builder = builder
                .base_uri(format!("https://{h}/api/v3"))
                .map_err(|e| Error::GitHubApi(e.to_string()))?;
            format!("{h}/api/v3")
        } else {
            "api.github.com".to_string()
        };

        let client = builder
            .build()
            .map_err(|e| Error::GitHubApi(e.to_string()))?;

        let http_client = Client::builder()
            .user_agent("stak")
            .build()
            .map_err(|e| Error::GitHubApi(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: PlatformConfig {
                platform: Platform::GitHub,
                owner,
                repo,
                host,
            },
            token: token.to_string(),
            http_client,
            api_host,
        })
    }

    /// GET a repository-relative path. `Ok(None)` when the endpoint is not
    /// available (treated as "not configured").
    async fn get_repo_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = format!(
            "https://{}/repos/{}/{}/{path}",
            self.api_host, self.config.owner, self.config.repo
        );

        let response = self
            .http_client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("request to {path} failed: {e}")))?;

        if !response.status().is_success() {
            debug!(
                status = %response.status(),
                path,
                "non-success response, treating as unconfigured"
            );
            return Ok(None);
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|e| Error::GitHubApi(format!("failed to parse {path}: {e}")))
    }

    /// Both legacy commit statuses and check runs must pass.
    async fn check_ci_status(&self, ref_name: &str) -> Result<bool> {
        let statuses: Option<CombinedStatus> = self
            .get_repo_json(&format!("commits/{ref_name}/status"))
            .await?;
        let runs: Option<CheckRunsResponse> = self
            .get_repo_json(&format!("commits/{ref_name}/check-runs"))
            .await?;

        let passed = statuses.as_ref().is_none_or(statuses_pass)
            && runs.as_ref().is_none_or(check_runs_pass);
        debug!(ref_name, passed, "checked CI status");
        Ok(passed)
    }
}

/// No statuses configured counts as passing.
fn statuses_pass(status: &CombinedStatus) -> bool {
    status.total_count == 0 || status.state == "success"
}

/// Every run must be completed with a passing conclusion.
fn check_runs_pass(runs: &CheckRunsResponse) -> bool {
    runs.total_count == 0
        || runs.check_runs.iter().all(|run| {
            run.status == "completed"
                && matches!(
                    run.conclusion.as_deref(),
                    Some("success" | "neutral" | "skipped")
                )
        })
}

/// Approved when some reviewer's latest verdict is an approval and nobody's
/// latest verdict requests changes. Comments don't override a verdict.
fn reviews_approve<'a>(reviews: impl IntoIterator<Item = (&'a str, ReviewState)>) -> bool {
    let mut latest: HashMap<&str, ReviewState> = HashMap::new();
    for (user, state) in reviews {
        match state {
            ReviewState::Approved | ReviewState::ChangesRequested | ReviewState::Dismissed => {
                latest.insert(user, state);
            }
            _ => {}
        }
    }
    latest.values().any(|s| *s == ReviewState::Approved)
        && !latest.values().any(|s| *s == ReviewState::ChangesRequested)
}

fn pr_from_octocrab(pr: &octocrab::models::pulls::PullRequest) -> PullRequest {
    PullRequest {
        number: pr.number,
        html_url: pr
            .html_url
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
        base_ref: pr.base.ref_field.clone(),
        head_ref: pr.head.ref_field.clone(),
        title: pr.title.as_deref().unwrap_or_default().to_string(),
        is_draft: pr.draft.unwrap_or(false),
    }
}

#[async_trait]
impl PlatformService for GitHubService {
    async fn find_existing_pr(&self, head_branch: &str) -> Result<Option<PullRequest>> {
        debug!(head_branch, "finding existing PR");
        let head = format!("{}:{}", &self.config.owner, head_branch);

        let prs = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .list()
            .head(head)
            .state(octocrab::params::State::Open)
            .send()
            .await?;

        let result = prs.items.first().map(pr_from_octocrab);
        debug!(found = ?result.as_ref().map(|p| p.number), "searched for PR");
        Ok(result)
    }

    async fn create_pr_with_options(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: Option<&str>,
        draft: bool,
    ) -> Result<PullRequest> {
        debug!(head, base, draft, "creating PR");
        let pulls = self.client.pulls(&self.config.owner, &self.config.repo);
        let mut builder = pulls.create(title, head, base).draft(draft);
        if let Some(body_text) = body {
            builder = builder.body(body_text);
        }

        let result = pr_from_octocrab(&builder.send().await?);
        debug!(pr_number = result.number, "created PR");
        Ok(result)
    }

    async fn update_pr_base(&self, pr_number: u64, new_base: &str) -> Result<PullRequest> {
        debug!(pr_number, new_base, "updating PR base");
        let pr = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .update(pr_number)
            .base(new_base)
            .send()
            .await?;
        Ok(pr_from_octocrab(&pr))
    }

    async fn update_pr(
        &self,
        pr_number: u64,
        title: Option<&str>,
        body: Option<&str>,
    ) -> Result<PullRequest> {
        debug!(pr_number, title = title.is_some(), body = body.is_some(), "editing PR");
        let pulls = self.client.pulls(&self.config.owner, &self.config.repo);
        let mut builder = pulls.update(pr_number);
        if let Some(title) = title {
            builder = builder.title(title);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }
        Ok(pr_from_octocrab(&builder.send().await?))
    }

    async fn close_pr(&self, pr_number: u64) -> Result<()> {
        debug!(pr_number, "closing PR");
        self.client
            .pulls(&self.config.owner, &self.config.repo)
            .update(pr_number)
            .state(octocrab::params::pulls::State::Closed)
            .send()
            .await?;
        Ok(())
    }

    async fn list_pr_comments(&self, pr_number: u64) -> Result<Vec<PrComment>> {
        debug!(pr_number, "listing PR comments");
        let comments = self
            .client
            .issues(&self.config.owner, &self.config.repo)
            .list_comments(pr_number)
            .per_page(100)
            .send()
            .await?;

        Ok(comments
            .items
            .into_iter()
            .map(|c| PrComment {
                id: c.id.0,
                body: c.body.unwrap_or_default(),
            })
            .collect())
    }

    async fn create_pr_comment(&self, pr_number: u64, body: &str) -> Result<()> {
        debug!(pr_number, "creating PR comment");
        self.client
            .issues(&self.config.owner, &self.config.repo)
            .create_comment(pr_number, body)
            .await?;
        Ok(())
    }

    async fn update_pr_comment(&self, _pr_number: u64, comment_id: u64, body: &str) -> Result<()> {
        debug!(comment_id, "updating PR comment");
        self.client
            .issues(&self.config.owner, &self.config.repo)
            .update_comment(octocrab::models::CommentId(comment_id), body)
            .await?;
        Ok(())
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }

    async fn get_pr_details(&self, pr_number: u64) -> Result<PullRequestDetails> {
        debug!(pr_number, "getting PR details");

        let pr = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .get(pr_number)
            .await?;

        let state = match pr.state {
            Some(octocrab::models::IssueState::Open) => PrState::Open,
            Some(octocrab::models::IssueState::Closed) if pr.merged_at.is_some() => PrState::Merged,
            // IssueState is non-exhaustive
            Some(_) | None => PrState::Closed,
        };

        Ok(PullRequestDetails {
            number: pr.number,
            title: pr.title.clone().unwrap_or_default(),
            body: pr.body.clone(),
            state,
            is_draft: pr.draft.unwrap_or(false),
            mergeable: pr.mergeable,
            head_ref: pr.head.ref_field.clone(),
            base_ref: pr.base.ref_field.clone(),
            html_url: pr
                .html_url
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
        })
    }

    async fn check_merge_readiness(&self, pr_number: u64) -> Result<MergeReadiness> {
        debug!(pr_number, "checking merge readiness");
        let details = self.get_pr_details(pr_number).await?;

        let reviews = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .list_reviews(pr_number)
            .send()
            .await?;

        let is_approved = reviews_approve(reviews.items.iter().filter_map(|r| {
            let user = r.user.as_ref()?.login.as_str();
            Some((user, r.state.clone()?))
        }));
        let ci_passed = self.check_ci_status(&details.head_ref).await?;

        let mut blocking_reasons = Vec::new();
        let mut uncertainties = Vec::new();
        if details.is_draft {
            blocking_reasons.push("PR is a draft".to_string());
        }
        if !is_approved {
            blocking_reasons.push("Not approved".to_string());
        }
        if !ci_passed {
            blocking_reasons.push("CI not passing".to_string());
        }
        match details.mergeable {
            Some(false) => blocking_reasons.push("Has merge conflicts".to_string()),
            None => uncertainties.push("Merge status unknown (GitHub still computing)".to_string()),
            Some(true) => {}
        }

        let readiness = MergeReadiness {
            is_approved,
            ci_passed,
            is_mergeable: details.mergeable,
            is_draft: details.is_draft,
            blocking_reasons,
            uncertainties,
        };
        debug!(pr_number, blocked = readiness.is_blocked(), "checked merge readiness");
        Ok(readiness)
    }

    async fn merge_pr(&self, pr_number: u64, method: MergeMethod) -> Result<MergeResult> {
        debug!(pr_number, %method, "merging PR");

        let octocrab_method = match method {
            MergeMethod::Squash => octocrab::params::pulls::MergeMethod::Squash,
            MergeMethod::Merge => octocrab::params::pulls::MergeMethod::Merge,
            MergeMethod::Rebase => octocrab::params::pulls::MergeMethod::Rebase,
        };

        let pulls = self.client.pulls(&self.config.owner, &self.config.repo);
        let result = if method == MergeMethod::Squash {
            let details = self.get_pr_details(pr_number).await?;
            let mut builder = pulls
                .merge(pr_number)
                .method(octocrab_method)
                .title(format!("{} (#{pr_number})", details.title));
            if let Some(ref body) = details.body {
                builder = builder.message(body);
            }
            builder.send().await
        } else {
            pulls.merge(pr_number).method(octocrab_method).send().await
        }
        .map_err(|e| Error::GitHubApi(format!("merge failed: {e}")))?;

        debug!(pr_number, merged = result.merged, sha = ?result.sha, "merge complete");
        Ok(MergeResult {
            merged: result.merged,
            sha: result.sha,
            message: result.message,
        })
    }
}

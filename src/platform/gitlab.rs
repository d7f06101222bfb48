//! GitLab platform service implementation

use crate::error::{Error, Result};
use crate::platform::PlatformService;
use crate::types::{
    MergeMethod, MergeReadiness, MergeResult, Platform, PlatformConfig, PrComment, PrState,
    PullRequest, PullRequestDetails,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// GitLab service using the REST v4 API
pub struct GitLabService {
    client: Client,
    token: String,
    /// Scheme and host, e.g. `https://gitlab.com`
    base_url: String,
    config: PlatformConfig,
    project_path: String,
}

#[derive(Deserialize)]
struct MergeRequest {
    iid: u64,
    web_url: String,
    source_branch: String,
    target_branch: String,
    title: String,
    #[serde(default)]
    draft: bool,
}

#[derive(Deserialize)]
struct MrNote {
    id: u64,
    body: String,
    system: bool,
}

#[derive(Deserialize)]
struct MergeRequestDetails {
    iid: u64,
    title: String,
    description: Option<String>,
    /// "opened", "closed", "locked", or "merged"
    state: String,
    #[serde(default)]
    draft: bool,
    /// "can_be_merged", "cannot_be_merged", "checking", ...
    merge_status: String,
    web_url: String,
    source_branch: String,
    target_branch: String,
}

#[derive(Deserialize)]
struct MrApprovals {
    approved: bool,
}

#[derive(Deserialize)]
struct Pipeline {
    status: String,
}

#[derive(Deserialize)]
struct MergeResponse {
    state: String,
    merge_commit_sha: Option<String>,
}

impl From<MergeRequest> for PullRequest {
    fn from(mr: MergeRequest) -> Self {
        Self {
            number: mr.iid,
            html_url: mr.web_url,
            base_ref: mr.target_branch,
            head_ref: mr.source_branch,
            title: mr.title,
            is_draft: mr.draft,
        }
    }
}

#[derive(Serialize)]
struct CreateMrPayload<'a> {
    source_branch: &'a str,
    target_branch: &'a str,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    draft: bool,
}

#[derive(Serialize)]
struct UpdateMrPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn merge_state(state: &str) -> PrState {
    match state {
        "opened" => PrState::Open,
        "merged" => PrState::Merged,
        _ => PrState::Closed,
    }
}

/// `None` while GitLab is still checking; other statuses are definitive.
fn mergeable_from_status(status: &str) -> Option<bool> {
    match status {
        "can_be_merged" => Some(true),
        "unchecked" | "checking" => None,
        _ => Some(false),
    }
}

impl GitLabService {
    /// Create a new GitLab service
    pub fn new(token: String, owner: String, repo: String, host: Option<String>) -> Result<Self> {
        let base_url = format!("https://{}", host.as_deref().unwrap_or("gitlab.com"));
        let config_host = host.filter(|h| h != "gitlab.com");
        Self::with_base_url(token, owner, repo, base_url, config_host)
    }

    /// Create a service that talks to an explicit base URL.
    pub fn with_base_url(
        token: String,
        owner: String,
        repo: String,
        base_url: String,
        host: Option<String>,
    ) -> Result<Self> {
        let project_path = format!("{owner}/{repo}");

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::GitLabApi(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
            config: PlatformConfig {
                platform: Platform::GitLab,
                owner,
                repo,
                host,
            },
            project_path,
        })
    }

    fn mr_url(&self, suffix: &str) -> String {
        format!(
            "{}/api/v4/projects/{}/merge_requests{suffix}",
            self.base_url,
            urlencoding::encode(&self.project_path)
        )
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("PRIVATE-TOKEN", &self.token)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        Ok(self
            .authed(request)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::GitLabApi(e.to_string()))?
            .json()
            .await?)
    }

    /// Like `send_json`, but a non-success status is `Ok(None)`.
    async fn try_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Option<T>> {
        let response = self.authed(request).send().await?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "optional endpoint unavailable");
            return Ok(None);
        }
        Ok(Some(response.json().await?))
    }
}

#[async_trait]
impl PlatformService for GitLabService {
    async fn find_existing_pr(&self, head_branch: &str) -> Result<Option<PullRequest>> {
        debug!(head_branch, "finding existing MR");
        let request = self
            .client
            .get(self.mr_url(""))
            .query(&[("source_branch", head_branch), ("state", "opened")]);
        let mrs: Vec<MergeRequest> = self.send_json(request).await?;

        let result: Option<PullRequest> = mrs.into_iter().next().map(Into::into);
        debug!(found = ?result.as_ref().map(|p| p.number), "searched for MR");
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
        debug!(head, base, draft, "creating MR");
        let payload = CreateMrPayload {
            source_branch: head,
            target_branch: base,
            title,
            description: body,
            draft,
        };
        let mr: MergeRequest = self
            .send_json(self.client.post(self.mr_url("")).json(&payload))
            .await?;
        debug!(mr_iid = mr.iid, "created MR");
        Ok(mr.into())
    }

    async fn update_pr_base(&self, pr_number: u64, new_base: &str) -> Result<PullRequest> {
        debug!(mr_iid = pr_number, new_base, "updating MR base");
        let request = self
            .client
            .put(self.mr_url(&format!("/{pr_number}")))
            .json(&serde_json::json!({ "target_branch": new_base }));
        let mr: MergeRequest = self.send_json(request).await?;
        Ok(mr.into())
    }

    async fn update_pr(
        &self,
        pr_number: u64,
        title: Option<&str>,
        body: Option<&str>,
    ) -> Result<PullRequest> {
        debug!(mr_iid = pr_number, "editing MR");
        let payload = UpdateMrPayload {
            title,
            description: body,
        };
        let request = self
            .client
            .put(self.mr_url(&format!("/{pr_number}")))
            .json(&payload);
        let mr: MergeRequest = self.send_json(request).await?;
        Ok(mr.into())
    }

    async fn close_pr(&self, pr_number: u64) -> Result<()> {
        debug!(mr_iid = pr_number, "closing MR");
        let request = self
            .client
            .put(self.mr_url(&format!("/{pr_number}")))
            .json(&serde_json::json!({ "state_event": "close" }));
        let _: MergeRequest = self.send_json(request).await?;
        Ok(())
    }

    async fn list_pr_comments(&self, pr_number: u64) -> Result<Vec<PrComment>> {
        debug!(mr_iid = pr_number, "listing MR comments");
        let request = self
            .client
            .get(self.mr_url(&format!("/{pr_number}/notes")))
            .query(&[("per_page", "100")]);
        let notes: Vec<MrNote> = self.send_json(request).await?;

        Ok(notes
            .into_iter()
            .filter(|n| !n.system)
            .map(|n| PrComment {
                id: n.id,
                body: n.body,
            })
            .collect())
    }

    async fn create_pr_comment(&self, pr_number: u64, body: &str) -> Result<()> {
        debug!(mr_iid = pr_number, "creating MR comment");
        let request = self
            .client
            .post(self.mr_url(&format!("/{pr_number}/notes")))
            .json(&serde_json::json!({ "body": body }));
        let _: serde_json::Value = self.send_json(request).await?;
        Ok(())
    }

    async fn update_pr_comment(&self, pr_number: u64, comment_id: u64, body: &str) -> Result<()> {
        debug!(mr_iid = pr_number, comment_id, "updating MR comment");
        let request = self
            .client
            .put(self.mr_url(&format!("/{pr_number}/notes/{comment_id}")))
            .json(&serde_json::json!({ "body": body }));
        let _: serde_json::Value = self.send_json(request).await?;
        Ok(())
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }

    async fn get_pr_details(&self, pr_number: u64) -> Result<PullRequestDetails> {
        debug!(mr_iid = pr_number, "getting MR details");
        let mr: MergeRequestDetails = self
            .send_json(self.client.get(self.mr_url(&format!("/{pr_number}"))))
            .await?;

        Ok(PullRequestDetails {
            number: mr.iid,
            title: mr.title,
            body: mr.description,
            state: merge_state(&mr.state),
            is_draft: mr.draft,
            mergeable: mergeable_from_status(&mr.merge_status),
            head_ref: mr.source_branch,
            base_ref: mr.target_branch,
            html_url: mr.web_url,
        })
    }

    async fn check_merge_readiness(&self, pr_number: u64) -> Result<MergeReadiness> {
        debug!(mr_iid = pr_number, "checking merge readiness");
        let details = self.get_pr_details(pr_number).await?;

        // Approvals need a paid tier on some instances; unavailable means not approved
        let approvals: Option<MrApprovals> = self
            .try_json(
                self.client
                    .get(self.mr_url(&format!("/{pr_number}/approvals"))),
            )
            .await?;
        let is_approved = approvals.is_some_and(|a| a.approved);

        // Most recent pipeline first; none configured is not blocking
        let pipelines: Option<Vec<Pipeline>> = self
            .try_json(
                self.client
                    .get(self.mr_url(&format!("/{pr_number}/pipelines"))),
            )
            .await?;
        let ci_passed = pipelines
            .as_deref()
            .and_then(<[Pipeline]>::first)
            .is_none_or(|p| p.status == "success");

        let mut blocking_reasons = Vec::new();
        let mut uncertainties = Vec::new();
        if details.is_draft {
            blocking_reasons.push("MR is a draft".to_string());
        }
        if !is_approved {
            blocking_reasons.push("Not approved".to_string());
        }
        if !ci_passed {
            blocking_reasons.push("CI not passing".to_string());
        }
        match details.mergeable {
            Some(false) => blocking_reasons.push("Has merge conflicts".to_string()),
            None => uncertainties.push("Merge status still being checked".to_string()),
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
        debug!(mr_iid = pr_number, blocked = readiness.is_blocked(), "checked merge readiness");
        Ok(readiness)
    }

    async fn merge_pr(&self, pr_number: u64, method: MergeMethod) -> Result<MergeResult> {
        debug!(mr_iid = pr_number, %method, "merging MR");

        let body = match method {
            MergeMethod::Squash => {
                let details = self.get_pr_details(pr_number).await?;
                serde_json::json!({
                    "squash": true,
                    "squash_commit_message": format!(
                        "{} (!{pr_number})\n\n{}",
                        details.title,
                        details.body.unwrap_or_default()
                    )
                })
            }
            MergeMethod::Merge => serde_json::json!({}),
            MergeMethod::Rebase => serde_json::json!({ "merge_method": "rebase" }),
        };

        let request = self
            .client
            .put(self.mr_url(&format!("/{pr_number}/merge")))
            .json(&body);
        let response: MergeResponse = self.send_json(request).await?;

        let merged = response.state == "merged";
        debug!(mr_iid = pr_number, merged, sha = ?response.merge_commit_sha, "merge complete");
        Ok(MergeResult {
            merged,
            sha: response.merge_commit_sha,
            message: (!merged).then(|| format!("MR is {}", response.state)),
        })
    }
}

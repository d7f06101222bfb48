//! Mock platform service for testing
//!
//! Not every helper is used by every test binary.

#![allow(dead_code)]

use async_trait::async_trait;
use stak::error::{Error, Result};
use stak::platform::PlatformService;
use stak::types::{
    MergeMethod, MergeReadiness, MergeResult, Platform, PlatformConfig, PrComment, PrState,
    PullRequest, PullRequestDetails,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Call record for `create_pr`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePrCall {
    pub head: String,
    pub base: String,
    pub title: String,
    pub body: Option<String>,
    pub draft: bool,
}

/// Call record for `update_pr_base`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateBaseCall {
    pub pr_number: u64,
    pub new_base: String,
}

/// Call record for `create_pr_comment` and `update_pr_comment`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentCall {
    pub pr_number: u64,
    pub comment_id: Option<u64>,
    pub body: String,
}

/// Call record for `merge_pr`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePrCall {
    pub pr_number: u64,
    pub method: MergeMethod,
}

/// Hand-written platform mock
///
/// Features:
/// - Auto-incrementing PR numbers
/// - Call tracking for verification
/// - Configurable responses per branch and per PR
/// - Error injection for failure path testing
/// - A successful `merge_pr` flips the stored details to merged
pub struct MockPlatformService {
    config: PlatformConfig,
    next_pr_number: AtomicU64,
    find_pr_responses: Mutex<HashMap<String, Option<PullRequest>>>,
    list_comments_responses: Mutex<HashMap<u64, Vec<PrComment>>>,
    pr_details_responses: Mutex<HashMap<u64, PullRequestDetails>>,
    merge_readiness_responses: Mutex<HashMap<u64, MergeReadiness>>,
    merge_responses: Mutex<HashMap<u64, MergeResult>>,
    // Call tracking
    find_pr_calls: Mutex<Vec<String>>,
    create_pr_calls: Mutex<Vec<CreatePrCall>>,
    update_base_calls: Mutex<Vec<UpdateBaseCall>>,
    comment_calls: Mutex<Vec<CommentCall>>,
    close_calls: Mutex<Vec<u64>>,
    get_pr_details_calls: Mutex<Vec<u64>>,
    merge_pr_calls: Mutex<Vec<MergePrCall>>,
    // Error injection
    error_on_find_pr: Mutex<Option<String>>,
    error_on_update_base: Mutex<Option<String>>,
    error_on_merge_pr: Mutex<Option<String>>,
}

impl Default for MockPlatformService {
    fn default() -> Self {
        Self::with_config(PlatformConfig {
            platform: Platform::GitHub,
            owner: "test".to_string(),
            repo: "repo".to_string(),
            host: None,
        })
    }
}

impl MockPlatformService {
    /// Create a new mock for `test/repo` on GitHub
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new mock with the given config
    pub fn with_config(config: PlatformConfig) -> Self {
        Self {
            config,
            next_pr_number: AtomicU64::new(100),
            find_pr_responses: Mutex::new(HashMap::new()),
            list_comments_responses: Mutex::new(HashMap::new()),
            pr_details_responses: Mutex::new(HashMap::new()),
            merge_readiness_responses: Mutex::new(HashMap::new()),
            merge_responses: Mutex::new(HashMap::new()),
            find_pr_calls: Mutex::new(Vec::new()),
            create_pr_calls: Mutex::new(Vec::new()),
            update_base_calls: Mutex::new(Vec::new()),
            comment_calls: Mutex::new(Vec::new()),
            close_calls: Mutex::new(Vec::new()),
            get_pr_details_calls: Mutex::new(Vec::new()),
            merge_pr_calls: Mutex::new(Vec::new()),
            error_on_find_pr: Mutex::new(None),
            error_on_update_base: Mutex::new(None),
            error_on_merge_pr: Mutex::new(None),
        }
    }

    // === Error injection methods ===

    /// Make `find_existing_pr` return an error
    pub fn fail_find_pr(&self, msg: &str) {
        *self.error_on_find_pr.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `update_pr_base` return an error
    pub fn fail_update_base(&self, msg: &str) {
        *self.error_on_update_base.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `merge_pr` return an error
    pub fn fail_merge_pr(&self, msg: &str) {
        *self.error_on_merge_pr.lock().unwrap() = Some(msg.to_string());
    }

    // === Response setup ===

    /// Set the response for `find_existing_pr` for a specific branch
    pub fn set_find_pr_response(&self, branch: &str, pr: Option<PullRequest>) {
        self.find_pr_responses
            .lock()
            .unwrap()
            .insert(branch.to_string(), pr);
    }

    /// Set the response for `list_pr_comments` for a specific PR
    pub fn set_list_comments_response(&self, pr_number: u64, comments: Vec<PrComment>) {
        self.list_comments_responses
            .lock()
            .unwrap()
            .insert(pr_number, comments);
    }

    /// Set the response for `get_pr_details` for a specific PR
    pub fn set_pr_details_response(&self, pr_number: u64, details: PullRequestDetails) {
        self.pr_details_responses
            .lock()
            .unwrap()
            .insert(pr_number, details);
    }

    /// Set the response for `check_merge_readiness` for a specific PR
    pub fn set_merge_readiness_response(&self, pr_number: u64, readiness: MergeReadiness) {
        self.merge_readiness_responses
            .lock()
            .unwrap()
            .insert(pr_number, readiness);
    }

    /// Set the response for `merge_pr` for a specific PR
    pub fn set_merge_response(&self, pr_number: u64, result: MergeResult) {
        self.merge_responses
            .lock()
            .unwrap()
            .insert(pr_number, result);
    }

    /// Helper: an open PR for `branch` against `base` with the given state
    pub fn setup_pr(&self, pr_number: u64, branch: &str, base: &str, state: PrState) {
        self.set_find_pr_response(
            branch,
            (state == PrState::Open).then(|| pull_request(pr_number, branch, base)),
        );
        self.set_pr_details_response(pr_number, details(pr_number, branch, base, state));
    }

    /// Helper: an open, approved, green PR that merges successfully
    pub fn setup_mergeable_pr(&self, pr_number: u64, branch: &str, base: &str) {
        self.setup_pr(pr_number, branch, base, PrState::Open);
        self.set_merge_readiness_response(pr_number, ready());
        self.set_merge_response(
            pr_number,
            MergeResult {
                merged: true,
                sha: Some(format!("merged_sha_{pr_number}")),
                message: None,
            },
        );
    }

    /// Helper: an open PR waiting for review
    pub fn setup_unapproved_pr(&self, pr_number: u64, branch: &str, base: &str) {
        self.setup_pr(pr_number, branch, base, PrState::Open);
        self.set_merge_readiness_response(
            pr_number,
            MergeReadiness {
                is_approved: false,
                blocking_reasons: vec!["Not approved".to_string()],
                ..ready()
            },
        );
    }

    /// Mark a PR as landed outside of stak
    pub fn land_externally(&self, pr_number: u64) {
        if let Some(details) = self.pr_details_responses.lock().unwrap().get_mut(&pr_number) {
            details.state = PrState::Merged;
        }
    }

    // === Call verification methods ===

    /// Get all branches that `find_existing_pr` was called with
    pub fn get_find_pr_calls(&self) -> Vec<String> {
        self.find_pr_calls.lock().unwrap().clone()
    }

    /// Get all `create_pr` calls
    pub fn get_create_pr_calls(&self) -> Vec<CreatePrCall> {
        self.create_pr_calls.lock().unwrap().clone()
    }

    /// Get all `update_pr_base` calls
    pub fn get_update_base_calls(&self) -> Vec<UpdateBaseCall> {
        self.update_base_calls.lock().unwrap().clone()
    }

    /// Get all comment create/update calls
    pub fn get_comment_calls(&self) -> Vec<CommentCall> {
        self.comment_calls.lock().unwrap().clone()
    }

    /// Get all `close_pr` calls
    pub fn get_close_calls(&self) -> Vec<u64> {
        self.close_calls.lock().unwrap().clone()
    }

    /// Get all `get_pr_details` calls
    pub fn get_pr_details_calls(&self) -> Vec<u64> {
        self.get_pr_details_calls.lock().unwrap().clone()
    }

    /// Get all `merge_pr` calls
    pub fn get_merge_pr_calls(&self) -> Vec<MergePrCall> {
        self.merge_pr_calls.lock().unwrap().clone()
    }

    /// Assert that `update_pr_base` was called with specific args
    pub fn assert_update_base_called(&self, pr_number: u64, new_base: &str) {
        let calls = self.get_update_base_calls();
        assert!(
            calls
                .iter()
                .any(|c| c.pr_number == pr_number && c.new_base == new_base),
            "Expected update_pr_base({pr_number}, {new_base}) but got: {calls:?}"
        );
    }

    /// Assert that `merge_pr` was called with a specific method
    pub fn assert_merge_called_with_method(&self, pr_number: u64, method: MergeMethod) {
        let calls = self.get_merge_pr_calls();
        assert!(
            calls.iter().any(|c| c.pr_number == pr_number && c.method == method),
            "Expected merge_pr({pr_number}, {method:?}) but got: {calls:?}"
        );
    }

    /// Get count of `merge_pr` calls
    pub fn merge_call_count(&self) -> usize {
        self.merge_pr_calls.lock().unwrap().len()
    }
}

/// Open pull request fixture
pub fn pull_request(number: u64, head: &str, base: &str) -> PullRequest {
    PullRequest {
        number,
        html_url: format!("https://github.com/test/repo/pull/{number}"),
        base_ref: base.to_string(),
        head_ref: head.to_string(),
        title: format!("Add {head}"),
        is_draft: false,
    }
}

/// Details fixture
pub fn details(number: u64, head: &str, base: &str, state: PrState) -> PullRequestDetails {
    PullRequestDetails {
        number,
        title: format!("Add {head}"),
        body: Some("PR body".to_string()),
        state,
        is_draft: false,
        mergeable: Some(true),
        head_ref: head.to_string(),
        base_ref: base.to_string(),
        html_url: format!("https://github.com/test/repo/pull/{number}"),
    }
}

/// Approved, green, conflict-free readiness
pub fn ready() -> MergeReadiness {
    MergeReadiness {
        is_approved: true,
        ci_passed: true,
        is_mergeable: Some(true),
        is_draft: false,
        blocking_reasons: vec![],
        uncertainties: vec![],
    }
}

#[async_trait]
impl PlatformService for MockPlatformService {
    async fn find_existing_pr(&self, head_branch: &str) -> Result<Option<PullRequest>> {
        self.find_pr_calls
            .lock()
            .unwrap()
            .push(head_branch.to_string());

        if let Some(msg) = self.error_on_find_pr.lock().unwrap().as_ref() {
            return Err(Error::Platform(msg.clone()));
        }

        let responses = self.find_pr_responses.lock().unwrap();
        Ok(responses.get(head_branch).cloned().flatten())
    }

    async fn create_pr_with_options(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: Option<&str>,
        draft: bool,
    ) -> Result<PullRequest> {
        self.create_pr_calls.lock().unwrap().push(CreatePrCall {
            head: head.to_string(),
            base: base.to_string(),
            title: title.to_string(),
            body: body.map(ToString::to_string),
            draft,
        });

        let number = self.next_pr_number.fetch_add(1, Ordering::SeqCst);
        Ok(PullRequest {
            title: title.to_string(),
            is_draft: draft,
            ..pull_request(number, head, base)
        })
    }

    async fn update_pr_base(&self, pr_number: u64, new_base: &str) -> Result<PullRequest> {
        self.update_base_calls.lock().unwrap().push(UpdateBaseCall {
            pr_number,
            new_base: new_base.to_string(),
        });

        if let Some(msg) = self.error_on_update_base.lock().unwrap().as_ref() {
            return Err(Error::Platform(msg.clone()));
        }

        let mut stored = self.pr_details_responses.lock().unwrap();
        let head = stored.get_mut(&pr_number).map_or_else(
            || "updated".to_string(),
            |d| {
                d.base_ref = new_base.to_string();
                d.head_ref.clone()
            },
        );
        Ok(pull_request(pr_number, &head, new_base))
    }

    async fn update_pr(
        &self,
        pr_number: u64,
        title: Option<&str>,
        _body: Option<&str>,
    ) -> Result<PullRequest> {
        let mut pr = pull_request(pr_number, "updated", "main");
        if let Some(title) = title {
            pr.title = title.to_string();
        }
        Ok(pr)
    }

    async fn close_pr(&self, pr_number: u64) -> Result<()> {
        self.close_calls.lock().unwrap().push(pr_number);
        Ok(())
    }

    async fn list_pr_comments(&self, pr_number: u64) -> Result<Vec<PrComment>> {
        let responses = self.list_comments_responses.lock().unwrap();
        Ok(responses.get(&pr_number).cloned().unwrap_or_default())
    }

    async fn create_pr_comment(&self, pr_number: u64, body: &str) -> Result<()> {
        self.comment_calls.lock().unwrap().push(CommentCall {
            pr_number,
            comment_id: None,
            body: body.to_string(),
        });
        Ok(())
    }

    async fn update_pr_comment(&self, pr_number: u64, comment_id: u64, body: &str) -> Result<()> {
        self.comment_calls.lock().unwrap().push(CommentCall {
            pr_number,
            comment_id: Some(comment_id),
            body: body.to_string(),
        });
        Ok(())
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }

    async fn get_pr_details(&self, pr_number: u64) -> Result<PullRequestDetails> {
        self.get_pr_details_calls.lock().unwrap().push(pr_number);

        let responses = self.pr_details_responses.lock().unwrap();
        responses.get(&pr_number).cloned().ok_or_else(|| {
            Error::Platform(format!(
                "get_pr_details: no response configured for PR #{pr_number}"
            ))
        })
    }

    async fn check_merge_readiness(&self, pr_number: u64) -> Result<MergeReadiness> {
        let responses = self.merge_readiness_responses.lock().unwrap();
        responses.get(&pr_number).cloned().ok_or_else(|| {
            Error::Platform(format!(
                "check_merge_readiness: no response configured for PR #{pr_number}"
            ))
        })
    }

    async fn merge_pr(&self, pr_number: u64, method: MergeMethod) -> Result<MergeResult> {
        self.merge_pr_calls
            .lock()
            .unwrap()
            .push(MergePrCall { pr_number, method });

        if let Some(msg) = self.error_on_merge_pr.lock().unwrap().as_ref() {
            return Err(Error::Platform(msg.clone()));
        }

        let result = self
            .merge_responses
            .lock()
            .unwrap()
            .get(&pr_number)
            .cloned()
            .ok_or_else(|| {
                Error::Platform(format!("merge_pr: no response configured for PR #{pr_number}"))
            })?;
        if result.merged {
            self.land_externally(pr_number);
        }
        Ok(result)
    }
}

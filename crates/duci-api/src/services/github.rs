//! GitHub API client for commit statuses and pull-request lookups.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use duci_core::{CommitState, CommitStatusClient, Repository};

const DEFAULT_API_ROOT: &str = "https://api.github.com";

/// GitHub API client.
pub struct GitHubClient {
    client: reqwest::Client,
    api_token: String,
    api_root: String,
}

/// Head of a pull request, resolved for issue-comment jobs.
#[derive(Debug, Deserialize)]
pub struct PullRequestHead {
    pub r#ref: String,
    pub sha: String,
}

#[derive(Debug, Deserialize)]
struct PullRequestResponse {
    head: PullRequestHead,
}

impl GitHubClient {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_token: api_token.into(),
            api_root: DEFAULT_API_ROOT.to_string(),
        }
    }

    /// Point the client at a different API root (for tests and GHE).
    pub fn with_api_root(mut self, api_root: impl Into<String>) -> Self {
        self.api_root = api_root.into();
        self
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("Authorization", format!("token {}", self.api_token))
            .header("User-Agent", "duci")
            .header("Accept", "application/vnd.github+json")
    }

    /// Fetch the head ref and SHA of a pull request.
    pub async fn get_pull_request(
        &self,
        full_name: &str,
        number: u64,
    ) -> Result<PullRequestHead, GitHubError> {
        let url = format!("{}/repos/{}/pulls/{}", self.api_root, full_name, number);

        let response = self
            .request(self.client.get(&url))
            .send()
            .await
            .map_err(|e| GitHubError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GitHubError::Api(format!(
                "failed to get pull request: {text}"
            )));
        }

        let pr: PullRequestResponse = response
            .json()
            .await
            .map_err(|e| GitHubError::Parse(e.to_string()))?;
        Ok(pr.head)
    }
}

/// Human-readable status message for a state.
fn description_of(state: CommitState) -> &'static str {
    match state {
        CommitState::Pending => "the job is running",
        CommitState::Success => "the job succeeded",
        CommitState::Failure => "the command exited non-zero",
        CommitState::Error => "the job could not be completed",
    }
}

/// Body of a commit-status POST. The task label becomes the status
/// `context`, the identity GitHub keys checks by, so push, PR, and comment
/// jobs report as distinct checks on the same commit.
fn status_body(state: CommitState, context: &str, target_url: &str) -> serde_json::Value {
    json!({
        "state": state.as_str(),
        "description": description_of(state),
        "target_url": target_url,
        "context": context,
    })
}

#[async_trait]
impl CommitStatusClient for GitHubClient {
    async fn create_commit_status(
        &self,
        repository: &Repository,
        sha: &str,
        state: CommitState,
        context: &str,
        target_url: &str,
    ) -> duci_core::Result<()> {
        let url = format!(
            "{}/repos/{}/statuses/{}",
            self.api_root, repository.full_name, sha
        );

        let body = status_body(state, context, target_url);

        let response = self
            .request(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| duci_core::Error::Internal(e.to_string()))?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(duci_core::Error::Internal(format!(
                "failed to create commit status: {text}"
            )));
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("GitHub API error: {0}")]
    Api(String),

    #[error("unexpected response: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_context_is_the_task_label() {
        let body = status_body(
            CommitState::Pending,
            "duci/push",
            "https://github.com/duck/pond/compare/abc...def",
        );

        assert_eq!(body["context"], "duci/push");
        assert_eq!(body["state"], "pending");
        assert_eq!(
            body["target_url"],
            "https://github.com/duck/pond/compare/abc...def"
        );
    }

    #[test]
    fn status_description_tracks_the_state() {
        for (state, wire) in [
            (CommitState::Pending, "pending"),
            (CommitState::Success, "success"),
            (CommitState::Failure, "failure"),
            (CommitState::Error, "error"),
        ] {
            let body = status_body(state, "duci/pr", "https://github.com/duck/pond/pull/8");
            assert_eq!(body["state"], wire);
            assert!(!body["description"].as_str().unwrap().is_empty());
        }
    }
}

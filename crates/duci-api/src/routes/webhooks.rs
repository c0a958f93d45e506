//! Webhook receiver for GitHub events.
//!
//! Accepted events spawn a job on a detached task and return immediately;
//! progress is observable through commit statuses and `GET /logs/{uuid}`.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use tracing::{info, warn};
use url::Url;

use duci_core::{Job, JobId, Repository};

use crate::AppState;
use crate::error::ApiError;

const ZERO_SHA: &str = "0000000000000000000000000000000000000000";

#[derive(Debug, Deserialize)]
struct RepositoryPayload {
    full_name: String,
    ssh_url: String,
}

impl From<RepositoryPayload> for Repository {
    fn from(payload: RepositoryPayload) -> Self {
        Repository {
            full_name: payload.full_name,
            ssh_url: payload.ssh_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PushPayload {
    r#ref: String,
    after: String,
    compare: String,
    repository: RepositoryPayload,
}

#[derive(Debug, Deserialize)]
struct PullRequestPayload {
    action: String,
    pull_request: PullRequestDetail,
    repository: RepositoryPayload,
}

#[derive(Debug, Deserialize)]
struct PullRequestDetail {
    html_url: String,
    head: HeadRef,
}

#[derive(Debug, Deserialize)]
struct HeadRef {
    r#ref: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct IssueCommentPayload {
    action: String,
    comment: CommentDetail,
    issue: IssueDetail,
    repository: RepositoryPayload,
}

#[derive(Debug, Deserialize)]
struct CommentDetail {
    body: String,
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct IssueDetail {
    number: u64,
    /// Present only when the issue is a pull request.
    pull_request: Option<serde_json::Value>,
}

/// Handle a GitHub webhook delivery.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let event = headers
        .get("X-GitHub-Event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    if let Some(ref secret) = state.webhook_secret {
        let signature = headers
            .get("X-Hub-Signature-256")
            .and_then(|v| v.to_str().ok());
        if !verify_github_signature(secret, &body, signature) {
            warn!(event = %event, "invalid webhook signature");
            return Err(ApiError::Unauthorized("invalid signature".to_string()));
        }
    }

    let job = match event {
        "push" => {
            let payload: PushPayload = serde_json::from_slice(&body)
                .map_err(|e| ApiError::BadRequest(format!("invalid push payload: {e}")))?;
            push_job(payload)?
        }
        "pull_request" => {
            let payload: PullRequestPayload = serde_json::from_slice(&body)
                .map_err(|e| ApiError::BadRequest(format!("invalid pull_request payload: {e}")))?;
            pull_request_job(payload)?
        }
        "issue_comment" => {
            let payload: IssueCommentPayload = serde_json::from_slice(&body)
                .map_err(|e| ApiError::BadRequest(format!("invalid issue_comment payload: {e}")))?;
            comment_job(&state, payload).await?
        }
        "ping" => {
            info!("ping event received");
            None
        }
        _ => {
            info!(event = %event, "unhandled event type");
            None
        }
    };

    let Some(job) = job else {
        return Ok((StatusCode::OK, Json(json!({"message": "skipped"}))));
    };

    let id = job.id;
    info!(job = %id, event = %event, repo = %job.repository.full_name, "job accepted");

    // Fire and forget: the response does not await job completion.
    let runner = state.runner.clone();
    tokio::spawn(async move {
        let _ = runner.run(job).await;
    });

    Ok((StatusCode::OK, Json(json!({"id": id.to_string()}))))
}

/// Job for a push event. Branch deletions (zero after-SHA) are skipped.
fn push_job(payload: PushPayload) -> Result<Option<Job>, ApiError> {
    if payload.after == ZERO_SHA {
        return Ok(None);
    }

    let target_url = parse_url(&payload.compare)?;
    Ok(Some(Job {
        id: JobId::new(),
        task: "duci/push".to_string(),
        target_url,
        repository: payload.repository.into(),
        r#ref: branch_of(&payload.r#ref).to_string(),
        sha: Some(payload.after),
        command: Vec::new(),
    }))
}

/// Job for a pull-request event; only opened and synchronized PRs build.
fn pull_request_job(payload: PullRequestPayload) -> Result<Option<Job>, ApiError> {
    if payload.action != "opened" && payload.action != "synchronize" {
        return Ok(None);
    }

    let target_url = parse_url(&payload.pull_request.html_url)?;
    Ok(Some(Job {
        id: JobId::new(),
        task: "duci/pr".to_string(),
        target_url,
        repository: payload.repository.into(),
        r#ref: payload.pull_request.head.r#ref,
        sha: Some(payload.pull_request.head.sha),
        command: Vec::new(),
    }))
}

/// Job for a `ci ...` comment on a pull request. The PR head is resolved
/// through the GitHub API because the comment payload does not carry it.
async fn comment_job(
    state: &AppState,
    payload: IssueCommentPayload,
) -> Result<Option<Job>, ApiError> {
    if payload.action != "created" || payload.issue.pull_request.is_none() {
        return Ok(None);
    }
    let Some(command) = comment_command(&payload.comment.body) else {
        return Ok(None);
    };

    let head = state
        .github
        .get_pull_request(&payload.repository.full_name, payload.issue.number)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let target_url = parse_url(&payload.comment.html_url)?;
    Ok(Some(Job {
        id: JobId::new(),
        task: "duci/comment".to_string(),
        target_url,
        repository: payload.repository.into(),
        r#ref: head.r#ref,
        sha: Some(head.sha),
        command,
    }))
}

/// Extract the command from a `ci ...` comment body.
fn comment_command(body: &str) -> Option<Vec<String>> {
    let rest = body.trim().strip_prefix("ci ")?;
    let command: Vec<String> = rest.split_whitespace().map(String::from).collect();
    if command.is_empty() { None } else { Some(command) }
}

/// Branch name of a push ref, e.g. `refs/heads/master` -> `master`.
fn branch_of(r#ref: &str) -> &str {
    r#ref
        .strip_prefix("refs/heads/")
        .or_else(|| r#ref.strip_prefix("refs/tags/"))
        .unwrap_or(r#ref)
}

fn parse_url(raw: &str) -> Result<Url, ApiError> {
    Url::parse(raw).map_err(|e| ApiError::BadRequest(format!("invalid URL {raw}: {e}")))
}

/// Verify a GitHub webhook signature.
fn verify_github_signature(secret: &str, body: &[u8], signature: Option<&str>) -> bool {
    let Some(signature) = signature else {
        return false;
    };

    // Signature format: "sha256=<hex>"
    let Some(sig_hex) = signature.strip_prefix("sha256=") else {
        return false;
    };

    let Ok(sig_bytes) = hex::decode(sig_hex) else {
        return false;
    };

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC can take any size key");
    mac.update(body);

    mac.verify_slice(&sig_bytes).is_ok()
}

//! Application state.

use std::sync::Arc;

use duci_core::LogStore;
use duci_runner::DockerRunner;

use crate::services::github::GitHubClient;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<DockerRunner>,
    pub store: Arc<dyn LogStore>,
    pub github: Arc<GitHubClient>,
    /// When set, webhook deliveries must carry a valid
    /// `X-Hub-Signature-256` header.
    pub webhook_secret: Option<String>,
}

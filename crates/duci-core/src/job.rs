//! Job and repository descriptors.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::JobId;

/// Immutable record describing one job invocation.
#[derive(Debug, Clone)]
pub struct Job {
    /// Unique identifier for this job.
    pub id: JobId,
    /// Task class, e.g. `duci/push`. Used as the commit-status description.
    pub task: String,
    /// Originating URL, linked from the commit status for human reference.
    pub target_url: Url,
    /// Repository to clone.
    pub repository: Repository,
    /// Branch or tag name.
    pub r#ref: String,
    /// Exact commit to check out. `None` means the tip of `ref`.
    pub sha: Option<String>,
    /// Command executed inside the built container.
    pub command: Vec<String>,
}

/// The two observations the orchestrator needs from a repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    /// `owner/name`.
    pub full_name: String,
    /// SSH clone URL.
    pub ssh_url: String,
}

/// User-supplied parameters applied when launching the container.
///
/// Parsed from `.duci/config.yml` in the cloned tree; unknown keys are
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeOptions {
    /// `hostPath:containerPath[:mode]` strings, passed verbatim as binds.
    #[serde(default)]
    pub volumes: Vec<String>,
}

/// Commit status states understood by the source-code host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitState {
    Pending,
    Success,
    Failure,
    Error,
}

impl CommitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitState::Pending => "pending",
            CommitState::Success => "success",
            CommitState::Failure => "failure",
            CommitState::Error => "error",
        }
    }
}

impl std::fmt::Display for CommitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_state_wire_strings() {
        assert_eq!(CommitState::Pending.to_string(), "pending");
        assert_eq!(CommitState::Success.to_string(), "success");
        assert_eq!(CommitState::Failure.to_string(), "failure");
        assert_eq!(CommitState::Error.to_string(), "error");
    }

    #[test]
    fn runtime_options_ignore_unknown_keys() {
        let opts: RuntimeOptions =
            serde_yaml::from_str("volumes:\n  - /hello:/hello\nfuture_key: 1\n").unwrap();
        assert_eq!(opts.volumes, vec!["/hello:/hello".to_string()]);
    }

    #[test]
    fn runtime_options_default_is_empty() {
        assert!(RuntimeOptions::default().volumes.is_empty());
    }
}

//! Git transport: clones a ref (and optionally an exact revision) into a
//! job workspace over SSH.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use duci_core::{Error, GitClient, Result};

/// Service for git operations, authenticating with the configured SSH key.
pub struct GitService {
    ssh_key_path: PathBuf,
}

impl GitService {
    pub fn new(ssh_key_path: impl Into<PathBuf>) -> Self {
        Self {
            ssh_key_path: ssh_key_path.into(),
        }
    }

    fn ssh_command(&self) -> String {
        format!(
            "ssh -i {} -o StrictHostKeyChecking=no",
            self.ssh_key_path.display()
        )
    }

    async fn git(&self, args: &[&str], cwd: Option<&Path>) -> Result<()> {
        let mut command = Command::new("git");
        command
            .args(args)
            .env("GIT_SSH_COMMAND", self.ssh_command())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A clone abandoned by the job deadline must not keep running.
            .kill_on_drop(true);
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }

        debug!(?args, "running git");
        let output = command
            .output()
            .await
            .map_err(|e| Error::Clone(format!("failed to spawn git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Clone(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl GitClient for GitService {
    async fn clone_repository(
        &self,
        dir: &Path,
        ssh_url: &str,
        r#ref: &str,
        sha: Option<&str>,
    ) -> Result<()> {
        info!(url = %ssh_url, r#ref = %r#ref, dir = %dir.display(), "cloning repository");

        let dir_arg = dir.to_str().ok_or_else(|| {
            Error::Clone(format!("workspace path is not valid UTF-8: {}", dir.display()))
        })?;
        self.git(
            &["clone", "--branch", r#ref, "--single-branch", ssh_url, dir_arg],
            None,
        )
        .await?;

        if let Some(sha) = sha {
            self.git(&["checkout", "--detach", sha], Some(dir)).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssh_command_names_the_configured_key() {
        let service = GitService::new("/path/to/ssh_key");
        assert_eq!(
            service.ssh_command(),
            "ssh -i /path/to/ssh_key -o StrictHostKeyChecking=no"
        );
    }

    #[tokio::test]
    async fn clone_failure_surfaces_as_a_clone_error() {
        let dir = tempfile::tempdir().unwrap();
        let service = GitService::new("/path/to/missing_key");

        let err = service
            .clone_repository(
                &dir.path().join("clone"),
                "file:///path/to/nothing.git",
                "master",
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Clone(_)));
    }
}

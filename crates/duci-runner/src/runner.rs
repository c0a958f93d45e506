//! The per-job state machine.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::{error, info, warn};

use duci_core::client::LogStream;
use duci_core::{
    CommitState, CommitStatusClient, ContainerClient, Error, GitClient, Job, JobId, LogStore,
    Result,
};
use duci_executor::archive;

use crate::deadline::Deadline;
use crate::gate::ConcurrencyGate;
use crate::recipe;
use crate::sink::LogSink;
use crate::workspace::WorkspaceManager;

/// Drives one job end to end: admission, commit-status bracketing, clone,
/// image build, container run, log persistence, and cleanup of container,
/// workspace, and log record on every exit path.
pub struct DockerRunner {
    name: String,
    workspaces: WorkspaceManager,
    git: Arc<dyn GitClient>,
    hub: Arc<dyn CommitStatusClient>,
    docker: Arc<dyn ContainerClient>,
    sink: LogSink,
    gate: ConcurrencyGate,
    timeout: Duration,
}

impl DockerRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        base_work_dir: impl Into<PathBuf>,
        git: Arc<dyn GitClient>,
        hub: Arc<dyn CommitStatusClient>,
        docker: Arc<dyn ContainerClient>,
        store: Arc<dyn LogStore>,
        gate: ConcurrencyGate,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            workspaces: WorkspaceManager::new(base_work_dir),
            git,
            hub,
            docker,
            sink: LogSink::new(store),
            gate,
            timeout,
        }
    }

    /// Run `job` to completion. Blocks until a concurrency slot is free,
    /// then holds it for the whole run. Returns `Ok` when the container
    /// exited zero, [`Error::Failure`] when it exited non-zero, and the
    /// first infrastructure error otherwise.
    pub async fn run(&self, job: Job) -> Result<()> {
        let _permit = self.gate.acquire().await;
        info!(job = %job.id, task = %job.task, repo = %job.repository.full_name, "job admitted");

        self.report(&job, CommitState::Pending).await;

        if let Err(e) = self.sink.start(job.id).await {
            error!(job = %job.id, error = %e, "failed to open the log record");
            self.report(&job, CommitState::Error).await;
            return Err(e);
        }

        let deadline = Deadline::after(self.timeout);
        let result = self.execute(&job, &deadline).await;

        // The record is closed on every terminal path, even after expiry,
        // so pollers of the log endpoint always observe completion.
        if let Err(e) = self.sink.finish(job.id).await {
            warn!(job = %job.id, error = %e, "failed to close the log record");
        }

        self.report(&job, terminal_state(&result)).await;
        match &result {
            Ok(()) => info!(job = %job.id, "job succeeded"),
            Err(e) if e.is_failure() => info!(job = %job.id, "job failed"),
            Err(e) => warn!(job = %job.id, error = %e, "job ended with an error"),
        }
        result
    }

    async fn execute(&self, job: &Job, deadline: &Deadline) -> Result<()> {
        let workspace = self.workspaces.prepare(job.id)?;
        let result = self.execute_in(&workspace, job, deadline).await;
        self.workspaces.release(&workspace);
        result
    }

    async fn execute_in(&self, workspace: &Path, job: &Job, deadline: &Deadline) -> Result<()> {
        deadline
            .run(self.git.clone_repository(
                workspace,
                &job.repository.ssh_url,
                &job.r#ref,
                job.sha.as_deref(),
            ))
            .await?;

        let dockerfile = recipe::dockerfile(workspace);
        let options = recipe::runtime_options(workspace)?;

        let tag = image_tag(&self.name, &job.repository.full_name, job.id);
        let context = archive::pack(workspace)?;

        // The build log is drained before the container starts so the
        // user-facing run output is never interleaved with image noise.
        let build_log = deadline
            .run(self.docker.build(context, &tag, &dockerfile))
            .await?;
        deadline.run(self.drain(job.id, build_log)).await?;

        let (container_id, run_log) = deadline
            .run(self.docker.run(&options, &tag, &job.command))
            .await?;

        let mut result = self.observe(job.id, run_log, &container_id, deadline).await;

        // Removal is not deadline-bound: a timed-out job must still reclaim
        // its container. The first error wins over a removal error.
        if let Err(e) = self.docker.rm(&container_id).await {
            error!(job = %job.id, container = %container_id, error = %e, "failed to remove container");
            if result.is_ok() {
                result = Err(e);
            }
        }

        result
    }

    async fn observe(
        &self,
        id: JobId,
        run_log: LogStream,
        container_id: &str,
        deadline: &Deadline,
    ) -> Result<()> {
        deadline.run(self.drain(id, run_log)).await?;

        let code = deadline.run(self.docker.exit_code(container_id)).await?;
        if code != 0 {
            info!(job = %id, code, "container exited non-zero");
            return Err(Error::Failure);
        }
        Ok(())
    }

    /// Append every line of `stream` to the log sink, in arrival order.
    async fn drain(&self, id: JobId, mut stream: LogStream) -> Result<()> {
        while let Some(line) = stream.next().await {
            self.sink.append(id, line?).await?;
        }
        Ok(())
    }

    async fn report(&self, job: &Job, state: CommitState) {
        let sha = job.sha.as_deref().unwrap_or(&job.r#ref);
        if let Err(e) = self
            .hub
            .create_commit_status(&job.repository, sha, state, &job.task, job.target_url.as_str())
            .await
        {
            error!(job = %job.id, state = %state, error = %e, "failed to report commit status");
        }
    }
}

/// Deterministic image tag for a job.
fn image_tag(runner_name: &str, repo_full_name: &str, id: JobId) -> String {
    format!("{runner_name}/{repo_full_name}:{id}").to_lowercase()
}

/// Terminal commit status for a finished job.
fn terminal_state(result: &Result<()>) -> CommitState {
    match result {
        Ok(()) => CommitState::Success,
        Err(Error::Failure) => CommitState::Failure,
        Err(_) => CommitState::Error,
    }
}

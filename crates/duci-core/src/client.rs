//! Trait seams consumed by the job orchestrator.
//!
//! Each external collaborator (git transport, container daemon, commit
//! status host, log store) is typed as an async trait so the orchestrator
//! can be exercised against mocks.

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::path::Path;

use crate::{CommitState, JobId, LogLine, LogMessage, LogRecord, Repository, Result, RuntimeOptions};

/// A lazy, finite, non-restartable sequence of log lines. The stream ends
/// when the underlying source reaches end-of-stream; read errors abort the
/// consuming job.
pub type LogStream = BoxStream<'static, Result<LogLine>>;

/// Git transport used to materialize a revision into a workspace.
#[async_trait]
pub trait GitClient: Send + Sync {
    /// Clone `ssh_url` into `dir`, checked out at `sha` if given, otherwise
    /// at the tip of `r#ref`.
    async fn clone_repository(
        &self,
        dir: &Path,
        ssh_url: &str,
        r#ref: &str,
        sha: Option<&str>,
    ) -> Result<()>;
}

/// Container daemon primitives: build, run, exit code, remove.
#[async_trait]
pub trait ContainerClient: Send + Sync {
    /// Build an image named `tag` from an uncompressed tar build context,
    /// using the recipe at `dockerfile` inside the context. Returns the
    /// build log stream.
    async fn build(&self, context_tar: Vec<u8>, tag: &str, dockerfile: &str) -> Result<LogStream>;

    /// Create and start a container from `tag` running `command`. Returns
    /// the container id and the run log stream.
    async fn run(
        &self,
        options: &RuntimeOptions,
        tag: &str,
        command: &[String],
    ) -> Result<(String, LogStream)>;

    /// Wait for the container to stop and return its exit code.
    async fn exit_code(&self, container_id: &str) -> Result<i64>;

    /// Remove the container.
    async fn rm(&self, container_id: &str) -> Result<()>;
}

/// Commit-status host (GitHub).
#[async_trait]
pub trait CommitStatusClient: Send + Sync {
    /// Post `state` against `sha`. `context` is the status identity on the
    /// host (the job's task label), so distinct task types never overwrite
    /// each other's checks on the same commit.
    async fn create_commit_status(
        &self,
        repository: &Repository,
        sha: &str,
        state: CommitState,
        context: &str,
        target_url: &str,
    ) -> Result<()>;
}

/// Persistent keyed log store. Exactly one concurrent writer per job;
/// the orchestrator serializes appends per job id.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Write `{finished: false, stream: []}`, overwriting any prior record.
    async fn start(&self, id: JobId) -> Result<()>;

    /// Read the current record (or initialize an empty one), append
    /// `message`, write back.
    async fn append(&self, id: JobId, message: LogMessage) -> Result<()>;

    /// Set the terminal `finished` flag.
    async fn finish(&self, id: JobId) -> Result<()>;

    /// Fetch the record for `id`.
    async fn get(&self, id: JobId) -> Result<LogRecord>;

    /// Release the underlying store handle.
    async fn close(&self) -> Result<()>;
}

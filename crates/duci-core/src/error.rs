//! Error types for duci.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Concurrency gate could not be constructed. Fatal at boot.
    #[error("admission error: {0}")]
    Admission(String),

    /// Source retrieval failed.
    #[error("clone failed: {0}")]
    Clone(String),

    /// The runtime-options file was present but malformed.
    #[error("invalid runtime options: {0}")]
    Resolve(String),

    /// Image construction failed.
    #[error("build failed: {0}")]
    Build(String),

    /// The container could not start.
    #[error("run failed: {0}")]
    Run(String),

    /// The exit code was unavailable.
    #[error("exit code unavailable: {0}")]
    Inspect(String),

    /// Container removal failed.
    #[error("cleanup failed: {0}")]
    Cleanup(String),

    /// Log store read or write failed.
    #[error("log store error: {0}")]
    Store(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The container exited non-zero. Not an infrastructure error.
    #[error("failure")]
    Failure,

    /// The per-job deadline fired.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error is the distinguished non-zero-exit sentinel.
    pub fn is_failure(&self) -> bool {
        matches!(self, Error::Failure)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

//! Core domain types and traits for the duci CI dispatcher.
//!
//! This crate contains:
//! - Job identifiers and the per-job invocation record
//! - Log record and log line types
//! - Commit status states
//! - The trait seams the orchestrator consumes: git, container daemon,
//!   commit-status host, and the persistent log store

pub mod client;
pub mod error;
pub mod id;
pub mod job;
pub mod log;

pub use client::{CommitStatusClient, ContainerClient, GitClient, LogStore};
pub use error::{Error, Result};
pub use id::JobId;
pub use job::{CommitState, Job, Repository, RuntimeOptions};
pub use log::{LogLine, LogMessage, LogRecord};

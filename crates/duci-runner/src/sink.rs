//! Log fan-out: persistent store plus the process status log.

use std::sync::Arc;
use tracing::info;

use duci_core::{JobId, LogLine, LogStore, Result};

/// Wraps the log store; every appended line is also forwarded to the
/// process log so operators can follow jobs without polling the endpoint.
#[derive(Clone)]
pub struct LogSink {
    store: Arc<dyn LogStore>,
}

impl LogSink {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self { store }
    }

    /// Open the job's log record before any line is appended, so the log
    /// endpoint never reports an in-flight job as unknown.
    pub async fn start(&self, id: JobId) -> Result<()> {
        self.store.start(id).await
    }

    pub async fn append(&self, id: JobId, line: LogLine) -> Result<()> {
        info!(job = %id, "{}", line.text);
        self.store.append(id, line.into()).await
    }

    /// Mark the record terminal. Runs on every exit path.
    pub async fn finish(&self, id: JobId) -> Result<()> {
        self.store.finish(id).await
    }
}

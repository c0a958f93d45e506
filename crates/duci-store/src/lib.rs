//! Embedded log store.
//!
//! Persists one JSON-encoded [`LogRecord`] per job, keyed by the job's
//! UUID string, in a sled database. `append` is a read-modify-write and is
//! not atomic under contention; the orchestrator guarantees a single
//! writer per job key.

use async_trait::async_trait;
use std::path::Path;

use duci_core::{Error, JobId, LogMessage, LogRecord, LogStore, Result};

/// sled-backed [`LogStore`].
#[derive(Debug, Clone)]
pub struct SledLogStore {
    db: sled::Db,
}

impl SledLogStore {
    /// Open (or create) the database at `path`. Fatal at boot on failure.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path).map_err(|e| Error::Store(e.to_string()))?;
        Ok(Self { db })
    }

    fn read(&self, id: JobId) -> Result<Option<LogRecord>> {
        let Some(bytes) = self
            .db
            .get(id.to_string())
            .map_err(|e| Error::Store(e.to_string()))?
        else {
            return Ok(None);
        };
        let record = serde_json::from_slice(&bytes).map_err(|e| Error::Store(e.to_string()))?;
        Ok(Some(record))
    }

    fn write(&self, id: JobId, record: &LogRecord) -> Result<()> {
        let bytes = serde_json::to_vec(record).map_err(|e| Error::Store(e.to_string()))?;
        self.db
            .insert(id.to_string(), bytes)
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl LogStore for SledLogStore {
    async fn start(&self, id: JobId) -> Result<()> {
        self.write(id, &LogRecord::default())
    }

    async fn append(&self, id: JobId, message: LogMessage) -> Result<()> {
        let mut record = self.read(id)?.unwrap_or_default();
        record.stream.push(message);
        self.write(id, &record)
    }

    async fn finish(&self, id: JobId) -> Result<()> {
        let mut record = self
            .read(id)?
            .ok_or_else(|| Error::NotFound(format!("no log record for job {id}")))?;
        record.finished = true;
        self.write(id, &record)
    }

    async fn get(&self, id: JobId) -> Result<LogRecord> {
        self.read(id)?
            .ok_or_else(|| Error::NotFound(format!("no log record for job {id}")))
    }

    async fn close(&self) -> Result<()> {
        self.db.flush().map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }
}

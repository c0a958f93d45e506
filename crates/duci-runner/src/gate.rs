//! Global job admission.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use duci_core::{Error, Result};

/// Counting semaphore bounding concurrent orchestrator runs. Constructed
/// exactly once at boot; the permit returned by [`acquire`](Self::acquire)
/// releases the slot when dropped.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyGate {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::Admission(
                "job concurrency must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
        })
    }

    /// Block until a slot is free.
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("the gate semaphore is never closed")
    }
}

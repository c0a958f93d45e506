//! Whole-job deadlines.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use duci_core::{Error, Result};

/// A cancellable expiry derived from the configured job timeout. A timeout
/// of zero means no deadline. Subordinate operations are bounded with
/// [`run`](Self::run); expiry maps to [`Error::DeadlineExceeded`].
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// Deadline `timeout` from now; unbounded when `timeout` is zero.
    pub fn after(timeout: Duration) -> Self {
        let at = (!timeout.is_zero()).then(|| Instant::now() + timeout);
        Self { at }
    }

    /// Bound a fallible operation by the deadline.
    pub async fn run<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        match self.at {
            None => operation.await,
            Some(at) => match tokio::time::timeout_at(at, operation).await {
                Ok(result) => result,
                Err(_) => Err(Error::DeadlineExceeded),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn expiry_maps_to_deadline_exceeded() {
        let deadline = Deadline::after(Duration::from_secs(1));

        let err = deadline
            .run(async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Ok(())
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "context deadline exceeded");
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_means_no_deadline() {
        let deadline = Deadline::after(Duration::ZERO);

        deadline
            .run(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn inner_errors_pass_through() {
        let deadline = Deadline::after(Duration::from_secs(10));

        let err = deadline
            .run(async { Err::<(), _>(Error::Clone("unreachable host".to_string())) })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Clone(_)));
    }
}

use std::{future::Future, time::Duration};

use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::services::error::StorageError;

/// Deadline and cancellation signal carried by one storage operation.
#[derive(Debug, Clone)]
pub struct OperationScope {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl OperationScope {
    pub fn new(timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            cancel,
        }
    }

    #[cfg(test)]
    pub fn unbounded() -> Self {
        Self {
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    #[cfg(test)]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Drives `fut` until it finishes, the deadline passes, or the token
    /// fires. The future is dropped on the latter two, closing any stream it
    /// held open.
    pub async fn run<T, F>(&self, op: &'static str, fut: F) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(StorageError::Cancelled { op });
        }

        let bounded = async {
            match self.deadline {
                Some(deadline) => timeout_at(deadline, fut)
                    .await
                    .unwrap_or_else(|_| Err(StorageError::DeadlineExceeded { op })),
                None => fut.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StorageError::Cancelled { op }),
            result = bounded => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn never() -> Result<(), StorageError> {
        std::future::pending().await
    }

    async fn must_not_run() -> Result<(), StorageError> {
        panic!("must not be polled")
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_fires_deadline_exceeded() {
        let scope = OperationScope::new(Duration::from_secs(5), CancellationToken::new());

        let started = Instant::now();
        let err = scope.run("get", never()).await.unwrap_err();

        assert!(matches!(err, StorageError::DeadlineExceeded { op: "get" }));
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_fires_cancelled() {
        let token = CancellationToken::new();
        let scope = OperationScope::new(Duration::from_secs(60), token.child_token());

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let err = scope.run("save", never()).await.unwrap_err();
        assert!(matches!(err, StorageError::Cancelled { op: "save" }));
    }

    #[tokio::test]
    async fn already_cancelled_scope_does_not_start() {
        let scope = OperationScope::unbounded();
        scope.cancellation().cancel();

        let err = scope.run("list", must_not_run()).await.unwrap_err();
        assert!(matches!(err, StorageError::Cancelled { op: "list" }));
    }

    #[tokio::test]
    async fn completed_operations_pass_through() {
        let scope = OperationScope::unbounded();

        assert_eq!(scope.run("info", async { Ok(7) }).await.unwrap(), 7);

        let err = scope
            .run("info", async { Err::<(), _>(StorageError::not_found("info", "x")) })
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }
}

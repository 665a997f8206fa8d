//! Startup gate for remote storage.
//!
//! Opens a connection, probes it, and retries transient failures with a
//! Fibonacci backoff until an overall deadline. Runs once, before the
//! service accepts requests; there is no background health loop.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{error, info, warn};

use crate::{domain::config::RemoteStoreConfig, services::error::StorageError};

/// One connect-and-probe attempt against a backend.
#[async_trait]
pub trait Connector: Send + Sync {
    type Handle: Send;

    async fn connect(&self) -> Result<Self::Handle, StorageError>;
}

/// Delays of 1, 2, 3, 5, 8... times `min`, capped at `max`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    max: Duration,
    prev: Duration,
    curr: Duration,
}

impl FibonacciBackoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            max,
            prev: min,
            curr: min,
        }
    }
}

impl Iterator for FibonacciBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let delay = self.curr.min(self.max);
        let next = self.prev.saturating_add(self.curr);
        self.prev = self.curr;
        self.curr = next;
        Some(delay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempt_timeout: Duration,
    pub deadline: Duration,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(3),
            deadline: Duration::from_secs(30),
            min_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl From<&RemoteStoreConfig> for RetryPolicy {
    fn from(config: &RemoteStoreConfig) -> Self {
        Self {
            attempt_timeout: config.attempt_timeout,
            deadline: config.connect_deadline,
            ..Self::default()
        }
    }
}

pub struct ConnectionSupervisor<C> {
    connector: C,
    policy: RetryPolicy,
}

impl<C: Connector> ConnectionSupervisor<C> {
    pub fn new(connector: C, policy: RetryPolicy) -> Self {
        Self { connector, policy }
    }

    /// Returns a live handle, or a fatal error once a non-retryable failure
    /// occurs or the deadline passes.
    pub async fn establish(&self) -> Result<C::Handle, StorageError> {
        let started = Instant::now();
        let deadline = started + self.policy.deadline;
        let mut backoff = FibonacciBackoff::new(self.policy.min_backoff, self.policy.max_backoff);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            info!(attempt, "Trying to connect to storage");

            let attempt_started = Instant::now();
            let attempt_deadline = (attempt_started + self.policy.attempt_timeout).min(deadline);

            let error = match timeout_at(attempt_deadline, self.connector.connect()).await {
                Ok(Ok(handle)) => {
                    info!(
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Connected to storage"
                    );
                    return Ok(handle);
                }
                Ok(Err(e)) => e,
                Err(_) => StorageError::ConnectFailure(format!(
                    "attempt timed out after {:?}",
                    attempt_deadline - attempt_started
                )),
            };

            if !error.is_retryable() {
                error!(attempt, error = %error, "Failed to connect to storage");
                return Err(error);
            }

            let delay = backoff.next().unwrap_or(self.policy.max_backoff);
            let resume_at = (Instant::now() + delay).min(deadline);

            warn!(
                attempt,
                retry_in_seconds = delay.as_secs(),
                error = %error,
                "Failed to connect to storage"
            );

            if resume_at < deadline {
                sleep_until(resume_at).await;
                continue;
            }

            sleep_until(deadline).await;
            error!(
                attempts = attempt,
                elapsed_secs = started.elapsed().as_secs(),
                "Giving up connecting to storage"
            );
            return Err(StorageError::Unavailable(format!(
                "no connection after {} attempts in {:?}: {}",
                attempt,
                started.elapsed(),
                error
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    use super::*;

    #[derive(Clone, Copy)]
    enum Failure {
        Refuse,
        Hang,
        Fatal,
    }

    struct FlakyConnector {
        failures: u32,
        failure: Failure,
        attempts: Arc<AtomicU32>,
    }

    impl FlakyConnector {
        fn new(failures: u32, failure: Failure) -> (Self, Arc<AtomicU32>) {
            let attempts = Arc::new(AtomicU32::new(0));
            (
                Self {
                    failures,
                    failure,
                    attempts: attempts.clone(),
                },
                attempts,
            )
        }
    }

    #[async_trait]
    impl Connector for FlakyConnector {
        type Handle = u32;

        async fn connect(&self) -> Result<u32, StorageError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.failures {
                return match self.failure {
                    Failure::Refuse => Err(StorageError::ConnectFailure("refused".into())),
                    Failure::Hang => std::future::pending().await,
                    Failure::Fatal => Err(StorageError::InvalidConfig("bad uri".into())),
                };
            }
            Ok(attempt)
        }
    }

    #[test]
    fn backoff_follows_fibonacci_and_caps() {
        let delays: Vec<u64> = FibonacciBackoff::new(Duration::from_secs(1), Duration::from_secs(60))
            .take(12)
            .map(|d| d.as_secs())
            .collect();

        assert_eq!(delays, vec![1, 2, 3, 5, 8, 13, 21, 34, 55, 60, 60, 60]);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let (connector, attempts) = FlakyConnector::new(3, Failure::Refuse);
        let supervisor = ConnectionSupervisor::new(connector, RetryPolicy::default());

        let started = Instant::now();
        let handle = supervisor.establish().await.unwrap();

        assert_eq!(handle, 4);
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(1 + 2 + 3));
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_attempts_are_retried() {
        let (connector, attempts) = FlakyConnector::new(2, Failure::Hang);
        let supervisor = ConnectionSupervisor::new(connector, RetryPolicy::default());

        let started = Instant::now();
        supervisor.establish().await.unwrap();

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        // two 3s attempt timeouts plus 1s and 2s of backoff
        assert_eq!(started.elapsed(), Duration::from_secs(3 + 1 + 3 + 2));
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_errors_are_not_retried() {
        let (connector, attempts) = FlakyConnector::new(1, Failure::Fatal);
        let supervisor = ConnectionSupervisor::new(connector, RetryPolicy::default());

        let started = Instant::now();
        let err = supervisor.establish().await.unwrap_err();

        assert!(matches!(err, StorageError::InvalidConfig(_)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_at_the_deadline() {
        let (connector, _) = FlakyConnector::new(u32::MAX, Failure::Refuse);
        let policy = RetryPolicy::default();
        let supervisor = ConnectionSupervisor::new(connector, policy);

        let started = Instant::now();
        let err = supervisor.establish().await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, StorageError::Unavailable(_)));
        assert!(elapsed >= policy.deadline);
        assert!(elapsed <= policy.deadline + policy.max_backoff);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_backend_gives_up_at_the_deadline() {
        let (connector, _) = FlakyConnector::new(u32::MAX, Failure::Hang);
        let policy = RetryPolicy {
            deadline: Duration::from_secs(10),
            ..RetryPolicy::default()
        };
        let supervisor = ConnectionSupervisor::new(connector, policy);

        let started = Instant::now();
        let err = supervisor.establish().await.unwrap_err();

        assert!(matches!(err, StorageError::Unavailable(_)));
        assert!(started.elapsed() >= policy.deadline);
        assert!(started.elapsed() <= policy.deadline + policy.max_backoff);
    }
}

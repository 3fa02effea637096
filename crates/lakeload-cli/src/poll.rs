//! Bounded polling of remote operations
//!
//! Stack creation, crawler runs and job runs are all asynchronous on the
//! provider side. Each is awaited by probing its status on a fixed interval
//! until a terminal state, an error, or the maximum wait is reached.

use crate::error::{PipelineError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Result of a single status probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// Terminal success
    Done(T),
    /// Still running; carries the provider's state for logging
    Pending(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    interval: Duration,
    max_wait: Duration,
}

impl Poller {
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        Self { interval, max_wait }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Probe until `Done`, sleeping `interval` between probes.
    ///
    /// Errors from `probe` end the wait immediately. When the next sleep
    /// would pass `max_wait` the wait fails with [`PipelineError::Timeout`].
    pub async fn until<T, F, Fut>(&self, operation: &str, mut probe: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<PollOutcome<T>>>,
    {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            match probe().await? {
                PollOutcome::Done(value) => {
                    debug!(operation, attempt, elapsed = ?started.elapsed(), "Reached terminal state");
                    return Ok(value);
                }
                PollOutcome::Pending(state) => {
                    let waited = started.elapsed();
                    if waited + self.interval > self.max_wait {
                        return Err(PipelineError::Timeout {
                            operation: operation.to_string(),
                            waited,
                            limit: self.max_wait,
                        });
                    }

                    info!(operation, state = %state, attempt, "Still running, checking again in {:?}", self.interval);
                    tokio::time::sleep(self.interval).await;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test(start_paused = true)]
    async fn test_returns_first_done_value() {
        let poller = Poller::new(Duration::from_secs(10), Duration::from_secs(60));
        let calls = Cell::new(0);

        let value = poller
            .until("job", || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n < 3 {
                        Ok(PollOutcome::Pending("RUNNING".to_string()))
                    } else {
                        Ok(PollOutcome::Done(n))
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_when_never_terminal() {
        let poller = Poller::new(Duration::from_secs(10), Duration::from_secs(35));
        let calls = Cell::new(0);

        let err = poller
            .until("crawler 'sales'", || {
                calls.set(calls.get() + 1);
                async { Ok::<_, PipelineError>(PollOutcome::<()>::Pending("RUNNING".to_string())) }
            })
            .await
            .unwrap_err();

        match err {
            PipelineError::Timeout {
                operation,
                waited,
                limit,
            } => {
                assert_eq!(operation, "crawler 'sales'");
                assert!(waited >= Duration::from_secs(30));
                assert_eq!(limit, Duration::from_secs(35));
            }
            other => panic!("expected Timeout, got {:?}", other),
        }
        assert_eq!(calls.get(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_error_stops_polling() {
        let poller = Poller::new(Duration::from_secs(10), Duration::from_secs(300));
        let calls = Cell::new(0);

        let err = poller
            .until("job", || {
                calls.set(calls.get() + 1);
                async {
                    Err::<PollOutcome<()>, _>(PipelineError::provider("Glue", "throttled"))
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Provider { .. }));
        assert_eq!(calls.get(), 1);
    }
}

use relaycore::{NodeError, NodeSpec};
use std::future::Future;
use tokio::time::{sleep, timeout, Duration};
use tokio_util::sync::CancellationToken;

/// Per-node retry and timeout settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub retries: u32,
    /// Deadline for each individual attempt
    pub timeout: Duration,
    /// Linear backoff step: attempt `n` is followed by a `n * step` pause
    pub backoff_step: Duration,
}

/// Final error after the policy gave up.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryError {
    pub error: NodeError,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn for_node(node: &NodeSpec, backoff_step: Duration) -> Self {
        Self {
            retries: node.retries,
            timeout: Duration::from_millis(node.timeout_ms),
            backoff_step,
        }
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }

    /// Run `attempt` until it succeeds, a non-transient error occurs, the
    /// attempts run out or the run is cancelled. Returns the value and the
    /// number of attempts made.
    pub async fn run<F, Fut, T>(
        &self,
        cancellation: &CancellationToken,
        mut attempt: F,
    ) -> Result<(T, u32), RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, NodeError>>,
    {
        let max_attempts = self.retries.saturating_add(1);
        let mut current = 1;

        loop {
            let outcome = tokio::select! {
                _ = cancellation.cancelled() => Err(NodeError::Cancelled),
                result = timeout(self.timeout, attempt()) => match result {
                    Ok(result) => result,
                    Err(_) => Err(NodeError::Timeout {
                        ms: self.timeout.as_millis() as u64,
                    }),
                },
            };

            let error = match outcome {
                Ok(value) => return Ok((value, current)),
                Err(error) => error,
            };

            if current >= max_attempts || !error.is_transient() {
                return Err(RetryError {
                    error,
                    attempts: current,
                });
            }

            let delay = self.backoff(current);
            tracing::warn!(
                attempt = current,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                %error,
                "Attempt failed, retrying"
            );

            tokio::select! {
                _ = cancellation.cancelled() => {
                    return Err(RetryError {
                        error: NodeError::Cancelled,
                        attempts: current,
                    });
                }
                _ = sleep(delay) => {}
            }
            current += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(retries: u32, timeout_ms: u64) -> RetryPolicy {
        RetryPolicy {
            retries,
            timeout: Duration::from_millis(timeout_ms),
            backoff_step: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = policy(2, 1000)
            .run(&CancellationToken::new(), move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(NodeError::ExecutionFailed("flaky".into()))
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result, Ok(("done", 3)));
    }

    #[tokio::test]
    async fn gives_up_after_last_attempt() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<((), u32), _> = policy(1, 1000)
            .run(&CancellationToken::new(), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(NodeError::ExecutionFailed("down".into()))
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 2);
        assert_eq!(err.error, NodeError::ExecutionFailed("down".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn configuration_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<((), u32), _> = policy(3, 1000)
            .run(&CancellationToken::new(), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(NodeError::Configuration("bad".into()))
            })
            .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_attempts_time_out() {
        let result: Result<((), u32), _> = policy(1, 20)
            .run(&CancellationToken::new(), || async {
                sleep(Duration::from_millis(200)).await;
                Ok(())
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.error, NodeError::Timeout { ms: 20 });
        assert_eq!(err.attempts, 2);
        assert!(err.error.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn cancellation_interrupts_an_attempt() {
        let token = CancellationToken::new();
        token.cancel();

        let result: Result<((), u32), _> = policy(5, 1000)
            .run(&token, || async {
                sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert_eq!(result.unwrap_err().error, NodeError::Cancelled);
    }

    #[test]
    fn backoff_is_linear() {
        let p = RetryPolicy {
            retries: 2,
            timeout: Duration::from_secs(5),
            backoff_step: Duration::from_millis(150),
        };
        assert_eq!(p.backoff(1), Duration::from_millis(150));
        assert_eq!(p.backoff(2), Duration::from_millis(300));
    }
}

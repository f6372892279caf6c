//! Fixed-interval retry for transient kernel errors.

use std::path::Path;
use std::time::Duration;

use rbdlxc_common::RbdlxcError;
use rustix::io::Errno;
use tokio::time::Instant;

/// Poll interval for transient mount/unmount failures.
pub const RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Give up on a transient condition after this long.
pub const RETRY_CEILING: Duration = Duration::from_secs(300);

/// How long and how often to retry a kernel call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between attempts.
    pub interval: Duration,
    /// Total time after which a still-transient error becomes fatal.
    pub ceiling: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: RETRY_INTERVAL,
            ceiling: RETRY_CEILING,
        }
    }
}

/// Outcome of a retried call that did not succeed.
#[derive(Debug)]
pub enum RetryFailure {
    /// A non-retryable errno, returned on the attempt that produced it.
    Fatal(Errno),
    /// Only retryable errnos were seen until the ceiling passed.
    Exhausted {
        /// Last errno observed.
        last: Errno,
        /// Time spent.
        elapsed: Duration,
    },
}

impl RetryFailure {
    /// Convert to the crate error, using `fatal` for non-retryable errnos.
    pub fn into_error(
        self,
        operation: &str,
        target: &Path,
        fatal: impl FnOnce(std::io::Error) -> RbdlxcError,
    ) -> RbdlxcError {
        match self {
            Self::Fatal(errno) => fatal(errno.into()),
            Self::Exhausted { last, elapsed } => RbdlxcError::RetryExhausted {
                operation: operation.to_string(),
                target: target.to_path_buf(),
                elapsed,
                last: last.into(),
            },
        }
    }
}

impl RetryPolicy {
    /// Call `attempt` until it succeeds, fails with an errno outside
    /// `retryable`, or the ceiling passes.
    ///
    /// # Errors
    ///
    /// Returns the fatal errno or [`RetryFailure::Exhausted`].
    pub async fn run<F, Fut>(&self, retryable: &[Errno], mut attempt: F) -> Result<u32, RetryFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), Errno>>,
    {
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match attempt().await {
                Ok(()) => return Ok(attempts),
                Err(errno) if retryable.contains(&errno) => {
                    let elapsed = started.elapsed();
                    if elapsed >= self.ceiling {
                        return Err(RetryFailure::Exhausted {
                            last: errno,
                            elapsed,
                        });
                    }
                    tracing::trace!(%errno, attempts, "Transient kernel error, retrying");
                    tokio::time::sleep(self.interval).await;
                }
                Err(errno) => return Err(RetryFailure::Fatal(errno)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::ready;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn retries_only_listed_errnos() {
        let policy = RetryPolicy::default();
        let mut results = vec![Ok(()), Err(Errno::NODEV), Err(Errno::NODEV)];

        let attempts = policy
            .run(&[Errno::NODEV], || ready(results.pop().unwrap()))
            .await
            .unwrap();

        assert_eq!(attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn other_errnos_fail_first_time() {
        let policy = RetryPolicy::default();
        let mut calls = 0;

        let failure = policy
            .run(&[Errno::NODEV], || {
                calls += 1;
                ready(Err(Errno::INVAL))
            })
            .await
            .unwrap_err();

        assert!(matches!(failure, RetryFailure::Fatal(Errno::INVAL)));
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ceiling_bounds_the_loop() {
        let policy = RetryPolicy {
            interval: Duration::from_millis(10),
            ceiling: Duration::from_secs(1),
        };

        let failure = policy
            .run(&[Errno::BUSY], || ready(Err(Errno::BUSY)))
            .await
            .unwrap_err();

        match failure {
            RetryFailure::Exhausted { last, elapsed } => {
                assert_eq!(last, Errno::BUSY);
                assert!(elapsed >= Duration::from_secs(1));
            }
            RetryFailure::Fatal(errno) => panic!("unexpected fatal {errno}"),
        }
    }
}

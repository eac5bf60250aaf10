use crate::error::Result;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// How long to wait between two attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed(Duration),
    /// `base` plus a uniform random share of `jitter`, so assets polled on the
    /// same tick do not retry in lockstep.
    Jittered { base: Duration, jitter: Duration },
}

impl Backoff {
    pub fn delay(&self) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Jittered { base, jitter } => {
                let jitter_ms = jitter.as_millis() as u64;
                if jitter_ms == 0 {
                    return base;
                }
                base + Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total number of calls, including the first one.
    pub attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts,
            backoff: Backoff::Fixed(delay),
        }
    }

    pub fn jittered(attempts: u32, base: Duration, jitter: Duration) -> Self {
        Self {
            attempts,
            backoff: Backoff::Jittered { base, jitter },
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(2, Duration::from_secs(1))
    }
}

/// Suspends the caller between attempts. Swapped out in tests.
#[async_trait::async_trait]
pub trait Delay: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioDelay;

#[async_trait::async_trait]
impl Delay for TokioDelay {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Applies a [`RetryPolicy`] to fallible async operations.
#[derive(Clone)]
pub struct Retry {
    policy: RetryPolicy,
    delay: Arc<dyn Delay>,
}

impl Retry {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            delay: Arc::new(TokioDelay),
        }
    }

    pub fn with_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. The last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts && e.is_retryable() => {
                    let delay = self.policy.backoff.delay();
                    tracing::debug!(
                        label,
                        error = %e,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Request failed, retrying"
                    );
                    self.delay.sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDelay {
        slept: Mutex<Vec<Duration>>,
    }

    #[async_trait::async_trait]
    impl Delay for RecordingDelay {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    fn retry(policy: RetryPolicy) -> (Retry, Arc<RecordingDelay>) {
        let delay = Arc::new(RecordingDelay::default());
        (Retry::new(policy).with_delay(delay.clone()), delay)
    }

    #[tokio::test]
    async fn should_retry_once_and_return_second_result() {
        let (retry, delay) = retry(RetryPolicy::default());
        let calls = AtomicU32::new(0);

        let value = retry
            .run("memory", || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ProbeError::NotFound("empty window".into()))
                } else {
                    Ok(42)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(*delay.slept.lock().unwrap(), vec![Duration::from_secs(1)]);
    }

    #[tokio::test]
    async fn should_give_up_after_one_retry_on_rate_limit() {
        let (retry, delay) = retry(RetryPolicy::default());
        let calls = AtomicU32::new(0);

        let err = retry
            .run("bss", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ProbeError::RateLimited)
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ProbeError::RateLimited));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(delay.slept.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_propagate_last_error_unchanged() {
        let (retry, _) = retry(RetryPolicy::default());
        let calls = AtomicU32::new(0);

        let err = retry
            .run("status", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ProbeError::Upstream {
                    status: 500 + n as u16,
                    reason: "boom".into(),
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ProbeError::Upstream { status: 501, .. }));
    }

    #[tokio::test]
    async fn should_not_retry_config_errors() {
        let (retry, delay) = retry(RetryPolicy::default());
        let calls = AtomicU32::new(0);

        let err = retry
            .run("device", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ProbeError::Config("missing secret".into()))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ProbeError::Config(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(delay.slept.lock().unwrap().is_empty());
    }

    #[test]
    fn should_keep_jittered_delay_within_bounds() {
        let backoff = Backoff::Jittered {
            base: Duration::from_millis(1000),
            jitter: Duration::from_millis(500),
        };
        for _ in 0..100 {
            let delay = backoff.delay();
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay < Duration::from_millis(1500));
        }

        let no_jitter = Backoff::Jittered {
            base: Duration::from_millis(250),
            jitter: Duration::ZERO,
        };
        assert_eq!(no_jitter.delay(), Duration::from_millis(250));
    }
}

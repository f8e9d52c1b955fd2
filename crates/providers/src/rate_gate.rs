//! Single-producer serial queue enforcing a minimum spacing between
//! dispatches, with bounded exponential-backoff retry for transient
//! provider errors.
//!
//! All search calls issued by every sub-agent in every session funnel
//! through one shared `RateGate`, so the observed inter-dispatch interval
//! at the provider never drops below `min_spacing` no matter how many
//! callers enqueue concurrently. The `tokio::sync::Mutex` held across an
//! entire `dispatch` call (including its retries) is what makes the queue
//! serial rather than merely rate-limited.

use dr_domain::error::{Error, Result};
use dr_domain::trace::TraceEvent;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// How a classifier decides a failed dispatch should be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryKind {
    /// Non-transient — surface the error to the caller immediately.
    None,
    /// Transient (network/timeout/5xx) — standard backoff: 1s, 2s, 4s…
    Standard,
    /// Rate-limited (HTTP 429) — backoff: 2s, 4s, 8s…, or the provider's
    /// `Retry-After` value when present.
    RateLimited { retry_after_ms: Option<u64> },
}

pub struct RateGate {
    min_spacing: Duration,
    max_retries: u32,
    queue: Mutex<Option<Instant>>,
}

impl RateGate {
    pub fn new(min_spacing: Duration, max_retries: u32) -> Self {
        Self {
            min_spacing,
            max_retries,
            queue: Mutex::new(None),
        }
    }

    /// Run `f`, retrying on transient failures per `classify`, never
    /// dispatching two attempts (across all callers) closer together than
    /// `min_spacing`.
    pub async fn dispatch<F, Fut, T>(
        &self,
        classify: impl Fn(&Error) -> RetryKind,
        mut f: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_dispatch = self.queue.lock().await;
        let mut attempt = 0u32;

        loop {
            self.wait_for_spacing(&mut last_dispatch).await;
            *last_dispatch = Some(Instant::now());

            match f().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    let kind = classify(&e);
                    if kind == RetryKind::None || attempt >= self.max_retries {
                        return Err(e);
                    }
                    let backoff = backoff_for(kind, attempt);
                    TraceEvent::LlmRetry {
                        role: "search".into(),
                        attempt: attempt + 1,
                        error_kind: format!("{:?}", kind),
                        backoff_ms: backoff.as_millis() as u64,
                    }
                    .emit();
                    attempt += 1;
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    async fn wait_for_spacing(&self, last_dispatch: &mut Option<Instant>) {
        if let Some(last) = *last_dispatch {
            let elapsed = last.elapsed();
            if elapsed < self.min_spacing {
                tokio::time::sleep(self.min_spacing - elapsed).await;
            }
        }
    }
}

fn backoff_for(kind: RetryKind, attempt: u32) -> Duration {
    match kind {
        RetryKind::RateLimited {
            retry_after_ms: Some(ms),
        } => Duration::from_millis(ms),
        RetryKind::RateLimited { retry_after_ms: None } => {
            Duration::from_secs(2u64.saturating_pow(attempt + 1))
        }
        _ => Duration::from_secs(2u64.saturating_pow(attempt)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn succeeds_on_first_try_without_retry() {
        let gate = RateGate::new(Duration::from_millis(1), 3);
        let result = gate
            .dispatch(|_| RetryKind::None, || async { Ok::<_, Error>(42) })
            .await
            .unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn non_retryable_error_surfaces_immediately() {
        let gate = RateGate::new(Duration::from_millis(1), 3);
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result = gate
            .dispatch(
                |_| RetryKind::None,
                move || {
                    calls2.fetch_add(1, Ordering::SeqCst);
                    async { Err::<i32, _>(Error::Other("boom".into())) }
                },
            )
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_up_to_max_then_surfaces_error() {
        let gate = RateGate::new(Duration::from_millis(1), 2);
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result = gate
            .dispatch(
                |_| RetryKind::Standard,
                move || {
                    calls2.fetch_add(1, Ordering::SeqCst);
                    async { Err::<i32, _>(Error::Other("transient".into())) }
                },
            )
            .await;
        assert!(result.is_err());
        // Initial attempt + 2 retries = 3 calls.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let gate = RateGate::new(Duration::from_millis(1), 5);
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result = gate
            .dispatch(
                |_| RetryKind::Standard,
                move || {
                    let n = calls2.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err(Error::Other("transient".into()))
                        } else {
                            Ok(99)
                        }
                    }
                },
            )
            .await
            .unwrap();
        assert_eq!(result, 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rate_limited_honors_retry_after() {
        let backoff = backoff_for(
            RetryKind::RateLimited {
                retry_after_ms: Some(500),
            },
            0,
        );
        assert_eq!(backoff, Duration::from_millis(500));
    }

    #[tokio::test]
    async fn rate_limited_without_retry_after_uses_standard_schedule() {
        assert_eq!(
            backoff_for(RetryKind::RateLimited { retry_after_ms: None }, 0),
            Duration::from_secs(2)
        );
        assert_eq!(
            backoff_for(RetryKind::RateLimited { retry_after_ms: None }, 1),
            Duration::from_secs(4)
        );
        assert_eq!(
            backoff_for(RetryKind::RateLimited { retry_after_ms: None }, 2),
            Duration::from_secs(8)
        );
    }

    #[tokio::test]
    async fn standard_backoff_schedule() {
        assert_eq!(backoff_for(RetryKind::Standard, 0), Duration::from_secs(1));
        assert_eq!(backoff_for(RetryKind::Standard, 1), Duration::from_secs(2));
        assert_eq!(backoff_for(RetryKind::Standard, 2), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn enforces_minimum_spacing_between_dispatches() {
        let gate = RateGate::new(Duration::from_millis(50), 0);
        let start = Instant::now();
        gate.dispatch(|_| RetryKind::None, || async { Ok::<_, Error>(()) })
            .await
            .unwrap();
        gate.dispatch(|_| RetryKind::None, || async { Ok::<_, Error>(()) })
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}

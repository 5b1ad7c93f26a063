//! Retry with exponential backoff for transient failures.
//!
//! Postview downloads run over the camera's WiFi link right after landing,
//! when the link is at its flakiest; transient HTTP failures are retried
//! with doubling, capped, optionally jittered delays.

use std::future::Future;
use std::time::Duration;

use log::{info, warn};
use rand::Rng;

use crate::config::RetryConfig;
use crate::error::RigError;

/// Classify an error as transient (worth retrying) or permanent.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for RigError {
    fn is_retryable(&self) -> bool {
        match self {
            RigError::Http(e) => e.is_timeout() || e.is_connect(),
            RigError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            // Camera API, config, template and EXIF failures don't heal on
            // their own.
            _ => false,
        }
    }
}

/// Run `operation`, retrying transient failures per `config`.
///
/// Returns the first success or the last error once attempts are exhausted
/// or a permanent error surfaces.
pub async fn with_backoff<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    info!("succeeded after {} attempts", attempt + 1);
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;
                let sleep_for = if config.jitter { add_jitter(delay) } else { delay };
                warn!(
                    "attempt {attempt}/{} failed ({e}); retrying in {}ms",
                    config.max_attempts,
                    sleep_for.as_millis()
                );
                tokio::time::sleep(sleep_for).await;
                delay = (delay * 2).min(config.max_delay);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Uniform jitter between 0% and 100% of the delay.
fn add_jitter(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + factor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                TestError::Transient => write!(f, "transient"),
                TestError::Permanent => write!(f, "permanent"),
            }
        }
    }

    impl IsRetryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    fn quick(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(50),
            jitter: false,
        }
    }

    #[tokio::test]
    async fn success_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = with_backoff(&quick(3), || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TestError>(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_failures_retry_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = with_backoff(&quick(3), || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TestError::Transient)
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = with_backoff(&quick(3), || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(TestError::Permanent)
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn attempts_are_bounded() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = with_backoff(&quick(2), || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(TestError::Transient)
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3, "initial try + 2 retries");
    }

    #[test]
    fn jitter_stays_within_one_extra_delay() {
        let delay = Duration::from_millis(40);
        for _ in 0..100 {
            let j = add_jitter(delay);
            assert!(j >= delay && j <= delay * 2);
        }
    }

    #[test]
    fn http_classification_only_retries_transport_errors() {
        assert!(!RigError::Config("bad".into()).is_retryable());
        assert!(!RigError::Camera { code: 1, message: "busy".into() }.is_retryable());
        let io = RigError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        ));
        assert!(io.is_retryable());
        let not_found = RigError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(!not_found.is_retryable());
    }
}

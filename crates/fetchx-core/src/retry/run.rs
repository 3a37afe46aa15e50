//! Retry loop: run an async operation until success or policy says stop.

use std::fmt::Display;
use std::future::Future;

use super::classify::Classify;
use super::policy::{RetryDecision, RetryPolicy};
use crate::control::{ControlToken, Signal};

/// Runs `op` until it succeeds or the retry policy says to stop.
///
/// `op` receives the 1-based attempt number. On a retryable failure the task
/// sleeps for the backoff duration and tries again; the last error is returned
/// once the policy gives up. The backoff is a suspension point: a pause or stop
/// on `token` ends it early and returns the last error without another attempt.
pub async fn run_with_retry<T, E, F, Fut>(policy: &RetryPolicy, token: &mut ControlToken, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + Display,
{
    let mut attempt = 1u32;
    loop {
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) => match policy.decide(attempt, e.kind()) {
                RetryDecision::NoRetry => return Err(e),
                RetryDecision::RetryAfter(d) => {
                    tracing::debug!(attempt, delay_ms = d.as_millis() as u64, "retrying after: {}", e);
                    if token.sleep(d).await != Signal::Run {
                        tracing::debug!(attempt, "retry abandoned, job signalled");
                        return Err(e);
                    }
                    attempt += 1;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::JobControl;
    use crate::retry::ErrorKind;
    use std::fmt;
    use std::time::Duration;

    #[derive(Debug)]
    struct Flaky(ErrorKind);

    impl fmt::Display for Flaky {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "flaky: {:?}", self.0)
        }
    }

    impl Classify for Flaky {
        fn kind(&self) -> ErrorKind {
            self.0
        }
    }

    fn quick(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            ..RetryPolicy::transfers()
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let mut calls = 0;
        let out: Result<u32, Flaky> = run_with_retry(&quick(3), &mut JobControl::new().subscribe(), |attempt| {
            calls += 1;
            async move {
                if attempt < 3 {
                    Err(Flaky(ErrorKind::Connection))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert_eq!(out.unwrap(), 3);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn gives_up_at_max_attempts() {
        let mut calls = 0;
        let out: Result<(), Flaky> = run_with_retry(&quick(2), &mut JobControl::new().subscribe(), |_| {
            calls += 1;
            async { Err(Flaky(ErrorKind::Interrupted)) }
        })
        .await;
        assert!(out.is_err());
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let mut calls = 0;
        let out: Result<(), Flaky> = run_with_retry(&quick(5), &mut JobControl::new().subscribe(), |_| {
            calls += 1;
            async { Err(Flaky(ErrorKind::Other)) }
        })
        .await;
        assert!(out.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_cuts_the_backoff_short() {
        let control = JobControl::new();
        let mut token = control.subscribe();
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(3),
            ..RetryPolicy::transfers()
        };
        let begin = tokio::time::Instant::now();
        let mut calls = 0;
        let out: Result<(), Flaky> = run_with_retry(&policy, &mut token, |_| {
            calls += 1;
            control.request_pause();
            async { Err(Flaky(ErrorKind::Connection)) }
        })
        .await;
        assert!(out.is_err());
        assert_eq!(calls, 1);
        assert!(begin.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_backoff_wakes_the_sleeper() {
        let control = JobControl::new();
        let mut token = control.subscribe();
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(3600),
            max_delay: Duration::from_secs(3600),
            ..RetryPolicy::transfers()
        };
        let begin = tokio::time::Instant::now();
        let retrying = tokio::spawn(async move {
            let mut calls = 0u32;
            let out: Result<(), Flaky> = run_with_retry(&policy, &mut token, |_| {
                calls += 1;
                async { Err(Flaky(ErrorKind::Interrupted)) }
            })
            .await;
            (out.is_err(), calls)
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        control.request_stop();
        assert_eq!(retrying.await.unwrap(), (true, 1));
        assert!(begin.elapsed() < Duration::from_secs(3600));
    }
}

//! Bounded retry with linear backoff for upstream fetches.
//!
//! Only transient failures are retried (see [`FetchError::is_transient`]).
//! The delay before attempt `n + 1` is `base_delay × n`.

use std::{future::Future, time::Duration};

use crate::error::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Total attempts, including the first. Zero is treated as one.
  pub attempts:   u32,
  pub base_delay: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self { attempts: 3, base_delay: Duration::from_secs(5) }
  }
}

impl RetryPolicy {
  /// A policy that never sleeps; for tests.
  pub fn immediate(attempts: u32) -> Self {
    Self { attempts, base_delay: Duration::ZERO }
  }

  pub fn delay_after(&self, attempt: u32) -> Duration { self.base_delay * attempt }
}

/// Run `operation` until it succeeds, fails permanently, or the policy's
/// attempts are exhausted. The last error is returned unchanged.
pub async fn with_retry<F, Fut, T>(
  policy: &RetryPolicy,
  label: &str,
  mut operation: F,
) -> Result<T, FetchError>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, FetchError>>,
{
  let attempts = policy.attempts.max(1);
  let mut attempt = 0;

  loop {
    attempt += 1;

    match operation().await {
      Ok(value) => {
        if attempt > 1 {
          tracing::info!(operation = label, attempt, "fetch succeeded after retry");
        }
        return Ok(value);
      }
      Err(err) if err.is_transient() && attempt < attempts => {
        let delay = policy.delay_after(attempt);
        tracing::warn!(
          operation = label,
          attempt,
          delay_secs = delay.as_secs_f64(),
          error = %err,
          "transient fetch failure, retrying"
        );
        tokio::time::sleep(delay).await;
      }
      Err(err) => {
        if err.is_transient() {
          tracing::error!(operation = label, attempt, error = %err, "retries exhausted");
        }
        return Err(err);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use super::*;

  fn transport() -> FetchError {
    FetchError::Transport { label: "test".into(), reason: "connection reset".into() }
  }

  #[test]
  fn backoff_is_linear() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.delay_after(1), Duration::from_secs(5));
    assert_eq!(policy.delay_after(2), Duration::from_secs(10));
  }

  #[tokio::test]
  async fn transient_failures_are_retried_until_success() {
    let calls = AtomicU32::new(0);
    let result = with_retry(&RetryPolicy::immediate(3), "test", || async {
      if calls.fetch_add(1, Ordering::SeqCst) < 2 { Err(transport()) } else { Ok(7) }
    })
    .await;
    assert_eq!(result, Ok(7));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn gives_up_after_the_last_attempt() {
    let calls = AtomicU32::new(0);
    let result: Result<(), _> = with_retry(&RetryPolicy::immediate(3), "test", || async {
      calls.fetch_add(1, Ordering::SeqCst);
      Err(transport())
    })
    .await;
    assert_eq!(result, Err(transport()));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn client_errors_are_not_retried() {
    let calls = AtomicU32::new(0);
    let result: Result<(), _> = with_retry(&RetryPolicy::immediate(3), "test", || async {
      calls.fetch_add(1, Ordering::SeqCst);
      Err(FetchError::Status { label: "test".into(), status: 404 })
    })
    .await;
    assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn server_errors_are_retried() {
    let calls = AtomicU32::new(0);
    let result = with_retry(&RetryPolicy::immediate(3), "test", || async {
      if calls.fetch_add(1, Ordering::SeqCst) == 0 {
        Err(FetchError::Status { label: "test".into(), status: 502 })
      } else {
        Ok("ok")
      }
    })
    .await;
    assert_eq!(result, Ok("ok"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }
}

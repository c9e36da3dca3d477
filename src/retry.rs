//! Retry with exponential backoff.
//!
//! Nothing in the cache or the optimistic store retries on its own; callers
//! wrap the operations that are safe to repeat.

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
  /// Total attempts, including the first one
  pub max_attempts: u32,
  #[serde(with = "millis")]
  pub initial_delay: Duration,
  pub multiplier: f64,
  #[serde(with = "millis")]
  pub max_delay: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      initial_delay: Duration::from_millis(250),
      multiplier: 2.0,
      max_delay: Duration::from_secs(5),
    }
  }
}

impl RetryPolicy {
  /// Reject settings that cannot produce a sensible backoff.
  pub fn validate(&self) -> Result<()> {
    if !self.multiplier.is_finite() || self.multiplier < 1.0 {
      return Err(eyre!(
        "retry.multiplier must be a number >= 1.0, got {}",
        self.multiplier
      ));
    }
    Ok(())
  }

  /// Delay before attempt `attempt + 1`, where `attempt` starts at 1.
  pub fn delay_after(&self, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1) as i32;
    let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
    let capped = scaled.min(self.max_delay.as_secs_f64()).max(0.0);
    Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
  }
}

/// Run `op` until it succeeds or the policy runs out of attempts.
///
/// Returns the last error when every attempt fails.
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T>>,
{
  let attempts = policy.max_attempts.max(1);
  let mut attempt = 1;
  loop {
    match op().await {
      Ok(value) => return Ok(value),
      Err(e) if attempt >= attempts => return Err(e),
      Err(e) => {
        let delay = policy.delay_after(attempt);
        warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying after failure");
        tokio::time::sleep(delay).await;
        attempt += 1;
      }
    }
  }
}

mod millis {
  use serde::{Deserialize, Deserializer};
  use std::time::Duration;

  pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
  where
    D: Deserializer<'de>,
  {
    u64::deserialize(deserializer).map(Duration::from_millis)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};

  #[test]
  fn test_delay_grows_and_caps() {
    let policy = RetryPolicy {
      max_attempts: 10,
      initial_delay: Duration::from_millis(100),
      multiplier: 2.0,
      max_delay: Duration::from_millis(500),
    };

    assert_eq!(policy.delay_after(1), Duration::from_millis(100));
    assert_eq!(policy.delay_after(2), Duration::from_millis(200));
    assert_eq!(policy.delay_after(3), Duration::from_millis(400));
    assert_eq!(policy.delay_after(4), Duration::from_millis(500));
  }

  #[test]
  fn test_bad_multiplier_never_panics() {
    for multiplier in [-2.0, f64::NAN, f64::INFINITY] {
      let policy = RetryPolicy {
        multiplier,
        ..RetryPolicy::default()
      };
      assert!(policy.validate().is_err());
      assert!(policy.delay_after(2) <= policy.max_delay);
      assert!(policy.delay_after(3) <= policy.max_delay);
    }
    assert!(RetryPolicy::default().validate().is_ok());
  }

  #[tokio::test(start_paused = true)]
  async fn test_succeeds_after_transient_failures() {
    let calls = AtomicU32::new(0);

    let result = retry_with_backoff(&RetryPolicy::default(), || {
      let n = calls.fetch_add(1, Ordering::SeqCst);
      async move {
        if n < 2 {
          Err(eyre!("connection reset"))
        } else {
          Ok(n)
        }
      }
    })
    .await;

    assert_eq!(result.ok(), Some(2));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn test_returns_last_error_when_exhausted() {
    let calls = AtomicU32::new(0);

    let result: Result<()> = retry_with_backoff(&RetryPolicy::default(), || {
      let n = calls.fetch_add(1, Ordering::SeqCst);
      async move { Err(eyre!("attempt {}", n)) }
    })
    .await;

    assert_eq!(result.map_err(|e| e.to_string()), Err("attempt 2".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn test_none_policy_tries_once() {
    let calls = AtomicU32::new(0);

    let result: Result<()> = retry_with_backoff(
      &RetryPolicy {
        max_attempts: 1,
        ..RetryPolicy::default()
      }, || {
      calls.fetch_add(1, Ordering::SeqCst);
      async { Err(eyre!("nope")) }
    })
    .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn test_policy_from_yaml() {
    let policy: RetryPolicy =
      serde_yaml::from_str("max_attempts: 5\ninitial_delay: 50\nmax_delay: 1000\n").unwrap();
    assert_eq!(policy.max_attempts, 5);
    assert_eq!(policy.initial_delay, Duration::from_millis(50));
    assert_eq!(policy.multiplier, 2.0);
  }
}

use std::time::Duration;
use tokio::time::Instant;

/// Default quiet period for search-as-you-type
pub const DEFAULT_DELAY: Duration = Duration::from_millis(300);

/// Holds back a rapidly changing value until it has been stable for `delay`.
///
/// Driven by the UI tick: `push` on every change, `poll` on every tick.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
  delay: Duration,
  pending: Option<(T, Instant)>,
}

impl<T> Default for Debouncer<T> {
  fn default() -> Self {
    Self::new(DEFAULT_DELAY)
  }
}

impl<T> Debouncer<T> {
  pub fn new(delay: Duration) -> Self {
    Self {
      delay,
      pending: None,
    }
  }

  /// Replace the pending value and restart the quiet period.
  pub fn push(&mut self, value: T) {
    self.pending = Some((value, Instant::now() + self.delay));
  }

  /// Drop the pending value.
  pub fn cancel(&mut self) {
    self.pending = None;
  }

  /// Take the value once its quiet period has passed.
  pub fn poll(&mut self) -> Option<T> {
    let ready = matches!(&self.pending, Some((_, deadline)) if Instant::now() >= *deadline);
    if ready {
      self.pending.take().map(|(value, _)| value)
    } else {
      None
    }
  }
}

//! Debounce raw search keystrokes into committed search terms.
//!
//! The caller feeds every edit with `input` and calls `poll` on its tick; a
//! value is committed once no edit arrived for the delay. Only committed
//! values should reach `ListSlice::set_search`.

use std::time::{Duration, Instant};

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct Debouncer {
  delay: Duration,
  pending: Option<(String, Instant)>,
  committed: String,
}

impl Debouncer {
  pub fn new(delay: Duration) -> Self {
    Self {
      delay,
      pending: None,
      committed: String::new(),
    }
  }

  /// Last committed value
  pub fn committed(&self) -> &str {
    &self.committed
  }

  pub fn is_pending(&self) -> bool {
    self.pending.is_some()
  }

  /// Record an edit. Restarts the delay.
  pub fn input(&mut self, text: &str, now: Instant) {
    self.pending = Some((text.to_string(), now));
  }

  /// Commit the pending value if the delay has passed. Returns the new value
  /// only when it differs from the previous commit.
  pub fn poll(&mut self, now: Instant) -> Option<String> {
    match &self.pending {
      Some((_, at)) if now.saturating_duration_since(*at) >= self.delay => self.flush(),
      _ => None,
    }
  }

  /// Commit the pending value immediately.
  pub fn flush(&mut self) -> Option<String> {
    let (text, _) = self.pending.take()?;
    let text = text.trim().to_string();
    if text == self.committed {
      return None;
    }
    self.committed = text.clone();
    Some(text)
  }
}

impl Default for Debouncer {
  fn default() -> Self {
    Self::new(SEARCH_DEBOUNCE)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_commits_after_quiet_period() {
    let start = Instant::now();
    let mut debouncer = Debouncer::default();

    debouncer.input("j", start);
    debouncer.input("ja", start + Duration::from_millis(100));
    debouncer.input("jaz", start + Duration::from_millis(200));
    assert_eq!(debouncer.poll(start + Duration::from_millis(600)), None);
    assert_eq!(
      debouncer.poll(start + Duration::from_millis(700)),
      Some("jaz".to_string())
    );
    assert_eq!(debouncer.committed(), "jaz");
    assert!(!debouncer.is_pending());
  }

  #[test]
  fn test_unchanged_value_not_recommitted() {
    let start = Instant::now();
    let mut debouncer = Debouncer::new(Duration::from_millis(10));

    debouncer.input("dub ", start);
    assert_eq!(debouncer.flush(), Some("dub".to_string()));

    debouncer.input("dub", start);
    assert_eq!(debouncer.poll(start + Duration::from_millis(20)), None);
    assert_eq!(debouncer.committed(), "dub");
  }
}

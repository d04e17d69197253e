//! Single-value cache (dashboard aggregates, detail records).

use chrono::{DateTime, Duration, Utc};

use super::staleness::should_fetch;
use super::traits::failure_message;

#[derive(Debug, Clone)]
pub struct ValueCache<T> {
  value: Option<T>,
  loading: bool,
  error: Option<String>,
  last_fetched: Option<DateTime<Utc>>,
  generation: u64,
}

impl<T> Default for ValueCache<T> {
  fn default() -> Self {
    Self {
      value: None,
      loading: false,
      error: None,
      last_fetched: None,
      generation: 0,
    }
  }
}

impl<T: Clone> ValueCache<T> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn value(&self) -> Option<&T> {
    self.value.as_ref()
  }

  pub fn is_loading(&self) -> bool {
    self.loading
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  pub fn last_fetched(&self) -> Option<DateTime<Utc>> {
    self.last_fetched
  }

  pub fn should_fetch(&self, cache_duration: Duration, now: DateTime<Utc>) -> bool {
    should_fetch(self.last_fetched, cache_duration, &(), Some(&()), now)
  }

  pub fn begin_fetch(&mut self) -> u64 {
    self.generation += 1;
    self.loading = true;
    self.error = None;
    self.generation
  }

  pub fn fetch_succeeded(&mut self, generation: u64, value: T, now: DateTime<Utc>) -> bool {
    if generation != self.generation {
      return false;
    }
    self.value = Some(value);
    self.loading = false;
    self.last_fetched = Some(now);
    true
  }

  pub fn fetch_failed(&mut self, generation: u64, message: &str) -> bool {
    if generation != self.generation {
      return false;
    }
    self.loading = false;
    self.error = Some(failure_message(message));
    true
  }

  pub fn invalidate(&mut self) {
    self.last_fetched = None;
  }

  pub fn clear(&mut self) {
    let generation = self.generation + 1;
    *self = Self::default();
    self.generation = generation;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_value_lifecycle() {
    let mut cache: ValueCache<u32> = ValueCache::new();
    let now = Utc::now();
    assert!(cache.should_fetch(Duration::minutes(5), now));

    let generation = cache.begin_fetch();
    assert!(cache.is_loading());
    assert!(cache.fetch_succeeded(generation, 7, now));
    assert_eq!(cache.value(), Some(&7));
    assert!(!cache.should_fetch(Duration::minutes(5), now + Duration::minutes(4)));
    assert!(cache.should_fetch(Duration::minutes(5), now + Duration::minutes(6)));

    let generation = cache.begin_fetch();
    cache.fetch_failed(generation, "boom");
    assert_eq!(cache.value(), Some(&7));
    assert_eq!(cache.error(), Some("boom"));

    cache.invalidate();
    assert!(cache.should_fetch(Duration::minutes(5), now));
  }
}

//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};

/// Trait for entities that can be held in a cache slice.
///
/// Implementors must provide a unique identity key so mutation reducers can
/// find the item again after a create, update or delete.
pub trait Cacheable: Clone + Send + Sync + 'static {
  /// Unique identifier for this entity (e.g., page id, media public id)
  fn cache_key(&self) -> String;

  /// Text matched by the client-side secondary filter.
  /// Defaults to the cache key.
  fn search_text(&self) -> String {
    self.cache_key()
  }

  /// Entity type name for logging (e.g., "page", "track")
  fn entity_type() -> &'static str;
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was fetched (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from cached data that is still fresh.
  pub fn from_cache(data: T, cached_at: Option<DateTime<Utc>>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      cached_at,
    }
  }

  /// A network result arrived after a newer request was started and was dropped.
  pub fn superseded(data: T, cached_at: Option<DateTime<Utc>>) -> Self {
    Self {
      data,
      source: CacheSource::Superseded,
      cached_at,
    }
  }

  /// Check whether this result triggered a network round trip that was applied.
  pub fn is_fresh_fetch(&self) -> bool {
    self.source == CacheSource::Network
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network, written into the slice
  Network,
  /// Data served from the slice without a request
  Cache,
  /// The request completed but a newer one owns the slice; the slice's
  /// current contents are returned instead
  Superseded,
}

/// Per-slice rule for how successful create/update results reach the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationPolicy {
  /// Splice the returned item into the cached list
  #[default]
  Splice,
  /// Drop `last_fetched` and let the next fetch rebuild the list.
  /// Used where the mutation payload is not the list projection.
  Invalidate,
}

/// When a fetch flips the slice's `loading` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadingPolicy {
  /// Every fetch shows the loading state
  #[default]
  Always,
  /// Only fetches into an empty list show the loading state, so paging
  /// through existing data does not flash a full loading view
  WhenEmpty,
}

/// Message stored in a slice when a failure carries no text.
pub const GENERIC_ERROR: &str = "Something went wrong";

/// Pick the message reduced into a slice's `error` field.
pub(crate) fn failure_message(message: &str) -> String {
  let trimmed = message.trim();
  if trimmed.is_empty() {
    GENERIC_ERROR.to_string()
  } else {
    trimmed.to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_failure_message_fallback() {
    assert_eq!(failure_message(""), GENERIC_ERROR);
    assert_eq!(failure_message("   "), GENERIC_ERROR);
    assert_eq!(failure_message(" Request timed out "), "Request timed out");
  }

  #[test]
  fn test_cache_result_sources() {
    assert!(CacheResult::from_network(1).is_fresh_fetch());
    assert!(!CacheResult::from_cache(1, None).is_fresh_fetch());
    assert_eq!(
      CacheResult::superseded(1, None).source,
      CacheSource::Superseded
    );
  }
}

//! Cursor-paged cache for media listings.

use chrono::{DateTime, Duration, Utc};

use super::staleness::should_fetch;
use super::traits::{failure_message, Cacheable};

/// Parameters for a cursor-paged listing. The cursor itself is not part of
/// the snapshot; only the first page is compared for staleness.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CursorParams {
  pub folder: Option<String>,
  pub page_size: u32,
}

/// One batch from a cursor-paged endpoint.
#[derive(Debug, Clone)]
pub struct CursorPage<T> {
  pub items: Vec<T>,
  pub next_cursor: Option<String>,
  pub has_more: bool,
}

/// Cached state for a cursor-paged listing.
#[derive(Debug, Clone)]
pub struct CursorCache<T> {
  items: Vec<T>,
  loading: bool,
  loading_more: bool,
  error: Option<String>,
  next_cursor: Option<String>,
  has_more: bool,
  folder: Option<String>,
  page_size: u32,
  last_fetched: Option<DateTime<Utc>>,
  last_fetch_params: Option<CursorParams>,
  generation: u64,
}

impl<T: Cacheable> CursorCache<T> {
  pub fn new(page_size: u32) -> Self {
    Self {
      items: Vec::new(),
      loading: false,
      loading_more: false,
      error: None,
      next_cursor: None,
      has_more: false,
      folder: None,
      page_size,
      last_fetched: None,
      last_fetch_params: None,
      generation: 0,
    }
  }

  pub fn items(&self) -> &[T] {
    &self.items
  }

  pub fn is_loading(&self) -> bool {
    self.loading
  }

  pub fn is_loading_more(&self) -> bool {
    self.loading_more
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  pub fn next_cursor(&self) -> Option<&str> {
    self.next_cursor.as_deref()
  }

  pub fn has_more(&self) -> bool {
    self.has_more
  }

  pub fn last_fetched(&self) -> Option<DateTime<Utc>> {
    self.last_fetched
  }

  pub fn current_params(&self) -> CursorParams {
    CursorParams {
      folder: self.folder.clone(),
      page_size: self.page_size,
    }
  }

  pub fn should_fetch(&self, cache_duration: Duration, now: DateTime<Utc>) -> bool {
    should_fetch(
      self.last_fetched,
      cache_duration,
      &self.current_params(),
      self.last_fetch_params.as_ref(),
      now,
    )
  }

  /// Restrict the listing to a folder (None for all).
  pub fn set_folder(&mut self, folder: Option<&str>) {
    self.folder = folder.map(str::trim).filter(|f| !f.is_empty()).map(String::from);
  }

  pub fn begin_fetch(&mut self) -> u64 {
    self.generation += 1;
    self.loading = true;
    self.loading_more = false;
    self.error = None;
    self.generation
  }

  /// Replace items with the first batch.
  pub fn fetch_succeeded(
    &mut self,
    generation: u64,
    page: CursorPage<T>,
    params: CursorParams,
    now: DateTime<Utc>,
  ) -> bool {
    if generation != self.generation {
      return false;
    }

    self.items = page.items;
    self.next_cursor = page.next_cursor;
    self.has_more = page.has_more;
    self.last_fetched = Some(now);
    self.last_fetch_params = Some(params);
    self.loading = false;
    true
  }

  pub fn fetch_failed(&mut self, generation: u64, message: &str) -> bool {
    if generation != self.generation {
      return false;
    }

    self.loading = false;
    self.loading_more = false;
    self.error = Some(failure_message(message));
    true
  }

  /// Start loading the next batch.
  ///
  /// Returns the generation and cursor to request, or None when there is
  /// nothing more to load or a request is already in flight.
  pub fn begin_load_more(&mut self) -> Option<(u64, String)> {
    if !self.has_more || self.loading || self.loading_more {
      return None;
    }
    let cursor = self.next_cursor.clone()?;

    self.generation += 1;
    self.loading_more = true;
    self.error = None;
    Some((self.generation, cursor))
  }

  /// Append the next batch and move the cursor.
  pub fn load_more_succeeded(&mut self, generation: u64, page: CursorPage<T>) -> bool {
    if generation != self.generation {
      return false;
    }

    self.items.extend(page.items);
    self.next_cursor = page.next_cursor;
    self.has_more = page.has_more;
    self.loading_more = false;
    true
  }

  /// Prepend an uploaded asset.
  pub fn apply_uploaded(&mut self, item: T) {
    self.items.insert(0, item);
    self.last_fetched = None;
  }

  /// Remove an asset by key. Returns whether it was present.
  pub fn apply_deleted(&mut self, key: &str) -> bool {
    let before = self.items.len();
    self.items.retain(|item| item.cache_key() != key);
    self.last_fetched = None;
    self.items.len() != before
  }

  pub fn invalidate(&mut self) {
    self.last_fetched = None;
  }

  pub fn clear(&mut self) {
    let generation = self.generation + 1;
    *self = Self::new(self.page_size);
    self.generation = generation;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, Clone, PartialEq)]
  struct Asset(&'static str);

  impl Cacheable for Asset {
    fn cache_key(&self) -> String {
      self.0.to_string()
    }

    fn entity_type() -> &'static str {
      "asset"
    }
  }

  fn first_batch() -> CursorCache<Asset> {
    let mut cache = CursorCache::new(2);
    let generation = cache.begin_fetch();
    let params = cache.current_params();
    cache.fetch_succeeded(
      generation,
      CursorPage {
        items: vec![Asset("X"), Asset("Y")],
        next_cursor: Some("c1".to_string()),
        has_more: true,
      },
      params,
      Utc::now(),
    );
    cache
  }

  #[test]
  fn test_cursor_append() {
    let mut cache = first_batch();
    assert!(cache.has_more());
    assert_eq!(cache.next_cursor(), Some("c1"));

    let (generation, cursor) = cache.begin_load_more().expect("more to load");
    assert_eq!(cursor, "c1");
    assert!(cache.is_loading_more());
    assert!(!cache.is_loading());

    assert!(cache.load_more_succeeded(
      generation,
      CursorPage {
        items: vec![Asset("Z")],
        next_cursor: None,
        has_more: false,
      }
    ));

    assert_eq!(cache.items(), &[Asset("X"), Asset("Y"), Asset("Z")]);
    assert!(!cache.has_more());
    assert_eq!(cache.next_cursor(), None);
    assert!(!cache.is_loading_more());
  }

  #[test]
  fn test_load_more_refused_without_cursor_or_while_busy() {
    let mut empty: CursorCache<Asset> = CursorCache::new(2);
    assert!(empty.begin_load_more().is_none());

    let mut cache = first_batch();
    assert!(cache.begin_load_more().is_some());
    assert!(cache.begin_load_more().is_none(), "already loading more");

    let mut cache = first_batch();
    cache.begin_fetch();
    assert!(cache.begin_load_more().is_none(), "fetch in flight");
  }

  #[test]
  fn test_refetch_supersedes_load_more() {
    let mut cache = first_batch();
    let (more_gen, _) = cache.begin_load_more().expect("more to load");
    let fetch_gen = cache.begin_fetch();
    assert!(!cache.is_loading_more());

    assert!(!cache.load_more_succeeded(
      more_gen,
      CursorPage {
        items: vec![Asset("late")],
        next_cursor: None,
        has_more: false,
      }
    ));
    assert!(cache.fetch_succeeded(
      fetch_gen,
      CursorPage {
        items: vec![Asset("fresh")],
        next_cursor: None,
        has_more: false,
      },
      cache.current_params(),
      Utc::now()
    ));
    assert_eq!(cache.items(), &[Asset("fresh")]);
  }

  #[test]
  fn test_folder_change_forces_fetch() {
    let mut cache = first_batch();
    assert!(!cache.should_fetch(Duration::minutes(5), Utc::now()));
    cache.set_folder(Some("covers"));
    assert!(cache.should_fetch(Duration::minutes(5), Utc::now()));
  }

  #[test]
  fn test_upload_and_delete() {
    let mut cache = first_batch();
    cache.apply_uploaded(Asset("new"));
    assert_eq!(cache.items()[0], Asset("new"));
    assert!(cache.last_fetched().is_none());

    assert!(cache.apply_deleted("X"));
    assert!(!cache.apply_deleted("X"));
    assert_eq!(cache.items(), &[Asset("new"), Asset("Y")]);
  }

  #[test]
  fn test_failure_keeps_items() {
    let mut cache = first_batch();
    let (generation, _) = cache.begin_load_more().expect("more to load");
    assert!(cache.fetch_failed(generation, "Network error: connection reset"));
    assert_eq!(cache.items().len(), 2);
    assert!(!cache.is_loading_more());
    assert!(cache.has_more());
    assert_eq!(cache.error(), Some("Network error: connection reset"));
  }
}

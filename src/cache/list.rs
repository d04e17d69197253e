//! Page-numbered list cache with fetch lifecycle and mutation reducers.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

use super::staleness::{should_fetch, FetchParams};
use super::traits::{failure_message, Cacheable, LoadingPolicy};

/// Pagination metadata.
///
/// `page` and `page_size` are owned by the client. `total_items` and
/// `total_pages` come from the server on each fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
  pub page: u32,
  pub page_size: u32,
  pub total_items: u64,
  pub total_pages: u32,
}

impl Pagination {
  pub fn new(page_size: u32) -> Self {
    Self {
      page: 1,
      page_size,
      total_items: 0,
      total_pages: 0,
    }
  }
}

/// One page of results as returned by the server.
#[derive(Debug, Clone)]
pub struct ListPage<T> {
  pub items: Vec<T>,
  pub total_items: u64,
  pub total_pages: u32,
}

/// Outcome of a local delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteOutcome {
  /// Whether an item with the key was in the list
  pub removed: bool,
  /// The page emptied and stepped back; the caller should refetch
  pub refetch: bool,
}

/// Cached list state for one entity type.
#[derive(Debug, Clone)]
pub struct ListCache<T> {
  items: Vec<T>,
  loading: bool,
  error: Option<String>,
  pagination: Pagination,
  search: String,
  filters: BTreeMap<String, String>,
  last_fetched: Option<DateTime<Utc>>,
  last_fetch_params: Option<FetchParams>,
  generation: u64,
  loading_policy: LoadingPolicy,
}

impl<T: Cacheable> ListCache<T> {
  pub fn new(page_size: u32) -> Self {
    Self {
      items: Vec::new(),
      loading: false,
      error: None,
      pagination: Pagination::new(page_size),
      search: String::new(),
      filters: BTreeMap::new(),
      last_fetched: None,
      last_fetch_params: None,
      generation: 0,
      loading_policy: LoadingPolicy::Always,
    }
  }

  pub fn with_loading_policy(mut self, policy: LoadingPolicy) -> Self {
    self.loading_policy = policy;
    self
  }

  pub fn items(&self) -> &[T] {
    &self.items
  }

  pub fn is_loading(&self) -> bool {
    self.loading
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  pub fn pagination(&self) -> Pagination {
    self.pagination
  }

  pub fn search(&self) -> &str {
    &self.search
  }

  pub fn filters(&self) -> &BTreeMap<String, String> {
    &self.filters
  }

  pub fn last_fetched(&self) -> Option<DateTime<Utc>> {
    self.last_fetched
  }

  pub fn last_fetch_params(&self) -> Option<&FetchParams> {
    self.last_fetch_params.as_ref()
  }

  /// Parameters a fetch issued now would use.
  pub fn current_params(&self) -> FetchParams {
    FetchParams {
      page: self.pagination.page,
      page_size: self.pagination.page_size,
      search: self.search.clone(),
      filters: self.filters.clone(),
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

  // ==========================================================================
  // Fetch lifecycle
  // ==========================================================================

  /// Enter the loading state and return the generation tag for this request.
  pub fn begin_fetch(&mut self) -> u64 {
    self.generation += 1;
    self.loading = match self.loading_policy {
      LoadingPolicy::Always => true,
      LoadingPolicy::WhenEmpty => self.items.is_empty(),
    };
    self.error = None;
    self.generation
  }

  /// Apply a successful fetch. Returns false if `generation` was superseded.
  pub fn fetch_succeeded(
    &mut self,
    generation: u64,
    page: ListPage<T>,
    params: FetchParams,
    now: DateTime<Utc>,
  ) -> bool {
    if generation != self.generation {
      return false;
    }

    self.items = page.items;
    self.pagination.total_items = page.total_items;
    self.pagination.total_pages = page.total_pages;
    self.last_fetched = Some(now);
    self.last_fetch_params = Some(params);
    self.loading = false;
    true
  }

  /// Apply a failed fetch. Items and pagination are kept.
  /// Returns false if `generation` was superseded.
  pub fn fetch_failed(&mut self, generation: u64, message: &str) -> bool {
    if generation != self.generation {
      return false;
    }

    self.loading = false;
    self.error = Some(failure_message(message));
    true
  }

  // ==========================================================================
  // Mutation reducers
  // ==========================================================================

  /// Prepend a created item. `total_pages` is left to the next fetch.
  pub fn apply_created(&mut self, item: T) {
    self.items.insert(0, item);
    self.pagination.total_items += 1;
    self.last_fetched = None;
  }

  /// Replace an item in place. Returns false (and leaves the list alone)
  /// when the item is not on the cached page.
  pub fn apply_updated(&mut self, item: T) -> bool {
    let key = item.cache_key();
    self.last_fetched = None;
    match self.items.iter_mut().find(|existing| existing.cache_key() == key) {
      Some(existing) => {
        *existing = item;
        true
      }
      None => false,
    }
  }

  /// Remove an item by key after the server confirmed the delete.
  ///
  /// The total drops by one even when the item is not on the cached page.
  /// When the removal empties a page other than the first, the page steps
  /// back by one and the outcome asks for a refetch.
  pub fn apply_deleted(&mut self, key: &str) -> DeleteOutcome {
    let before = self.items.len();
    self.items.retain(|item| item.cache_key() != key);
    let removed = self.items.len() != before;

    self.pagination.total_items = self.pagination.total_items.saturating_sub(1);
    self.last_fetched = None;

    let refetch = removed && self.items.is_empty() && self.pagination.page > 1;
    if refetch {
      self.pagination.page -= 1;
    }

    DeleteOutcome { removed, refetch }
  }

  /// Drop `last_fetched` so the next check fetches.
  pub fn invalidate(&mut self) {
    self.last_fetched = None;
  }

  /// Reset to the empty state, keeping the configured page size and policy.
  /// In-flight requests are superseded.
  pub fn clear(&mut self) {
    let generation = self.generation + 1;
    *self = Self::new(self.pagination.page_size).with_loading_policy(self.loading_policy);
    self.generation = generation;
  }

  // ==========================================================================
  // Filter / search composition
  // ==========================================================================

  /// Commit a search term. Returns to the first page when it changes.
  pub fn set_search(&mut self, term: &str) {
    let term = term.trim();
    if self.search != term {
      self.search = term.to_string();
      self.pagination.page = 1;
    }
  }

  /// Set or remove (empty/None value) a server-side filter.
  /// Returns to the first page when the filter set changes.
  pub fn set_filter(&mut self, name: &str, value: Option<&str>) {
    let changed = match value.map(str::trim).filter(|v| !v.is_empty()) {
      Some(v) => self.filters.insert(name.to_string(), v.to_string()).as_deref() != Some(v),
      None => self.filters.remove(name).is_some(),
    };
    if changed {
      self.pagination.page = 1;
    }
  }

  /// Select a page (1-based; 0 is treated as 1).
  pub fn set_page(&mut self, page: u32) {
    self.pagination.page = page.max(1);
  }

  /// Change the page size, returning to the first page.
  pub fn set_page_size(&mut self, page_size: u32) {
    let page_size = page_size.max(1);
    if self.pagination.page_size != page_size {
      self.pagination.page_size = page_size;
      self.pagination.page = 1;
    }
  }

  /// Client-side secondary filter over the fetched page.
  /// Case-insensitive substring match; never touches pagination.
  pub fn filter_local(&self, needle: &str) -> Vec<&T> {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
      return self.items.iter().collect();
    }
    self
      .items
      .iter()
      .filter(|item| item.search_text().to_lowercase().contains(&needle))
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, Clone, PartialEq)]
  struct Item {
    id: &'static str,
    title: &'static str,
  }

  impl Cacheable for Item {
    fn cache_key(&self) -> String {
      self.id.to_string()
    }

    fn search_text(&self) -> String {
      self.title.to_string()
    }

    fn entity_type() -> &'static str {
      "item"
    }
  }

  fn item(id: &'static str) -> Item {
    Item { id, title: id }
  }

  fn page_of(items: Vec<Item>, total_items: u64, total_pages: u32) -> ListPage<Item> {
    ListPage {
      items,
      total_items,
      total_pages,
    }
  }

  fn loaded(items: Vec<Item>, total: u64) -> ListCache<Item> {
    let mut cache = ListCache::new(10);
    let generation = cache.begin_fetch();
    let params = cache.current_params();
    let pages = ((total + 9) / 10) as u32;
    assert!(cache.fetch_succeeded(generation, page_of(items, total, pages), params, Utc::now()));
    cache
  }

  #[test]
  fn test_fetch_success_replaces_items_and_keeps_client_page() {
    let mut cache: ListCache<Item> = ListCache::new(10);
    cache.set_page(2);
    let generation = cache.begin_fetch();
    assert!(cache.is_loading());

    let params = cache.current_params();
    let now = Utc::now();
    assert!(cache.fetch_succeeded(
      generation,
      page_of(vec![item("a"), item("b")], 12, 2),
      params.clone(),
      now
    ));

    assert!(!cache.is_loading());
    assert_eq!(cache.items().len(), 2);
    let p = cache.pagination();
    assert_eq!((p.page, p.page_size, p.total_items, p.total_pages), (2, 10, 12, 2));
    assert_eq!(cache.last_fetched(), Some(now));
    assert_eq!(cache.last_fetch_params(), Some(&params));
    assert!(!cache.should_fetch(Duration::minutes(2), now));
  }

  #[test]
  fn test_fetch_failure_keeps_cache() {
    let mut cache = loaded(vec![item("a"), item("b")], 2);
    let fetched = cache.last_fetched();

    let generation = cache.begin_fetch();
    assert!(cache.error().is_none());
    assert!(cache.fetch_failed(generation, "Request timed out"));

    assert!(!cache.is_loading());
    assert_eq!(cache.error(), Some("Request timed out"));
    assert_eq!(cache.items().len(), 2);
    assert_eq!(cache.pagination().total_items, 2);
    assert_eq!(cache.last_fetched(), fetched);
  }

  #[test]
  fn test_fetch_failure_generic_message() {
    let mut cache: ListCache<Item> = ListCache::new(10);
    let generation = cache.begin_fetch();
    cache.fetch_failed(generation, "");
    assert_eq!(cache.error(), Some(crate::cache::traits::GENERIC_ERROR));
  }

  #[test]
  fn test_superseded_completion_is_ignored() {
    let mut cache: ListCache<Item> = ListCache::new(10);
    let slow = cache.begin_fetch();
    let fast = cache.begin_fetch();
    let params = cache.current_params();

    assert!(cache.fetch_succeeded(fast, page_of(vec![item("new")], 1, 1), params.clone(), Utc::now()));
    assert!(!cache.fetch_succeeded(slow, page_of(vec![item("old")], 1, 1), params, Utc::now()));
    assert!(!cache.fetch_failed(slow, "late failure"));

    assert_eq!(cache.items(), &[item("new")]);
    assert!(cache.error().is_none());
  }

  #[test]
  fn test_identical_fetches_are_idempotent() {
    let mut cache: ListCache<Item> = ListCache::new(10);
    let params = cache.current_params();

    let g1 = cache.begin_fetch();
    cache.fetch_succeeded(g1, page_of(vec![item("a"), item("b")], 2, 1), params.clone(), Utc::now());
    let first = (cache.items().to_vec(), cache.pagination());

    let g2 = cache.begin_fetch();
    cache.fetch_succeeded(g2, page_of(vec![item("a"), item("b")], 2, 1), params, Utc::now());
    assert_eq!((cache.items().to_vec(), cache.pagination()), first);
  }

  #[test]
  fn test_when_empty_loading_policy() {
    let mut cache: ListCache<Item> = ListCache::new(10).with_loading_policy(LoadingPolicy::WhenEmpty);
    cache.begin_fetch();
    assert!(cache.is_loading());

    let mut cache = loaded(vec![item("a")], 1).with_loading_policy(LoadingPolicy::WhenEmpty);
    cache.set_page(2);
    cache.begin_fetch();
    assert!(!cache.is_loading());
  }

  #[test]
  fn test_optimistic_create() {
    let mut cache = loaded(vec![item("A"), item("B")], 2);
    let pages_before = cache.pagination().total_pages;

    cache.apply_created(item("C"));

    assert_eq!(cache.items(), &[item("C"), item("A"), item("B")]);
    assert_eq!(cache.pagination().total_items, 3);
    assert_eq!(cache.pagination().total_pages, pages_before);
    assert!(cache.last_fetched().is_none());
  }

  #[test]
  fn test_create_then_delete_round_trip() {
    let mut cache = loaded(vec![item("A"), item("B")], 7);
    cache.apply_created(item("C"));
    let outcome = cache.apply_deleted("C");

    assert!(outcome.removed);
    assert!(!outcome.refetch);
    assert_eq!(cache.pagination().total_items, 7);
    assert_eq!(cache.items(), &[item("A"), item("B")]);
  }

  #[test]
  fn test_update_in_place_and_missing() {
    let mut cache = loaded(vec![item("A"), item("B"), item("C")], 3);

    let renamed = Item { id: "B", title: "Bee" };
    assert!(cache.apply_updated(renamed.clone()));
    assert_eq!(cache.items()[1], renamed);

    let before = cache.items().to_vec();
    assert!(!cache.apply_updated(item("Z")));
    assert_eq!(cache.items(), before.as_slice());
    assert_eq!(cache.pagination().total_items, 3);
  }

  #[test]
  fn test_page_underflow_steps_back() {
    let mut cache: ListCache<Item> = ListCache::new(10);
    cache.set_page(3);
    let generation = cache.begin_fetch();
    let params = cache.current_params();
    cache.fetch_succeeded(generation, page_of(vec![item("last")], 21, 3), params, Utc::now());

    let outcome = cache.apply_deleted("last");

    assert_eq!(outcome, DeleteOutcome { removed: true, refetch: true });
    assert_eq!(cache.pagination().page, 2);
    assert_eq!(cache.pagination().total_items, 20);
    assert!(cache.should_fetch(Duration::minutes(2), Utc::now()));
  }

  #[test]
  fn test_emptying_first_page_does_not_step_back() {
    let mut cache = loaded(vec![item("only")], 1);
    let outcome = cache.apply_deleted("only");
    assert_eq!(outcome, DeleteOutcome { removed: true, refetch: false });
    assert_eq!(cache.pagination().page, 1);
    assert_eq!(cache.pagination().total_items, 0);
  }

  #[test]
  fn test_delete_off_page_still_decrements_total() {
    let mut cache = loaded(vec![item("a")], 12);
    let outcome = cache.apply_deleted("nope");
    assert_eq!(outcome, DeleteOutcome { removed: false, refetch: false });
    assert_eq!(cache.items().len(), 1);
    assert_eq!(cache.pagination().total_items, 11);

    let mut empty = ListCache::<Item>::new(10);
    empty.apply_deleted("nope");
    assert_eq!(empty.pagination().total_items, 0);
  }

  #[test]
  fn test_search_and_filter_reset_page() {
    let mut cache: ListCache<Item> = ListCache::new(10);
    cache.set_page(4);
    cache.set_search("drums");
    assert_eq!(cache.pagination().page, 1);

    cache.set_page(3);
    cache.set_search("drums");
    assert_eq!(cache.pagination().page, 3, "unchanged search keeps page");

    cache.set_filter("group", Some("live"));
    assert_eq!(cache.pagination().page, 1);
    assert_eq!(cache.filters().get("group").map(String::as_str), Some("live"));

    cache.set_page(2);
    cache.set_filter("group", Some("live"));
    assert_eq!(cache.pagination().page, 2, "same filter value keeps page");

    cache.set_filter("group", Some(""));
    assert_eq!(cache.pagination().page, 1);
    assert!(cache.filters().is_empty());
  }

  #[test]
  fn test_committed_search_change_forces_fetch() {
    let mut cache = loaded(vec![item("a")], 1);
    assert!(!cache.should_fetch(Duration::minutes(2), Utc::now()));
    cache.set_search("a");
    assert!(cache.should_fetch(Duration::minutes(2), Utc::now()));
  }

  #[test]
  fn test_local_filter_does_not_touch_pagination() {
    let mut cache = loaded(
      vec![
        Item { id: "1", title: "Morning Raga" },
        Item { id: "2", title: "Night Drive" },
        Item { id: "3", title: "raga at dusk" },
      ],
      30,
    );
    cache.set_page(1);

    let hits = cache.filter_local("RAGA");
    assert_eq!(hits.len(), 2);
    assert_eq!(cache.pagination().total_items, 30);
    assert_eq!(cache.filter_local("  ").len(), 3);
  }

  #[test]
  fn test_clear_resets_and_supersedes() {
    let mut cache = loaded(vec![item("a")], 1);
    cache.set_search("x");
    let in_flight = cache.begin_fetch();
    cache.clear();

    assert!(cache.items().is_empty());
    assert!(cache.last_fetched().is_none());
    assert_eq!(cache.search(), "");
    assert_eq!(cache.pagination().page_size, 10);
    assert!(!cache.fetch_succeeded(in_flight, page_of(vec![item("b")], 1, 1), FetchParams::new(1, 10), Utc::now()));
    assert!(cache.items().is_empty());
  }
}

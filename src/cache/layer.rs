//! Slice layer that runs the fetch lifecycle against a network fetcher.
//!
//! Each slice owns its cache state behind a shared lock. Locks are never held
//! across an `.await`; a fetch takes a generation tag before it suspends and
//! only writes its result back if no newer request was started meanwhile.

use chrono::{Duration, Utc};
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use super::cursor::{CursorCache, CursorPage, CursorParams};
use super::folders::{Folder, FolderCache};
use super::list::{DeleteOutcome, ListCache, ListPage};
use super::staleness::{FetchParams, DASHBOARD_CACHE_DURATION, LIST_CACHE_DURATION, MEDIA_CACHE_DURATION};
use super::traits::{CacheResult, Cacheable, LoadingPolicy, MutationPolicy};
use super::value::ValueCache;

/// Shared, lock-protected cache state. Poisoned locks are recovered since
/// every reducer leaves the state consistent.
#[derive(Debug)]
struct Shared<C>(Arc<RwLock<C>>);

impl<C> Shared<C> {
  fn new(state: C) -> Self {
    Self(Arc::new(RwLock::new(state)))
  }

  fn read(&self) -> RwLockReadGuard<'_, C> {
    self.0.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write(&self) -> RwLockWriteGuard<'_, C> {
    self.0.write().unwrap_or_else(PoisonError::into_inner)
  }
}

impl<C> Clone for Shared<C> {
  fn clone(&self) -> Self {
    Self(Arc::clone(&self.0))
  }
}

// ============================================================================
// Page-numbered lists
// ============================================================================

/// Cache slice for a page-numbered, searchable, filterable list.
pub struct ListSlice<T> {
  state: Shared<ListCache<T>>,
  cache_duration: Duration,
  mutation_policy: MutationPolicy,
}

impl<T: Cacheable> ListSlice<T> {
  pub fn new(page_size: u32) -> Self {
    Self {
      state: Shared::new(ListCache::new(page_size)),
      cache_duration: LIST_CACHE_DURATION,
      mutation_policy: MutationPolicy::Splice,
    }
  }

  pub fn with_cache_duration(mut self, cache_duration: Duration) -> Self {
    self.cache_duration = cache_duration;
    self
  }

  pub fn with_loading_policy(self, policy: LoadingPolicy) -> Self {
    {
      let mut state = self.state.write();
      let current = std::mem::replace(&mut *state, ListCache::new(1));
      *state = current.with_loading_policy(policy);
    }
    self
  }

  pub fn with_mutation_policy(mut self, policy: MutationPolicy) -> Self {
    self.mutation_policy = policy;
    self
  }

  pub fn cache_duration(&self) -> Duration {
    self.cache_duration
  }

  pub fn mutation_policy(&self) -> MutationPolicy {
    self.mutation_policy
  }

  /// Copy of the current state.
  pub fn snapshot(&self) -> ListCache<T> {
    self.state.read().clone()
  }

  /// Read from the state without cloning it.
  pub fn read<R>(&self, f: impl FnOnce(&ListCache<T>) -> R) -> R {
    f(&self.state.read())
  }

  pub fn needs_fetch(&self) -> bool {
    self.state.read().should_fetch(self.cache_duration, Utc::now())
  }

  pub fn set_search(&self, term: &str) {
    self.state.write().set_search(term);
  }

  pub fn set_filter(&self, name: &str, value: Option<&str>) {
    self.state.write().set_filter(name, value);
  }

  pub fn set_page(&self, page: u32) {
    self.state.write().set_page(page);
  }

  pub fn set_page_size(&self, page_size: u32) {
    self.state.write().set_page_size(page_size);
  }

  pub fn invalidate(&self) {
    self.state.write().invalidate();
  }

  pub fn clear(&self) {
    self.state.write().clear();
  }

  /// Fetch the current page with a cache-first strategy.
  ///
  /// 1. Unless `force`, serve from the slice when the staleness policy allows
  /// 2. Otherwise start a tagged request with the slice's current parameters
  /// 3. Reduce the outcome into the slice if the request is still the latest
  ///
  /// Failures are recorded in the slice and returned to the caller.
  pub async fn fetch<F, Fut, E>(&self, force: bool, fetcher: F) -> Result<CacheResult<Vec<T>>, E>
  where
    F: FnOnce(FetchParams) -> Fut,
    Fut: Future<Output = Result<ListPage<T>, E>>,
    E: Display,
  {
    let (params, generation) = {
      let mut state = self.state.write();
      if !force && !state.should_fetch(self.cache_duration, Utc::now()) {
        debug!(entity = T::entity_type(), "serving list from cache");
        return Ok(CacheResult::from_cache(
          state.items().to_vec(),
          state.last_fetched(),
        ));
      }
      (state.current_params(), state.begin_fetch())
    };

    debug!(
      entity = T::entity_type(),
      page = params.page,
      search = %params.search,
      generation,
      "fetching list"
    );

    match fetcher(params.clone()).await {
      Ok(page) => {
        let mut state = self.state.write();
        if state.fetch_succeeded(generation, page, params, Utc::now()) {
          Ok(CacheResult::from_network(state.items().to_vec()))
        } else {
          debug!(entity = T::entity_type(), generation, "dropping superseded list result");
          Ok(CacheResult::superseded(
            state.items().to_vec(),
            state.last_fetched(),
          ))
        }
      }
      Err(e) => {
        if !self.state.write().fetch_failed(generation, &e.to_string()) {
          debug!(entity = T::entity_type(), generation, "dropping superseded list failure");
        }
        Err(e)
      }
    }
  }

  /// Reduce a successful create according to the mutation policy.
  pub fn apply_created(&self, item: T) {
    let mut state = self.state.write();
    match self.mutation_policy {
      MutationPolicy::Splice => state.apply_created(item),
      MutationPolicy::Invalidate => state.invalidate(),
    }
  }

  /// Reduce a successful update according to the mutation policy.
  pub fn apply_updated(&self, item: T) {
    let mut state = self.state.write();
    match self.mutation_policy {
      MutationPolicy::Splice => {
        state.apply_updated(item);
      }
      MutationPolicy::Invalidate => state.invalidate(),
    }
  }

  pub fn apply_deleted(&self, key: &str) -> DeleteOutcome {
    self.state.write().apply_deleted(key)
  }
}

impl<T> Clone for ListSlice<T> {
  fn clone(&self) -> Self {
    Self {
      state: self.state.clone(),
      cache_duration: self.cache_duration,
      mutation_policy: self.mutation_policy,
    }
  }
}

// ============================================================================
// Cursor-paged media listings
// ============================================================================

pub struct CursorSlice<T> {
  state: Shared<CursorCache<T>>,
  cache_duration: Duration,
}

impl<T: Cacheable> CursorSlice<T> {
  pub fn new(page_size: u32) -> Self {
    Self {
      state: Shared::new(CursorCache::new(page_size)),
      cache_duration: MEDIA_CACHE_DURATION,
    }
  }

  pub fn with_cache_duration(mut self, cache_duration: Duration) -> Self {
    self.cache_duration = cache_duration;
    self
  }

  pub fn snapshot(&self) -> CursorCache<T> {
    self.state.read().clone()
  }

  pub fn read<R>(&self, f: impl FnOnce(&CursorCache<T>) -> R) -> R {
    f(&self.state.read())
  }

  pub fn needs_fetch(&self) -> bool {
    self.state.read().should_fetch(self.cache_duration, Utc::now())
  }

  pub fn set_folder(&self, folder: Option<&str>) {
    self.state.write().set_folder(folder);
  }

  pub fn invalidate(&self) {
    self.state.write().invalidate();
  }

  pub fn clear(&self) {
    self.state.write().clear();
  }

  /// Fetch the first batch, replacing the slice's items.
  pub async fn fetch<F, Fut, E>(&self, force: bool, fetcher: F) -> Result<CacheResult<Vec<T>>, E>
  where
    F: FnOnce(CursorParams) -> Fut,
    Fut: Future<Output = Result<CursorPage<T>, E>>,
    E: Display,
  {
    let (params, generation) = {
      let mut state = self.state.write();
      if !force && !state.should_fetch(self.cache_duration, Utc::now()) {
        debug!(entity = T::entity_type(), "serving media from cache");
        return Ok(CacheResult::from_cache(
          state.items().to_vec(),
          state.last_fetched(),
        ));
      }
      (state.current_params(), state.begin_fetch())
    };

    debug!(entity = T::entity_type(), generation, "fetching media");

    match fetcher(params.clone()).await {
      Ok(page) => {
        let mut state = self.state.write();
        if state.fetch_succeeded(generation, page, params, Utc::now()) {
          Ok(CacheResult::from_network(state.items().to_vec()))
        } else {
          debug!(entity = T::entity_type(), generation, "dropping superseded media result");
          Ok(CacheResult::superseded(
            state.items().to_vec(),
            state.last_fetched(),
          ))
        }
      }
      Err(e) => {
        self.state.write().fetch_failed(generation, &e.to_string());
        Err(e)
      }
    }
  }

  /// Append the next batch. Returns `Ok(None)` when there is nothing to load
  /// or another request is in flight.
  pub async fn load_more<F, Fut, E>(&self, fetcher: F) -> Result<Option<CacheResult<Vec<T>>>, E>
  where
    F: FnOnce(CursorParams, String) -> Fut,
    Fut: Future<Output = Result<CursorPage<T>, E>>,
    E: Display,
  {
    let (params, generation, cursor) = {
      let mut state = self.state.write();
      let params = state.current_params();
      match state.begin_load_more() {
        Some((generation, cursor)) => (params, generation, cursor),
        None => return Ok(None),
      }
    };

    debug!(entity = T::entity_type(), %cursor, generation, "loading more media");

    match fetcher(params, cursor).await {
      Ok(page) => {
        let mut state = self.state.write();
        if state.load_more_succeeded(generation, page) {
          Ok(Some(CacheResult::from_network(state.items().to_vec())))
        } else {
          Ok(Some(CacheResult::superseded(
            state.items().to_vec(),
            state.last_fetched(),
          )))
        }
      }
      Err(e) => {
        self.state.write().fetch_failed(generation, &e.to_string());
        Err(e)
      }
    }
  }

  pub fn apply_uploaded(&self, item: T) {
    self.state.write().apply_uploaded(item);
  }

  pub fn apply_deleted(&self, key: &str) -> bool {
    self.state.write().apply_deleted(key)
  }
}

impl<T> Clone for CursorSlice<T> {
  fn clone(&self) -> Self {
    Self {
      state: self.state.clone(),
      cache_duration: self.cache_duration,
    }
  }
}

// ============================================================================
// Folder tree
// ============================================================================

pub struct FolderSlice<T> {
  state: Shared<FolderCache<T>>,
  cache_duration: Duration,
}

impl<T: Cacheable> FolderSlice<T> {
  pub fn new() -> Self {
    Self {
      state: Shared::new(FolderCache::new()),
      cache_duration: MEDIA_CACHE_DURATION,
    }
  }

  pub fn with_cache_duration(mut self, cache_duration: Duration) -> Self {
    self.cache_duration = cache_duration;
    self
  }

  pub fn snapshot(&self) -> FolderCache<T> {
    self.state.read().clone()
  }

  pub fn read<R>(&self, f: impl FnOnce(&FolderCache<T>) -> R) -> R {
    f(&self.state.read())
  }

  pub fn select(&self, path: Option<&str>) -> bool {
    self.state.write().select(path)
  }

  pub fn navigate_up(&self) -> bool {
    self.state.write().navigate_up()
  }

  pub fn apply_deleted(&self, key: &str) -> bool {
    self.state.write().apply_deleted(key)
  }

  pub fn invalidate(&self) {
    self.state.write().invalidate();
  }

  pub fn clear(&self) {
    self.state.write().clear();
  }

  pub async fn fetch<F, Fut, E>(&self, force: bool, fetcher: F) -> Result<CacheResult<Vec<Folder<T>>>, E>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<Folder<T>>, E>>,
    E: Display,
  {
    let generation = {
      let mut state = self.state.write();
      if !force && !state.should_fetch(self.cache_duration, Utc::now()) {
        debug!(entity = T::entity_type(), "serving folders from cache");
        return Ok(CacheResult::from_cache(
          state.folders().to_vec(),
          state.last_fetched(),
        ));
      }
      state.begin_fetch()
    };

    match fetcher().await {
      Ok(folders) => {
        let mut state = self.state.write();
        if state.fetch_succeeded(generation, folders, Utc::now()) {
          Ok(CacheResult::from_network(state.folders().to_vec()))
        } else {
          Ok(CacheResult::superseded(
            state.folders().to_vec(),
            state.last_fetched(),
          ))
        }
      }
      Err(e) => {
        self.state.write().fetch_failed(generation, &e.to_string());
        Err(e)
      }
    }
  }
}

impl<T: Cacheable> Default for FolderSlice<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> Clone for FolderSlice<T> {
  fn clone(&self) -> Self {
    Self {
      state: self.state.clone(),
      cache_duration: self.cache_duration,
    }
  }
}

// ============================================================================
// Single values
// ============================================================================

pub struct ValueSlice<T> {
  state: Shared<ValueCache<T>>,
  cache_duration: Duration,
}

impl<T: Clone + Send + Sync + 'static> ValueSlice<T> {
  pub fn new() -> Self {
    Self {
      state: Shared::new(ValueCache::new()),
      cache_duration: DASHBOARD_CACHE_DURATION,
    }
  }

  pub fn with_cache_duration(mut self, cache_duration: Duration) -> Self {
    self.cache_duration = cache_duration;
    self
  }

  pub fn snapshot(&self) -> ValueCache<T> {
    self.state.read().clone()
  }

  pub fn invalidate(&self) {
    self.state.write().invalidate();
  }

  pub fn clear(&self) {
    self.state.write().clear();
  }

  pub async fn fetch<F, Fut, E>(&self, force: bool, fetcher: F) -> Result<CacheResult<T>, E>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
  {
    let generation = {
      let mut state = self.state.write();
      if !force && !state.should_fetch(self.cache_duration, Utc::now()) {
        if let Some(value) = state.value() {
          debug!("serving value from cache");
          return Ok(CacheResult::from_cache(value.clone(), state.last_fetched()));
        }
      }
      state.begin_fetch()
    };

    match fetcher().await {
      Ok(value) => {
        let mut state = self.state.write();
        if state.fetch_succeeded(generation, value.clone(), Utc::now()) {
          Ok(CacheResult::from_network(value))
        } else {
          let current = state.value().cloned().unwrap_or(value);
          Ok(CacheResult::superseded(current, state.last_fetched()))
        }
      }
      Err(e) => {
        self.state.write().fetch_failed(generation, &e.to_string());
        Err(e)
      }
    }
  }
}

impl<T: Clone + Send + Sync + 'static> Default for ValueSlice<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> Clone for ValueSlice<T> {
  fn clone(&self) -> Self {
    Self {
      state: self.state.clone(),
      cache_duration: self.cache_duration,
    }
  }
}

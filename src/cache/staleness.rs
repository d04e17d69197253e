//! Staleness policy deciding whether cached data can be reused.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

/// Cache duration for searchable/filterable lists (pages, tracks, playlists, contacts).
pub const LIST_CACHE_DURATION: Duration = Duration::minutes(2);

/// Cache duration for media listings and folders.
pub const MEDIA_CACHE_DURATION: Duration = Duration::minutes(5);

/// Cache duration for dashboard aggregates.
pub const DASHBOARD_CACHE_DURATION: Duration = Duration::minutes(5);

/// Snapshot of the query parameters used for a list fetch.
///
/// Two snapshots are equal only if page, page size, search text and every
/// active filter match.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchParams {
  pub page: u32,
  pub page_size: u32,
  pub search: String,
  pub filters: BTreeMap<String, String>,
}

impl FetchParams {
  pub fn new(page: u32, page_size: u32) -> Self {
    Self {
      page,
      page_size,
      ..Self::default()
    }
  }

  pub fn with_search(mut self, search: impl Into<String>) -> Self {
    self.search = search.into();
    self
  }

  pub fn with_filter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.filters.insert(name.into(), value.into());
    self
  }

  /// Query string pairs for the backend (`page`, `limit`, `search`, filters).
  /// Empty search is omitted.
  pub fn query_pairs(&self) -> Vec<(String, String)> {
    let mut pairs = vec![
      ("page".to_string(), self.page.to_string()),
      ("limit".to_string(), self.page_size.to_string()),
    ];
    if !self.search.is_empty() {
      pairs.push(("search".to_string(), self.search.clone()));
    }
    for (name, value) in &self.filters {
      pairs.push((name.clone(), value.clone()));
    }
    pairs
  }
}

/// Decide whether a fetch is needed.
///
/// Returns true when nothing was fetched yet, when the last fetch is older
/// than `cache_duration`, or when `current` differs from the parameters of
/// the last fetch.
pub fn should_fetch<P: PartialEq>(
  last_fetched: Option<DateTime<Utc>>,
  cache_duration: Duration,
  current: &P,
  last_fetch_params: Option<&P>,
  now: DateTime<Utc>,
) -> bool {
  let Some(fetched_at) = last_fetched else {
    return true;
  };

  if now - fetched_at > cache_duration {
    return true;
  }

  match last_fetch_params {
    Some(last) => last != current,
    None => true,
  }
}

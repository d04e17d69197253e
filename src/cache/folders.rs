//! Folder cache with breadcrumb navigation over pre-aggregated folders.
//!
//! Folder contents arrive embedded in the folder listing, so selecting a
//! folder never issues a request.

use chrono::{DateTime, Duration, Utc};

use super::staleness::should_fetch;
use super::traits::{failure_message, Cacheable};

/// A folder with its items embedded.
#[derive(Debug, Clone, PartialEq)]
pub struct Folder<T> {
  pub name: String,
  /// Slash-separated path, e.g. "albums/live"
  pub path: String,
  pub items: Vec<T>,
  pub item_count: u64,
}

impl<T> Folder<T> {
  fn parent_path(&self) -> Option<&str> {
    self.path.rsplit_once('/').map(|(parent, _)| parent)
  }
}

/// One step in the breadcrumb trail. `path` is None for the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breadcrumb {
  pub label: String,
  pub path: Option<String>,
}

pub const ROOT_LABEL: &str = "All folders";

#[derive(Debug, Clone)]
pub struct FolderCache<T> {
  folders: Vec<Folder<T>>,
  loading_folders: bool,
  error: Option<String>,
  last_fetched_folders: Option<DateTime<Utc>>,
  current_path: Option<String>,
  generation: u64,
}

impl<T: Cacheable> Default for FolderCache<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Cacheable> FolderCache<T> {
  pub fn new() -> Self {
    Self {
      folders: Vec::new(),
      loading_folders: false,
      error: None,
      last_fetched_folders: None,
      current_path: None,
      generation: 0,
    }
  }

  pub fn folders(&self) -> &[Folder<T>] {
    &self.folders
  }

  pub fn is_loading(&self) -> bool {
    self.loading_folders
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  pub fn last_fetched(&self) -> Option<DateTime<Utc>> {
    self.last_fetched_folders
  }

  pub fn current_path(&self) -> Option<&str> {
    self.current_path.as_deref()
  }

  /// The folder listing has no parameters; only time gates a refetch.
  pub fn should_fetch(&self, cache_duration: Duration, now: DateTime<Utc>) -> bool {
    should_fetch(
      self.last_fetched_folders,
      cache_duration,
      &(),
      Some(&()),
      now,
    )
  }

  pub fn begin_fetch(&mut self) -> u64 {
    self.generation += 1;
    self.loading_folders = true;
    self.error = None;
    self.generation
  }

  /// Replace the folder tree. A selection that no longer exists falls back to the root.
  pub fn fetch_succeeded(&mut self, generation: u64, folders: Vec<Folder<T>>, now: DateTime<Utc>) -> bool {
    if generation != self.generation {
      return false;
    }

    self.folders = folders;
    self.loading_folders = false;
    self.last_fetched_folders = Some(now);
    if let Some(path) = &self.current_path {
      if self.find(path).is_none() {
        self.current_path = None;
      }
    }
    true
  }

  pub fn fetch_failed(&mut self, generation: u64, message: &str) -> bool {
    if generation != self.generation {
      return false;
    }

    self.loading_folders = false;
    self.error = Some(failure_message(message));
    true
  }

  fn find(&self, path: &str) -> Option<&Folder<T>> {
    self.folders.iter().find(|f| f.path == path)
  }

  /// Select a folder by path (None for the root). Returns false if the path is unknown.
  pub fn select(&mut self, path: Option<&str>) -> bool {
    match path.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
      None => {
        self.current_path = None;
        true
      }
      Some(p) if self.find(p).is_some() => {
        self.current_path = Some(p.to_string());
        true
      }
      Some(_) => false,
    }
  }

  /// Move to the parent folder. Returns false when already at the root.
  pub fn navigate_up(&mut self) -> bool {
    match self.current_path.take() {
      None => false,
      Some(path) => {
        self.current_path = path
          .rsplit_once('/')
          .map(|(parent, _)| parent.to_string())
          .filter(|parent| self.find(parent).is_some());
        true
      }
    }
  }

  pub fn selected(&self) -> Option<&Folder<T>> {
    self.current_path.as_deref().and_then(|p| self.find(p))
  }

  /// Items of the selected folder; empty at the root.
  pub fn selected_items(&self) -> &[T] {
    self.selected().map(|f| f.items.as_slice()).unwrap_or(&[])
  }

  /// Direct subfolders of the current selection.
  pub fn children(&self) -> Vec<&Folder<T>> {
    let current = self.current_path.as_deref();
    self
      .folders
      .iter()
      .filter(|f| f.parent_path() == current)
      .collect()
  }

  /// Trail from the root to the current selection.
  pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
    let mut trail = vec![Breadcrumb {
      label: ROOT_LABEL.to_string(),
      path: None,
    }];

    if let Some(path) = &self.current_path {
      let mut prefix = String::new();
      for segment in path.split('/') {
        if !prefix.is_empty() {
          prefix.push('/');
        }
        prefix.push_str(segment);
        let label = self
          .find(&prefix)
          .map(|f| f.name.clone())
          .unwrap_or_else(|| segment.to_string());
        trail.push(Breadcrumb {
          label,
          path: Some(prefix.clone()),
        });
      }
    }

    trail
  }

  /// Remove an item from whichever folder holds it.
  pub fn apply_deleted(&mut self, key: &str) -> bool {
    let mut removed = false;
    for folder in &mut self.folders {
      let before = folder.items.len();
      folder.items.retain(|item| item.cache_key() != key);
      let gone = (before - folder.items.len()) as u64;
      if gone > 0 {
        folder.item_count = folder.item_count.saturating_sub(gone);
        removed = true;
      }
    }
    self.last_fetched_folders = None;
    removed
  }

  pub fn invalidate(&mut self) {
    self.last_fetched_folders = None;
  }

  pub fn clear(&mut self) {
    let generation = self.generation + 1;
    *self = Self::new();
    self.generation = generation;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, Clone, PartialEq)]
  struct Clip(&'static str);

  impl Cacheable for Clip {
    fn cache_key(&self) -> String {
      self.0.to_string()
    }

    fn entity_type() -> &'static str {
      "clip"
    }
  }

  fn folder(name: &str, path: &str, items: Vec<Clip>) -> Folder<Clip> {
    let item_count = items.len() as u64;
    Folder {
      name: name.to_string(),
      path: path.to_string(),
      items,
      item_count,
    }
  }

  fn loaded() -> FolderCache<Clip> {
    let mut cache = FolderCache::new();
    let generation = cache.begin_fetch();
    cache.fetch_succeeded(
      generation,
      vec![
        folder("Albums", "albums", vec![Clip("a1")]),
        folder("Live", "albums/live", vec![Clip("l1"), Clip("l2")]),
        folder("Studio", "albums/studio", vec![]),
        folder("Podcasts", "podcasts", vec![Clip("p1")]),
      ],
      Utc::now(),
    );
    cache
  }

  #[test]
  fn test_root_children_and_breadcrumbs() {
    let cache = loaded();
    let names: Vec<_> = cache.children().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["Albums", "Podcasts"]);
    assert_eq!(cache.breadcrumbs().len(), 1);
    assert!(cache.selected_items().is_empty());
  }

  #[test]
  fn test_select_nested_folder() {
    let mut cache = loaded();
    assert!(cache.select(Some("albums/live/")));
    assert_eq!(cache.selected_items(), &[Clip("l1"), Clip("l2")]);

    let trail = cache.breadcrumbs();
    let labels: Vec<_> = trail.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels, vec![ROOT_LABEL, "Albums", "Live"]);
    assert_eq!(trail[1].path.as_deref(), Some("albums"));
    assert_eq!(trail[2].path.as_deref(), Some("albums/live"));
  }

  #[test]
  fn test_select_unknown_keeps_selection() {
    let mut cache = loaded();
    cache.select(Some("albums"));
    assert!(!cache.select(Some("missing")));
    assert_eq!(cache.current_path(), Some("albums"));
    let names: Vec<_> = cache.children().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["Live", "Studio"]);
  }

  #[test]
  fn test_navigate_up() {
    let mut cache = loaded();
    cache.select(Some("albums/live"));
    assert!(cache.navigate_up());
    assert_eq!(cache.current_path(), Some("albums"));
    assert!(cache.navigate_up());
    assert_eq!(cache.current_path(), None);
    assert!(!cache.navigate_up());
  }

  #[test]
  fn test_delete_updates_count() {
    let mut cache = loaded();
    assert!(cache.apply_deleted("l1"));
    let live = cache.folders().iter().find(|f| f.path == "albums/live").expect("live folder");
    assert_eq!(live.item_count, 1);
    assert_eq!(live.items, vec![Clip("l2")]);
    assert!(cache.should_fetch(Duration::minutes(5), Utc::now()));
  }

  #[test]
  fn test_refetch_drops_vanished_selection() {
    let mut cache = loaded();
    cache.select(Some("podcasts"));
    let generation = cache.begin_fetch();
    cache.fetch_succeeded(generation, vec![folder("Albums", "albums", vec![])], Utc::now());
    assert_eq!(cache.current_path(), None);
  }

  #[test]
  fn test_freshness() {
    let cache = loaded();
    assert!(!cache.should_fetch(Duration::minutes(5), Utc::now()));
    assert!(FolderCache::<Clip>::new().should_fetch(Duration::minutes(5), Utc::now()));
  }
}

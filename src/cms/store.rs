//! Every cache slice the client reads from, held in one injectable value.

use crate::cache::{CursorSlice, FolderSlice, ListSlice, LoadingPolicy, MutationPolicy, ValueSlice};
use crate::config::CacheConfig;

use super::types::{Audio, Contact, DashboardStats, Image, PageSummary, Playlist, Track};

/// Cache slices for all entities. Clones share state.
#[derive(Clone)]
pub struct Store {
  pub pages: ListSlice<PageSummary>,
  pub tracks: ListSlice<Track>,
  pub playlists: ListSlice<Playlist>,
  pub contacts: ListSlice<Contact>,
  pub images: CursorSlice<Image>,
  pub audios: CursorSlice<Audio>,
  pub audio_folders: FolderSlice<Audio>,
  pub dashboard: ValueSlice<DashboardStats>,
}

impl Store {
  pub fn new(config: &CacheConfig) -> Self {
    let list_ttl = config.list_ttl();
    let media_ttl = config.media_ttl();

    Self {
      // Page list items are a projection of the full page, so mutations
      // refetch rather than splice.
      pages: ListSlice::new(config.page_size)
        .with_cache_duration(list_ttl)
        .with_loading_policy(LoadingPolicy::WhenEmpty)
        .with_mutation_policy(MutationPolicy::Invalidate),
      tracks: ListSlice::new(config.page_size).with_cache_duration(list_ttl),
      playlists: ListSlice::new(config.page_size).with_cache_duration(list_ttl),
      contacts: ListSlice::new(config.page_size).with_cache_duration(list_ttl),
      images: CursorSlice::new(config.media_page_size).with_cache_duration(media_ttl),
      audios: CursorSlice::new(config.media_page_size).with_cache_duration(media_ttl),
      audio_folders: FolderSlice::new().with_cache_duration(media_ttl),
      dashboard: ValueSlice::new().with_cache_duration(config.dashboard_ttl()),
    }
  }

  /// Empty every slice, e.g. on logout or session expiry.
  pub fn clear_all(&self) {
    self.pages.clear();
    self.tracks.clear();
    self.playlists.clear();
    self.contacts.clear();
    self.images.clear();
    self.audios.clear();
    self.audio_folders.clear();
    self.dashboard.clear();
  }
}

impl Default for Store {
  fn default() -> Self {
    Self::new(&CacheConfig::default())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::ListPage;

  fn contact(id: &str) -> Contact {
    Contact {
      id: id.to_string(),
      name: "Ada".to_string(),
      email: "ada@example.com".to_string(),
      subject: None,
      message: String::new(),
      created_at: None,
    }
  }

  #[tokio::test]
  async fn test_clear_all_empties_slices() {
    let store = Store::default();
    store
      .contacts
      .fetch(false, |_| async {
        Ok::<_, String>(ListPage {
          items: vec![contact("c1")],
          total_items: 1,
          total_pages: 1,
        })
      })
      .await
      .unwrap();
    assert_eq!(store.contacts.snapshot().items().len(), 1);

    let shared = store.clone();
    shared.clear_all();
    assert!(store.contacts.snapshot().items().is_empty());
    assert!(store.contacts.needs_fetch());
  }

  #[test]
  fn test_pages_use_invalidate_policy() {
    let store = Store::default();
    assert_eq!(store.pages.mutation_policy(), MutationPolicy::Invalidate);
    assert_eq!(store.tracks.mutation_policy(), MutationPolicy::Splice);
    assert_eq!(store.pages.cache_duration(), chrono::Duration::minutes(2));
  }
}

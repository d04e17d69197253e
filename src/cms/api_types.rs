//! Serde-deserializable types matching backend and media host responses.
//!
//! These wrappers are separate from domain types so the envelopes and
//! pagination shapes stay out of the cache layer.

use serde::Deserialize;

use crate::cache::{CursorPage, Folder, ListPage};

use super::types::{Audio, User};

// ============================================================================
// Backend envelopes
// ============================================================================

/// `{ "data": ... }` wrapper used by every backend endpoint
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
  pub data: T,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApiPagination {
  #[serde(default)]
  pub current_page: u32,
  #[serde(default)]
  pub total_pages: u32,
  #[serde(default)]
  pub total_items: u64,
  #[serde(default)]
  pub items_per_page: u32,
}

/// List payload: `{ items: [...], pagination: {...} }`
#[derive(Debug, Deserialize)]
pub struct ApiListData<T> {
  #[serde(alias = "pages", alias = "tracks", alias = "playlists", alias = "contacts")]
  pub items: Vec<T>,
  pub pagination: Option<ApiPagination>,
}

impl<T> ApiListData<T> {
  /// Convert to a cache page. Only the totals are taken from the server;
  /// `currentPage`/`itemsPerPage` are not trusted to echo the request.
  pub fn into_page(self) -> ListPage<T> {
    let (total_items, total_pages) = match self.pagination {
      Some(p) => (p.total_items, p.total_pages),
      None => (self.items.len() as u64, u32::from(!self.items.is_empty())),
    };
    ListPage {
      items: self.items,
      total_items,
      total_pages,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiLoginData {
  pub token: String,
  pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct ApiVerifyData {
  pub user: User,
}

// ============================================================================
// Media host responses
// ============================================================================

/// `{ images|audios: [...], next_cursor?, has_more }`
#[derive(Debug, Deserialize)]
pub struct ApiMediaList<T> {
  #[serde(alias = "images", alias = "audios", alias = "resources")]
  pub items: Vec<T>,
  #[serde(default)]
  pub next_cursor: Option<String>,
  #[serde(default)]
  pub has_more: bool,
}

impl<T> From<ApiMediaList<T>> for CursorPage<T> {
  fn from(list: ApiMediaList<T>) -> Self {
    // Treat a cursor with has_more=false as exhausted
    let next_cursor = list.next_cursor.filter(|_| list.has_more);
    CursorPage {
      has_more: list.has_more && next_cursor.is_some(),
      items: list.items,
      next_cursor,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiFolder {
  pub name: String,
  pub path: String,
  #[serde(default)]
  pub audios: Vec<Audio>,
  #[serde(rename = "audioCount", default)]
  pub audio_count: Option<u64>,
}

impl From<ApiFolder> for Folder<Audio> {
  fn from(folder: ApiFolder) -> Self {
    let item_count = folder.audio_count.unwrap_or(folder.audios.len() as u64);
    Folder {
      name: folder.name,
      path: folder.path.trim_matches('/').to_string(),
      items: folder.audios,
      item_count,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiFoldersResponse {
  #[serde(default)]
  pub folders: Vec<ApiFolder>,
}

//! Caching implementations for CMS types.

use crate::cache::Cacheable;

use super::types::{Audio, Contact, Image, PageSummary, Playlist, Track};

// ============================================================================
// Cacheable implementations
// ============================================================================

impl Cacheable for PageSummary {
  fn cache_key(&self) -> String {
    self.id.clone()
  }

  fn search_text(&self) -> String {
    format!("{} {}", self.title, self.slug)
  }

  fn entity_type() -> &'static str {
    "page"
  }
}

impl Cacheable for Track {
  fn cache_key(&self) -> String {
    self.id.clone()
  }

  fn search_text(&self) -> String {
    match &self.artist {
      Some(artist) => format!("{} {}", self.title, artist),
      None => self.title.clone(),
    }
  }

  fn entity_type() -> &'static str {
    "track"
  }
}

impl Cacheable for Playlist {
  fn cache_key(&self) -> String {
    self.id.clone()
  }

  fn search_text(&self) -> String {
    self.name.clone()
  }

  fn entity_type() -> &'static str {
    "playlist"
  }
}

impl Cacheable for Contact {
  fn cache_key(&self) -> String {
    self.id.clone()
  }

  fn search_text(&self) -> String {
    format!(
      "{} {} {}",
      self.name,
      self.email,
      self.subject.as_deref().unwrap_or("")
    )
  }

  fn entity_type() -> &'static str {
    "contact"
  }
}

impl Cacheable for Image {
  fn cache_key(&self) -> String {
    self.public_id.clone()
  }

  fn entity_type() -> &'static str {
    "image"
  }
}

impl Cacheable for Audio {
  fn cache_key(&self) -> String {
    self.public_id.clone()
  }

  fn entity_type() -> &'static str {
    "audio"
  }
}

// ============================================================================
// Server-side filter names
// ============================================================================

/// Filter query parameters understood by the backend, per resource.
pub mod filters {
  pub const CATEGORY: &str = "category";
  pub const AUTHOR: &str = "author";
  pub const TAG: &str = "tag";
  pub const STATUS: &str = "status";
  pub const GROUP: &str = "group";
  pub const CREATOR: &str = "creator";
  /// "public" or "private"
  pub const VISIBILITY: &str = "visibility";

  pub const PAGES: &[&str] = &[CATEGORY, AUTHOR, TAG, STATUS];
  pub const TRACKS: &[&str] = &[GROUP, VISIBILITY];
  pub const PLAYLISTS: &[&str] = &[CREATOR, VISIBILITY];
  pub const CONTACTS: &[&str] = &[];
}

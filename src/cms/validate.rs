//! Client-side validation of mutation payloads, run before any request.

use std::fmt;

use super::types::{PageInput, PlaylistInput, TrackInput};

const MAX_TITLE_LEN: usize = 200;
const MAX_EXCERPT_LEN: usize = 500;
const MAX_META_DESCRIPTION_LEN: usize = 160;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
  pub field: &'static str,
  pub message: String,
}

/// Per-field validation failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
  errors: Vec<FieldError>,
}

impl ValidationErrors {
  pub fn errors(&self) -> &[FieldError] {
    &self.errors
  }

  pub fn is_empty(&self) -> bool {
    self.errors.is_empty()
  }

  /// First message recorded for a field.
  pub fn for_field(&self, field: &str) -> Option<&str> {
    self
      .errors
      .iter()
      .find(|e| e.field == field)
      .map(|e| e.message.as_str())
  }

  fn add(&mut self, field: &'static str, message: impl Into<String>) {
    self.errors.push(FieldError {
      field,
      message: message.into(),
    });
  }

  fn require(&mut self, field: &'static str, value: &str) -> bool {
    if value.trim().is_empty() {
      self.add(field, "is required");
      false
    } else {
      true
    }
  }

  fn max_len(&mut self, field: &'static str, value: &str, max: usize) {
    if value.chars().count() > max {
      self.add(field, format!("must be at most {} characters", max));
    }
  }

  fn url(&mut self, field: &'static str, value: &str) {
    match url::Url::parse(value) {
      Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
      _ => self.add(field, "must be an http(s) URL"),
    }
  }

  fn into_result(self) -> Result<(), ValidationErrors> {
    if self.errors.is_empty() {
      Ok(())
    } else {
      Err(self)
    }
  }
}

impl fmt::Display for ValidationErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let parts: Vec<String> = self
      .errors
      .iter()
      .map(|e| format!("{} {}", e.field, e.message))
      .collect();
    write!(f, "{}", parts.join("; "))
  }
}

pub trait Validate {
  fn validate(&self) -> Result<(), ValidationErrors>;
}

/// Slugs are lowercase ASCII words joined by single hyphens.
pub fn is_valid_slug(slug: &str) -> bool {
  !slug.is_empty()
    && slug.split('-').all(|word| {
      !word.is_empty()
        && word
          .chars()
          .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    })
}

/// Derive a slug from a title.
pub fn slugify(title: &str) -> String {
  title
    .to_lowercase()
    .split(|c: char| !c.is_ascii_alphanumeric())
    .filter(|word| !word.is_empty())
    .collect::<Vec<_>>()
    .join("-")
}

impl Validate for PageInput {
  fn validate(&self) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    if errors.require("title", &self.title) {
      errors.max_len("title", &self.title, MAX_TITLE_LEN);
    }
    if errors.require("slug", &self.slug) && !is_valid_slug(&self.slug) {
      errors.add("slug", "may only contain lowercase letters, digits and hyphens");
    }
    errors.require("content", &self.content);
    if let Some(excerpt) = &self.excerpt {
      errors.max_len("excerpt", excerpt, MAX_EXCERPT_LEN);
    }
    if let Some(meta) = &self.meta_description {
      errors.max_len("metaDescription", meta, MAX_META_DESCRIPTION_LEN);
    }
    if let Some(status) = &self.status {
      if status != "draft" && status != "published" {
        errors.add("status", "must be draft or published");
      }
    }
    if let Some(image) = &self.featured_image {
      errors.url("featuredImage", image);
    }

    errors.into_result()
  }
}

impl Validate for TrackInput {
  fn validate(&self) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    if errors.require("title", &self.title) {
      errors.max_len("title", &self.title, MAX_TITLE_LEN);
    }
    if errors.require("audioUrl", &self.audio_url) {
      errors.url("audioUrl", &self.audio_url);
    }
    if let Some(cover) = &self.cover_image {
      errors.url("coverImage", cover);
    }
    if let Some(duration) = self.duration {
      if !duration.is_finite() || duration < 0.0 {
        errors.add("duration", "must be a positive number of seconds");
      }
    }

    errors.into_result()
  }
}

impl Validate for PlaylistInput {
  fn validate(&self) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    if errors.require("name", &self.name) {
      errors.max_len("name", &self.name, MAX_TITLE_LEN);
    }
    if self.tracks.iter().any(|id| id.trim().is_empty()) {
      errors.add("tracks", "contains an empty track id");
    }
    if let Some(cover) = &self.cover_image {
      errors.url("coverImage", cover);
    }

    errors.into_result()
  }
}

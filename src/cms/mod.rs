//! CMS backend and media host integration.
//!
//! - `client` / `media`: plain HTTP clients sharing one bearer token
//! - `cached_client`: cache-first façade over both, driving the slice store
//! - `store`: the injectable set of cache slices
//! - `generate`: optional AI content generation for page bodies

mod api_types;
mod cache;
mod cached_client;
mod client;
mod error;
mod generate;
mod media;
mod store;
mod types;
mod validate;

pub use cache::filters;
pub use cached_client::CachedCmsClient;
pub use client::{BearerToken, CmsClient, Resource};
pub use error::ApiError;
pub use generate::{build_prompt, strip_code_fences, ContentGenerator};
pub use media::{MediaClient, MediaKind};
pub use store::Store;
pub use types::{
  Audio, Contact, DashboardStats, Image, Page, PageInput, PageSummary, Playlist, PlaylistInput,
  Track, TrackInput, User,
};
pub use validate::{is_valid_slug, slugify, FieldError, Validate, ValidationErrors};

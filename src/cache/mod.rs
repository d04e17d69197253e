//! Client-side caching layer for list synchronization.
//!
//! This module is backend-agnostic and provides:
//! - A pure staleness policy over "last fetched" time and query parameters
//! - Page-numbered list caches with optimistic mutation reducers
//! - Cursor-paged caches with append-on-load-more
//! - A folder cache with breadcrumb navigation over embedded items
//! - Async slices that tag every request with a generation so late
//!   responses never overwrite newer data

mod cursor;
mod folders;
mod layer;
mod list;
mod staleness;
mod traits;
mod value;

pub use cursor::{CursorCache, CursorPage, CursorParams};
pub use folders::{Breadcrumb, Folder, FolderCache, ROOT_LABEL};
pub use layer::{CursorSlice, FolderSlice, ListSlice, ValueSlice};
pub use list::{DeleteOutcome, ListCache, ListPage, Pagination};
pub use staleness::{
  should_fetch, FetchParams, DASHBOARD_CACHE_DURATION, LIST_CACHE_DURATION,
  MEDIA_CACHE_DURATION,
};
pub use traits::{CacheResult, CacheSource, Cacheable, LoadingPolicy, MutationPolicy, GENERIC_ERROR};

//! Client-side data caching and list synchronization for a CMS admin backend.

pub mod auth;
pub mod cache;
pub mod cms;
pub mod config;
pub mod debounce;
pub mod logging;

//! Session bootstrap and durable token storage.

mod session;
mod token_store;

pub use session::{
  backoff_delay, bootstrap, is_token_expired, reverify, token_expiry, RetryPolicy, Session,
  SessionState, SessionStatus,
};
pub use token_store::{MemoryTokenStore, SqliteTokenStore, TokenStore, TOKEN_KEY};

//! Session state machine and startup verification of a stored token.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use color_eyre::Result;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cms::{ApiError, User};
use crate::config::AuthConfig;

use super::token_store::TokenStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
  /// Not yet bootstrapped
  #[default]
  Unknown,
  Unauthenticated,
  Verifying,
  Authenticated,
  /// Verification failed on the network; the token is trusted while retrying
  Optimistic { attempt: u32 },
  /// Retries exhausted. The token is kept and re-verified on the next action.
  Degraded,
}

impl SessionStatus {
  pub fn is_authenticated(&self) -> bool {
    matches!(
      self,
      SessionStatus::Authenticated | SessionStatus::Optimistic { .. } | SessionStatus::Degraded
    )
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
  pub status: SessionStatus,
  pub user: Option<User>,
  pub loading: bool,
}

/// Shared session handle. Clones see the same state.
#[derive(Debug, Clone, Default)]
pub struct Session(Arc<RwLock<SessionState>>);

impl Session {
  pub fn snapshot(&self) -> SessionState {
    self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
  }

  pub fn status(&self) -> SessionStatus {
    self.0.read().unwrap_or_else(PoisonError::into_inner).status
  }

  pub fn user(&self) -> Option<User> {
    self.0.read().unwrap_or_else(PoisonError::into_inner).user.clone()
  }

  pub fn is_authenticated(&self) -> bool {
    self.status().is_authenticated()
  }

  fn update(&self, f: impl FnOnce(&mut SessionState)) {
    let mut state = self.0.write().unwrap_or_else(PoisonError::into_inner);
    let before = state.status;
    f(&mut state);
    if state.status != before {
      info!(from = ?before, to = ?state.status, "session transition");
    }
  }

  pub fn set_verifying(&self) {
    self.update(|s| {
      s.status = SessionStatus::Verifying;
      s.loading = true;
    });
  }

  pub fn set_authenticated(&self, user: User) {
    self.update(|s| {
      s.status = SessionStatus::Authenticated;
      s.user = Some(user);
      s.loading = false;
    });
  }

  /// Network failure during verification; keep the token while retrying.
  pub fn set_optimistic(&self, attempt: u32) {
    self.update(|s| {
      s.status = SessionStatus::Optimistic { attempt };
      s.loading = false;
    });
  }

  pub fn set_degraded(&self) {
    self.update(|s| {
      s.status = SessionStatus::Degraded;
      s.loading = false;
    });
  }

  pub fn set_unauthenticated(&self) {
    self.update(|s| {
      s.status = SessionStatus::Unauthenticated;
      s.user = None;
      s.loading = false;
    });
  }
}

/// Delay before retry `attempt` (zero-based): `2^attempt * base`.
pub fn backoff_delay(attempt: u32, base: Duration) -> Duration {
  base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Expiry from the `exp` claim if the token is a JWT. Opaque tokens yield `None`.
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
  let mut parts = token.split('.');
  let (_, payload, _) = (parts.next()?, parts.next()?, parts.next()?);
  if parts.next().is_some() {
    return None;
  }

  let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
  let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
  let exp = claims.get("exp")?.as_f64()?;
  DateTime::from_timestamp(exp as i64, 0)
}

pub fn is_token_expired(token: &str, now: DateTime<Utc>) -> bool {
  token_expiry(token).is_some_and(|exp| exp <= now)
}

/// Retry settings for startup verification.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
  pub max_retries: u32,
  pub backoff_base: Duration,
}

impl From<&AuthConfig> for RetryPolicy {
  fn from(config: &AuthConfig) -> Self {
    Self {
      max_retries: config.max_retries,
      backoff_base: Duration::from_millis(config.backoff_base_ms),
    }
  }
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self::from(&AuthConfig::default())
  }
}

/// Restore a session from the stored token.
///
/// 1. No token: unauthenticated
/// 2. Expired JWT: discard the token, unauthenticated
/// 3. Verify with the server. 401 discards the token. Other failures move to
///    the optimistic state and retry with exponential backoff, ending in
///    `Degraded` when retries run out.
///
/// Returns the token when the session ends up authenticated in any form.
pub async fn bootstrap<F, Fut>(
  session: &Session,
  store: &dyn TokenStore,
  policy: RetryPolicy,
  now: DateTime<Utc>,
  mut verify: F,
) -> Result<Option<String>>
where
  F: FnMut(String) -> Fut,
  Fut: Future<Output = Result<User, ApiError>>,
{
  let Some(token) = store.load()? else {
    debug!("no stored token");
    session.set_unauthenticated();
    return Ok(None);
  };

  if is_token_expired(&token, now) {
    info!("stored token expired, discarding");
    store.clear()?;
    session.set_unauthenticated();
    return Ok(None);
  }

  session.set_verifying();
  let mut attempt = 0;
  loop {
    match verify(token.clone()).await {
      Ok(user) => {
        session.set_authenticated(user);
        return Ok(Some(token));
      }
      Err(ApiError::Unauthorized) => {
        info!("stored token rejected, discarding");
        store.clear()?;
        session.set_unauthenticated();
        return Ok(None);
      }
      Err(e) if attempt < policy.max_retries => {
        warn!(error = %e, attempt, "token verification failed, retrying");
        session.set_optimistic(attempt + 1);
        tokio::time::sleep(backoff_delay(attempt, policy.backoff_base)).await;
        attempt += 1;
      }
      Err(e) => {
        warn!(error = %e, "token verification failed, continuing degraded");
        session.set_degraded();
        return Ok(Some(token));
      }
    }
  }
}

/// Single verification attempt for a degraded session. Returns whether the
/// session is still authenticated.
pub async fn reverify<F, Fut>(session: &Session, store: &dyn TokenStore, verify: F) -> Result<bool>
where
  F: FnOnce(String) -> Fut,
  Fut: Future<Output = Result<User, ApiError>>,
{
  let Some(token) = store.load()? else {
    session.set_unauthenticated();
    return Ok(false);
  };

  match verify(token).await {
    Ok(user) => {
      session.set_authenticated(user);
      Ok(true)
    }
    Err(ApiError::Unauthorized) => {
      store.clear()?;
      session.set_unauthenticated();
      Ok(false)
    }
    Err(e) => {
      debug!(error = %e, "re-verification failed, staying degraded");
      Ok(true)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::auth::MemoryTokenStore;
  use std::sync::atomic::{AtomicU32, Ordering};

  fn user() -> User {
    User {
      id: "u1".to_string(),
      username: "ada".to_string(),
      email: "ada@example.com".to_string(),
      role: "admin".to_string(),
    }
  }

  fn jwt(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"u1","exp":{}}}"#, exp));
    format!("{}.{}.sig", header, payload)
  }

  fn fast_policy() -> RetryPolicy {
    RetryPolicy {
      max_retries: 2,
      backoff_base: Duration::from_millis(1),
    }
  }

  #[test]
  fn test_backoff_delay() {
    let base = Duration::from_secs(1);
    assert_eq!(backoff_delay(0, base), Duration::from_secs(1));
    assert_eq!(backoff_delay(1, base), Duration::from_secs(2));
    assert_eq!(backoff_delay(2, base), Duration::from_secs(4));
  }

  #[test]
  fn test_token_expiry() {
    let now = Utc::now();
    assert!(is_token_expired(&jwt(now.timestamp() - 10), now));
    assert!(!is_token_expired(&jwt(now.timestamp() + 3600), now));
    assert!(!is_token_expired("opaque-token", now));
    assert_eq!(token_expiry("a.!!!.c"), None);
  }

  #[tokio::test]
  async fn test_no_token_is_unauthenticated() {
    let session = Session::default();
    let store = MemoryTokenStore::default();
    let calls = AtomicU32::new(0);
    let token = bootstrap(&session, &store, fast_policy(), Utc::now(), |_| {
      calls.fetch_add(1, Ordering::SeqCst);
      async { Ok(user()) }
    })
    .await
    .unwrap();
    assert!(token.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(session.status(), SessionStatus::Unauthenticated);
  }

  #[tokio::test]
  async fn test_expired_token_discarded_without_verifying() {
    let now = Utc::now();
    let session = Session::default();
    let store = MemoryTokenStore::with_token(&jwt(now.timestamp() - 1));
    let calls = AtomicU32::new(0);
    bootstrap(&session, &store, fast_policy(), now, |_| {
      calls.fetch_add(1, Ordering::SeqCst);
      async { Ok(user()) }
    })
    .await
    .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(session.status(), SessionStatus::Unauthenticated);
    assert_eq!(store.load().unwrap(), None);
  }

  #[tokio::test]
  async fn test_verified_token_authenticates() {
    let session = Session::default();
    let store = MemoryTokenStore::with_token("opaque");
    let token = bootstrap(&session, &store, fast_policy(), Utc::now(), |t| async move {
      assert_eq!(t, "opaque");
      Ok(user())
    })
    .await
    .unwrap();
    assert_eq!(token.as_deref(), Some("opaque"));
    let state = session.snapshot();
    assert_eq!(state.status, SessionStatus::Authenticated);
    assert_eq!(state.user.unwrap().username, "ada");
    assert!(!state.loading);
  }

  #[tokio::test]
  async fn test_rejected_token_discarded() {
    let session = Session::default();
    let store = MemoryTokenStore::with_token("opaque");
    let calls = AtomicU32::new(0);
    let token = bootstrap(&session, &store, fast_policy(), Utc::now(), |_| {
      calls.fetch_add(1, Ordering::SeqCst);
      async { Err(ApiError::Unauthorized) }
    })
    .await
    .unwrap();
    assert_eq!(token, None);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.status(), SessionStatus::Unauthenticated);
    assert_eq!(store.load().unwrap(), None);
  }

  #[tokio::test]
  async fn test_network_failures_end_degraded_with_token_kept() {
    let session = Session::default();
    let store = MemoryTokenStore::with_token("opaque");
    let calls = AtomicU32::new(0);
    let token = bootstrap(&session, &store, fast_policy(), Utc::now(), |_| {
      calls.fetch_add(1, Ordering::SeqCst);
      async { Err(ApiError::Timeout) }
    })
    .await
    .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(session.status(), SessionStatus::Degraded);
    assert!(session.is_authenticated());
    assert_eq!(token.as_deref(), Some("opaque"));
    assert_eq!(store.load().unwrap().as_deref(), Some("opaque"));
  }

  #[tokio::test]
  async fn test_retry_recovers() {
    let session = Session::default();
    let store = MemoryTokenStore::with_token("opaque");
    let calls = AtomicU32::new(0);
    bootstrap(&session, &store, fast_policy(), Utc::now(), |_| {
      let n = calls.fetch_add(1, Ordering::SeqCst);
      async move {
        if n == 0 {
          Err(ApiError::Network("connection refused".into()))
        } else {
          Ok(user())
        }
      }
    })
    .await
    .unwrap();
    assert_eq!(session.status(), SessionStatus::Authenticated);
  }

  #[tokio::test]
  async fn test_reverify_from_degraded() {
    let session = Session::default();
    session.set_degraded();
    let store = MemoryTokenStore::with_token("opaque");

    assert!(reverify(&session, &store, |_| async { Err(ApiError::Timeout) }).await.unwrap());
    assert_eq!(session.status(), SessionStatus::Degraded);

    assert!(reverify(&session, &store, |_| async { Ok(user()) }).await.unwrap());
    assert_eq!(session.status(), SessionStatus::Authenticated);

    session.set_degraded();
    assert!(!reverify(&session, &store, |_| async { Err(ApiError::Unauthorized) }).await.unwrap());
    assert_eq!(session.status(), SessionStatus::Unauthenticated);
    assert_eq!(store.load().unwrap(), None);
  }
}

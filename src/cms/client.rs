use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::cache::{FetchParams, ListPage};
use crate::config::ApiConfig;

use super::api_types::{ApiEnvelope, ApiListData, ApiLoginData, ApiVerifyData};
use super::error::ApiError;
use super::types::User;

/// Backend resources with list/get/create/update/delete endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
  Pages,
  Tracks,
  Playlists,
  Contacts,
}

impl Resource {
  pub fn path(&self) -> &'static str {
    match self {
      Resource::Pages => "pages",
      Resource::Tracks => "tracks",
      Resource::Playlists => "playlists",
      Resource::Contacts => "contacts",
    }
  }
}

/// In-memory bearer token shared by the backend and media clients.
#[derive(Debug, Clone, Default)]
pub struct BearerToken(Arc<RwLock<Option<String>>>);

impl BearerToken {
  pub fn get(&self) -> Option<String> {
    self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
  }

  pub fn set(&self, token: impl Into<String>) {
    *self.0.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
  }

  pub fn clear(&self) {
    *self.0.write().unwrap_or_else(PoisonError::into_inner) = None;
  }

  pub(crate) fn attach(&self, request: RequestBuilder) -> RequestBuilder {
    match self.get() {
      Some(token) => request.bearer_auth(token),
      None => request,
    }
  }
}

/// Build `base/segment/segment`, percent-encoding each segment.
pub(crate) fn join_url(base: &Url, segments: &[&str]) -> Result<Url, ApiError> {
  let mut url = base.clone();
  url
    .path_segments_mut()
    .map_err(|_| ApiError::Config(format!("{} cannot be used as a base URL", base)))?
    .pop_if_empty()
    .extend(segments);
  Ok(url)
}

/// Check the status and decode a JSON body.
pub(crate) async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
  let status = response.status();
  let path = response.url().path().to_string();
  if status.is_success() {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
  } else {
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::from_status(status, &path, &body))
  }
}

/// Check the status and discard the body.
pub(crate) async fn check_response(response: Response) -> Result<(), ApiError> {
  let status = response.status();
  if status.is_success() {
    return Ok(());
  }
  let path = response.url().path().to_string();
  let body = response.text().await.unwrap_or_default();
  Err(ApiError::from_status(status, &path, &body))
}

/// Backend REST API client
#[derive(Clone)]
pub struct CmsClient {
  client: reqwest::Client,
  base_url: Url,
  verify_timeout: Duration,
  token: BearerToken,
}

impl CmsClient {
  pub fn new(config: &ApiConfig, token: BearerToken) -> Result<Self, ApiError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    let base_url =
      Url::parse(&config.url).map_err(|e| ApiError::Config(format!("api.url: {}", e)))?;

    Ok(Self {
      client,
      base_url,
      verify_timeout: Duration::from_secs(config.verify_timeout_secs),
      token,
    })
  }

  /// Client with default timeouts against an explicit base URL.
  pub fn with_base_url(base_url: &str, token: BearerToken) -> Result<Self, ApiError> {
    Self::new(
      &ApiConfig {
        url: base_url.to_string(),
        timeout_secs: 10,
        verify_timeout_secs: 5,
      },
      token,
    )
  }

  pub fn token(&self) -> &BearerToken {
    &self.token
  }

  fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
    let url = join_url(&self.base_url, segments)?;
    debug!(%method, %url, "backend request");
    Ok(self.token.attach(self.client.request(method, url)))
  }

  async fn send_data<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
    let response = request.send().await?;
    let envelope: ApiEnvelope<T> = parse_response(response).await?;
    Ok(envelope.data)
  }

  // --------------------------------------------------------------------------
  // Auth
  // --------------------------------------------------------------------------

  /// Exchange credentials for a bearer token.
  pub async fn login(&self, username: &str, password: &str) -> Result<(String, User), ApiError> {
    let body = serde_json::json!({ "username": username, "password": password });
    let request = self.client.post(join_url(&self.base_url, &["auth", "login"])?).json(&body);
    let data: ApiLoginData = self.send_data(request).await?;
    Ok((data.token, data.user))
  }

  /// Check a token against the backend. Uses the shorter verification timeout
  /// and the given token rather than the shared one.
  pub async fn verify(&self, token: &str) -> Result<User, ApiError> {
    let request = self
      .client
      .get(join_url(&self.base_url, &["auth", "verify"])?)
      .bearer_auth(token)
      .timeout(self.verify_timeout);
    let data: ApiVerifyData = self.send_data(request).await?;
    Ok(data.user)
  }

  // --------------------------------------------------------------------------
  // Resources
  // --------------------------------------------------------------------------

  /// List one page of a resource with search and filters.
  pub async fn list<T: DeserializeOwned>(
    &self,
    resource: Resource,
    params: &FetchParams,
  ) -> Result<ListPage<T>, ApiError> {
    let request = self
      .request(Method::GET, &[resource.path()])?
      .query(&params.query_pairs());
    let data: ApiListData<T> = self.send_data(request).await?;
    Ok(data.into_page())
  }

  pub async fn get<T: DeserializeOwned>(&self, resource: Resource, id: &str) -> Result<T, ApiError> {
    let request = self.request(Method::GET, &[resource.path(), id])?;
    self.send_data(request).await
  }

  pub async fn get_page_by_slug<T: DeserializeOwned>(&self, slug: &str) -> Result<T, ApiError> {
    let request = self.request(Method::GET, &[Resource::Pages.path(), "slug", slug])?;
    self.send_data(request).await
  }

  pub async fn create<T, B>(&self, resource: Resource, body: &B) -> Result<T, ApiError>
  where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    let request = self.request(Method::POST, &[resource.path()])?.json(body);
    self.send_data(request).await
  }

  pub async fn update<T, B>(&self, resource: Resource, id: &str, body: &B) -> Result<T, ApiError>
  where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    let request = self.request(Method::PUT, &[resource.path(), id])?.json(body);
    self.send_data(request).await
  }

  pub async fn delete(&self, resource: Resource, id: &str) -> Result<(), ApiError> {
    let response = self.request(Method::DELETE, &[resource.path(), id])?.send().await?;
    check_response(response).await
  }
}

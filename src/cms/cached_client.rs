//! Cached CMS client that wraps the backend and media clients with the
//! slice store.

use chrono::Utc;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::auth::{self, RetryPolicy, Session, SessionStatus, TokenStore};
use crate::cache::{CacheResult, Cacheable, FetchParams, Folder, ListSlice};
use crate::config::Config;

use super::client::{BearerToken, CmsClient, Resource};
use super::error::ApiError;
use super::media::{MediaClient, MediaKind};
use super::store::Store;
use super::types::{
  Audio, Contact, DashboardStats, Image, Page, PageInput, PageSummary, Playlist, PlaylistInput,
  Track, TrackInput, User,
};
use super::validate::Validate;

/// Items fetched for each recent-activity list on the dashboard
const DASHBOARD_RECENT: u32 = 5;

/// CMS client with cache-first reads and slice-aware mutations.
///
/// Reads go through the store's slices and only hit the network when the
/// staleness policy asks for it. Mutations call the backend, then splice or
/// invalidate the affected slices. A 401 from any call other than token
/// verification ends the session and empties every slice.
#[derive(Clone)]
pub struct CachedCmsClient {
  api: CmsClient,
  media: MediaClient,
  bearer: BearerToken,
  store: Store,
  session: Session,
  tokens: Arc<dyn TokenStore>,
  retry: RetryPolicy,
}

impl CachedCmsClient {
  /// Create a client from configuration with an injected store.
  pub fn new(config: &Config, store: Store, tokens: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
    let bearer = BearerToken::default();
    let api = CmsClient::new(&config.api, bearer.clone())?;
    let media = MediaClient::new(&config.media, bearer)?;
    Ok(Self::from_parts(
      api,
      media,
      store,
      tokens,
      RetryPolicy::from(&config.auth),
    ))
  }

  /// Assemble from prebuilt clients. Both clients must share one bearer token.
  pub fn from_parts(
    api: CmsClient,
    media: MediaClient,
    store: Store,
    tokens: Arc<dyn TokenStore>,
    retry: RetryPolicy,
  ) -> Self {
    Self {
      bearer: api.token().clone(),
      api,
      media,
      store,
      session: Session::default(),
      tokens,
      retry,
    }
  }

  pub fn store(&self) -> &Store {
    &self.store
  }

  pub fn session(&self) -> &Session {
    &self.session
  }

  // --------------------------------------------------------------------------
  // Session
  // --------------------------------------------------------------------------

  /// Restore the session from the stored token.
  pub async fn bootstrap(&self) -> color_eyre::Result<SessionStatus> {
    let api = self.api.clone();
    let token = auth::bootstrap(
      &self.session,
      self.tokens.as_ref(),
      self.retry,
      Utc::now(),
      |token| {
        let api = api.clone();
        async move { api.verify(&token).await }
      },
    )
    .await?;

    match token {
      Some(token) => self.bearer.set(token),
      None => self.bearer.clear(),
    }
    Ok(self.session.status())
  }

  pub async fn login(&self, username: &str, password: &str) -> Result<User, ApiError> {
    let (token, user) = match self.api.login(username, password).await {
      Ok(ok) => ok,
      Err(ApiError::Unauthorized) => {
        return Err(ApiError::Status {
          status: 401,
          message: "Invalid username or password".to_string(),
        })
      }
      Err(e) => return Err(e),
    };

    if let Err(e) = self.tokens.save(&token) {
      warn!(error = %e, "failed to persist token");
    }
    self.bearer.set(token);
    self.store.clear_all();
    self.session.set_authenticated(user.clone());
    info!(username = %user.username, "logged in");
    Ok(user)
  }

  pub fn logout(&self) {
    self.end_session();
    info!("logged out");
  }

  fn end_session(&self) {
    if let Err(e) = self.tokens.clear() {
      warn!(error = %e, "failed to clear stored token");
    }
    self.bearer.clear();
    self.session.set_unauthenticated();
    self.store.clear_all();
  }

  /// A degraded session gets one verification attempt per user action.
  /// A rejected token ends the session and the action is not sent.
  async fn ensure_session(&self) -> Result<(), ApiError> {
    if self.session.status() != SessionStatus::Degraded {
      return Ok(());
    }

    let api = self.api.clone();
    let result = auth::reverify(&self.session, self.tokens.as_ref(), |token| async move {
      api.verify(&token).await
    })
    .await;

    match result {
      Ok(true) => Ok(()),
      Ok(false) => {
        self.bearer.clear();
        self.store.clear_all();
        Err(ApiError::Unauthorized)
      }
      Err(e) => {
        warn!(error = %e, "failed to re-verify session");
        Ok(())
      }
    }
  }

  /// Log a failure at the right level and end the session on 401.
  fn guard<T>(&self, result: Result<T, ApiError>) -> Result<T, ApiError> {
    match &result {
      Err(ApiError::Unauthorized) => {
        warn!("session expired");
        self.end_session();
      }
      Err(e) if !e.is_reportable() => debug!(error = %e, "not found"),
      Err(e) => warn!(error = %e, "request failed"),
      Ok(_) => {}
    }
    result
  }

  // --------------------------------------------------------------------------
  // Page-numbered lists
  // --------------------------------------------------------------------------

  async fn fetch_list<T>(
    &self,
    slice: &ListSlice<T>,
    resource: Resource,
    force: bool,
  ) -> Result<CacheResult<Vec<T>>, ApiError>
  where
    T: Cacheable + DeserializeOwned,
  {
    self.ensure_session().await?;
    let api = self.api.clone();
    let result = slice
      .fetch(force, |params| async move { api.list::<T>(resource, &params).await })
      .await;
    self.guard(result)
  }

  async fn get_one<T: DeserializeOwned>(&self, resource: Resource, id: &str) -> Result<T, ApiError> {
    self.ensure_session().await?;
    let result = self.api.get(resource, id).await;
    self.guard(result)
  }

  async fn create_in<T, R, B>(
    &self,
    slice: &ListSlice<R>,
    resource: Resource,
    input: &B,
    to_item: impl FnOnce(&T) -> R,
  ) -> Result<T, ApiError>
  where
    T: DeserializeOwned,
    R: Cacheable,
    B: Validate + serde::Serialize,
  {
    input.validate()?;
    self.ensure_session().await?;
    let created: T = self.guard(self.api.create(resource, input).await)?;
    slice.apply_created(to_item(&created));
    self.store.dashboard.invalidate();
    info!(resource = resource.path(), "created");
    Ok(created)
  }

  async fn update_in<T, R, B>(
    &self,
    slice: &ListSlice<R>,
    resource: Resource,
    id: &str,
    input: &B,
    to_item: impl FnOnce(&T) -> R,
  ) -> Result<T, ApiError>
  where
    T: DeserializeOwned,
    R: Cacheable,
    B: Validate + serde::Serialize,
  {
    input.validate()?;
    self.ensure_session().await?;
    let updated: T = self.guard(self.api.update(resource, id, input).await)?;
    slice.apply_updated(to_item(&updated));
    self.store.dashboard.invalidate();
    info!(resource = resource.path(), id, "updated");
    Ok(updated)
  }

  async fn delete_in<T>(&self, slice: &ListSlice<T>, resource: Resource, id: &str) -> Result<(), ApiError>
  where
    T: Cacheable + DeserializeOwned,
  {
    self.ensure_session().await?;
    self.guard(self.api.delete(resource, id).await)?;
    let outcome = slice.apply_deleted(id);
    self.store.dashboard.invalidate();
    info!(resource = resource.path(), id, "deleted");

    if outcome.refetch {
      debug!(resource = resource.path(), "page emptied, refetching previous page");
      if let Err(e) = self.fetch_list(slice, resource, true).await {
        debug!(error = %e, "refetch after page underflow failed");
      }
    }
    Ok(())
  }

  pub async fn pages(&self, force: bool) -> Result<CacheResult<Vec<PageSummary>>, ApiError> {
    self.fetch_list(&self.store.pages, Resource::Pages, force).await
  }

  pub async fn get_page(&self, id: &str) -> Result<Page, ApiError> {
    self.get_one(Resource::Pages, id).await
  }

  pub async fn get_page_by_slug(&self, slug: &str) -> Result<Page, ApiError> {
    self.ensure_session().await?;
    let result = self.api.get_page_by_slug(slug).await;
    self.guard(result)
  }

  pub async fn create_page(&self, input: &PageInput) -> Result<Page, ApiError> {
    self
      .create_in(&self.store.pages, Resource::Pages, input, |page: &Page| {
        PageSummary::from(page)
      })
      .await
  }

  pub async fn update_page(&self, id: &str, input: &PageInput) -> Result<Page, ApiError> {
    self
      .update_in(&self.store.pages, Resource::Pages, id, input, |page: &Page| {
        PageSummary::from(page)
      })
      .await
  }

  pub async fn delete_page(&self, id: &str) -> Result<(), ApiError> {
    self.delete_in(&self.store.pages, Resource::Pages, id).await
  }

  pub async fn tracks(&self, force: bool) -> Result<CacheResult<Vec<Track>>, ApiError> {
    self.fetch_list(&self.store.tracks, Resource::Tracks, force).await
  }

  pub async fn get_track(&self, id: &str) -> Result<Track, ApiError> {
    self.get_one(Resource::Tracks, id).await
  }

  pub async fn create_track(&self, input: &TrackInput) -> Result<Track, ApiError> {
    self
      .create_in(&self.store.tracks, Resource::Tracks, input, Track::clone)
      .await
  }

  pub async fn update_track(&self, id: &str, input: &TrackInput) -> Result<Track, ApiError> {
    self
      .update_in(&self.store.tracks, Resource::Tracks, id, input, Track::clone)
      .await
  }

  pub async fn delete_track(&self, id: &str) -> Result<(), ApiError> {
    self.delete_in(&self.store.tracks, Resource::Tracks, id).await
  }

  pub async fn playlists(&self, force: bool) -> Result<CacheResult<Vec<Playlist>>, ApiError> {
    self
      .fetch_list(&self.store.playlists, Resource::Playlists, force)
      .await
  }

  pub async fn get_playlist(&self, id: &str) -> Result<Playlist, ApiError> {
    self.get_one(Resource::Playlists, id).await
  }

  pub async fn create_playlist(&self, input: &PlaylistInput) -> Result<Playlist, ApiError> {
    self
      .create_in(&self.store.playlists, Resource::Playlists, input, Playlist::clone)
      .await
  }

  pub async fn update_playlist(&self, id: &str, input: &PlaylistInput) -> Result<Playlist, ApiError> {
    self
      .update_in(&self.store.playlists, Resource::Playlists, id, input, Playlist::clone)
      .await
  }

  pub async fn delete_playlist(&self, id: &str) -> Result<(), ApiError> {
    self
      .delete_in(&self.store.playlists, Resource::Playlists, id)
      .await
  }

  pub async fn contacts(&self, force: bool) -> Result<CacheResult<Vec<Contact>>, ApiError> {
    self
      .fetch_list(&self.store.contacts, Resource::Contacts, force)
      .await
  }

  pub async fn get_contact(&self, id: &str) -> Result<Contact, ApiError> {
    self.get_one(Resource::Contacts, id).await
  }

  pub async fn delete_contact(&self, id: &str) -> Result<(), ApiError> {
    self
      .delete_in(&self.store.contacts, Resource::Contacts, id)
      .await
  }

  // --------------------------------------------------------------------------
  // Media
  // --------------------------------------------------------------------------

  pub async fn images(&self, force: bool) -> Result<CacheResult<Vec<Image>>, ApiError> {
    self.ensure_session().await?;
    let media = self.media.clone();
    let result = self
      .store
      .images
      .fetch(force, |params| async move {
        media.list(MediaKind::Image, &params, None).await
      })
      .await;
    self.guard(result)
  }

  /// Append the next batch of images. `None` when there is nothing to load.
  pub async fn load_more_images(&self) -> Result<Option<CacheResult<Vec<Image>>>, ApiError> {
    self.ensure_session().await?;
    let media = self.media.clone();
    let result = self
      .store
      .images
      .load_more(|params, cursor| async move {
        media.list(MediaKind::Image, &params, Some(&cursor)).await
      })
      .await;
    self.guard(result)
  }

  pub async fn upload_image(&self, path: &Path, folder: Option<&str>) -> Result<Image, ApiError> {
    self.ensure_session().await?;
    let image: Image = self.guard(self.media.upload_file(MediaKind::Image, path, folder).await)?;
    self.store.images.apply_uploaded(image.clone());
    info!(public_id = %image.public_id, "image uploaded");
    Ok(image)
  }

  pub async fn delete_image(&self, public_id: &str) -> Result<(), ApiError> {
    self.ensure_session().await?;
    self.guard(self.media.delete(MediaKind::Image, public_id).await)?;
    self.store.images.apply_deleted(public_id);
    info!(public_id, "image deleted");
    Ok(())
  }

  /// Audios, optionally restricted to one folder.
  pub async fn audios(&self, folder: Option<&str>, force: bool) -> Result<CacheResult<Vec<Audio>>, ApiError> {
    self.ensure_session().await?;
    self.store.audios.set_folder(folder);
    let media = self.media.clone();
    let result = self
      .store
      .audios
      .fetch(force, |params| async move {
        media.list(MediaKind::Audio, &params, None).await
      })
      .await;
    self.guard(result)
  }

  pub async fn load_more_audios(&self) -> Result<Option<CacheResult<Vec<Audio>>>, ApiError> {
    self.ensure_session().await?;
    let media = self.media.clone();
    let result = self
      .store
      .audios
      .load_more(|params, cursor| async move {
        media.list(MediaKind::Audio, &params, Some(&cursor)).await
      })
      .await;
    self.guard(result)
  }

  pub async fn upload_audio(&self, path: &Path, folder: Option<&str>) -> Result<Audio, ApiError> {
    self.ensure_session().await?;
    let audio: Audio = self.guard(self.media.upload_file(MediaKind::Audio, path, folder).await)?;
    self.store.audios.apply_uploaded(audio.clone());
    // Folder counts come from the server
    self.store.audio_folders.invalidate();
    info!(public_id = %audio.public_id, "audio uploaded");
    Ok(audio)
  }

  pub async fn delete_audio(&self, public_id: &str) -> Result<(), ApiError> {
    self.ensure_session().await?;
    self.guard(self.media.delete(MediaKind::Audio, public_id).await)?;
    self.store.audios.apply_deleted(public_id);
    self.store.audio_folders.apply_deleted(public_id);
    info!(public_id, "audio deleted");
    Ok(())
  }

  pub async fn audio_folders(&self, force: bool) -> Result<CacheResult<Vec<Folder<Audio>>>, ApiError> {
    self.ensure_session().await?;
    let media = self.media.clone();
    let result = self
      .store
      .audio_folders
      .fetch(force, || async move { media.audio_folders().await })
      .await;
    self.guard(result)
  }

  // --------------------------------------------------------------------------
  // Dashboard
  // --------------------------------------------------------------------------

  /// Totals for every resource plus the most recent pages and contacts.
  pub async fn dashboard(&self, force: bool) -> Result<CacheResult<DashboardStats>, ApiError> {
    self.ensure_session().await?;
    let api = self.api.clone();
    let result = self
      .store
      .dashboard
      .fetch(force, || async move {
        let recent = FetchParams::new(1, DASHBOARD_RECENT);
        let (pages, tracks, playlists, contacts) = futures::try_join!(
          api.list::<PageSummary>(Resource::Pages, &recent),
          api.list::<Track>(Resource::Tracks, &recent),
          api.list::<Playlist>(Resource::Playlists, &recent),
          api.list::<Contact>(Resource::Contacts, &recent),
        )?;

        Ok::<_, ApiError>(DashboardStats {
          total_pages: pages.total_items,
          total_tracks: tracks.total_items,
          total_playlists: playlists.total_items,
          total_contacts: contacts.total_items,
          recent_pages: pages.items,
          recent_contacts: contacts.items,
        })
      })
      .await;
    self.guard(result)
  }
}

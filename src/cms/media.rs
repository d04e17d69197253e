//! Media host client: cursor-paged listings, uploads, deletes and audio folders.

use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::cache::{CursorPage, CursorParams, Folder};
use crate::config::MediaConfig;

use super::api_types::{ApiFoldersResponse, ApiMediaList};
use super::client::{check_response, join_url, parse_response, BearerToken};
use super::error::ApiError;
use super::types::Audio;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
  Image,
  Audio,
}

impl MediaKind {
  fn path(&self) -> &'static str {
    match self {
      MediaKind::Image => "images",
      MediaKind::Audio => "audios",
    }
  }
}

/// Guess a content type from the file extension.
fn content_type(file_name: &str) -> &'static str {
  let ext = file_name
    .rsplit_once('.')
    .map(|(_, ext)| ext.to_ascii_lowercase())
    .unwrap_or_default();
  match ext.as_str() {
    "png" => "image/png",
    "jpg" | "jpeg" => "image/jpeg",
    "gif" => "image/gif",
    "webp" => "image/webp",
    "svg" => "image/svg+xml",
    "mp3" => "audio/mpeg",
    "wav" => "audio/wav",
    "ogg" => "audio/ogg",
    "m4a" => "audio/mp4",
    "flac" => "audio/flac",
    _ => "application/octet-stream",
  }
}

#[derive(Clone)]
pub struct MediaClient {
  client: reqwest::Client,
  base_url: Url,
  token: BearerToken,
}

impl MediaClient {
  pub fn new(config: &MediaConfig, token: BearerToken) -> Result<Self, ApiError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    let base_url =
      Url::parse(&config.url).map_err(|e| ApiError::Config(format!("media.url: {}", e)))?;

    Ok(Self {
      client,
      base_url,
      token,
    })
  }

  pub fn with_base_url(base_url: &str, token: BearerToken) -> Result<Self, ApiError> {
    Self::new(
      &MediaConfig {
        url: base_url.to_string(),
        timeout_secs: 30,
      },
      token,
    )
  }

  /// List one batch of images or audios.
  pub async fn list<T: DeserializeOwned>(
    &self,
    kind: MediaKind,
    params: &CursorParams,
    cursor: Option<&str>,
  ) -> Result<CursorPage<T>, ApiError> {
    let mut query = vec![("limit", params.page_size.to_string())];
    if let Some(cursor) = cursor {
      query.push(("cursor", cursor.to_string()));
    }
    if let Some(folder) = &params.folder {
      query.push(("folder", folder.clone()));
    }

    let url = join_url(&self.base_url, &[kind.path()])?;
    debug!(%url, ?cursor, "media list request");
    let request = self.token.attach(self.client.get(url)).query(&query);
    let list: ApiMediaList<T> = parse_response(request.send().await?).await?;
    Ok(list.into())
  }

  /// Upload a file as multipart form data. Returns the stored asset.
  pub async fn upload<T: DeserializeOwned>(
    &self,
    kind: MediaKind,
    file_name: &str,
    bytes: Vec<u8>,
    folder: Option<&str>,
  ) -> Result<T, ApiError> {
    let part = Part::bytes(bytes)
      .file_name(file_name.to_string())
      .mime_str(content_type(file_name))?;
    let mut form = Form::new().part("file", part);
    if let Some(folder) = folder {
      form = form.text("folder", folder.to_string());
    }

    let url = join_url(&self.base_url, &[kind.path(), "upload"])?;
    debug!(%url, file_name, "media upload");
    let response = self
      .token
      .attach(self.client.post(url))
      .multipart(form)
      .send()
      .await?;
    parse_response(response).await
  }

  /// Read a local file and upload it.
  pub async fn upload_file<T: DeserializeOwned>(
    &self,
    kind: MediaKind,
    path: &Path,
    folder: Option<&str>,
  ) -> Result<T, ApiError> {
    let bytes = tokio::fs::read(path)
      .await
      .map_err(|e| ApiError::Config(format!("cannot read {}: {}", path.display(), e)))?;
    let file_name = path
      .file_name()
      .and_then(|n| n.to_str())
      .unwrap_or("upload")
      .to_string();
    self.upload(kind, &file_name, bytes, folder).await
  }

  /// Delete an asset. Public ids may contain slashes; they are sent as one
  /// encoded path segment.
  pub async fn delete(&self, kind: MediaKind, public_id: &str) -> Result<(), ApiError> {
    let url = join_url(&self.base_url, &[kind.path(), public_id])?;
    let response = self.token.attach(self.client.delete(url)).send().await?;
    check_response(response).await
  }

  /// Pre-aggregated audio folder tree with embedded audios.
  pub async fn audio_folders(&self) -> Result<Vec<Folder<Audio>>, ApiError> {
    let url = join_url(&self.base_url, &["audios", "folders"])?;
    let response = self.token.attach(self.client.get(url)).send().await?;
    let folders: ApiFoldersResponse = parse_response(response).await?;
    Ok(folders.folders.into_iter().map(Folder::from).collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cms::types::Image;
  use mockito::Matcher;

  #[test]
  fn test_content_type() {
    assert_eq!(content_type("cover.JPG"), "image/jpeg");
    assert_eq!(content_type("mix.mp3"), "audio/mpeg");
    assert_eq!(content_type("README"), "application/octet-stream");
  }

  #[tokio::test]
  async fn test_list_with_cursor() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
      .mock("GET", "/images")
      .match_query(Matcher::AllOf(vec![
        Matcher::UrlEncoded("limit".into(), "2".into()),
        Matcher::UrlEncoded("cursor".into(), "c1".into()),
      ]))
      .with_status(200)
      .with_body(r#"{"images": [{"public_id": "z", "secure_url": "https://cdn/z.png"}], "has_more": false}"#)
      .create_async()
      .await;

    let client = MediaClient::with_base_url(&server.url(), BearerToken::default()).unwrap();
    let params = CursorParams {
      folder: None,
      page_size: 2,
    };
    let page: CursorPage<Image> = client.list(MediaKind::Image, &params, Some("c1")).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert!(!page.has_more);
    assert!(page.next_cursor.is_none());
  }

  #[tokio::test]
  async fn test_upload_multipart() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
      .mock("POST", "/images/upload")
      .match_header(
        "content-type",
        Matcher::Regex("multipart/form-data; boundary=.*".into()),
      )
      .match_body(Matcher::Regex(r#"name="folder"\r\n\r\ncovers"#.into()))
      .with_status(201)
      .with_body(r#"{"public_id": "covers/new", "secure_url": "https://cdn/covers/new.png"}"#)
      .create_async()
      .await;

    let client = MediaClient::with_base_url(&server.url(), BearerToken::default()).unwrap();
    let image: Image = client
      .upload(MediaKind::Image, "new.png", vec![1, 2, 3], Some("covers"))
      .await
      .unwrap();
    assert_eq!(image.secure_url, "https://cdn/covers/new.png");
  }

  #[tokio::test]
  async fn test_delete_encodes_public_id() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
      .mock("DELETE", "/audios/albums%2Flive%2Fone")
      .with_status(200)
      .with_body(r#"{"result": "ok"}"#)
      .create_async()
      .await;

    let client = MediaClient::with_base_url(&server.url(), BearerToken::default()).unwrap();
    client.delete(MediaKind::Audio, "albums/live/one").await.unwrap();
  }

  #[tokio::test]
  async fn test_audio_folders() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
      .mock("GET", "/audios/folders")
      .with_status(200)
      .with_body(r#"{"folders": [{"name": "Live", "path": "live", "audios": [], "audioCount": 0}]}"#)
      .create_async()
      .await;

    let client = MediaClient::with_base_url(&server.url(), BearerToken::default()).unwrap();
    let folders = client.audio_folders().await.unwrap();
    assert_eq!(folders.len(), 1);
    assert_eq!(folders[0].name, "Live");
  }
}

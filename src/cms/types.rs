use serde::{Deserialize, Deserializer, Serialize};

/// Page as projected in list views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
  #[serde(alias = "_id")]
  pub id: String,
  pub title: String,
  pub slug: String,
  #[serde(default)]
  pub excerpt: Option<String>,
  #[serde(default)]
  pub category: Option<String>,
  #[serde(default)]
  pub author: Option<String>,
  #[serde(default)]
  pub tags: Vec<String>,
  #[serde(default)]
  pub status: Option<String>, // "draft" or "published"
  #[serde(default)]
  pub created_at: Option<String>,
  #[serde(default)]
  pub updated_at: Option<String>,
}

/// Full page with HTML content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
  #[serde(alias = "_id")]
  pub id: String,
  pub title: String,
  pub slug: String,
  #[serde(default)]
  pub content: String,
  #[serde(default)]
  pub excerpt: Option<String>,
  #[serde(default)]
  pub category: Option<String>,
  #[serde(default)]
  pub author: Option<String>,
  #[serde(default)]
  pub tags: Vec<String>,
  #[serde(default)]
  pub status: Option<String>,
  #[serde(default)]
  pub featured_image: Option<String>,
  #[serde(default)]
  pub meta_description: Option<String>,
  #[serde(default)]
  pub created_at: Option<String>,
  #[serde(default)]
  pub updated_at: Option<String>,
}

impl From<&Page> for PageSummary {
  fn from(page: &Page) -> Self {
    Self {
      id: page.id.clone(),
      title: page.title.clone(),
      slug: page.slug.clone(),
      excerpt: page.excerpt.clone(),
      category: page.category.clone(),
      author: page.author.clone(),
      tags: page.tags.clone(),
      status: page.status.clone(),
      created_at: page.created_at.clone(),
      updated_at: page.updated_at.clone(),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInput {
  pub title: String,
  /// Derived from the title by the CLI when left empty
  #[serde(default)]
  pub slug: String,
  pub content: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub excerpt: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub tags: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub featured_image: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub meta_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
  #[serde(alias = "_id")]
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub artist: Option<String>,
  #[serde(default)]
  pub group: Option<String>,
  pub audio_url: String,
  #[serde(default)]
  pub cover_image: Option<String>,
  #[serde(default)]
  pub duration: Option<f64>, // seconds
  #[serde(default)]
  pub is_public: bool,
  #[serde(default)]
  pub created_by: Option<String>,
  #[serde(default)]
  pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInput {
  pub title: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub artist: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub group: Option<String>,
  pub audio_url: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cover_image: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub duration: Option<f64>,
  #[serde(default)]
  pub is_public: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
  #[serde(alias = "_id")]
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub creator: Option<String>,
  #[serde(default)]
  pub is_public: bool,
  /// Track ids; populated track objects are reduced to their ids
  #[serde(default, deserialize_with = "deserialize_ids")]
  pub tracks: Vec<String>,
  #[serde(default)]
  pub cover_image: Option<String>,
  #[serde(default)]
  pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistInput {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default)]
  pub is_public: bool,
  #[serde(default)]
  pub tracks: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cover_image: Option<String>,
}

/// Contact form submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
  #[serde(alias = "_id")]
  pub id: String,
  pub name: String,
  pub email: String,
  #[serde(default)]
  pub subject: Option<String>,
  #[serde(default)]
  pub message: String,
  #[serde(default)]
  pub created_at: Option<String>,
}

/// Image held by the media host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
  pub public_id: String,
  pub secure_url: String,
  #[serde(default)]
  pub format: Option<String>,
  #[serde(default)]
  pub width: Option<u32>,
  #[serde(default)]
  pub height: Option<u32>,
  #[serde(default)]
  pub bytes: Option<u64>,
  #[serde(default)]
  pub folder: Option<String>,
  #[serde(default)]
  pub created_at: Option<String>,
}

/// Audio file held by the media host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Audio {
  pub public_id: String,
  pub secure_url: String,
  #[serde(default)]
  pub format: Option<String>,
  #[serde(default)]
  pub duration: Option<f64>,
  #[serde(default)]
  pub bytes: Option<u64>,
  #[serde(default)]
  pub folder: Option<String>,
  #[serde(default)]
  pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  #[serde(alias = "_id")]
  pub id: String,
  pub username: String,
  #[serde(default)]
  pub email: String,
  #[serde(default)]
  pub role: String,
}

/// Aggregates shown on the dashboard landing view
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DashboardStats {
  pub total_pages: u64,
  pub total_tracks: u64,
  pub total_playlists: u64,
  pub total_contacts: u64,
  pub recent_pages: Vec<PageSummary>,
  pub recent_contacts: Vec<Contact>,
}

fn deserialize_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum IdOrObject {
    Id(String),
    Object {
      #[serde(alias = "_id")]
      id: String,
    },
  }

  let v: Vec<IdOrObject> = Vec::deserialize(deserializer)?;
  Ok(
    v.into_iter()
      .map(|entry| match entry {
        IdOrObject::Id(id) => id,
        IdOrObject::Object { id } => id,
      })
      .collect(),
  )
}

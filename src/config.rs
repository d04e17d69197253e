use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  pub media: MediaConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub auth: AuthConfig,
  /// Optional AI content generation
  pub generate: Option<GenerateConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Backend base URL, e.g. "https://cms.example.com/api"
  pub url: String,
  #[serde(default = "default_api_timeout")]
  pub timeout_secs: u64,
  #[serde(default = "default_verify_timeout")]
  pub verify_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
  /// Media host base URL
  pub url: String,
  #[serde(default = "default_media_timeout")]
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Pages, tracks, playlists, contacts
  #[serde(default = "default_list_ttl")]
  pub list_ttl_secs: u64,
  /// Images, audios, audio folders
  #[serde(default = "default_media_ttl")]
  pub media_ttl_secs: u64,
  #[serde(default = "default_media_ttl")]
  pub dashboard_ttl_secs: u64,
  #[serde(default = "default_page_size")]
  pub page_size: u32,
  #[serde(default = "default_media_page_size")]
  pub media_page_size: u32,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      list_ttl_secs: default_list_ttl(),
      media_ttl_secs: default_media_ttl(),
      dashboard_ttl_secs: default_media_ttl(),
      page_size: default_page_size(),
      media_page_size: default_media_page_size(),
    }
  }
}

impl CacheConfig {
  pub fn list_ttl(&self) -> Duration {
    Duration::seconds(self.list_ttl_secs as i64)
  }

  pub fn media_ttl(&self) -> Duration {
    Duration::seconds(self.media_ttl_secs as i64)
  }

  pub fn dashboard_ttl(&self) -> Duration {
    Duration::seconds(self.dashboard_ttl_secs as i64)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
  /// Verification retries after a network failure
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,
  /// Retry delay is 2^attempt times this base
  #[serde(default = "default_backoff_base")]
  pub backoff_base_ms: u64,
}

impl Default for AuthConfig {
  fn default() -> Self {
    Self {
      max_retries: default_max_retries(),
      backoff_base_ms: default_backoff_base(),
    }
  }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
  /// OpenAI-compatible chat completions endpoint
  #[default]
  Openai,
  /// Google Gemini generateContent endpoint
  Gemini,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateConfig {
  #[serde(default)]
  pub provider: Provider,
  pub model: String,
  /// Override the provider's base URL
  pub url: Option<String>,
}

fn default_api_timeout() -> u64 {
  10
}

fn default_verify_timeout() -> u64 {
  5
}

fn default_media_timeout() -> u64 {
  30
}

fn default_list_ttl() -> u64 {
  120
}

fn default_media_ttl() -> u64 {
  300
}

fn default_page_size() -> u32 {
  10
}

fn default_media_page_size() -> u32 {
  30
}

fn default_max_retries() -> u32 {
  2
}

fn default_backoff_base() -> u64 {
  1000
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./cmsdeck.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/cmsdeck/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/cmsdeck/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("cmsdeck.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("cmsdeck").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to load config file {}: {}", path.display(), e))
  }

  /// Parse and validate configuration from YAML text.
  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config =
      serde_yaml::from_str(contents).map_err(|e| eyre!("Invalid YAML: {}", e))?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    check_url("api.url", &self.api.url)?;
    check_url("media.url", &self.media.url)?;
    if let Some(url) = self.generate.as_ref().and_then(|g| g.url.as_deref()) {
      check_url("generate.url", url)?;
    }
    if self.cache.page_size == 0 || self.cache.media_page_size == 0 {
      return Err(eyre!("cache page sizes must be greater than zero"));
    }
    Ok(())
  }

  /// Get the API key for a content generation provider from environment variables.
  ///
  /// Checks CMSDECK_OPENAI_KEY / CMSDECK_GEMINI_KEY.
  pub fn get_generate_key(provider: Provider) -> Result<String> {
    let var = match provider {
      Provider::Openai => "CMSDECK_OPENAI_KEY",
      Provider::Gemini => "CMSDECK_GEMINI_KEY",
    };
    std::env::var(var).map_err(|_| eyre!("API key not found. Set the {} environment variable.", var))
  }
}

fn check_url(field: &str, value: &str) -> Result<()> {
  let parsed = url::Url::parse(value).map_err(|e| eyre!("{} is not a valid URL: {}", field, e))?;
  match parsed.scheme() {
    "http" | "https" => Ok(()),
    other => Err(eyre!("{} must use http or https, got {}", field, other)),
  }
}

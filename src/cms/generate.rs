//! One-shot AI content generation for page bodies. Results are not cached.

use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::{GenerateConfig, Provider};

use super::client::{join_url, parse_response};
use super::error::ApiError;

const OPENAI_URL: &str = "https://api.openai.com/v1";
const GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const GENERATE_TIMEOUT_SECS: u64 = 60;

/// Prompt sent to either provider.
pub fn build_prompt(topic: &str, instructions: Option<&str>) -> String {
  let mut prompt = format!(
    "Write a web page about \"{}\". Respond with HTML body content only: \
     use <h2>, <p>, <ul> and <li> elements, no <html>, <head> or <body> tags \
     and no markdown.",
    topic.trim()
  );
  if let Some(extra) = instructions.map(str::trim).filter(|s| !s.is_empty()) {
    prompt.push_str("\nAdditional instructions: ");
    prompt.push_str(extra);
  }
  prompt
}

/// Remove a surrounding ``` fence (with optional language tag) if present.
pub fn strip_code_fences(text: &str) -> String {
  let trimmed = text.trim();
  let Some(rest) = trimmed.strip_prefix("```") else {
    return trimmed.to_string();
  };
  let Some(body) = rest.strip_suffix("```") else {
    return trimmed.to_string();
  };
  // Drop the language tag line
  let body = match body.split_once('\n') {
    Some((tag, tail)) if !tag.contains('<') => tail,
    _ => body,
  };
  body.trim().to_string()
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
  #[serde(default)]
  choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
  message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
  #[serde(default)]
  content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
  #[serde(default)]
  candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
  content: GeminiContent,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
  #[serde(default)]
  parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
  #[serde(default)]
  text: String,
}

#[derive(Clone)]
pub struct ContentGenerator {
  client: reqwest::Client,
  provider: Provider,
  model: String,
  base_url: Url,
  api_key: String,
}

impl ContentGenerator {
  pub fn new(config: &GenerateConfig, api_key: String) -> Result<Self, ApiError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(GENERATE_TIMEOUT_SECS))
      .build()?;
    let default_url = match config.provider {
      Provider::Openai => OPENAI_URL,
      Provider::Gemini => GEMINI_URL,
    };
    let url = config.url.as_deref().unwrap_or(default_url);
    let base_url = Url::parse(url).map_err(|e| ApiError::Config(format!("generate.url: {}", e)))?;

    Ok(Self {
      client,
      provider: config.provider,
      model: config.model.clone(),
      base_url,
      api_key,
    })
  }

  /// Generate HTML for a page about `topic`.
  pub async fn generate(&self, topic: &str, instructions: Option<&str>) -> Result<String, ApiError> {
    let prompt = build_prompt(topic, instructions);
    debug!(provider = ?self.provider, model = %self.model, "generating content");

    let text = match self.provider {
      Provider::Openai => self.openai(&prompt).await?,
      Provider::Gemini => self.gemini(&prompt).await?,
    };
    Ok(strip_code_fences(&text))
  }

  async fn openai(&self, prompt: &str) -> Result<String, ApiError> {
    let url = join_url(&self.base_url, &["chat", "completions"])?;
    let body = json!({
      "model": self.model,
      "messages": [{"role": "user", "content": prompt}],
    });
    let response = self
      .client
      .post(url)
      .bearer_auth(&self.api_key)
      .json(&body)
      .send()
      .await?;
    let parsed: OpenAiResponse = parse_response(response).await?;
    parsed
      .choices
      .into_iter()
      .find_map(|c| c.message.content)
      .ok_or_else(|| ApiError::InvalidResponse("no completion returned".to_string()))
  }

  async fn gemini(&self, prompt: &str) -> Result<String, ApiError> {
    let action = format!("{}:generateContent", self.model);
    let url = join_url(&self.base_url, &["models", &action])?;
    let body = json!({ "contents": [{"parts": [{"text": prompt}]}] });
    let response = self
      .client
      .post(url)
      .query(&[("key", &self.api_key)])
      .json(&body)
      .send()
      .await?;
    let parsed: GeminiResponse = parse_response(response).await?;
    let text: String = parsed
      .candidates
      .into_iter()
      .next()
      .map(|c| c.content.parts.into_iter().map(|p| p.text).collect())
      .unwrap_or_default();
    if text.is_empty() {
      return Err(ApiError::InvalidResponse("no candidate returned".to_string()));
    }
    Ok(text)
  }
}

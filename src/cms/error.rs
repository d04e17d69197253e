//! Error taxonomy for requests against the backend and the media host.

use reqwest::StatusCode;

use super::validate::ValidationErrors;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
  /// Rejected client-side before any request was sent
  #[error("Validation failed: {0}")]
  Validation(ValidationErrors),
  /// The bearer token is missing, expired or revoked
  #[error("Session expired, please sign in again")]
  Unauthorized,
  #[error("Not found: {0}")]
  NotFound(String),
  #[error("Request timed out")]
  Timeout,
  #[error("Network error: {0}")]
  Network(String),
  #[error("Server error {status}: {message}")]
  Status { status: u16, message: String },
  #[error("Invalid response: {0}")]
  InvalidResponse(String),
  #[error("Config error: {0}")]
  Config(String),
}

impl ApiError {
  /// Whether this failure should be surfaced as a user-facing warning.
  /// Not-found is expected when probing single resources.
  pub fn is_reportable(&self) -> bool {
    !matches!(self, ApiError::NotFound(_))
  }

  /// Map a non-success status with its body text.
  pub(crate) fn from_status(status: StatusCode, path: &str, body: &str) -> Self {
    match status {
      StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
      StatusCode::NOT_FOUND => ApiError::NotFound(path.to_string()),
      _ => ApiError::Status {
        status: status.as_u16(),
        message: error_message(body).unwrap_or_else(|| {
          status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
        }),
      },
    }
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_timeout() {
      ApiError::Timeout
    } else if err.is_decode() {
      ApiError::InvalidResponse(err.to_string())
    } else if let Some(status) = err.status() {
      ApiError::from_status(status, err.url().map(|u| u.path()).unwrap_or(""), "")
    } else {
      ApiError::Network(err.to_string())
    }
  }
}

impl From<serde_json::Error> for ApiError {
  fn from(err: serde_json::Error) -> Self {
    ApiError::InvalidResponse(err.to_string())
  }
}

impl From<ValidationErrors> for ApiError {
  fn from(errors: ValidationErrors) -> Self {
    ApiError::Validation(errors)
  }
}

/// Pull `message` (or `error`) out of a JSON error body.
fn error_message(body: &str) -> Option<String> {
  match serde_json::from_str::<serde_json::Value>(body) {
    Ok(value) => ["message", "error"]
      .iter()
      .find_map(|key| value.get(key).and_then(|v| v.as_str()))
      .map(String::from),
    Err(_) => {
      let trimmed = body.trim();
      (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_status_mapping() {
    assert!(matches!(
      ApiError::from_status(StatusCode::UNAUTHORIZED, "/pages", ""),
      ApiError::Unauthorized
    ));
    assert!(matches!(
      ApiError::from_status(StatusCode::NOT_FOUND, "/pages/7", ""),
      ApiError::NotFound(p) if p == "/pages/7"
    ));

    match ApiError::from_status(
      StatusCode::UNPROCESSABLE_ENTITY,
      "/tracks",
      r#"{"success":false,"message":"Slug already taken"}"#,
    ) {
      ApiError::Status { status, message } => {
        assert_eq!(status, 422);
        assert_eq!(message, "Slug already taken");
      }
      other => panic!("unexpected {other:?}"),
    }

    match ApiError::from_status(StatusCode::BAD_GATEWAY, "/tracks", "") {
      ApiError::Status { message, .. } => assert_eq!(message, "Bad Gateway"),
      other => panic!("unexpected {other:?}"),
    }

    match ApiError::from_status(StatusCode::SERVICE_UNAVAILABLE, "/tracks", "upstream down\n") {
      ApiError::Status { message, .. } => assert_eq!(message, "upstream down"),
      other => panic!("unexpected {other:?}"),
    }
  }

  #[test]
  fn test_reportable() {
    assert!(!ApiError::NotFound("/x".into()).is_reportable());
    assert!(ApiError::Timeout.is_reportable());
    assert!(ApiError::Unauthorized.is_reportable());
  }
}

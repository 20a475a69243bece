//! HTTP-facing error type.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use score_engine::{ScoreError, StoreError};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  BadRequest(String),

  #[error("{0}")]
  Unauthorized(String),

  #[error("{0}")]
  Forbidden(String),

  #[error("{0}")]
  NotFound(String),

  #[error("{0}")]
  Internal(String),

  #[error(transparent)]
  Score(#[from] ScoreError),
}

impl ApiError {
  pub fn unauthorized() -> Self {
    Self::Unauthorized("Unauthorized".into())
  }
}

#[derive(Serialize)]
struct ErrorBody {
  error: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  field: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  step: Option<&'static str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  details: Option<String>,
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, body) = match self {
      ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, plain(msg)),
      ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, plain(msg)),
      ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, plain(msg)),
      ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, plain(msg)),
      ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, plain(msg)),
      ApiError::Score(ScoreError::Validation { field, reason }) => (
        StatusCode::BAD_REQUEST,
        ErrorBody {
          field: Some(field),
          ..plain(reason)
        },
      ),
      ApiError::Score(ScoreError::NotFound(_)) => {
        (StatusCode::NOT_FOUND, plain("Pending score not found".into()))
      }
      ApiError::Score(ScoreError::SignatureInvalid) => {
        (StatusCode::UNAUTHORIZED, plain("Invalid signature".into()))
      }
      ApiError::Score(ScoreError::Store {
        source: StoreError::Conflict(msg),
        ..
      }) => (StatusCode::CONFLICT, plain(msg)),
      ApiError::Score(ScoreError::Store { step, source }) => {
        error!(step, error = %source, "store failure");
        (
          StatusCode::INTERNAL_SERVER_ERROR,
          ErrorBody {
            error: format!("Failed to update {}", step),
            field: None,
            step: Some(step),
            details: Some(source.to_string()),
          },
        )
      }
    };
    (status, Json(body)).into_response()
  }
}

fn plain(error: String) -> ErrorBody {
  ErrorBody {
    error,
    field: None,
    step: None,
    details: None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn maps_core_errors_to_status_codes() {
    let cases = [
      (ApiError::from(ScoreError::validation("scoreId", "Score ID is required")), StatusCode::BAD_REQUEST),
      (ApiError::from(ScoreError::NotFound("x".into())), StatusCode::NOT_FOUND),
      (ApiError::from(ScoreError::SignatureInvalid), StatusCode::UNAUTHORIZED),
      (
        ApiError::from(ScoreError::store("teams")(StoreError::Conflict("dup".into()))),
        StatusCode::CONFLICT,
      ),
      (
        ApiError::from(ScoreError::store("ledger")(StoreError::unavailable("down"))),
        StatusCode::INTERNAL_SERVER_ERROR,
      ),
      (ApiError::unauthorized(), StatusCode::UNAUTHORIZED),
      (ApiError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (err, status) in cases {
      assert_eq!(err.into_response().status(), status);
    }
  }

  #[tokio::test]
  async fn validation_body_names_the_field() {
    let response = ApiError::from(ScoreError::validation("repository.name", "Repository name is required")).into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "Repository name is required");
    assert_eq!(body["field"], "repository.name");
    assert!(body.get("step").is_none());
  }
}

//! GitHub webhook intake: verify the signature, then queue the scored event.

use axum::{
  body::Bytes,
  extract::State,
  http::{HeaderMap, StatusCode},
  Json,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use score_engine::{signature, EventKind, IntakeOutcome, WebhookPayload};

use crate::error::ApiError;
use crate::state::AppState;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
  headers.get(name).and_then(|v| v.to_str().ok())
}

/// `POST /api/github/webhook`
pub async fn github(
  State(state): State<AppState>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
  signature::verify(
    state.webhook_secret.as_deref(),
    &body,
    header(&headers, "x-hub-signature-256"),
  )?;

  let kind = EventKind::from_header(header(&headers, "x-github-event").unwrap_or_default());
  let delivery = header(&headers, "x-github-delivery");

  let payload: WebhookPayload = serde_json::from_slice(&body).map_err(|e| {
    warn!(event = kind.as_str(), error = %e, "webhook body is not valid JSON");
    ApiError::BadRequest("Invalid JSON payload".into())
  })?;

  let outcome = state.intake.ingest(&kind, &payload, delivery).await?;
  let body = match outcome {
    IntakeOutcome::Queued(score) => json!({ "success": true, "scoreId": score.id }),
    IntakeOutcome::Ignored => json!({ "success": true }),
    IntakeOutcome::Duplicate(id) => {
      info!(delivery, score = %id, "redelivered webhook");
      json!({ "success": true, "duplicate": true, "scoreId": id })
    }
  };
  Ok((StatusCode::OK, Json(body)))
}

//! HTTP handlers.

pub mod admin;
pub mod leaderboard;
pub mod teams;
pub mod webhook;

use axum::http::HeaderMap;

use crate::auth::{self, Claims};
use crate::error::ApiError;
use crate::state::AppState;

pub async fn health() -> &'static str {
  "ok"
}

/// Verified session claims from the bearer token.
pub(crate) fn session(state: &AppState, headers: &HeaderMap) -> Result<Claims, ApiError> {
  let token = auth::bearer(headers).ok_or_else(ApiError::unauthorized)?;
  state.sessions.verify(token)
}

pub(crate) fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<Claims, ApiError> {
  let claims = session(state, headers)?;
  if !claims.is_admin() {
    return Err(ApiError::Forbidden("Admin access required".into()));
  }
  Ok(claims)
}

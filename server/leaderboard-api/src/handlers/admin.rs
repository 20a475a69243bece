//! Admin routes: login, the review queue, team directory and board curation.

use axum::{extract::State, http::HeaderMap, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use score_engine::review::parse_score_id;
use score_engine::types::{LedgerEntry, NewTeam, PendingScore, Team};
use score_engine::ScoreError;

use super::require_admin;
use crate::auth;
use crate::config::non_blank;
use crate::error::ApiError;
use crate::leaderboard::{self, Boards};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginBody {
  #[serde(default)]
  password: Option<String>,
}

/// `POST /api/admin/auth`
pub async fn login(
  State(state): State<AppState>,
  Json(body): Json<LoginBody>,
) -> Result<Json<Value>, ApiError> {
  let password = non_blank(body.password).ok_or_else(|| ApiError::BadRequest("Password is required".into()))?;

  // blake3::Hash compares in constant time.
  if blake3::hash(password.as_bytes()) != blake3::hash(state.admin_password.as_bytes()) {
    warn!("admin login failed");
    return Err(ApiError::Unauthorized("Invalid admin password".into()));
  }

  let (token, claims) = state.sessions.issue_admin(Utc::now())?;
  Ok(Json(json!({
    "success": true,
    "token": token,
    "expiresAt": claims.expires_at(),
  })))
}

/// `GET /api/admin/pending-scores`
pub async fn pending_scores(
  State(state): State<AppState>,
  headers: HeaderMap,
) -> Result<Json<Vec<PendingScore>>, ApiError> {
  require_admin(&state, &headers)?;
  Ok(Json(state.intake.list_pending().await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreAction {
  #[serde(default)]
  score_id: Option<String>,
}

/// `POST /api/admin/approve-score`
pub async fn approve_score(
  State(state): State<AppState>,
  headers: HeaderMap,
  Json(body): Json<ScoreAction>,
) -> Result<Json<Value>, ApiError> {
  require_admin(&state, &headers)?;
  let id = parse_score_id(body.score_id.as_deref())?;
  let outcome = state.gate.approve(id).await?;
  Ok(Json(json!({
    "success": true,
    "message": outcome.message(),
    "newTotal": outcome.new_total,
    "rank": outcome.rank,
  })))
}

/// `POST /api/admin/reject-score`
pub async fn reject_score(
  State(state): State<AppState>,
  headers: HeaderMap,
  Json(body): Json<ScoreAction>,
) -> Result<Json<Value>, ApiError> {
  require_admin(&state, &headers)?;
  let id = parse_score_id(body.score_id.as_deref())?;
  state.gate.reject(id).await?;
  Ok(Json(json!({
    "success": true,
    "message": "Score request rejected",
  })))
}

/// `POST /api/admin/recompute-ranks`
pub async fn recompute_ranks(
  State(state): State<AppState>,
  headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
  require_admin(&state, &headers)?;
  let changed = state.gate.recompute_ranks().await?;
  info!(changed = changed.len(), "ranks recomputed");
  Ok(Json(json!({ "success": true, "updated": changed.len() })))
}

/// `GET /api/admin/teams`
pub async fn list_teams(
  State(state): State<AppState>,
  headers: HeaderMap,
) -> Result<Json<Vec<Team>>, ApiError> {
  require_admin(&state, &headers)?;
  let teams = state
    .directory
    .list_teams()
    .await
    .map_err(ScoreError::store("teams"))?;
  Ok(Json(teams))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTeam {
  #[serde(default)]
  team_name: Option<String>,
  #[serde(default)]
  password: Option<String>,
  #[serde(default)]
  repository_name: Option<String>,
  #[serde(default)]
  repository_url: Option<String>,
}

/// `POST /api/admin/teams`
pub async fn create_team(
  State(state): State<AppState>,
  headers: HeaderMap,
  Json(body): Json<CreateTeam>,
) -> Result<Json<Team>, ApiError> {
  require_admin(&state, &headers)?;
  let (Some(team_name), Some(password)) = (non_blank(body.team_name), non_blank(body.password)) else {
    return Err(ApiError::BadRequest("Team name and password are required".into()));
  };
  let team_name = team_name.trim().to_string();

  let team = state
    .directory
    .create_team(&NewTeam {
      password_hash: auth::hash_password(&password)?,
      repository_name: non_blank(body.repository_name).map(|r| r.trim().to_string()),
      repository_url: non_blank(body.repository_url),
      created_at: Utc::now(),
      team_name,
    })
    .await
    .map_err(ScoreError::store("teams"))?;

  info!(team = %team.team_name, repository = ?team.repository_name, "created team");
  Ok(Json(team))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTeam {
  #[serde(default)]
  team_name: Option<String>,
  #[serde(default)]
  is_active: Option<bool>,
}

/// `PUT /api/admin/teams`
pub async fn update_team(
  State(state): State<AppState>,
  headers: HeaderMap,
  Json(body): Json<UpdateTeam>,
) -> Result<Json<Team>, ApiError> {
  require_admin(&state, &headers)?;
  let (Some(team_name), Some(active)) = (non_blank(body.team_name), body.is_active) else {
    return Err(ApiError::BadRequest("Team name and active status are required".into()));
  };

  let team = state
    .directory
    .set_team_active(team_name.trim(), active)
    .await
    .map_err(ScoreError::store("teams"))?
    .ok_or_else(|| ApiError::NotFound("Team not found".into()))?;

  info!(team = %team.team_name, active, "updated team status");
  Ok(Json(team))
}

/// `PUT /api/admin/leaderboard`
///
/// Replaces the individuals, domains and less-AI boards and rewrites the
/// snapshot. Team rows in the body are ignored.
pub async fn publish_boards(
  State(state): State<AppState>,
  headers: HeaderMap,
  Json(curated): Json<Boards>,
) -> Result<Json<Value>, ApiError> {
  require_admin(&state, &headers)?;
  let published = leaderboard::publish(
    state.store.as_ref(),
    state.boards.as_ref(),
    &state.snapshot_path,
    curated,
  )
  .await
  .map_err(ScoreError::store_in("leaderboard"))?;

  info!(
    individuals = published.individuals.len(),
    domains = published.domains.len(),
    less_ai = published.less_ai.len(),
    "published curated leaderboards"
  );
  Ok(Json(json!({ "success": true, "data": published })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerDetails {
  #[serde(default)]
  team_name: Option<String>,
  #[serde(default)]
  domain: Option<String>,
  #[serde(default)]
  project: Option<String>,
}

/// `PUT /api/admin/leaderboard/team`
pub async fn update_ledger_team(
  State(state): State<AppState>,
  headers: HeaderMap,
  Json(body): Json<LedgerDetails>,
) -> Result<Json<LedgerEntry>, ApiError> {
  require_admin(&state, &headers)?;
  let Some(team_name) = non_blank(body.team_name) else {
    return Err(ApiError::BadRequest("Team name is required".into()));
  };
  let domain = non_blank(body.domain).map(|d| d.trim().to_string());
  let project = non_blank(body.project).map(|p| p.trim().to_string());
  if domain.is_none() && project.is_none() {
    return Err(ApiError::BadRequest("Domain or project is required".into()));
  }

  let entry = state
    .store
    .set_ledger_details(team_name.trim(), domain.as_deref(), project.as_deref())
    .await
    .map_err(ScoreError::store("leaderboard_teams"))?
    .ok_or_else(|| ApiError::NotFound("Team not found on leaderboard".into()))?;

  info!(team = %entry.team_name, domain = %entry.domain, project = %entry.project, "updated ledger details");
  Ok(Json(entry))
}

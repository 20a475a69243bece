//! Team login and the signed-in team's own score data.

use axum::{
  extract::{Query, State},
  http::HeaderMap,
  Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use score_engine::types::{ActivityTally, ActivityType, WeeklyAggregate};
use score_engine::ScoreError;

use super::session;
use crate::auth::verify_password;
use crate::config::non_blank;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginBody {
  #[serde(default)]
  team_name: Option<String>,
  #[serde(default)]
  password: Option<String>,
}

/// `POST /api/teams/auth`
pub async fn login(
  State(state): State<AppState>,
  Json(body): Json<LoginBody>,
) -> Result<Json<Value>, ApiError> {
  let (Some(team_name), Some(password)) = (non_blank(body.team_name), non_blank(body.password)) else {
    return Err(ApiError::BadRequest("Team name and password are required".into()));
  };

  let team = state
    .directory
    .find_team(team_name.trim())
    .await
    .map_err(ScoreError::store("teams"))?;

  let invalid = || ApiError::Unauthorized("Invalid team credentials".into());
  let Some(team) = team else {
    warn!(team = %team_name, "login for unknown team");
    return Err(invalid());
  };
  if !team.is_active {
    return Err(ApiError::Forbidden("Team account is inactive".into()));
  }
  if !verify_password(&password, &team.password_hash) {
    warn!(team = %team.team_name, "team login failed");
    return Err(invalid());
  }

  let (token, claims) = state.sessions.issue_team(&team.team_name, Utc::now())?;
  Ok(Json(json!({
    "success": true,
    "teamName": team.team_name,
    "token": token,
    "expiresAt": claims.expires_at(),
  })))
}

#[derive(Deserialize)]
pub struct DataQuery {
  #[serde(default)]
  team: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamData {
  pub team_name: String,
  pub score: i64,
  pub rank: i32,
  pub commits: i64,
  pub pull_requests: i64,
  pub issues: i64,
  pub workflows: i64,
  pub tests: i64,
  pub repositories: Vec<ActivityTally>,
  pub weekly: Vec<WeeklyAggregate>,
  pub last_activity: Option<DateTime<Utc>>,
}

impl TeamData {
  fn build(
    team_name: String,
    score: i64,
    rank: i32,
    repositories: Vec<ActivityTally>,
    weekly: Vec<WeeklyAggregate>,
  ) -> Self {
    let count = |kind: ActivityType| -> i64 {
      repositories
        .iter()
        .filter(|t| t.activity_type == kind)
        .map(|t| t.count)
        .sum()
    };
    Self {
      commits: count(ActivityType::Commit),
      pull_requests: count(ActivityType::PullRequest),
      issues: count(ActivityType::Issue),
      workflows: count(ActivityType::Workflow),
      tests: count(ActivityType::Test),
      last_activity: repositories.iter().map(|t| t.last_updated).max(),
      team_name,
      score,
      rank,
      repositories,
      weekly,
    }
  }
}

/// `GET /api/teams/data?team=NAME`
///
/// Team tokens may only read their own team, and only while it is active.
pub async fn data(
  State(state): State<AppState>,
  headers: HeaderMap,
  Query(query): Query<DataQuery>,
) -> Result<Json<TeamData>, ApiError> {
  let claims = session(&state, &headers)?;
  let team_name = non_blank(query.team)
    .map(|t| t.trim().to_string())
    .ok_or_else(|| ApiError::BadRequest("Team name is required".into()))?;

  if !claims.is_admin() {
    if claims.team.as_deref() != Some(team_name.as_str()) {
      return Err(ApiError::Forbidden("Token does not belong to this team".into()));
    }
    let active = state
      .directory
      .find_team(&team_name)
      .await
      .map_err(ScoreError::store("teams"))?
      .is_some_and(|t| t.is_active);
    if !active {
      return Err(ApiError::Forbidden("Team account is inactive".into()));
    }
  }

  let (entry, tallies, weekly) = tokio::join!(
    state.store.ledger_entry(&team_name),
    state.store.tallies_for(&team_name),
    state.store.weekly_for(&team_name),
  );
  let entry = entry.map_err(ScoreError::store("leaderboard_teams"))?;
  let tallies = tallies.map_err(ScoreError::store("team_activities"))?;
  let weekly = weekly.map_err(ScoreError::store("weekly_scores"))?;

  let (score, rank) = entry.map(|e| (e.points, e.rank)).unwrap_or((0, 0));
  Ok(Json(TeamData::build(team_name, score, rank, tallies, weekly)))
}

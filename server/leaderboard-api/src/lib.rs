//! Club Leaderboard API
//!
//! HTTP service around the score engine: signed GitHub webhooks in, an admin
//! review queue, team self-service reads and the public leaderboards.
//! Bind to 127.0.0.1 by default and put it behind the site's reverse proxy.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod leaderboard;
pub mod state;

use std::time::Duration;

use axum::{
  routing::{get, post, put},
  Router,
};
use chrono::Utc;
use score_engine::Projector;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, warn};

pub use config::Config;
pub use state::AppState;

pub fn router(state: AppState) -> Router {
  Router::new()
    .route("/health", get(handlers::health))
    .route("/api/github/webhook", post(handlers::webhook::github))
    .route("/api/admin/auth", post(handlers::admin::login))
    .route("/api/admin/pending-scores", get(handlers::admin::pending_scores))
    .route("/api/admin/approve-score", post(handlers::admin::approve_score))
    .route("/api/admin/reject-score", post(handlers::admin::reject_score))
    .route("/api/admin/recompute-ranks", post(handlers::admin::recompute_ranks))
    .route(
      "/api/admin/teams",
      get(handlers::admin::list_teams)
        .post(handlers::admin::create_team)
        .put(handlers::admin::update_team),
    )
    .route("/api/admin/leaderboard", put(handlers::admin::publish_boards))
    .route("/api/admin/leaderboard/team", put(handlers::admin::update_ledger_team))
    .route("/api/teams/auth", post(handlers::teams::login))
    .route("/api/teams/data", get(handlers::teams::data))
    .route("/api/leaderboard", get(handlers::leaderboard::all))
    .route("/api/leaderboard/teams", get(handlers::leaderboard::teams))
    .route("/api/leaderboard/individuals", get(handlers::leaderboard::individuals))
    .route("/api/leaderboard/domains", get(handlers::leaderboard::domains))
    .route("/api/leaderboard/less-ai", get(handlers::leaderboard::less_ai))
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive())
    .with_state(state)
}

/// Retry outstanding tally/weekly projections forever.
pub async fn projection_loop(projector: Projector, every: Duration) {
  let mut ticker = tokio::time::interval(every);
  ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
  loop {
    ticker.tick().await;
    match projector.drain(Utc::now()).await {
      Ok(report) if report.events_seen == 0 => {}
      Ok(report) if report.is_clean() => {
        debug!(events = report.events_seen, "caught up approval projections");
      }
      Ok(report) => {
        warn!(events = report.events_seen, failures = ?report.failures, "projection pass incomplete");
      }
      Err(e) => warn!(error = %e, "projection pass could not read approval log"),
    }
  }
}

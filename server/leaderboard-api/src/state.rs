//! Shared handler state.

use std::path::PathBuf;
use std::sync::Arc;

use score_engine::{Intake, ReviewGate, ScoreStore, TeamDirectory};

use crate::auth::SessionSigner;
use crate::config::Config;
use crate::leaderboard::BoardStore;

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
  pub store: Arc<dyn ScoreStore>,
  pub directory: Arc<dyn TeamDirectory>,
  pub boards: Arc<dyn BoardStore>,
  pub intake: Intake,
  pub gate: ReviewGate,
  pub sessions: SessionSigner,
  pub webhook_secret: Option<String>,
  pub admin_password: String,
  pub snapshot_path: PathBuf,
}

impl AppState {
  pub fn new(
    store: Arc<dyn ScoreStore>,
    directory: Arc<dyn TeamDirectory>,
    boards: Arc<dyn BoardStore>,
    config: &Config,
  ) -> Self {
    Self {
      intake: Intake::new(store.clone(), directory.clone(), config.engine.clone()),
      gate: ReviewGate::new(store.clone(), &config.engine),
      sessions: SessionSigner::new(&config.session_secret, config.session_ttl),
      webhook_secret: config.webhook_secret.clone(),
      admin_password: config.admin_password.clone(),
      snapshot_path: config.snapshot_path.clone(),
      store,
      directory,
      boards,
    }
  }
}

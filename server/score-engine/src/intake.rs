//! Webhook intake: normalize, resolve the owning team, queue for review.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::error::ScoreError;
use crate::normalize;
use crate::store::{ScoreStore, TeamDirectory};
use crate::types::*;

#[derive(Debug, Clone, PartialEq)]
pub enum IntakeOutcome {
  /// A pending score awaits admin review.
  Queued(PendingScore),
  /// The event earns no points.
  Ignored,
  /// Delivery id already produced this score (only with dedupe enabled).
  Duplicate(Uuid),
}

#[derive(Clone)]
pub struct Intake {
  store: Arc<dyn ScoreStore>,
  directory: Arc<dyn TeamDirectory>,
  config: Config,
}

impl Intake {
  pub fn new(store: Arc<dyn ScoreStore>, directory: Arc<dyn TeamDirectory>, config: Config) -> Self {
    Self {
      store,
      directory,
      config,
    }
  }

  pub async fn ingest(
    &self,
    kind: &EventKind,
    payload: &WebhookPayload,
    delivery_id: Option<&str>,
  ) -> Result<IntakeOutcome, ScoreError> {
    self.ingest_at(kind, payload, delivery_id, Utc::now()).await
  }

  pub async fn ingest_at(
    &self,
    kind: &EventKind,
    payload: &WebhookPayload,
    delivery_id: Option<&str>,
    now: DateTime<Utc>,
  ) -> Result<IntakeOutcome, ScoreError> {
    let Some(mut candidate) = normalize::normalize(kind, payload, &self.config.points)? else {
      return Ok(IntakeOutcome::Ignored);
    };

    if self.config.dedupe_deliveries {
      if let Some(id) = delivery_id {
        let seen = self
          .store
          .find_by_delivery(id)
          .await
          .map_err(ScoreError::store("pending_scores"))?;
        if let Some(existing) = seen {
          info!(delivery = id, score = %existing.id, "duplicate delivery ignored");
          return Ok(IntakeOutcome::Duplicate(existing.id));
        }
      }
    }

    if let Some(repo) = candidate.repository_name.as_deref() {
      let bound = self
        .directory
        .team_for_repository(repo)
        .await
        .map_err(ScoreError::store("teams"))?;
      match bound {
        Some(team) if !team.is_active => {
          info!(repository = repo, team = %team.team_name, "repository bound to inactive team, event ignored");
          return Ok(IntakeOutcome::Ignored);
        }
        Some(team) => candidate.team_name = team.team_name,
        None => {}
      }
    }

    let row = self.enqueue(candidate, delivery_id, now).await?;
    Ok(IntakeOutcome::Queued(row))
  }

  /// Append a candidate to the review queue as `pending`.
  pub async fn enqueue(
    &self,
    candidate: AwardCandidate,
    delivery_id: Option<&str>,
    now: DateTime<Utc>,
  ) -> Result<PendingScore, ScoreError> {
    if candidate.team_name.trim().is_empty() {
      return Err(ScoreError::validation("teamName", "must not be empty"));
    }
    if candidate.points <= 0 {
      return Err(ScoreError::validation("points", "must be positive"));
    }

    let new = NewPendingScore {
      candidate,
      delivery_id: delivery_id.map(str::to_string),
      created_at: now,
    };
    let row = self
      .store
      .insert_pending(&new)
      .await
      .map_err(ScoreError::store("pending_scores"))?;
    info!(
      team = %row.team_name,
      points = row.points,
      activity = row.activity_type.as_str(),
      score = %row.id,
      "created pending score"
    );
    Ok(row)
  }

  /// Review queue: pending scores, newest first.
  pub async fn list_pending(&self) -> Result<Vec<PendingScore>, ScoreError> {
    self
      .store
      .list_pending()
      .await
      .map_err(ScoreError::store("pending_scores"))
  }
}

//! Review gate: the only path from a pending score to the ledger.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::ScoreError;
use crate::projection::{ProjectionReport, Projector};
use crate::rank;
use crate::store::ScoreStore;
use crate::types::{LedgerDefaults, RankAssignment};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalOutcome {
  pub score_id: Uuid,
  pub team_name: String,
  pub points_awarded: i64,
  pub new_total: i64,
  pub rank: i32,
  /// `None` when the projection pass could not read the approval log.
  pub projection: Option<ProjectionReport>,
}

impl ApprovalOutcome {
  pub fn message(&self) -> String {
    format!("Approved {} points for {}", self.points_awarded, self.team_name)
  }
}

/// Parse an admin-supplied score id. Missing is a validation error; an id
/// that cannot exist is reported as not found.
pub fn parse_score_id(raw: Option<&str>) -> Result<Uuid, ScoreError> {
  let raw = raw
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .ok_or_else(|| ScoreError::validation("scoreId", "Score ID is required"))?;
  Uuid::parse_str(raw).map_err(|_| ScoreError::NotFound(raw.to_string()))
}

#[derive(Clone)]
pub struct ReviewGate {
  store: Arc<dyn ScoreStore>,
  projector: Projector,
  defaults: LedgerDefaults,
}

impl ReviewGate {
  pub fn new(store: Arc<dyn ScoreStore>, config: &Config) -> Self {
    Self {
      projector: Projector::new(store.clone(), config.projection_batch_size),
      store,
      defaults: LedgerDefaults {
        domain: config.default_domain.clone(),
        project: config.default_project.clone(),
      },
    }
  }

  pub fn projector(&self) -> &Projector {
    &self.projector
  }

  pub async fn approve(&self, id: Uuid) -> Result<ApprovalOutcome, ScoreError> {
    self.approve_at(id, Utc::now()).await
  }

  /// Approve a pending score.
  ///
  /// The ledger increment, re-rank, status change and approval event commit
  /// together; on error nothing changed and the score is still pending.
  /// Tally and weekly projections follow and cannot fail the approval.
  pub async fn approve_at(&self, id: Uuid, now: DateTime<Utc>) -> Result<ApprovalOutcome, ScoreError> {
    let committed = self
      .store
      .commit_approval(id, now, &self.defaults, rank::assign)
      .await
      .map_err(ScoreError::store_in("ledger"))?
      .ok_or_else(|| ScoreError::NotFound(id.to_string()))?;

    let event = &committed.event;
    info!(
      team = %event.team_name,
      points = event.points,
      total = committed.ledger.points,
      rank = committed.ledger.rank,
      score = %id,
      "approved score"
    );

    let projection = match self.projector.drain(now).await {
      Ok(report) => {
        if !report.is_clean() {
          warn!(score = %id, failures = ?report.failures, "approval recorded with partial enrichment failure");
        }
        Some(report)
      }
      Err(e) => {
        warn!(score = %id, error = %e, "approval recorded, projection deferred");
        None
      }
    };

    Ok(ApprovalOutcome {
      score_id: id,
      team_name: event.team_name.clone(),
      points_awarded: event.points,
      new_total: committed.ledger.points,
      rank: committed.ledger.rank,
      projection,
    })
  }

  pub async fn reject(&self, id: Uuid) -> Result<(), ScoreError> {
    self.reject_at(id, Utc::now()).await
  }

  /// Reject a pending score. Rejecting anything not currently pending is
  /// `NotFound`.
  pub async fn reject_at(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), ScoreError> {
    let rejected = self
      .store
      .reject_pending(id, now)
      .await
      .map_err(ScoreError::store("pending_scores"))?;
    if !rejected {
      return Err(ScoreError::NotFound(id.to_string()));
    }
    info!(score = %id, "rejected score");
    Ok(())
  }

  /// Rewrite every rank from the current ledger.
  pub async fn recompute_ranks(&self) -> Result<Vec<RankAssignment>, ScoreError> {
    rank::recompute_ranks(self.store.as_ref()).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_score_id_requires_value() {
    assert!(matches!(
      parse_score_id(None),
      Err(ScoreError::Validation { .. })
    ));
    assert!(matches!(
      parse_score_id(Some("  ")),
      Err(ScoreError::Validation { .. })
    ));
  }

  #[test]
  fn parse_score_id_unknown_shape_is_not_found() {
    assert!(matches!(
      parse_score_id(Some("42")),
      Err(ScoreError::NotFound(_))
    ));
    let id = Uuid::new_v4();
    assert_eq!(parse_score_id(Some(&id.to_string())).unwrap(), id);
  }

  #[test]
  fn outcome_message_matches_admin_toast() {
    let outcome = ApprovalOutcome {
      score_id: Uuid::nil(),
      team_name: "alpha".into(),
      points_awarded: 6,
      new_total: 16,
      rank: 1,
      projection: None,
    };
    assert_eq!(outcome.message(), "Approved 6 points for alpha");
  }
}

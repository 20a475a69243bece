//! Activity tally and weekly aggregate projections of the approval log.
//!
//! Approval events are appended by the review gate in the same storage
//! command as the ledger change. The projector folds them into the two
//! enrichment tables; each (event, table) pair is applied exactly once, so a
//! failed pass can simply be retried.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ScoreError;
use crate::store::ScoreStore;
use crate::types::ApprovalEvent;
use crate::week;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectionReport {
  pub events_seen: usize,
  pub tallies_applied: usize,
  pub weekly_applied: usize,
  /// `step: error` for every projection that failed this pass.
  pub failures: Vec<String>,
}

impl ProjectionReport {
  pub fn is_clean(&self) -> bool {
    self.failures.is_empty()
  }
}

#[derive(Clone)]
pub struct Projector {
  store: Arc<dyn ScoreStore>,
  batch_size: usize,
}

impl Projector {
  pub fn new(store: Arc<dyn ScoreStore>, batch_size: usize) -> Self {
    Self {
      store,
      batch_size: batch_size.max(1),
    }
  }

  /// Apply every outstanding projection once.
  ///
  /// Per-event failures are logged and reported, never raised; only a failure
  /// to read the log itself is an error.
  pub async fn drain(&self, now: DateTime<Utc>) -> Result<ProjectionReport, ScoreError> {
    let events = self
      .store
      .unprojected_events(self.batch_size)
      .await
      .map_err(ScoreError::store("outbox"))?;

    let mut report = ProjectionReport {
      events_seen: events.len(),
      ..Default::default()
    };
    for event in &events {
      self.apply(event, now, &mut report).await;
    }
    if !events.is_empty() {
      debug!(
        events = report.events_seen,
        tallies = report.tallies_applied,
        weekly = report.weekly_applied,
        failures = report.failures.len(),
        "projection pass finished"
      );
    }
    Ok(report)
  }

  async fn apply(&self, event: &ApprovalEvent, now: DateTime<Utc>, report: &mut ProjectionReport) {
    if !event.tally_projected {
      match self.store.project_tally(event, now).await {
        Ok(true) => report.tallies_applied += 1,
        Ok(false) => {}
        Err(e) => {
          warn!(seq = event.seq, team = %event.team_name, error = %e, "team_activities update failed");
          report.failures.push(format!("tally: {}", e));
        }
      }
    }

    if !event.weekly_projected {
      // Weeks follow the approval instant, not the original activity time.
      let window = week::week_window(event.approved_at);
      match self.store.project_weekly(event, window, now).await {
        Ok(true) => report.weekly_applied += 1,
        Ok(false) => {}
        Err(e) => {
          warn!(seq = event.seq, team = %event.team_name, error = %e, "weekly_scores update failed");
          report.failures.push(format!("weekly: {}", e));
        }
      }
    }
  }
}

//! Engine configuration with sane defaults.

/// Points awarded per qualifying GitHub activity.
#[derive(Debug, Clone)]
pub struct PointsTable {
  /// Per commit in a push.
  pub commit: i64,
  pub pull_request_opened: i64,
  pub pull_request_merged: i64,
  pub issue_opened: i64,
  pub issue_closed: i64,
  /// Completed workflow run with `conclusion == "success"`.
  pub workflow_success: i64,
}

impl Default for PointsTable {
  fn default() -> Self {
    Self {
      commit: 2,
      pull_request_opened: 5,
      pull_request_merged: 10,
      issue_opened: 3,
      issue_closed: 5,
      workflow_success: 8,
    }
  }
}

#[derive(Debug, Clone)]
pub struct Config {
  pub points: PointsTable,
  /// Domain written when a team first enters the ledger.
  pub default_domain: String,
  /// Project written when a team first enters the ledger.
  pub default_project: String,
  /// Drop a webhook whose delivery id already produced a pending score.
  pub dedupe_deliveries: bool,
  /// Max approval events drained per projector pass.
  pub projection_batch_size: usize,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      points: PointsTable::default(),
      default_domain: "General".into(),
      default_project: "Active Project".into(),
      dedupe_deliveries: false,
      projection_batch_size: 100,
    }
  }
}

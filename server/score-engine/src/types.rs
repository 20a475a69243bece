//! Core types for the score engine (webhook JSON contracts + stored records).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Inbound types (JSON contract: what GitHub sends)
// ---------------------------------------------------------------------------

/// GitHub webhook body. Only the fields the point table reads are modelled;
/// unknown fields are silently ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
  #[serde(default)]
  pub action: Option<String>,
  #[serde(default)]
  pub repository: Option<InboundRepository>,
  #[serde(rename = "ref", default)]
  pub git_ref: Option<String>,
  #[serde(default)]
  pub compare: Option<String>,
  #[serde(default)]
  pub commits: Option<Vec<serde_json::Value>>,
  #[serde(default)]
  pub pull_request: Option<InboundPullRequest>,
  #[serde(default)]
  pub issue: Option<InboundIssue>,
  #[serde(default)]
  pub workflow_run: Option<InboundWorkflowRun>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundRepository {
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub html_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundPullRequest {
  #[serde(default)]
  pub title: Option<String>,
  #[serde(default)]
  pub html_url: Option<String>,
  #[serde(default)]
  pub merged: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundIssue {
  #[serde(default)]
  pub title: Option<String>,
  #[serde(default)]
  pub html_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundWorkflowRun {
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub html_url: Option<String>,
  #[serde(default)]
  pub conclusion: Option<String>,
}

/// Event kind carried in the `X-GitHub-Event` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
  Push,
  PullRequest,
  Issues,
  WorkflowRun,
  Other(String),
}

impl EventKind {
  pub fn from_header(s: &str) -> Self {
    match s.trim() {
      "push" => Self::Push,
      "pull_request" => Self::PullRequest,
      "issues" => Self::Issues,
      "workflow_run" => Self::WorkflowRun,
      other => Self::Other(other.to_string()),
    }
  }

  pub fn as_str(&self) -> &str {
    match self {
      Self::Push => "push",
      Self::PullRequest => "pull_request",
      Self::Issues => "issues",
      Self::WorkflowRun => "workflow_run",
      Self::Other(s) => s,
    }
  }
}

// ---------------------------------------------------------------------------
// Enums (normalized)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
  Commit,
  PullRequest,
  Issue,
  Workflow,
  Test,
}

impl ActivityType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Commit => "commit",
      Self::PullRequest => "pull_request",
      Self::Issue => "issue",
      Self::Workflow => "workflow",
      Self::Test => "test",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "commit" => Some(Self::Commit),
      "pull_request" => Some(Self::PullRequest),
      "issue" => Some(Self::Issue),
      "workflow" => Some(Self::Workflow),
      "test" => Some(Self::Test),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreStatus {
  Pending,
  Approved,
  Rejected,
}

impl ScoreStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Approved => "approved",
      Self::Rejected => "rejected",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "pending" => Some(Self::Pending),
      "approved" => Some(Self::Approved),
      "rejected" => Some(Self::Rejected),
      _ => None,
    }
  }
}

// ---------------------------------------------------------------------------
// Pipeline records
// ---------------------------------------------------------------------------

/// Output of the normalizer: a scored activity awaiting persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwardCandidate {
  pub team_name: String,
  pub repository_name: Option<String>,
  pub activity_type: ActivityType,
  pub points: i64,
  pub description: String,
  pub reference_url: Option<String>,
}

/// Insert shape for the pending queue; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewPendingScore {
  pub candidate: AwardCandidate,
  pub delivery_id: Option<String>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingScore {
  pub id: Uuid,
  pub team_name: String,
  pub repository_name: Option<String>,
  pub activity_type: ActivityType,
  pub points: i64,
  pub description: String,
  pub reference_url: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub delivery_id: Option<String>,
  pub status: ScoreStatus,
  pub created_at: DateTime<Utc>,
  pub approved_at: Option<DateTime<Utc>>,
  pub rejected_at: Option<DateTime<Utc>>,
}

impl PendingScore {
  pub fn from_new(id: Uuid, new: &NewPendingScore) -> Self {
    let c = &new.candidate;
    Self {
      id,
      team_name: c.team_name.clone(),
      repository_name: c.repository_name.clone(),
      activity_type: c.activity_type,
      points: c.points,
      description: c.description.clone(),
      reference_url: c.reference_url.clone(),
      delivery_id: new.delivery_id.clone(),
      status: ScoreStatus::Pending,
      created_at: new.created_at,
      approved_at: None,
      rejected_at: None,
    }
  }
}

/// One row of the authoritative per-team ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
  pub team_name: String,
  pub points: i64,
  pub domain: String,
  pub project: String,
  pub rank: i32,
}

/// Domain/project written when a team's ledger entry is first created.
#[derive(Debug, Clone)]
pub struct LedgerDefaults {
  pub domain: String,
  pub project: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankAssignment {
  pub team_name: String,
  pub rank: i32,
}

/// Ranking function handed to the store so ranks are computed in one place.
pub type Ranker = fn(&[LedgerEntry]) -> Vec<RankAssignment>;

/// Outbox record appended by every committed approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalEvent {
  pub seq: i64,
  pub score_id: Uuid,
  pub team_name: String,
  /// Empty when the pending score carried no repository.
  pub repository_name: String,
  pub activity_type: ActivityType,
  pub points: i64,
  pub approved_at: DateTime<Utc>,
  pub tally_projected: bool,
  pub weekly_projected: bool,
}

/// Result of the atomic approval command.
#[derive(Debug, Clone)]
pub struct CommittedApproval {
  pub event: ApprovalEvent,
  pub ledger: LedgerEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityTally {
  pub team_name: String,
  pub repository_name: String,
  pub activity_type: ActivityType,
  pub count: i64,
  pub last_updated: DateTime<Utc>,
}

/// Sunday-aligned seven day window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekWindow {
  pub start: NaiveDate,
  pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyAggregate {
  pub team_name: String,
  pub repository_name: String,
  pub week_start: NaiveDate,
  pub week_end: NaiveDate,
  pub points: i64,
  pub activities: i64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Team directory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
  pub id: Uuid,
  pub team_name: String,
  #[serde(skip_serializing)]
  pub password_hash: String,
  pub is_active: bool,
  pub repository_name: Option<String>,
  pub repository_url: Option<String>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTeam {
  pub team_name: String,
  pub password_hash: String,
  pub repository_name: Option<String>,
  pub repository_url: Option<String>,
  pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn event_kind_from_header() {
    assert_eq!(EventKind::from_header("push"), EventKind::Push);
    assert_eq!(EventKind::from_header("workflow_run"), EventKind::WorkflowRun);
    assert_eq!(
      EventKind::from_header("ping"),
      EventKind::Other("ping".into())
    );
  }

  #[test]
  fn activity_type_names_match_stored_values() {
    for t in [
      ActivityType::Commit,
      ActivityType::PullRequest,
      ActivityType::Issue,
      ActivityType::Workflow,
      ActivityType::Test,
    ] {
      assert_eq!(ActivityType::parse(t.as_str()), Some(t));
      let json = serde_json::to_string(&t).unwrap();
      assert_eq!(json, format!("\"{}\"", t.as_str()));
    }
  }

  #[test]
  fn payload_ignores_unknown_fields() {
    let raw = r#"{"action":"opened","sender":{"login":"x"},"repository":{"name":"alpha","private":false}}"#;
    let p: WebhookPayload = serde_json::from_str(raw).unwrap();
    assert_eq!(p.action.as_deref(), Some("opened"));
    assert_eq!(p.repository.unwrap().name.as_deref(), Some("alpha"));
  }
}

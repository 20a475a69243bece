//! Storage abstraction for the scoring pipeline.
//!
//! The engine treats the datastore purely as storage: ranking, windowing and
//! projection logic live in this crate. Every method is one storage command;
//! the ones documented as atomic must be all-or-nothing in the backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::types::*;

#[async_trait]
pub trait ScoreStore: Send + Sync {
  /// Append a new pending score. Never deduplicates.
  async fn insert_pending(&self, score: &NewPendingScore) -> Result<PendingScore, StoreError>;

  /// All `pending` scores, newest first.
  async fn list_pending(&self) -> Result<Vec<PendingScore>, StoreError>;

  /// Any score created from this webhook delivery, whatever its status.
  async fn find_by_delivery(&self, delivery_id: &str) -> Result<Option<PendingScore>, StoreError>;

  /// Move a `pending` score to `rejected`. Returns false when the score is
  /// missing or no longer pending.
  async fn reject_pending(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError>;

  /// Atomically: claim the `pending` score as approved, add its points to the
  /// team's ledger entry (creating it with `defaults` if absent), rewrite every
  /// rank using `ranker`, and append an approval event.
  ///
  /// Returns `None` when the score is missing or no longer pending.
  async fn commit_approval(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
    defaults: &LedgerDefaults,
    ranker: Ranker,
  ) -> Result<Option<CommittedApproval>, StoreError>;

  /// Ledger ordered by points descending, then team name.
  async fn ledger(&self) -> Result<Vec<LedgerEntry>, StoreError>;

  async fn ledger_entry(&self, team_name: &str) -> Result<Option<LedgerEntry>, StoreError>;

  /// Curate a team's domain and/or project. `None` leaves the field as is.
  /// Returns `None` when the team has no ledger entry.
  async fn set_ledger_details(
    &self,
    team_name: &str,
    domain: Option<&str>,
    project: Option<&str>,
  ) -> Result<Option<LedgerEntry>, StoreError>;

  /// Overwrite ranks for the listed teams.
  async fn write_ranks(&self, ranks: &[RankAssignment]) -> Result<(), StoreError>;

  /// Approval events with at least one projection outstanding, oldest first.
  async fn unprojected_events(&self, limit: usize) -> Result<Vec<ApprovalEvent>, StoreError>;

  /// Atomically increment the tally for the event's (team, repository,
  /// activity) triple and mark the event tally-projected. Returns false if the
  /// event had already been projected.
  async fn project_tally(&self, event: &ApprovalEvent, at: DateTime<Utc>) -> Result<bool, StoreError>;

  /// Atomically add the event to its weekly aggregate row and mark the event
  /// weekly-projected. Returns false if already projected.
  async fn project_weekly(
    &self,
    event: &ApprovalEvent,
    window: WeekWindow,
    at: DateTime<Utc>,
  ) -> Result<bool, StoreError>;

  async fn tallies_for(&self, team_name: &str) -> Result<Vec<ActivityTally>, StoreError>;

  /// Weekly rows for a team, most recent week first.
  async fn weekly_for(&self, team_name: &str) -> Result<Vec<WeeklyAggregate>, StoreError>;
}

/// Team identity and repository bindings.
#[async_trait]
pub trait TeamDirectory: Send + Sync {
  /// Team bound to a repository name. An active binding wins over an
  /// inactive one; callers decide what an inactive binding means.
  async fn team_for_repository(&self, repository_name: &str) -> Result<Option<Team>, StoreError>;

  async fn find_team(&self, team_name: &str) -> Result<Option<Team>, StoreError>;

  /// All teams, newest first.
  async fn list_teams(&self) -> Result<Vec<Team>, StoreError>;

  /// Fails with `StoreError::Conflict` when the name is taken.
  async fn create_team(&self, team: &NewTeam) -> Result<Team, StoreError>;

  async fn set_team_active(&self, team_name: &str, active: bool) -> Result<Option<Team>, StoreError>;
}

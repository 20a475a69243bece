//! In-memory implementation of `ScoreStore` and `TeamDirectory`.
//!
//! All state lives behind one `RwLock`, so every trait method is atomic.
//! State is lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::rank;
use crate::store::{ScoreStore, TeamDirectory};
use crate::types::*;

type TallyKey = (String, String, ActivityType);
type WeekKey = (String, String, NaiveDate);

#[derive(Default)]
struct State {
  pending: Vec<PendingScore>,
  ledger: HashMap<String, LedgerEntry>,
  events: Vec<ApprovalEvent>,
  tallies: HashMap<TallyKey, ActivityTally>,
  weekly: HashMap<WeekKey, WeeklyAggregate>,
  teams: Vec<Team>,
}

#[derive(Default)]
pub struct InMemoryStore {
  state: RwLock<State>,
}

impl InMemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Seed or overwrite a ledger entry.
  pub async fn put_ledger_entry(&self, entry: LedgerEntry) {
    let mut state = self.state.write().await;
    state.ledger.insert(entry.team_name.clone(), entry);
  }

  /// Any score by id, regardless of status.
  pub async fn score(&self, id: Uuid) -> Option<PendingScore> {
    let state = self.state.read().await;
    state.pending.iter().find(|p| p.id == id).cloned()
  }
}

fn sorted_ledger(state: &State) -> Vec<LedgerEntry> {
  let mut entries: Vec<LedgerEntry> = state.ledger.values().cloned().collect();
  entries.sort_by(rank::compare);
  entries
}

#[async_trait]
impl ScoreStore for InMemoryStore {
  async fn insert_pending(&self, score: &NewPendingScore) -> Result<PendingScore, StoreError> {
    let mut state = self.state.write().await;
    let row = PendingScore::from_new(Uuid::new_v4(), score);
    state.pending.push(row.clone());
    Ok(row)
  }

  async fn list_pending(&self) -> Result<Vec<PendingScore>, StoreError> {
    let state = self.state.read().await;
    let mut rows: Vec<PendingScore> = state
      .pending
      .iter()
      .filter(|p| p.status == ScoreStatus::Pending)
      .cloned()
      .collect();
    // Stable sort keeps insertion order reversed for equal timestamps.
    rows.reverse();
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(rows)
  }

  async fn find_by_delivery(&self, delivery_id: &str) -> Result<Option<PendingScore>, StoreError> {
    let state = self.state.read().await;
    Ok(
      state
        .pending
        .iter()
        .find(|p| p.delivery_id.as_deref() == Some(delivery_id))
        .cloned(),
    )
  }

  async fn reject_pending(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
    let mut state = self.state.write().await;
    match state
      .pending
      .iter_mut()
      .find(|p| p.id == id && p.status == ScoreStatus::Pending)
    {
      Some(row) => {
        row.status = ScoreStatus::Rejected;
        row.rejected_at = Some(at);
        Ok(true)
      }
      None => Ok(false),
    }
  }

  async fn commit_approval(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
    defaults: &LedgerDefaults,
    ranker: Ranker,
  ) -> Result<Option<CommittedApproval>, StoreError> {
    let mut guard = self.state.write().await;
    let state = &mut *guard;

    let Some(row) = state
      .pending
      .iter_mut()
      .find(|p| p.id == id && p.status == ScoreStatus::Pending)
    else {
      return Ok(None);
    };
    row.status = ScoreStatus::Approved;
    row.approved_at = Some(at);
    let row = row.clone();

    let entry = state
      .ledger
      .entry(row.team_name.clone())
      .or_insert_with(|| LedgerEntry {
        team_name: row.team_name.clone(),
        points: 0,
        domain: defaults.domain.clone(),
        project: defaults.project.clone(),
        rank: 0,
      });
    entry.points += row.points;

    for assignment in ranker(&sorted_ledger(state)) {
      if let Some(e) = state.ledger.get_mut(&assignment.team_name) {
        e.rank = assignment.rank;
      }
    }

    let event = ApprovalEvent {
      seq: state.events.len() as i64 + 1,
      score_id: row.id,
      team_name: row.team_name.clone(),
      repository_name: row.repository_name.clone().unwrap_or_default(),
      activity_type: row.activity_type,
      points: row.points,
      approved_at: at,
      tally_projected: false,
      weekly_projected: false,
    };
    state.events.push(event.clone());

    let ledger = state
      .ledger
      .get(&row.team_name)
      .cloned()
      .ok_or_else(|| StoreError::corrupt("leaderboard_teams", "entry vanished during approval"))?;
    Ok(Some(CommittedApproval { event, ledger }))
  }

  async fn ledger(&self) -> Result<Vec<LedgerEntry>, StoreError> {
    let state = self.state.read().await;
    Ok(sorted_ledger(&state))
  }

  async fn ledger_entry(&self, team_name: &str) -> Result<Option<LedgerEntry>, StoreError> {
    let state = self.state.read().await;
    Ok(state.ledger.get(team_name).cloned())
  }

  async fn set_ledger_details(
    &self,
    team_name: &str,
    domain: Option<&str>,
    project: Option<&str>,
  ) -> Result<Option<LedgerEntry>, StoreError> {
    let mut state = self.state.write().await;
    let Some(entry) = state.ledger.get_mut(team_name) else {
      return Ok(None);
    };
    if let Some(domain) = domain {
      entry.domain = domain.to_string();
    }
    if let Some(project) = project {
      entry.project = project.to_string();
    }
    Ok(Some(entry.clone()))
  }

  async fn write_ranks(&self, ranks: &[RankAssignment]) -> Result<(), StoreError> {
    let mut state = self.state.write().await;
    for r in ranks {
      if let Some(e) = state.ledger.get_mut(&r.team_name) {
        e.rank = r.rank;
      }
    }
    Ok(())
  }

  async fn unprojected_events(&self, limit: usize) -> Result<Vec<ApprovalEvent>, StoreError> {
    let state = self.state.read().await;
    Ok(
      state
        .events
        .iter()
        .filter(|e| !e.tally_projected || !e.weekly_projected)
        .take(limit)
        .cloned()
        .collect(),
    )
  }

  async fn project_tally(&self, event: &ApprovalEvent, at: DateTime<Utc>) -> Result<bool, StoreError> {
    let mut guard = self.state.write().await;
    let state = &mut *guard;
    let Some(stored) = state.events.iter_mut().find(|e| e.seq == event.seq) else {
      return Err(StoreError::corrupt("approval_events", format!("unknown seq {}", event.seq)));
    };
    if stored.tally_projected {
      return Ok(false);
    }
    stored.tally_projected = true;

    let key = (
      event.team_name.clone(),
      event.repository_name.clone(),
      event.activity_type,
    );
    let tally = state.tallies.entry(key).or_insert_with(|| ActivityTally {
      team_name: event.team_name.clone(),
      repository_name: event.repository_name.clone(),
      activity_type: event.activity_type,
      count: 0,
      last_updated: at,
    });
    tally.count += 1;
    tally.last_updated = at;
    Ok(true)
  }

  async fn project_weekly(
    &self,
    event: &ApprovalEvent,
    window: WeekWindow,
    at: DateTime<Utc>,
  ) -> Result<bool, StoreError> {
    let mut guard = self.state.write().await;
    let state = &mut *guard;
    let Some(stored) = state.events.iter_mut().find(|e| e.seq == event.seq) else {
      return Err(StoreError::corrupt("approval_events", format!("unknown seq {}", event.seq)));
    };
    if stored.weekly_projected {
      return Ok(false);
    }
    stored.weekly_projected = true;

    let key = (
      event.team_name.clone(),
      event.repository_name.clone(),
      window.start,
    );
    let row = state.weekly.entry(key).or_insert_with(|| WeeklyAggregate {
      team_name: event.team_name.clone(),
      repository_name: event.repository_name.clone(),
      week_start: window.start,
      week_end: window.end,
      points: 0,
      activities: 0,
      created_at: at,
      updated_at: at,
    });
    row.points += event.points;
    row.activities += 1;
    row.updated_at = at;
    Ok(true)
  }

  async fn tallies_for(&self, team_name: &str) -> Result<Vec<ActivityTally>, StoreError> {
    let state = self.state.read().await;
    let mut rows: Vec<ActivityTally> = state
      .tallies
      .values()
      .filter(|t| t.team_name == team_name)
      .cloned()
      .collect();
    rows.sort_by(|a, b| {
      a.repository_name
        .cmp(&b.repository_name)
        .then(a.activity_type.cmp(&b.activity_type))
    });
    Ok(rows)
  }

  async fn weekly_for(&self, team_name: &str) -> Result<Vec<WeeklyAggregate>, StoreError> {
    let state = self.state.read().await;
    let mut rows: Vec<WeeklyAggregate> = state
      .weekly
      .values()
      .filter(|w| w.team_name == team_name)
      .cloned()
      .collect();
    rows.sort_by(|a, b| {
      b.week_start
        .cmp(&a.week_start)
        .then_with(|| a.repository_name.cmp(&b.repository_name))
    });
    Ok(rows)
  }
}

#[async_trait]
impl TeamDirectory for InMemoryStore {
  async fn team_for_repository(&self, repository_name: &str) -> Result<Option<Team>, StoreError> {
    let state = self.state.read().await;
    let mut bound = state
      .teams
      .iter()
      .filter(|t| t.repository_name.as_deref() == Some(repository_name));
    let first = bound.next();
    let active = first
      .filter(|t| t.is_active)
      .or_else(|| bound.find(|t| t.is_active));
    Ok(active.or(first).cloned())
  }

  async fn find_team(&self, team_name: &str) -> Result<Option<Team>, StoreError> {
    let state = self.state.read().await;
    Ok(state.teams.iter().find(|t| t.team_name == team_name).cloned())
  }

  async fn list_teams(&self) -> Result<Vec<Team>, StoreError> {
    let state = self.state.read().await;
    let mut teams = state.teams.clone();
    teams.reverse();
    teams.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(teams)
  }

  async fn create_team(&self, team: &NewTeam) -> Result<Team, StoreError> {
    let mut state = self.state.write().await;
    if state.teams.iter().any(|t| t.team_name == team.team_name) {
      return Err(StoreError::Conflict(format!(
        "team {} already exists",
        team.team_name
      )));
    }
    let row = Team {
      id: Uuid::new_v4(),
      team_name: team.team_name.clone(),
      password_hash: team.password_hash.clone(),
      is_active: true,
      repository_name: team.repository_name.clone(),
      repository_url: team.repository_url.clone(),
      created_at: team.created_at,
    };
    state.teams.push(row.clone());
    Ok(row)
  }

  async fn set_team_active(&self, team_name: &str, active: bool) -> Result<Option<Team>, StoreError> {
    let mut state = self.state.write().await;
    Ok(
      state
        .teams
        .iter_mut()
        .find(|t| t.team_name == team_name)
        .map(|t| {
          t.is_active = active;
          t.clone()
        }),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn new_score(team: &str, points: i64, minute: u32) -> NewPendingScore {
    NewPendingScore {
      candidate: AwardCandidate {
        team_name: team.into(),
        repository_name: Some(team.into()),
        activity_type: ActivityType::Commit,
        points,
        description: "d".into(),
        reference_url: None,
      },
      delivery_id: None,
      created_at: Utc.with_ymd_and_hms(2025, 1, 15, 10, minute, 0).unwrap(),
    }
  }

  #[tokio::test]
  async fn list_pending_is_newest_first() {
    let store = InMemoryStore::new();
    let a = store.insert_pending(&new_score("a", 2, 0)).await.unwrap();
    let b = store.insert_pending(&new_score("b", 2, 5)).await.unwrap();
    let ids: Vec<Uuid> = store.list_pending().await.unwrap().iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![b.id, a.id]);
  }

  #[tokio::test]
  async fn commit_keeps_existing_domain_and_project() {
    let store = InMemoryStore::new();
    store
      .put_ledger_entry(LedgerEntry {
        team_name: "a".into(),
        points: 4,
        domain: "Web".into(),
        project: "Club site".into(),
        rank: 1,
      })
      .await;
    let p = store.insert_pending(&new_score("a", 6, 0)).await.unwrap();
    let defaults = LedgerDefaults {
      domain: "General".into(),
      project: "Active Project".into(),
    };
    let done = store
      .commit_approval(p.id, Utc::now(), &defaults, rank::assign)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(done.ledger.points, 10);
    assert_eq!(done.ledger.domain, "Web");
    assert_eq!(done.ledger.project, "Club site");
  }

  #[tokio::test]
  async fn duplicate_team_is_a_conflict() {
    let store = InMemoryStore::new();
    let team = NewTeam {
      team_name: "alpha".into(),
      password_hash: "x".into(),
      repository_name: None,
      repository_url: None,
      created_at: Utc::now(),
    };
    store.create_team(&team).await.unwrap();
    assert!(matches!(
      store.create_team(&team).await,
      Err(StoreError::Conflict(_))
    ));
  }
}

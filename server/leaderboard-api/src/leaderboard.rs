//! Public leaderboard views with a static snapshot fallback.

use std::path::Path;

use async_trait::async_trait;
use score_engine::types::LedgerEntry;
use score_engine::{ScoreStore, StoreError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualRow {
  pub rank: i32,
  pub name: String,
  #[serde(default)]
  pub team: Option<String>,
  #[serde(default)]
  pub domain: Option<String>,
  #[serde(default)]
  pub points: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRow {
  pub rank: i32,
  #[serde(rename = "teamName")]
  pub team_name: String,
  #[serde(default)]
  pub points: i64,
  #[serde(default)]
  pub domain: Option<String>,
  #[serde(default)]
  pub project: Option<String>,
}

impl From<LedgerEntry> for TeamRow {
  fn from(e: LedgerEntry) -> Self {
    Self {
      rank: e.rank,
      team_name: e.team_name,
      points: e.points,
      domain: Some(e.domain),
      project: Some(e.project),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainRow {
  pub rank: i32,
  pub domain: String,
  #[serde(rename = "totalPoints", default)]
  pub total_points: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessAiRow {
  pub rank: i32,
  pub name: String,
  #[serde(default)]
  pub team: Option<String>,
  #[serde(default)]
  pub points: i64,
}

/// All four views; also the on-disk snapshot format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Boards {
  #[serde(default)]
  pub individuals: Vec<IndividualRow>,
  #[serde(default)]
  pub teams: Vec<TeamRow>,
  #[serde(default)]
  pub domains: Vec<DomainRow>,
  #[serde(rename = "lessAI", default)]
  pub less_ai: Vec<LessAiRow>,
}

/// Sibling ranking tables curated outside the scoring pipeline.
#[async_trait]
pub trait BoardStore: Send + Sync {
  async fn individuals(&self) -> Result<Vec<IndividualRow>, StoreError>;
  async fn domains(&self) -> Result<Vec<DomainRow>, StoreError>;
  async fn less_ai(&self) -> Result<Vec<LessAiRow>, StoreError>;

  /// Replace the individuals, domains and less-AI tables in one step.
  /// `boards.teams` is ignored; the ledger owns team rows.
  async fn replace_boards(&self, boards: &Boards) -> Result<(), StoreError>;
}

/// Read the snapshot file; a missing or unreadable file yields empty boards.
pub async fn load_snapshot(path: &Path) -> Boards {
  let raw = match tokio::fs::read_to_string(path).await {
    Ok(raw) => raw,
    Err(e) => {
      debug!(path = %path.display(), error = %e, "no leaderboard snapshot");
      return Boards::default();
    }
  };
  match serde_json::from_str(&raw) {
    Ok(boards) => boards,
    Err(e) => {
      warn!(path = %path.display(), error = %e, "leaderboard snapshot is not valid JSON");
      Boards::default()
    }
  }
}

/// Write the snapshot atomically: a sibling temp file renamed into place.
pub async fn write_snapshot(path: &Path, boards: &Boards) -> std::io::Result<()> {
  if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
    tokio::fs::create_dir_all(dir).await?;
  }
  let json = serde_json::to_vec_pretty(boards)?;
  let tmp = path.with_extension("json.tmp");
  tokio::fs::write(&tmp, json).await?;
  tokio::fs::rename(&tmp, path).await
}

/// Resolve one view from the database, or from the snapshot when that fails.
async fn or_snapshot<T>(
  view: &'static str,
  primary: Result<Vec<T>, StoreError>,
  snapshot: &Path,
  pick: fn(Boards) -> Vec<T>,
) -> Vec<T> {
  match primary {
    Ok(rows) => rows,
    Err(e) => {
      warn!(view, error = %e, "leaderboard store unavailable, serving snapshot");
      pick(load_snapshot(snapshot).await)
    }
  }
}

pub async fn teams(store: &dyn ScoreStore, snapshot: &Path) -> Vec<TeamRow> {
  let primary = store.ledger().await.map(|entries| {
    let mut rows: Vec<TeamRow> = entries.into_iter().map(TeamRow::from).collect();
    // Entries not yet ranked (rank 0) sort after ranked ones.
    rows.sort_by_key(|r| if r.rank > 0 { r.rank } else { i32::MAX });
    rows
  });
  or_snapshot("teams", primary, snapshot, |b| b.teams).await
}

pub async fn individuals(boards: &dyn BoardStore, snapshot: &Path) -> Vec<IndividualRow> {
  or_snapshot("individuals", boards.individuals().await, snapshot, |b| b.individuals).await
}

pub async fn domains(boards: &dyn BoardStore, snapshot: &Path) -> Vec<DomainRow> {
  or_snapshot("domains", boards.domains().await, snapshot, |b| b.domains).await
}

pub async fn less_ai(boards: &dyn BoardStore, snapshot: &Path) -> Vec<LessAiRow> {
  or_snapshot("lessAI", boards.less_ai().await, snapshot, |b| b.less_ai).await
}

pub async fn all(store: &dyn ScoreStore, boards: &dyn BoardStore, snapshot: &Path) -> Boards {
  let (individuals, teams, domains, less_ai) = tokio::join!(
    individuals(boards, snapshot),
    teams(store, snapshot),
    domains(boards, snapshot),
    less_ai(boards, snapshot),
  );
  Boards {
    individuals,
    teams,
    domains,
    less_ai,
  }
}

/// Store curated boards, then refresh the snapshot with the ledger's teams.
///
/// The snapshot is written even when the ledger read fails, keeping the
/// previous snapshot's team rows.
pub async fn publish(
  store: &dyn ScoreStore,
  boards: &dyn BoardStore,
  snapshot: &Path,
  curated: Boards,
) -> Result<Boards, StoreError> {
  boards.replace_boards(&curated).await?;
  let published = Boards {
    teams: teams(store, snapshot).await,
    ..curated
  };
  if let Err(e) = write_snapshot(snapshot, &published).await {
    warn!(path = %snapshot.display(), error = %e, "failed to write leaderboard snapshot");
  }
  Ok(published)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn snapshot_format_uses_less_ai_key() {
    let raw = r#"{
      "individuals": [{"rank": 1, "name": "Asha", "team": "alpha", "domain": "Web", "points": 40}],
      "teams": [{"rank": 1, "teamName": "alpha", "points": 120}],
      "domains": [{"rank": 1, "domain": "Web", "totalPoints": 300}],
      "lessAI": [{"rank": 1, "name": "Ravi", "points": 12}]
    }"#;
    let boards: Boards = serde_json::from_str(raw).unwrap();
    assert_eq!(boards.individuals[0].name, "Asha");
    assert_eq!(boards.teams[0].team_name, "alpha");
    assert_eq!(boards.domains[0].total_points, 300);
    assert_eq!(boards.less_ai[0].name, "Ravi");

    let json = serde_json::to_value(&boards).unwrap();
    assert!(json.get("lessAI").is_some());
  }

  #[tokio::test]
  async fn written_snapshot_reads_back() {
    let dir = std::env::temp_dir().join(format!("boards-{}", uuid::Uuid::new_v4()));
    let path = dir.join("nested").join("leaderboard.json");
    let boards = Boards {
      domains: vec![DomainRow {
        rank: 1,
        domain: "Web".into(),
        total_points: 10,
      }],
      ..Boards::default()
    };
    write_snapshot(&path, &boards).await.unwrap();
    assert_eq!(load_snapshot(&path).await, boards);
    std::fs::remove_dir_all(dir).ok();
  }

  #[tokio::test]
  async fn missing_snapshot_is_empty() {
    let boards = load_snapshot(Path::new("/nonexistent/leaderboard.json")).await;
    assert_eq!(boards, Boards::default());
  }
}

//! PostgreSQL storage for the scoring pipeline, team directory and boards.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx_core::decode::Decode;
use sqlx_core::error::Error as SqlxError;
use sqlx_core::query::query;
use sqlx_core::query_scalar::query_scalar;
use sqlx_core::raw_sql::raw_sql;
use sqlx_core::row::Row;
use sqlx_core::types::Type;
use sqlx_postgres::{PgPool, PgRow, Postgres};
use uuid::Uuid;

use score_engine::types::*;
use score_engine::{ScoreStore, StoreError, TeamDirectory};

use crate::leaderboard::{BoardStore, Boards, DomainRow, IndividualRow, LessAiRow};

const SCHEMA: &str = include_str!("../schema.sql");

/// Serializes ledger commits so re-ranking never interleaves.
const LEDGER_LOCK: i64 = 7_240_115;

const PENDING_COLUMNS: &str = "id, team_name, repository_name, activity_type, points, description, \
   github_url, delivery_id, status, created_at, approved_at, rejected_at";

const LEDGER_SELECT: &str = r#"
  SELECT "teamName", points, domain, project, rank
  FROM leaderboard_teams
  ORDER BY points DESC, "teamName" ASC
"#;

const EVENT_COLUMNS: &str = "seq, score_id, team_name, repository_name, activity_type, points, approved_at, \
   tally_projected_at IS NOT NULL AS tally_projected, weekly_projected_at IS NOT NULL AS weekly_projected";

const TEAM_COLUMNS: &str =
  "id, team_name, password_hash, is_active, repository_name, repository_url, created_at";

/// Create every table the service needs if it does not exist yet.
pub async fn bootstrap(pool: &PgPool) -> Result<(), StoreError> {
  raw_sql(SCHEMA).execute(pool).await.map_err(store_err)?;
  Ok(())
}

#[derive(Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

fn store_err(e: SqlxError) -> StoreError {
  match &e {
    SqlxError::Database(db) if db.is_unique_violation() => StoreError::Conflict(db.message().to_string()),
    SqlxError::ColumnDecode { .. } | SqlxError::ColumnNotFound(_) | SqlxError::Decode(_) => {
      StoreError::corrupt("postgres", e.to_string())
    }
    _ => StoreError::unavailable(e.to_string()),
  }
}

fn in_table(table: &'static str) -> impl Fn(SqlxError) -> StoreError {
  move |e| StoreError::in_table(table, store_err(e))
}

fn col<'r, T>(row: &'r PgRow, name: &str) -> Result<T, StoreError>
where
  T: Decode<'r, Postgres> + Type<Postgres>,
{
  row.try_get(name).map_err(store_err)
}

fn activity(table: &'static str, raw: &str) -> Result<ActivityType, StoreError> {
  ActivityType::parse(raw).ok_or_else(|| StoreError::corrupt(table, format!("unknown activity_type {raw}")))
}

fn pending_from_row(row: &PgRow) -> Result<PendingScore, StoreError> {
  let status: String = col(row, "status")?;
  let activity_type: String = col(row, "activity_type")?;
  Ok(PendingScore {
    id: col(row, "id")?,
    team_name: col(row, "team_name")?,
    repository_name: col(row, "repository_name")?,
    activity_type: activity("pending_scores", &activity_type)?,
    points: col(row, "points")?,
    description: col(row, "description")?,
    reference_url: col(row, "github_url")?,
    delivery_id: col(row, "delivery_id")?,
    status: ScoreStatus::parse(&status)
      .ok_or_else(|| StoreError::corrupt("pending_scores", format!("unknown status {status}")))?,
    created_at: col(row, "created_at")?,
    approved_at: col(row, "approved_at")?,
    rejected_at: col(row, "rejected_at")?,
  })
}

fn ledger_from_row(row: &PgRow) -> Result<LedgerEntry, StoreError> {
  Ok(LedgerEntry {
    team_name: col(row, "teamName")?,
    points: col(row, "points")?,
    domain: col(row, "domain")?,
    project: col(row, "project")?,
    rank: col(row, "rank")?,
  })
}

fn event_from_row(row: &PgRow) -> Result<ApprovalEvent, StoreError> {
  let activity_type: String = col(row, "activity_type")?;
  Ok(ApprovalEvent {
    seq: col(row, "seq")?,
    score_id: col(row, "score_id")?,
    team_name: col(row, "team_name")?,
    repository_name: col(row, "repository_name")?,
    activity_type: activity("approval_events", &activity_type)?,
    points: col(row, "points")?,
    approved_at: col(row, "approved_at")?,
    tally_projected: col(row, "tally_projected")?,
    weekly_projected: col(row, "weekly_projected")?,
  })
}

fn team_from_row(row: &PgRow) -> Result<Team, StoreError> {
  Ok(Team {
    id: col(row, "id")?,
    team_name: col(row, "team_name")?,
    password_hash: col(row, "password_hash")?,
    is_active: col(row, "is_active")?,
    repository_name: col(row, "repository_name")?,
    repository_url: col(row, "repository_url")?,
    created_at: col(row, "created_at")?,
  })
}

#[async_trait]
impl ScoreStore for PgStore {
  async fn insert_pending(&self, score: &NewPendingScore) -> Result<PendingScore, StoreError> {
    let row = PendingScore::from_new(Uuid::new_v4(), score);
    query(
      r#"
      INSERT INTO pending_scores
        (id, team_name, repository_name, activity_type, points, description, github_url, delivery_id, status, created_at)
      VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', $9)
      "#,
    )
    .bind(row.id)
    .bind(&row.team_name)
    .bind(&row.repository_name)
    .bind(row.activity_type.as_str())
    .bind(row.points)
    .bind(&row.description)
    .bind(&row.reference_url)
    .bind(&row.delivery_id)
    .bind(row.created_at)
    .execute(&self.pool)
    .await
    .map_err(store_err)?;
    Ok(row)
  }

  async fn list_pending(&self) -> Result<Vec<PendingScore>, StoreError> {
    let sql = format!(
      "SELECT {PENDING_COLUMNS} FROM pending_scores WHERE status = 'pending' ORDER BY created_at DESC"
    );
    let rows = query(&sql).fetch_all(&self.pool).await.map_err(store_err)?;
    rows.iter().map(pending_from_row).collect()
  }

  async fn find_by_delivery(&self, delivery_id: &str) -> Result<Option<PendingScore>, StoreError> {
    let sql = format!("SELECT {PENDING_COLUMNS} FROM pending_scores WHERE delivery_id = $1 LIMIT 1");
    let row = query(&sql)
      .bind(delivery_id)
      .fetch_optional(&self.pool)
      .await
      .map_err(store_err)?;
    row.as_ref().map(pending_from_row).transpose()
  }

  async fn reject_pending(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
    let result = query(
      "UPDATE pending_scores SET status = 'rejected', rejected_at = $2 WHERE id = $1 AND status = 'pending'",
    )
    .bind(id)
    .bind(at)
    .execute(&self.pool)
    .await
    .map_err(store_err)?;
    Ok(result.rows_affected() == 1)
  }

  async fn commit_approval(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
    defaults: &LedgerDefaults,
    ranker: Ranker,
  ) -> Result<Option<CommittedApproval>, StoreError> {
    let mut tx = self.pool.begin().await.map_err(in_table("ledger"))?;

    query("SELECT pg_advisory_xact_lock($1)")
      .bind(LEDGER_LOCK)
      .execute(&mut *tx)
      .await
      .map_err(in_table("ledger"))?;

    let claimed = query(
      r#"
      UPDATE pending_scores SET status = 'approved', approved_at = $2
      WHERE id = $1 AND status = 'pending'
      RETURNING team_name, repository_name, activity_type, points
      "#,
    )
    .bind(id)
    .bind(at)
    .fetch_optional(&mut *tx)
    .await
    .map_err(in_table("pending_scores"))?;

    // Dropping the transaction rolls it back.
    let Some(claimed) = claimed else {
      return Ok(None);
    };
    let team_name: String = col(&claimed, "team_name")?;
    let repository_name: Option<String> = col(&claimed, "repository_name")?;
    let activity_raw: String = col(&claimed, "activity_type")?;
    let activity_type = activity("pending_scores", &activity_raw)?;
    let points: i64 = col(&claimed, "points")?;

    query(
      r#"
      INSERT INTO leaderboard_teams ("teamName", points, domain, project, rank)
      VALUES ($1, $2, $3, $4, 0)
      ON CONFLICT ("teamName") DO UPDATE SET
        points = leaderboard_teams.points + EXCLUDED.points,
        updated_at = NOW()
      "#,
    )
    .bind(&team_name)
    .bind(points)
    .bind(&defaults.domain)
    .bind(&defaults.project)
    .execute(&mut *tx)
    .await
    .map_err(in_table("leaderboard_teams"))?;

    let rows = query(LEDGER_SELECT).fetch_all(&mut *tx).await.map_err(in_table("rank"))?;
    let mut entries = rows
      .iter()
      .map(ledger_from_row)
      .collect::<Result<Vec<_>, _>>()?;

    for assignment in ranker(&entries) {
      let Some(entry) = entries.iter_mut().find(|e| e.team_name == assignment.team_name) else {
        continue;
      };
      if entry.rank != assignment.rank {
        query(r#"UPDATE leaderboard_teams SET rank = $2 WHERE "teamName" = $1"#)
          .bind(&assignment.team_name)
          .bind(assignment.rank)
          .execute(&mut *tx)
          .await
          .map_err(in_table("rank"))?;
        entry.rank = assignment.rank;
      }
    }

    let repository_name = repository_name.unwrap_or_default();
    let seq: i64 = query_scalar(
      r#"
      INSERT INTO approval_events (score_id, team_name, repository_name, activity_type, points, approved_at)
      VALUES ($1, $2, $3, $4, $5, $6)
      RETURNING seq
      "#,
    )
    .bind(id)
    .bind(&team_name)
    .bind(&repository_name)
    .bind(activity_type.as_str())
    .bind(points)
    .bind(at)
    .fetch_one(&mut *tx)
    .await
    .map_err(in_table("approval_events"))?;

    tx.commit().await.map_err(in_table("ledger"))?;

    let ledger = entries
      .into_iter()
      .find(|e| e.team_name == team_name)
      .ok_or_else(|| StoreError::corrupt("leaderboard_teams", format!("missing entry for {team_name}")))?;

    Ok(Some(CommittedApproval {
      event: ApprovalEvent {
        seq,
        score_id: id,
        team_name,
        repository_name,
        activity_type,
        points,
        approved_at: at,
        tally_projected: false,
        weekly_projected: false,
      },
      ledger,
    }))
  }

  async fn ledger(&self) -> Result<Vec<LedgerEntry>, StoreError> {
    let rows = query(LEDGER_SELECT)
      .fetch_all(&self.pool)
      .await
      .map_err(store_err)?;
    rows.iter().map(ledger_from_row).collect()
  }

  async fn ledger_entry(&self, team_name: &str) -> Result<Option<LedgerEntry>, StoreError> {
    let row = query(
      r#"SELECT "teamName", points, domain, project, rank FROM leaderboard_teams WHERE "teamName" = $1"#,
    )
    .bind(team_name)
    .fetch_optional(&self.pool)
    .await
    .map_err(store_err)?;
    row.as_ref().map(ledger_from_row).transpose()
  }

  async fn set_ledger_details(
    &self,
    team_name: &str,
    domain: Option<&str>,
    project: Option<&str>,
  ) -> Result<Option<LedgerEntry>, StoreError> {
    let row = query(
      r#"
      UPDATE leaderboard_teams SET
        domain = COALESCE($2, domain),
        project = COALESCE($3, project),
        updated_at = NOW()
      WHERE "teamName" = $1
      RETURNING "teamName", points, domain, project, rank
      "#,
    )
    .bind(team_name)
    .bind(domain)
    .bind(project)
    .fetch_optional(&self.pool)
    .await
    .map_err(store_err)?;
    row.as_ref().map(ledger_from_row).transpose()
  }

  async fn write_ranks(&self, ranks: &[RankAssignment]) -> Result<(), StoreError> {
    let mut tx = self.pool.begin().await.map_err(store_err)?;
    query("SELECT pg_advisory_xact_lock($1)")
      .bind(LEDGER_LOCK)
      .execute(&mut *tx)
      .await
      .map_err(store_err)?;
    for r in ranks {
      query(r#"UPDATE leaderboard_teams SET rank = $2, updated_at = NOW() WHERE "teamName" = $1"#)
        .bind(&r.team_name)
        .bind(r.rank)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;
    }
    tx.commit().await.map_err(store_err)
  }

  async fn unprojected_events(&self, limit: usize) -> Result<Vec<ApprovalEvent>, StoreError> {
    let sql = format!(
      "SELECT {EVENT_COLUMNS} FROM approval_events \
       WHERE tally_projected_at IS NULL OR weekly_projected_at IS NULL \
       ORDER BY seq LIMIT $1"
    );
    let rows = query(&sql)
      .bind(i64::try_from(limit).unwrap_or(i64::MAX))
      .fetch_all(&self.pool)
      .await
      .map_err(store_err)?;
    rows.iter().map(event_from_row).collect()
  }

  async fn project_tally(&self, event: &ApprovalEvent, at: DateTime<Utc>) -> Result<bool, StoreError> {
    let mut tx = self.pool.begin().await.map_err(store_err)?;
    let marked = query(
      "UPDATE approval_events SET tally_projected_at = $2 WHERE seq = $1 AND tally_projected_at IS NULL",
    )
    .bind(event.seq)
    .bind(at)
    .execute(&mut *tx)
    .await
    .map_err(store_err)?;
    if marked.rows_affected() == 0 {
      return Ok(false);
    }

    query(
      r#"
      INSERT INTO team_activities (team_name, repository_name, activity_type, count, last_updated)
      VALUES ($1, $2, $3, 1, $4)
      ON CONFLICT (team_name, activity_type, repository_name) DO UPDATE SET
        count = team_activities.count + 1,
        last_updated = EXCLUDED.last_updated
      "#,
    )
    .bind(&event.team_name)
    .bind(&event.repository_name)
    .bind(event.activity_type.as_str())
    .bind(at)
    .execute(&mut *tx)
    .await
    .map_err(store_err)?;

    tx.commit().await.map_err(store_err)?;
    Ok(true)
  }

  async fn project_weekly(
    &self,
    event: &ApprovalEvent,
    window: WeekWindow,
    at: DateTime<Utc>,
  ) -> Result<bool, StoreError> {
    let mut tx = self.pool.begin().await.map_err(store_err)?;
    let marked = query(
      "UPDATE approval_events SET weekly_projected_at = $2 WHERE seq = $1 AND weekly_projected_at IS NULL",
    )
    .bind(event.seq)
    .bind(at)
    .execute(&mut *tx)
    .await
    .map_err(store_err)?;
    if marked.rows_affected() == 0 {
      return Ok(false);
    }

    query(
      r#"
      INSERT INTO weekly_scores (team_name, repository_name, week_start, week_end, points, activities, created_at, updated_at)
      VALUES ($1, $2, $3, $4, $5, 1, $6, $6)
      ON CONFLICT (team_name, repository_name, week_start) DO UPDATE SET
        points = weekly_scores.points + EXCLUDED.points,
        activities = weekly_scores.activities + 1,
        updated_at = EXCLUDED.updated_at
      "#,
    )
    .bind(&event.team_name)
    .bind(&event.repository_name)
    .bind(window.start)
    .bind(window.end)
    .bind(event.points)
    .bind(at)
    .execute(&mut *tx)
    .await
    .map_err(store_err)?;

    tx.commit().await.map_err(store_err)?;
    Ok(true)
  }

  async fn tallies_for(&self, team_name: &str) -> Result<Vec<ActivityTally>, StoreError> {
    let rows = query(
      r#"
      SELECT team_name, repository_name, activity_type, count, last_updated
      FROM team_activities WHERE team_name = $1
      ORDER BY repository_name, activity_type
      "#,
    )
    .bind(team_name)
    .fetch_all(&self.pool)
    .await
    .map_err(store_err)?;

    rows
      .iter()
      .map(|row| {
        let activity_type: String = col(row, "activity_type")?;
        Ok(ActivityTally {
          team_name: col(row, "team_name")?,
          repository_name: col(row, "repository_name")?,
          activity_type: activity("team_activities", &activity_type)?,
          count: col(row, "count")?,
          last_updated: col(row, "last_updated")?,
        })
      })
      .collect()
  }

  async fn weekly_for(&self, team_name: &str) -> Result<Vec<WeeklyAggregate>, StoreError> {
    let rows = query(
      r#"
      SELECT team_name, repository_name, week_start, week_end, points, activities, created_at, updated_at
      FROM weekly_scores WHERE team_name = $1
      ORDER BY week_start DESC, repository_name
      "#,
    )
    .bind(team_name)
    .fetch_all(&self.pool)
    .await
    .map_err(store_err)?;

    rows
      .iter()
      .map(|row| {
        let week_start: NaiveDate = col(row, "week_start")?;
        Ok(WeeklyAggregate {
          team_name: col(row, "team_name")?,
          repository_name: col(row, "repository_name")?,
          week_start,
          week_end: col(row, "week_end")?,
          points: col(row, "points")?,
          activities: col(row, "activities")?,
          created_at: col(row, "created_at")?,
          updated_at: col(row, "updated_at")?,
        })
      })
      .collect()
  }
}

#[async_trait]
impl TeamDirectory for PgStore {
  async fn team_for_repository(&self, repository_name: &str) -> Result<Option<Team>, StoreError> {
    let sql = format!(
      "SELECT {TEAM_COLUMNS} FROM teams WHERE repository_name = $1 \
       ORDER BY is_active DESC, created_at LIMIT 1"
    );
    let row = query(&sql)
      .bind(repository_name)
      .fetch_optional(&self.pool)
      .await
      .map_err(store_err)?;
    row.as_ref().map(team_from_row).transpose()
  }

  async fn find_team(&self, team_name: &str) -> Result<Option<Team>, StoreError> {
    let sql = format!("SELECT {TEAM_COLUMNS} FROM teams WHERE team_name = $1");
    let row = query(&sql)
      .bind(team_name)
      .fetch_optional(&self.pool)
      .await
      .map_err(store_err)?;
    row.as_ref().map(team_from_row).transpose()
  }

  async fn list_teams(&self) -> Result<Vec<Team>, StoreError> {
    let sql = format!("SELECT {TEAM_COLUMNS} FROM teams ORDER BY created_at DESC");
    let rows = query(&sql).fetch_all(&self.pool).await.map_err(store_err)?;
    rows.iter().map(team_from_row).collect()
  }

  async fn create_team(&self, team: &NewTeam) -> Result<Team, StoreError> {
    let sql = format!(
      "INSERT INTO teams (id, team_name, password_hash, is_active, repository_name, repository_url, created_at) \
       VALUES ($1, $2, $3, TRUE, $4, $5, $6) RETURNING {TEAM_COLUMNS}"
    );
    let row = query(&sql)
      .bind(Uuid::new_v4())
      .bind(&team.team_name)
      .bind(&team.password_hash)
      .bind(&team.repository_name)
      .bind(&team.repository_url)
      .bind(team.created_at)
      .fetch_one(&self.pool)
      .await
      .map_err(store_err)?;
    team_from_row(&row)
  }

  async fn set_team_active(&self, team_name: &str, active: bool) -> Result<Option<Team>, StoreError> {
    let sql = format!(
      "UPDATE teams SET is_active = $2, updated_at = NOW() WHERE team_name = $1 RETURNING {TEAM_COLUMNS}"
    );
    let row = query(&sql)
      .bind(team_name)
      .bind(active)
      .fetch_optional(&self.pool)
      .await
      .map_err(store_err)?;
    row.as_ref().map(team_from_row).transpose()
  }
}

#[async_trait]
impl BoardStore for PgStore {
  async fn replace_boards(&self, boards: &Boards) -> Result<(), StoreError> {
    let mut tx = self.pool.begin().await.map_err(store_err)?;

    for (table, sql) in [
      ("leaderboard_individuals", "DELETE FROM leaderboard_individuals"),
      ("leaderboard_domains", "DELETE FROM leaderboard_domains"),
      ("leaderboard_less_ai", "DELETE FROM leaderboard_less_ai"),
    ] {
      query(sql)
        .execute(&mut *tx)
        .await
        .map_err(in_table(table))?;
    }

    for row in &boards.individuals {
      query("INSERT INTO leaderboard_individuals (rank, name, team, domain, points) VALUES ($1, $2, $3, $4, $5)")
        .bind(row.rank)
        .bind(&row.name)
        .bind(&row.team)
        .bind(&row.domain)
        .bind(row.points)
        .execute(&mut *tx)
        .await
        .map_err(in_table("leaderboard_individuals"))?;
    }
    for row in &boards.domains {
      query(r#"INSERT INTO leaderboard_domains (rank, domain, "totalPoints") VALUES ($1, $2, $3)"#)
        .bind(row.rank)
        .bind(&row.domain)
        .bind(row.total_points)
        .execute(&mut *tx)
        .await
        .map_err(in_table("leaderboard_domains"))?;
    }
    for row in &boards.less_ai {
      query("INSERT INTO leaderboard_less_ai (rank, name, team, points) VALUES ($1, $2, $3, $4)")
        .bind(row.rank)
        .bind(&row.name)
        .bind(&row.team)
        .bind(row.points)
        .execute(&mut *tx)
        .await
        .map_err(in_table("leaderboard_less_ai"))?;
    }

    tx.commit().await.map_err(store_err)
  }

  async fn individuals(&self) -> Result<Vec<IndividualRow>, StoreError> {
    let rows = query("SELECT rank, name, team, domain, points FROM leaderboard_individuals ORDER BY rank")
      .fetch_all(&self.pool)
      .await
      .map_err(store_err)?;
    rows
      .iter()
      .map(|row| {
        Ok(IndividualRow {
          rank: col(row, "rank")?,
          name: col(row, "name")?,
          team: col(row, "team")?,
          domain: col(row, "domain")?,
          points: col(row, "points")?,
        })
      })
      .collect()
  }

  async fn domains(&self) -> Result<Vec<DomainRow>, StoreError> {
    let rows = query(r#"SELECT rank, domain, "totalPoints" FROM leaderboard_domains ORDER BY rank"#)
      .fetch_all(&self.pool)
      .await
      .map_err(store_err)?;
    rows
      .iter()
      .map(|row| {
        Ok(DomainRow {
          rank: col(row, "rank")?,
          domain: col(row, "domain")?,
          total_points: col(row, "totalPoints")?,
        })
      })
      .collect()
  }

  async fn less_ai(&self) -> Result<Vec<LessAiRow>, StoreError> {
    let rows = query("SELECT rank, name, team, points FROM leaderboard_less_ai ORDER BY rank")
      .fetch_all(&self.pool)
      .await
      .map_err(store_err)?;
    rows
      .iter()
      .map(|row| {
        Ok(LessAiRow {
          rank: col(row, "rank")?,
          name: col(row, "name")?,
          team: col(row, "team")?,
          points: col(row, "points")?,
        })
      })
      .collect()
  }
}

//! Sequential ranking over the team ledger.

use std::cmp::Ordering;

use tracing::info;

use crate::error::ScoreError;
use crate::store::ScoreStore;
use crate::types::{LedgerEntry, RankAssignment};

/// Assign ranks 1..N by points descending; equal points fall back to team
/// name ascending so the result never depends on read order.
pub fn assign(entries: &[LedgerEntry]) -> Vec<RankAssignment> {
  let mut ordered: Vec<&LedgerEntry> = entries.iter().collect();
  ordered.sort_by(|a, b| compare(a, b));
  ordered
    .into_iter()
    .enumerate()
    .map(|(i, e)| RankAssignment {
      team_name: e.team_name.clone(),
      rank: i as i32 + 1,
    })
    .collect()
}

/// Ledger ordering shared by `assign` and the stores' `ledger()` reads.
pub fn compare(a: &LedgerEntry, b: &LedgerEntry) -> Ordering {
  b.points
    .cmp(&a.points)
    .then_with(|| a.team_name.cmp(&b.team_name))
}

/// Re-read the whole ledger and rewrite every rank.
///
/// Only assignments that differ from the stored rank are written.
pub async fn recompute_ranks(store: &dyn ScoreStore) -> Result<Vec<RankAssignment>, ScoreError> {
  let entries = store.ledger().await.map_err(ScoreError::store("rank"))?;
  let ranks = assign(&entries);
  let changed: Vec<RankAssignment> = ranks
    .iter()
    .filter(|r| {
      entries
        .iter()
        .find(|e| e.team_name == r.team_name)
        .map_or(true, |e| e.rank != r.rank)
    })
    .cloned()
    .collect();

  if !changed.is_empty() {
    store
      .write_ranks(&changed)
      .await
      .map_err(ScoreError::store("rank"))?;
  }
  info!(teams = ranks.len(), changed = changed.len(), "ranks recomputed");
  Ok(ranks)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(name: &str, points: i64) -> LedgerEntry {
    LedgerEntry {
      team_name: name.into(),
      points,
      domain: "General".into(),
      project: "Active Project".into(),
      rank: 0,
    }
  }

  fn rank_of(ranks: &[RankAssignment], name: &str) -> i32 {
    ranks.iter().find(|r| r.team_name == name).unwrap().rank
  }

  #[test]
  fn higher_points_rank_first() {
    let ranks = assign(&[entry("a", 10), entry("b", 30), entry("c", 20)]);
    assert_eq!(rank_of(&ranks, "b"), 1);
    assert_eq!(rank_of(&ranks, "c"), 2);
    assert_eq!(rank_of(&ranks, "a"), 3);
  }

  #[test]
  fn ties_get_distinct_consecutive_ranks_by_name() {
    let ranks = assign(&[entry("zeta", 5), entry("alpha", 5), entry("mid", 9)]);
    assert_eq!(rank_of(&ranks, "mid"), 1);
    assert_eq!(rank_of(&ranks, "alpha"), 2);
    assert_eq!(rank_of(&ranks, "zeta"), 3);
  }

  #[test]
  fn ranks_are_contiguous() {
    let entries: Vec<_> = (0..7).map(|i| entry(&format!("t{i}"), i * 3 % 5)).collect();
    let mut ranks: Vec<i32> = assign(&entries).iter().map(|r| r.rank).collect();
    ranks.sort();
    assert_eq!(ranks, (1..=7).collect::<Vec<_>>());
  }

  #[test]
  fn empty_ledger_has_no_ranks() {
    assert!(assign(&[]).is_empty());
  }
}

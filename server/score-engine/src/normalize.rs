//! Map inbound GitHub events onto award candidates.

use tracing::debug;

use crate::config::PointsTable;
use crate::error::ScoreError;
use crate::types::*;

/// Translate one webhook event into an award candidate.
///
/// Returns `Ok(None)` for kind/action combinations that earn nothing
/// (including a push with zero commits). A payload without a repository
/// name is a validation error.
pub fn normalize(
  kind: &EventKind,
  payload: &WebhookPayload,
  table: &PointsTable,
) -> Result<Option<AwardCandidate>, ScoreError> {
  let repository = payload.repository.as_ref();
  let repo_name = repository
    .and_then(|r| r.name.as_deref())
    .map(str::trim)
    .filter(|n| !n.is_empty())
    .ok_or_else(|| ScoreError::validation("repository.name", "must not be empty"))?;
  let repo_url = repository.and_then(|r| r.html_url.clone());
  let action = payload.action.as_deref().unwrap_or_default();

  let scored = match kind {
    EventKind::Push => {
      let count = payload.commits.as_ref().map_or(0, Vec::len) as i64;
      Some((
        count * table.commit,
        ActivityType::Commit,
        format!(
          "{} commit(s) pushed to {}",
          count,
          payload.git_ref.as_deref().unwrap_or("unknown ref")
        ),
        payload.compare.clone().or(repo_url),
      ))
    }
    EventKind::PullRequest => {
      let pr = payload.pull_request.clone().unwrap_or_default();
      let title = pr.title.unwrap_or_default();
      match action {
        "opened" => Some((
          table.pull_request_opened,
          ActivityType::PullRequest,
          format!("Pull request opened: {}", title),
          pr.html_url,
        )),
        "closed" if pr.merged == Some(true) => Some((
          table.pull_request_merged,
          ActivityType::PullRequest,
          format!("Pull request merged: {}", title),
          pr.html_url,
        )),
        _ => None,
      }
    }
    EventKind::Issues => {
      let issue = payload.issue.clone().unwrap_or_default();
      let title = issue.title.unwrap_or_default();
      match action {
        "opened" => Some((
          table.issue_opened,
          ActivityType::Issue,
          format!("Issue opened: {}", title),
          issue.html_url,
        )),
        "closed" => Some((
          table.issue_closed,
          ActivityType::Issue,
          format!("Issue closed: {}", title),
          issue.html_url,
        )),
        _ => None,
      }
    }
    EventKind::WorkflowRun => {
      let run = payload.workflow_run.clone().unwrap_or_default();
      let succeeded = run.conclusion.as_deref() == Some("success");
      if action == "completed" && succeeded {
        Some((
          table.workflow_success,
          ActivityType::Workflow,
          format!(
            "Workflow completed successfully: {}",
            run.name.unwrap_or_default()
          ),
          run.html_url,
        ))
      } else {
        None
      }
    }
    EventKind::Other(_) => None,
  };

  let Some((points, activity_type, description, reference_url)) = scored else {
    debug!(
      kind = kind.as_str(),
      action, repository = repo_name, "event earns no points"
    );
    return Ok(None);
  };

  if points <= 0 {
    debug!(kind = kind.as_str(), repository = repo_name, "zero-point event dropped");
    return Ok(None);
  }

  Ok(Some(AwardCandidate {
    team_name: repo_name.to_string(),
    repository_name: Some(repo_name.to_string()),
    activity_type,
    points,
    description,
    reference_url,
  }))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn run(kind: &str, json: &str) -> Option<AwardCandidate> {
    let payload: WebhookPayload = serde_json::from_str(json).unwrap();
    normalize(&EventKind::from_header(kind), &payload, &PointsTable::default()).unwrap()
  }

  #[test]
  fn push_awards_two_points_per_commit() {
    let c = run(
      "push",
      r#"{"ref":"refs/heads/main","compare":"https://github.com/o/alpha/compare/a...b",
          "commits":[{},{},{}],"repository":{"name":"alpha","html_url":"https://github.com/o/alpha"}}"#,
    )
    .unwrap();
    assert_eq!(c.points, 6);
    assert_eq!(c.activity_type, ActivityType::Commit);
    assert_eq!(c.team_name, "alpha");
    assert_eq!(c.repository_name.as_deref(), Some("alpha"));
    assert_eq!(c.description, "3 commit(s) pushed to refs/heads/main");
    assert_eq!(
      c.reference_url.as_deref(),
      Some("https://github.com/o/alpha/compare/a...b")
    );
  }

  #[test]
  fn push_without_compare_links_repository() {
    let c = run(
      "push",
      r#"{"ref":"refs/heads/dev","commits":[{}],"repository":{"name":"alpha","html_url":"https://github.com/o/alpha"}}"#,
    )
    .unwrap();
    assert_eq!(c.reference_url.as_deref(), Some("https://github.com/o/alpha"));
  }

  #[test]
  fn empty_push_produces_nothing() {
    assert!(run("push", r#"{"commits":[],"repository":{"name":"alpha"}}"#).is_none());
    assert!(run("push", r#"{"repository":{"name":"alpha"}}"#).is_none());
  }

  #[test]
  fn pull_request_opened_and_merged() {
    let opened = run(
      "pull_request",
      r#"{"action":"opened","pull_request":{"title":"Add login","html_url":"u"},"repository":{"name":"alpha"}}"#,
    )
    .unwrap();
    assert_eq!(opened.points, 5);
    assert_eq!(opened.activity_type, ActivityType::PullRequest);
    assert_eq!(opened.description, "Pull request opened: Add login");

    let merged = run(
      "pull_request",
      r#"{"action":"closed","pull_request":{"title":"Add login","merged":true},"repository":{"name":"alpha"}}"#,
    )
    .unwrap();
    assert_eq!(merged.points, 10);
  }

  #[test]
  fn pull_request_closed_unmerged_is_ignored() {
    assert!(run(
      "pull_request",
      r#"{"action":"closed","pull_request":{"merged":false},"repository":{"name":"alpha"}}"#,
    )
    .is_none());
    assert!(run(
      "pull_request",
      r#"{"action":"synchronize","pull_request":{},"repository":{"name":"alpha"}}"#,
    )
    .is_none());
  }

  #[test]
  fn issues_opened_and_closed() {
    let opened = run(
      "issues",
      r#"{"action":"opened","issue":{"title":"Bug"},"repository":{"name":"alpha"}}"#,
    )
    .unwrap();
    assert_eq!(opened.points, 3);
    assert_eq!(opened.activity_type, ActivityType::Issue);

    let closed = run(
      "issues",
      r#"{"action":"closed","issue":{"title":"Bug"},"repository":{"name":"alpha"}}"#,
    )
    .unwrap();
    assert_eq!(closed.points, 5);
    assert_eq!(closed.description, "Issue closed: Bug");
  }

  #[test]
  fn workflow_run_requires_success() {
    let ok = run(
      "workflow_run",
      r#"{"action":"completed","workflow_run":{"name":"CI","conclusion":"success"},"repository":{"name":"alpha"}}"#,
    )
    .unwrap();
    assert_eq!(ok.points, 8);
    assert_eq!(ok.activity_type, ActivityType::Workflow);

    assert!(run(
      "workflow_run",
      r#"{"action":"completed","workflow_run":{"name":"CI","conclusion":"failure"},"repository":{"name":"alpha"}}"#,
    )
    .is_none());
    assert!(run(
      "workflow_run",
      r#"{"action":"requested","workflow_run":{"conclusion":"success"},"repository":{"name":"alpha"}}"#,
    )
    .is_none());
  }

  #[test]
  fn unknown_kind_is_ignored() {
    assert!(run("star", r#"{"action":"created","repository":{"name":"alpha"}}"#).is_none());
  }

  #[test]
  fn missing_repository_is_a_validation_error() {
    let payload: WebhookPayload = serde_json::from_str(r#"{"commits":[{}]}"#).unwrap();
    let err = normalize(&EventKind::Push, &payload, &PointsTable::default()).unwrap_err();
    assert!(err.to_string().contains("repository.name"));
  }
}

//! Service configuration loaded from the environment.

use anyhow::{Context, Result};
use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
  pub database_url: String,
  pub database_max_connections: u32,
  pub bind_addr: IpAddr,
  pub port: u16,
  /// Shared GitHub webhook secret. `None` disables signature checks.
  pub webhook_secret: Option<String>,
  pub admin_password: String,
  /// Key material for signing session tokens.
  pub session_secret: String,
  pub session_ttl: Duration,
  /// Static leaderboard served when the database is unreachable.
  pub snapshot_path: PathBuf,
  pub projection_interval: Duration,
  pub engine: score_engine::Config,
}

impl Config {
  pub fn from_env() -> Result<Self> {
    let database_url =
      env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

    let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", 5u32)
      .context("DATABASE_MAX_CONNECTIONS must be a valid number")?;

    let bind_addr = parse_or("BIND_ADDR", IpAddr::from([127, 0, 0, 1]))
      .context("BIND_ADDR must be an IP address")?;

    let port = parse_or("PORT", 5004u16).context("PORT must be a valid number")?;

    let webhook_secret = non_blank(env::var("GITHUB_WEBHOOK_SECRET").ok());

    let admin_password = non_blank(env::var("ADMIN_PASSWORD").ok())
      .context("ADMIN_PASSWORD environment variable is required")?;

    let session_secret = non_blank(env::var("SESSION_SECRET").ok())
      .context("SESSION_SECRET environment variable is required")?;

    let session_ttl_minutes = parse_or("SESSION_TTL_MINUTES", 60u64)
      .context("SESSION_TTL_MINUTES must be a valid number")?;

    let snapshot_path = env::var("LEADERBOARD_SNAPSHOT")
      .map(PathBuf::from)
      .unwrap_or_else(|_| PathBuf::from("data/leaderboard.json"));

    let projection_secs = parse_or("PROJECTION_INTERVAL_SECS", 30u64)
      .context("PROJECTION_INTERVAL_SECS must be a valid number")?;

    let dedupe_deliveries = parse_or("DEDUPE_DELIVERIES", false)
      .context("DEDUPE_DELIVERIES must be true or false")?;

    Ok(Config {
      database_url,
      database_max_connections,
      bind_addr,
      port,
      webhook_secret,
      admin_password,
      session_secret,
      session_ttl: Duration::from_secs(session_ttl_minutes * 60),
      snapshot_path,
      projection_interval: Duration::from_secs(projection_secs.max(1)),
      engine: score_engine::Config {
        dedupe_deliveries,
        ..score_engine::Config::default()
      },
    })
  }
}

/// Treat missing, empty or whitespace-only values as unset.
pub fn non_blank(value: Option<String>) -> Option<String> {
  value.filter(|s| !s.trim().is_empty())
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
  T: std::str::FromStr,
  T::Err: std::error::Error + Send + Sync + 'static,
{
  match non_blank(env::var(key).ok()) {
    Some(raw) => raw
      .trim()
      .parse::<T>()
      .with_context(|| format!("invalid value for {key}: {raw}")),
    None => Ok(default),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn non_blank_rejects_empty_and_whitespace() {
    assert_eq!(non_blank(None), None);
    assert_eq!(non_blank(Some("".into())), None);
    assert_eq!(non_blank(Some(" \t\n".into())), None);
  }

  #[test]
  fn non_blank_keeps_value_untrimmed() {
    assert_eq!(non_blank(Some("  s3cret ".into())), Some("  s3cret ".into()));
  }

  #[test]
  fn parse_or_uses_default_when_unset() {
    let v: u16 = parse_or("LEADERBOARD_API_TEST_UNSET_PORT", 5004).unwrap();
    assert_eq!(v, 5004);
  }
}

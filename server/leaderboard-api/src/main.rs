//! Binary entrypoint for the leaderboard API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use sqlx_postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use leaderboard_api::db::{self, PgStore};
use leaderboard_api::{projection_loop, router, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let config = Config::from_env()?;

  let pool = PgPoolOptions::new()
    .max_connections(config.database_max_connections)
    .connect(&config.database_url)
    .await
    .context("failed to connect to DATABASE_URL")?;
  db::bootstrap(&pool).await.context("failed to bootstrap schema")?;

  if config.webhook_secret.is_none() {
    tracing::warn!("GITHUB_WEBHOOK_SECRET is not set; webhook signatures will not be checked");
  }

  let pg = Arc::new(PgStore::new(pool));
  let state = AppState::new(pg.clone(), pg.clone(), pg, &config);

  tokio::spawn(projection_loop(state.gate.projector().clone(), config.projection_interval));

  let addr = SocketAddr::new(config.bind_addr, config.port);
  let listener = tokio::net::TcpListener::bind(addr)
    .await
    .with_context(|| format!("failed to bind {addr}"))?;
  info!(%addr, "leaderboard-api listening");

  axum::serve(listener, router(state))
    .with_graceful_shutdown(async {
      let _ = tokio::signal::ctrl_c().await;
      info!("shutting down");
    })
    .await?;

  Ok(())
}

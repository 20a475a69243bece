//! Public leaderboard reads. Every response is `{ "data": ... }`.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::leaderboard::{self, Boards, DomainRow, IndividualRow, LessAiRow, TeamRow};
use crate::state::AppState;

#[derive(Serialize)]
pub struct Data<T> {
  pub data: T,
}

/// `GET /api/leaderboard`
pub async fn all(State(state): State<AppState>) -> Json<Data<Boards>> {
  let boards = leaderboard::all(state.store.as_ref(), state.boards.as_ref(), &state.snapshot_path).await;
  Json(Data { data: boards })
}

/// `GET /api/leaderboard/teams`
pub async fn teams(State(state): State<AppState>) -> Json<Data<Vec<TeamRow>>> {
  Json(Data {
    data: leaderboard::teams(state.store.as_ref(), &state.snapshot_path).await,
  })
}

/// `GET /api/leaderboard/individuals`
pub async fn individuals(State(state): State<AppState>) -> Json<Data<Vec<IndividualRow>>> {
  Json(Data {
    data: leaderboard::individuals(state.boards.as_ref(), &state.snapshot_path).await,
  })
}

/// `GET /api/leaderboard/domains`
pub async fn domains(State(state): State<AppState>) -> Json<Data<Vec<DomainRow>>> {
  Json(Data {
    data: leaderboard::domains(state.boards.as_ref(), &state.snapshot_path).await,
  })
}

/// `GET /api/leaderboard/less-ai`
pub async fn less_ai(State(state): State<AppState>) -> Json<Data<Vec<LessAiRow>>> {
  Json(Data {
    data: leaderboard::less_ai(state.boards.as_ref(), &state.snapshot_path).await,
  })
}

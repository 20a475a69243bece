//! Club Leaderboard Score Engine: deterministic, review-gated scoring.
//!
//! Normalizes GitHub webhook events into award candidates, queues them for
//! admin review, and on approval folds them into the per-team ledger with
//! fresh ranks. Approval events are projected into per-activity tallies and
//! Sunday-aligned weekly aggregates.
//!
//! No network, no SQL; storage is reached through the `store` traits.

pub mod config;
pub mod error;
pub mod intake;
pub mod memory;
pub mod normalize;
pub mod projection;
pub mod rank;
pub mod review;
pub mod signature;
pub mod store;
pub mod types;
pub mod week;

pub use config::Config;
pub use error::{ScoreError, StoreError};
pub use intake::{Intake, IntakeOutcome};
pub use memory::InMemoryStore;
pub use projection::{ProjectionReport, Projector};
pub use review::{ApprovalOutcome, ReviewGate};
pub use store::{ScoreStore, TeamDirectory};
pub use types::{EventKind, WebhookPayload};

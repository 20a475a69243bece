//! Structured error types for the score engine.

use thiserror::Error;

/// Failure reported by a storage backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
  #[error("store unavailable: {0}")]
  Unavailable(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("corrupt row in {table}: {reason}")]
  Corrupt { table: &'static str, reason: String },

  /// A failure inside a multi-table command, tagged with the table it hit.
  #[error("{table}: {source}")]
  InTable {
    table: &'static str,
    #[source]
    source: Box<StoreError>,
  },
}

impl StoreError {
  pub fn unavailable(msg: impl Into<String>) -> Self {
    Self::Unavailable(msg.into())
  }

  pub fn corrupt(table: &'static str, reason: impl Into<String>) -> Self {
    Self::Corrupt {
      table,
      reason: reason.into(),
    }
  }

  pub fn in_table(table: &'static str, source: StoreError) -> Self {
    Self::InTable {
      table,
      source: Box::new(source),
    }
  }

  /// Table the failure is attributed to, when the backend knows it.
  pub fn table(&self) -> Option<&'static str> {
    match self {
      Self::Corrupt { table, .. } | Self::InTable { table, .. } => Some(table),
      _ => None,
    }
  }
}

#[derive(Debug, Error)]
pub enum ScoreError {
  #[error("validation: {field}: {reason}")]
  Validation { field: String, reason: String },

  /// The score does not exist or has already left `pending`.
  #[error("pending score not found: {0}")]
  NotFound(String),

  #[error("invalid webhook signature")]
  SignatureInvalid,

  #[error("{step}: {source}")]
  Store {
    step: &'static str,
    #[source]
    source: StoreError,
  },
}

impl ScoreError {
  pub fn validation(field: &str, reason: &str) -> Self {
    Self::Validation {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }

  pub fn store(step: &'static str) -> impl FnOnce(StoreError) -> Self {
    move |source| Self::Store { step, source }
  }

  /// Like `store`, but prefer the table the backend attributed the failure to.
  pub fn store_in(fallback: &'static str) -> impl FnOnce(StoreError) -> Self {
    move |source| Self::Store {
      step: source.table().unwrap_or(fallback),
      source,
    }
  }

  /// Step name for store failures, used in admin-facing error bodies.
  pub fn step(&self) -> Option<&'static str> {
    match self {
      Self::Store { step, .. } => Some(step),
      _ => None,
    }
  }
}

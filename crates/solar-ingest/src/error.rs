//! Error types for `solar-ingest`.

use std::path::PathBuf;

use solar_core::{record::Series, validate::ValidationError};
use thiserror::Error;

use crate::orchestrator::Stage;

// ─── Fetch ───────────────────────────────────────────────────────────────────

/// Failure retrieving raw values from an upstream data source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
  /// Connection, DNS or timeout failure. Always transient.
  #[error("{label}: transport error: {reason}")]
  Transport { label: String, reason: String },

  #[error("{label} returned HTTP {status}")]
  Status { label: String, status: u16 },

  #[error("{label}: could not decode response: {reason}")]
  Decode { label: String, reason: String },

  #[error("{series} series (id={id}) not found in response")]
  SeriesNotFound { series: Series, id: String },

  #[error("{series} value is null in response")]
  NullValue { series: Series },
}

impl FetchError {
  /// Transport failures and server-side (5xx) responses may succeed on a
  /// later attempt; everything else is final.
  pub fn is_transient(&self) -> bool {
    match self {
      FetchError::Transport { .. } => true,
      FetchError::Status { status, .. } => *status >= 500,
      _ => false,
    }
  }
}

// ─── Export and drafts ───────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ExportError {
  #[error("cannot write {path}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("cannot read series for export: {0}")]
  Store(String),
}

#[derive(Debug, Error)]
pub enum DraftError {
  #[error("draft store error: {0}")]
  Store(String),
}

// ─── Ingest ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum FailureKind {
  #[error(transparent)]
  Fetch(#[from] FetchError),

  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error("persistence error: {0}")]
  Persistence(String),
}

/// A period that could not be ingested, with the stage it failed in.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {kind}")]
pub struct IngestError {
  pub stage: Stage,
  #[source]
  pub kind:  FailureKind,
}

impl IngestError {
  pub fn new(stage: Stage, kind: impl Into<FailureKind>) -> Self {
    Self { stage, kind: kind.into() }
  }

  pub fn persistence(stage: Stage, err: impl std::fmt::Display) -> Self {
    Self { stage, kind: FailureKind::Persistence(err.to_string()) }
  }

  pub fn is_validation(&self) -> bool {
    matches!(self.kind, FailureKind::Validation(_))
  }
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  fn status(code: u16) -> FetchError {
    FetchError::Status { label: "REData".into(), status: code }
  }

  #[test]
  fn only_transport_and_server_errors_are_transient() {
    assert!(FetchError::Transport { label: "x".into(), reason: "timeout".into() }.is_transient());
    assert!(status(500).is_transient());
    assert!(status(503).is_transient());
    assert!(!status(404).is_transient());
    assert!(!status(429).is_transient());
    assert!(!FetchError::NullValue { series: Series::Capacity }.is_transient());
    assert!(
      !FetchError::Decode { label: "x".into(), reason: "eof".into() }.is_transient()
    );
  }
}

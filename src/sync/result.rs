//! Per-row outcomes of a synchronization pass.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::access::RowState;
use crate::error::ErrorKind;
use crate::record::RecordKey;

/// What happened to one buffered row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
  /// The store call succeeded and the row is no longer pending
  Applied,
  /// No store call was made; the row is still pending
  Skipped { reason: String },
  /// The store call failed; the row is still pending
  Failed { kind: ErrorKind, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowOutcome {
  pub key: RecordKey,
  /// Row state the change was buffered as
  pub change: RowState,
  pub outcome: Outcome,
}

impl RowOutcome {
  pub fn is_applied(&self) -> bool {
    matches!(self.outcome, Outcome::Applied)
  }

  pub fn failure_kind(&self) -> Option<ErrorKind> {
    match &self.outcome {
      Outcome::Failed { kind, .. } => Some(*kind),
      _ => None,
    }
  }
}

/// Result of one `synchronize` call, in the order rows were applied.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
  pub started_at: DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
  pub rows: Vec<RowOutcome>,
}

impl SyncResult {
  pub fn applied(&self) -> usize {
    self.rows.iter().filter(|r| r.is_applied()).count()
  }

  pub fn failed(&self) -> impl Iterator<Item = &RowOutcome> {
    self
      .rows
      .iter()
      .filter(|r| matches!(r.outcome, Outcome::Failed { .. }))
  }

  pub fn skipped(&self) -> impl Iterator<Item = &RowOutcome> {
    self
      .rows
      .iter()
      .filter(|r| matches!(r.outcome, Outcome::Skipped { .. }))
  }

  /// Keys still pending after this pass, failed or skipped.
  pub fn failed_keys(&self) -> Vec<RecordKey> {
    self
      .rows
      .iter()
      .filter(|r| !r.is_applied())
      .map(|r| r.key)
      .collect()
  }

  /// Every buffered row was applied.
  pub fn is_clean(&self) -> bool {
    self.rows.iter().all(RowOutcome::is_applied)
  }
}

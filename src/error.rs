//! Error kinds surfaced by stores, accessors and the cache.

use serde::Serialize;
use thiserror::Error;

use crate::access::RowState;
use crate::record::RecordKey;

/// Errors raised by data-access operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
  /// The operation targets a key that does not exist
  #[error("record {0} not found")]
  NotFound(RecordKey),
  /// The key already exists where uniqueness is required
  #[error("record {0} already exists")]
  DuplicateKey(RecordKey),
  /// The stored record no longer matches the version the caller last saw
  #[error("record {0} was changed by another writer")]
  Conflict(RecordKey),
  /// The operation is not permitted for the row's current state
  #[error("record {key} is {state} and cannot be {action}")]
  InvalidState {
    key: RecordKey,
    state: RowState,
    action: &'static str,
  },
  /// A reload was refused because buffered changes would be lost
  #[error("snapshot has {0} pending change(s)")]
  PendingChanges(usize),
  /// The record or change set does not fit the table schema
  #[error("invalid record: {0}")]
  InvalidRecord(String),
  /// The backing store call could not complete
  #[error("backing store unavailable: {0}")]
  StoreUnavailable(String),
}

impl StoreError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::NotFound(_) => ErrorKind::NotFound,
      Self::DuplicateKey(_) => ErrorKind::DuplicateKey,
      Self::Conflict(_) => ErrorKind::Conflict,
      Self::InvalidState { .. } => ErrorKind::InvalidState,
      Self::PendingChanges(_) => ErrorKind::PendingChanges,
      Self::InvalidRecord(_) => ErrorKind::InvalidRecord,
      Self::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
    }
  }
}

/// Serializable error classification, carried in sync results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
  NotFound,
  DuplicateKey,
  Conflict,
  InvalidState,
  PendingChanges,
  InvalidRecord,
  StoreUnavailable,
}

impl From<rusqlite::Error> for StoreError {
  fn from(e: rusqlite::Error) -> Self {
    Self::StoreUnavailable(e.to_string())
  }
}

/// Result alias used across the data-access API.
pub type Result<T> = std::result::Result<T, StoreError>;

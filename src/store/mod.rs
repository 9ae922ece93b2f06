//! Backing stores: the authoritative source both access paths share.
//!
//! A [`BackingStore`] holds one table. Every call is atomic on its own; no
//! transaction spans two calls.

mod memory;
mod sqlite;

use serde::Serialize;

use crate::error::Result;
use crate::record::{ETag, FieldChanges, FieldValue, Record, RecordKey, TableSchema};

pub use memory::InMemoryStore;
pub(crate) use sqlite::create_table_sql;
pub use sqlite::SqliteStore;

/// Record selection for queries and snapshot loads.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub enum Filter {
  #[default]
  All,
  Key(RecordKey),
  /// Inclusive on both ends
  KeyRange { from: RecordKey, to: RecordKey },
  FieldEquals { field: String, value: FieldValue },
}

impl Filter {
  pub fn field_equals(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
    Self::FieldEquals {
      field: field.into(),
      value: value.into(),
    }
  }

  pub fn matches(&self, record: &Record) -> bool {
    match self {
      Self::All => true,
      Self::Key(k) => record.key() == *k,
      Self::KeyRange { from, to } => *from <= record.key() && record.key() <= *to,
      Self::FieldEquals { field, value } => {
        record.get(field).unwrap_or(&FieldValue::Null) == value
      }
    }
  }
}

/// Persistent store for the records of one table.
pub trait BackingStore: Send + Sync {
  fn schema(&self) -> &'static TableSchema;

  /// Records matching `filter`, ordered by key.
  fn query(&self, filter: &Filter) -> Result<Vec<Record>>;

  /// Single record lookup.
  fn get(&self, key: RecordKey) -> Result<Option<Record>> {
    Ok(self.query(&Filter::Key(key))?.into_iter().next())
  }

  /// Insert a new record. Fails with `DuplicateKey` if the key exists.
  fn insert(&self, record: &Record) -> Result<()>;

  /// Merge `changes` into an existing record and return the stored result.
  ///
  /// Fails with `NotFound` if the key is absent and with `Conflict` if
  /// `expected` is given and no longer matches the stored record.
  fn update(&self, key: RecordKey, changes: &FieldChanges, expected: Option<&ETag>)
    -> Result<Record>;

  /// Remove a record. Same failure rules as [`BackingStore::update`].
  fn delete(&self, key: RecordKey, expected: Option<&ETag>) -> Result<()>;
}

//! In-memory backing store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use super::{BackingStore, Filter};
use crate::error::{Result, StoreError};
use crate::record::{ETag, FieldChanges, Record, RecordKey, TableSchema};

/// Store that keeps one table in a map.
///
/// Can be switched offline to simulate an outage: every call then fails
/// with `StoreUnavailable`.
pub struct InMemoryStore {
  schema: &'static TableSchema,
  rows: Mutex<BTreeMap<RecordKey, Record>>,
  available: AtomicBool,
}

impl InMemoryStore {
  pub fn new(schema: &'static TableSchema) -> Self {
    Self {
      schema,
      rows: Mutex::new(BTreeMap::new()),
      available: AtomicBool::new(true),
    }
  }

  /// Create a store pre-filled with `records`.
  pub fn with_records<I>(schema: &'static TableSchema, records: I) -> Result<Self>
  where
    I: IntoIterator<Item = Record>,
  {
    let store = Self::new(schema);
    for record in records {
      store.insert(&record)?;
    }
    Ok(store)
  }

  pub fn set_available(&self, available: bool) {
    self.available.store(available, Ordering::SeqCst);
  }

  pub fn len(&self) -> usize {
    self.rows.lock().map(|rows| rows.len()).unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn rows(&self) -> Result<MutexGuard<'_, BTreeMap<RecordKey, Record>>> {
    if !self.available.load(Ordering::SeqCst) {
      return Err(StoreError::StoreUnavailable(format!(
        "{} store is offline",
        self.schema.table
      )));
    }
    self
      .rows
      .lock()
      .map_err(|e| StoreError::StoreUnavailable(format!("Lock poisoned: {}", e)))
  }
}

/// Fetch a stored record, checking the caller's version token.
fn checked<'a>(
  rows: &'a mut BTreeMap<RecordKey, Record>,
  key: RecordKey,
  expected: Option<&ETag>,
) -> Result<&'a mut Record> {
  let record = rows.get_mut(&key).ok_or(StoreError::NotFound(key))?;
  if let Some(expected) = expected {
    if record.etag() != *expected {
      return Err(StoreError::Conflict(key));
    }
  }
  Ok(record)
}

impl BackingStore for InMemoryStore {
  fn schema(&self) -> &'static TableSchema {
    self.schema
  }

  fn query(&self, filter: &Filter) -> Result<Vec<Record>> {
    if let Filter::FieldEquals { field, value } = filter {
      self.schema.typed_field(field, value)?;
    }

    let rows = self.rows()?;
    Ok(
      rows
        .values()
        .filter(|r| filter.matches(r))
        .cloned()
        .collect(),
    )
  }

  fn insert(&self, record: &Record) -> Result<()> {
    let normalized = self.schema.normalize(record)?;
    let mut rows = self.rows()?;
    if rows.contains_key(&record.key()) {
      return Err(StoreError::DuplicateKey(record.key()));
    }
    debug!(table = self.schema.table, key = %record.key(), "insert");
    rows.insert(record.key(), normalized);
    Ok(())
  }

  fn update(
    &self,
    key: RecordKey,
    changes: &FieldChanges,
    expected: Option<&ETag>,
  ) -> Result<Record> {
    self.schema.validate_changes(changes)?;
    let mut rows = self.rows()?;
    let record = checked(&mut rows, key, expected)?;
    record.apply(changes);
    debug!(table = self.schema.table, key = %key, fields = changes.len(), "update");
    Ok(record.clone())
  }

  fn delete(&self, key: RecordKey, expected: Option<&ETag>) -> Result<()> {
    let mut rows = self.rows()?;
    checked(&mut rows, key, expected)?;
    rows.remove(&key);
    debug!(table = self.schema.table, key = %key, "delete");
    Ok(())
  }
}

//! Pass-through accessor: one store call per operation, nothing cached.

use std::sync::Arc;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::record::{FieldChanges, Record, RecordKey};
use crate::store::{BackingStore, Filter};

/// Reads and writes that always go straight to the backing store.
///
/// Callers observe the store's current state on every call. Errors are
/// exactly the store's; nothing is retried.
pub struct ConnectedAccessor<S: BackingStore> {
  store: Arc<S>,
}

impl<S: BackingStore> ConnectedAccessor<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store }
  }

  pub fn list(&self, filter: &Filter) -> Result<Vec<Record>> {
    debug!(table = self.table(), ?filter, "connected list");
    self.store.query(filter)
  }

  pub fn get(&self, key: RecordKey) -> Result<Record> {
    debug!(table = self.table(), key = %key, "connected get");
    self.store.get(key)?.ok_or(StoreError::NotFound(key))
  }

  pub fn add(&self, record: Record) -> Result<()> {
    self.store.schema().check_required(&record)?;
    debug!(table = self.table(), key = %record.key(), "connected add");
    self.store.insert(&record)
  }

  /// Apply `changes` without a version check; the last writer wins.
  pub fn update(&self, key: RecordKey, changes: FieldChanges) -> Result<Record> {
    self.store.schema().check_required_changes(&changes)?;
    debug!(table = self.table(), key = %key, "connected update");
    self.store.update(key, &changes, None)
  }

  pub fn delete(&self, key: RecordKey) -> Result<()> {
    debug!(table = self.table(), key = %key, "connected delete");
    self.store.delete(key, None)
  }

  fn table(&self) -> &'static str {
    self.store.schema().table
  }
}

impl<S: BackingStore> Clone for ConnectedAccessor<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
    }
  }
}

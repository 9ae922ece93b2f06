//! Snapshot cache with buffered, row-tagged mutations.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::RowState;
use crate::error::{Result, StoreError};
use crate::record::{ETag, FieldChanges, Record, RecordKey, TableSchema};
use crate::store::{BackingStore, Filter};

/// What `load` does when the snapshot still holds unsynchronized changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadPolicy {
  /// Drop the pending changes and reload
  #[default]
  Discard,
  /// Refuse with `PendingChanges` and keep the snapshot
  #[serde(rename = "fail")]
  FailIfPending,
}

/// One snapshot entry.
#[derive(Debug, Clone)]
pub struct CachedRow {
  current: Record,
  /// As last loaded from or written to the store; `None` for added rows
  original: Option<Record>,
  state: RowState,
}

impl CachedRow {
  fn loaded(record: Record) -> Self {
    Self {
      original: Some(record.clone()),
      current: record,
      state: RowState::Unchanged,
    }
  }

  pub fn record(&self) -> &Record {
    &self.current
  }

  pub fn original(&self) -> Option<&Record> {
    self.original.as_ref()
  }

  pub fn state(&self) -> RowState {
    self.state
  }

  /// Field changes made since the row was loaded.
  pub fn changes(&self) -> FieldChanges {
    match &self.original {
      Some(original) => original.diff(&self.current),
      None => FieldChanges::new(),
    }
  }

  /// Version token of the store copy this row was based on.
  pub fn expected_etag(&self) -> Option<ETag> {
    self.original.as_ref().map(Record::etag)
  }
}

/// In-memory snapshot of store records plus locally buffered changes.
///
/// Mutations only touch the snapshot. The store is untouched until the
/// cache is passed to [`SyncEngine::synchronize`](crate::sync::SyncEngine::synchronize).
/// Rows are keyed by record key, so the snapshot holds at most one entry
/// per key, and all views iterate in key order.
pub struct DisconnectedCache<S: BackingStore> {
  store: Arc<S>,
  policy: LoadPolicy,
  filter: Filter,
  rows: BTreeMap<RecordKey, CachedRow>,
  loaded_at: Option<DateTime<Utc>>,
}

impl<S: BackingStore> DisconnectedCache<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self {
      store,
      policy: LoadPolicy::default(),
      filter: Filter::All,
      rows: BTreeMap::new(),
      loaded_at: None,
    }
  }

  pub fn with_load_policy(mut self, policy: LoadPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn store(&self) -> &Arc<S> {
    &self.store
  }

  pub fn schema(&self) -> &'static TableSchema {
    self.store.schema()
  }

  /// Filter of the last load.
  pub fn filter(&self) -> &Filter {
    &self.filter
  }

  pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
    self.loaded_at
  }

  /// Replace the snapshot with the store records matching `filter`.
  ///
  /// Under [`LoadPolicy::Discard`] any unsynchronized changes are lost.
  /// If the store query fails the previous snapshot is kept.
  pub fn load(&mut self, filter: Filter) -> Result<usize> {
    let pending = self.pending_count();
    if pending > 0 && self.policy == LoadPolicy::FailIfPending {
      return Err(StoreError::PendingChanges(pending));
    }

    let records = self.store.query(&filter)?;
    if pending > 0 {
      warn!(
        table = self.schema().table,
        pending, "discarding unsynchronized changes on reload"
      );
    }

    self.rows = records
      .into_iter()
      .map(|r| (r.key(), CachedRow::loaded(r)))
      .collect();
    self.filter = filter;
    self.loaded_at = Some(Utc::now());

    info!(table = self.schema().table, rows = self.rows.len(), "snapshot loaded");
    Ok(self.rows.len())
  }

  /// Buffer a new record. Fails with `DuplicateKey` if the key is already
  /// in the snapshot, whatever its state.
  pub fn add(&mut self, record: Record) -> Result<()> {
    let key = record.key();
    if self.rows.contains_key(&key) {
      return Err(StoreError::DuplicateKey(key));
    }
    let record = self.schema().normalize(&record)?;

    debug!(table = self.schema().table, key = %key, "cache add");
    self.rows.insert(
      key,
      CachedRow {
        current: record,
        original: None,
        state: RowState::Added,
      },
    );
    Ok(())
  }

  /// Merge `changes` into a cached row.
  ///
  /// Added rows stay Added, Unchanged and Modified rows become Modified.
  /// Deleted rows cannot be edited.
  pub fn update(&mut self, key: RecordKey, changes: FieldChanges) -> Result<()> {
    let schema = self.schema();
    let row = self.rows.get_mut(&key).ok_or(StoreError::NotFound(key))?;
    if row.state == RowState::Deleted {
      return Err(StoreError::InvalidState {
        key,
        state: row.state,
        action: "updated",
      });
    }
    schema.validate_changes(&changes)?;

    row.current.apply(&changes);
    if row.state == RowState::Unchanged {
      row.state = RowState::Modified;
    }
    debug!(table = schema.table, key = %key, state = %row.state, "cache update");
    Ok(())
  }

  /// Mark a row for deletion.
  ///
  /// A row that was never synchronized is dropped outright; any other row
  /// is kept as Deleted so synchronization can remove it from the store.
  pub fn delete(&mut self, key: RecordKey) -> Result<()> {
    let state = self.row_state(key).ok_or(StoreError::NotFound(key))?;
    match state {
      RowState::Added => {
        self.rows.remove(&key);
      }
      RowState::Unchanged | RowState::Modified => {
        if let Some(row) = self.rows.get_mut(&key) {
          row.state = RowState::Deleted;
        }
      }
      RowState::Deleted => {}
    }
    debug!(table = self.schema().table, key = %key, "cache delete");
    Ok(())
  }

  /// What the cache believes exists: every row not marked Deleted.
  pub fn view_cache_only(&self) -> Vec<Record> {
    self
      .rows
      .values()
      .filter(|row| row.state != RowState::Deleted)
      .map(|row| row.current.clone())
      .collect()
  }

  /// What is persisted right now, read fresh from the store.
  ///
  /// Covers the records matching the snapshot's filter plus the stored copy
  /// of every snapshot key the filter no longer matches, so synchronized
  /// rows stay visible after an edit moves them out of the filter.
  /// Diverges from [`view_cache_only`](Self::view_cache_only) while changes
  /// are pending.
  pub fn view_store_only(&self) -> Result<Vec<Record>> {
    let mut stored: BTreeMap<RecordKey, Record> = self
      .store
      .query(&self.filter)?
      .into_iter()
      .map(|r| (r.key(), r))
      .collect();

    for key in self.rows.keys() {
      if stored.contains_key(key) {
        continue;
      }
      if let Some(record) = self.store.get(*key)? {
        stored.insert(*key, record);
      }
    }
    Ok(stored.into_values().collect())
  }

  /// A live (not deleted) cached record.
  pub fn get(&self, key: RecordKey) -> Option<&Record> {
    self
      .rows
      .get(&key)
      .filter(|row| row.state != RowState::Deleted)
      .map(|row| &row.current)
  }

  pub fn row(&self, key: RecordKey) -> Option<&CachedRow> {
    self.rows.get(&key)
  }

  pub fn row_state(&self, key: RecordKey) -> Option<RowState> {
    self.rows.get(&key).map(|row| row.state)
  }

  pub fn rows(&self) -> impl Iterator<Item = &CachedRow> {
    self.rows.values()
  }

  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  pub fn pending_count(&self) -> usize {
    self.rows.values().filter(|row| row.state.is_pending()).count()
  }

  pub fn has_pending_changes(&self) -> bool {
    self.rows.values().any(|row| row.state.is_pending())
  }

  /// Undo every buffered change: added rows disappear, modified and
  /// deleted rows return to their loaded values. Returns the number of
  /// rows reverted.
  pub fn reject_changes(&mut self) -> usize {
    let before = self.pending_count();
    self.rows.retain(|_, row| row.state != RowState::Added);
    for row in self.rows.values_mut() {
      if let Some(original) = &row.original {
        row.current = original.clone();
      }
      row.state = RowState::Unchanged;
    }
    debug!(table = self.schema().table, reverted = before, "changes rejected");
    before
  }

  /// Keys of the rows in `state`, in key order.
  pub(crate) fn keys_in_state(&self, state: RowState) -> Vec<RecordKey> {
    self
      .rows
      .iter()
      .filter(|(_, row)| row.state == state)
      .map(|(key, _)| *key)
      .collect()
  }

  /// Record that `stored` is now the store's copy of the row.
  pub(crate) fn accept(&mut self, stored: Record) {
    self.rows.insert(stored.key(), CachedRow::loaded(stored));
  }

  /// Drop a row whose deletion reached the store.
  pub(crate) fn forget(&mut self, key: RecordKey) {
    self.rows.remove(&key);
  }
}

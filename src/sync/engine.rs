//! Applies a cache's buffered rows to its backing store.

use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};

use super::result::{Outcome, RowOutcome, SyncResult};
use crate::access::{DisconnectedCache, RowState};
use crate::error::{ErrorKind, Result, StoreError};
use crate::record::RecordKey;
use crate::store::BackingStore;

/// Order in which buffered rows reach the store.
///
/// Deletions go first so an added row can reuse a freed key; modifications
/// go last so they act on the post-insert, post-delete state.
const APPLY_ORDER: [RowState; 3] = [RowState::Deleted, RowState::Added, RowState::Modified];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
  /// Send each row's loaded version so rows changed in the store since
  /// load fail with `Conflict`
  pub check_versions: bool,
  /// After a `StoreUnavailable` failure, skip the remaining rows
  pub stop_on_unavailable: bool,
}

impl Default for SyncOptions {
  fn default() -> Self {
    Self {
      check_versions: true,
      stop_on_unavailable: true,
    }
  }
}

/// Reconciles a [`DisconnectedCache`] with its store.
///
/// Each row is its own unit of work: a failure is recorded for that row,
/// which stays pending, and earlier rows are not rolled back.
#[derive(Debug, Clone, Default)]
pub struct SyncEngine {
  options: SyncOptions,
}

impl SyncEngine {
  pub fn new(options: SyncOptions) -> Self {
    Self { options }
  }

  /// Apply every pending row and report a per-row outcome.
  ///
  /// Applied rows become Unchanged (or leave the snapshot, for deletions).
  /// Never fails as a whole.
  pub fn synchronize<S: BackingStore>(&self, cache: &mut DisconnectedCache<S>) -> SyncResult {
    let span = info_span!("synchronize", table = cache.schema().table);
    let _enter = span.enter();

    let started_at = Utc::now();
    let mut rows = Vec::with_capacity(cache.pending_count());
    let mut halted: Option<String> = None;

    for state in APPLY_ORDER {
      for key in cache.keys_in_state(state) {
        let outcome = match halted.clone() {
          Some(reason) => Outcome::Skipped { reason },
          None => match self.apply_row(cache, key, state) {
            Ok(()) => {
              debug!(key = %key, change = %state, "applied");
              Outcome::Applied
            }
            Err(e) => {
              warn!(key = %key, change = %state, error = %e, "row failed");
              if self.options.stop_on_unavailable && e.kind() == ErrorKind::StoreUnavailable {
                halted = Some(format!("store unavailable since row {}", key));
              }
              Outcome::Failed {
                kind: e.kind(),
                reason: e.to_string(),
              }
            }
          },
        };
        rows.push(RowOutcome {
          key,
          change: state,
          outcome,
        });
      }
    }

    let result = SyncResult {
      started_at,
      finished_at: Utc::now(),
      rows,
    };
    info!(
      rows = result.rows.len(),
      applied = result.applied(),
      failed = result.failed().count(),
      skipped = result.skipped().count(),
      "synchronize finished"
    );
    result
  }

  fn apply_row<S: BackingStore>(
    &self,
    cache: &mut DisconnectedCache<S>,
    key: RecordKey,
    state: RowState,
  ) -> Result<()> {
    let row = cache.row(key).cloned().ok_or(StoreError::NotFound(key))?;
    let expected = if self.options.check_versions {
      row.expected_etag()
    } else {
      None
    };
    let store = Arc::clone(cache.store());

    match state {
      RowState::Deleted => {
        store.delete(key, expected.as_ref())?;
        cache.forget(key);
      }
      RowState::Added => {
        store.insert(row.record())?;
        cache.accept(row.record().clone());
      }
      RowState::Modified => {
        let stored = store.update(key, &row.changes(), expected.as_ref())?;
        cache.accept(stored);
      }
      RowState::Unchanged => {}
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db::Database;
  use crate::entity::CUSTOMERS;
  use crate::record::{FieldChanges, FieldValue, Record};
  use crate::store::{Filter, InMemoryStore};

  fn customer(number: i64, city: &str) -> Record {
    Record::new(RecordKey(number))
      .with("customer_name", "Firma Peeters")
      .with("contact_last_name", "Jans")
      .with("contact_first_name", "Jan")
      .with("phone", "003212456")
      .with("address_line1", "EEN")
      .with("city", city)
      .with("country", "BE")
  }

  fn setup(keys: &[i64]) -> (Arc<InMemoryStore>, DisconnectedCache<InMemoryStore>) {
    let store = Arc::new(
      InMemoryStore::with_records(&CUSTOMERS, keys.iter().map(|k| customer(*k, "Gent"))).unwrap(),
    );
    let mut cache = DisconnectedCache::new(Arc::clone(&store));
    cache.load(Filter::All).unwrap();
    (store, cache)
  }

  fn keys(records: &[Record]) -> Vec<i64> {
    records.iter().map(|r| r.key().0).collect()
  }

  fn city(record: &Record) -> &FieldValue {
    record.get("city").unwrap_or(&FieldValue::Null)
  }

  #[test]
  fn test_update_and_delete_scenario() {
    const A: i64 = 1;
    const B: i64 = 2;
    let (store, mut cache) = setup(&[A, B]);

    cache
      .update(RecordKey(A), FieldChanges::new().set("city", "X"))
      .unwrap();
    assert_eq!(cache.row_state(RecordKey(A)), Some(RowState::Modified));

    cache.delete(RecordKey(B)).unwrap();
    assert_eq!(cache.row_state(RecordKey(B)), Some(RowState::Deleted));

    let cached = cache.view_cache_only();
    assert_eq!(keys(&cached), vec![A]);
    assert_eq!(city(&cached[0]), &FieldValue::from("X"));

    let stored = cache.view_store_only().unwrap();
    assert_eq!(keys(&stored), vec![A, B]);
    assert_eq!(city(&stored[0]), &FieldValue::from("Gent"));

    let result = SyncEngine::default().synchronize(&mut cache);
    assert_eq!(
      result.rows,
      vec![
        RowOutcome {
          key: RecordKey(B),
          change: RowState::Deleted,
          outcome: Outcome::Applied,
        },
        RowOutcome {
          key: RecordKey(A),
          change: RowState::Modified,
          outcome: Outcome::Applied,
        },
      ]
    );

    let remaining = store.query(&Filter::All).unwrap();
    assert_eq!(keys(&remaining), vec![A]);
    assert_eq!(city(&remaining[0]), &FieldValue::from("X"));

    assert_eq!(cache.row_state(RecordKey(A)), Some(RowState::Unchanged));
    assert!(cache.row(RecordKey(B)).is_none());
  }

  #[test]
  fn test_views_converge_after_sync() {
    let (_, mut cache) = setup(&[1, 2, 3]);
    cache.add(customer(4, "Brugge")).unwrap();
    cache
      .update(RecordKey(1), FieldChanges::new().set("phone", "xx32922000000"))
      .unwrap();
    cache.delete(RecordKey(3)).unwrap();

    assert_ne!(
      keys(&cache.view_cache_only()),
      keys(&cache.view_store_only().unwrap())
    );

    let result = SyncEngine::default().synchronize(&mut cache);
    assert!(result.is_clean());
    assert_eq!(result.applied(), 3);

    assert!(cache.rows().all(|row| row.state() == RowState::Unchanged));
    assert!(cache.row(RecordKey(3)).is_none());

    let cached = cache.view_cache_only();
    let stored = cache.view_store_only().unwrap();
    assert_eq!(keys(&cached), vec![1, 2, 4]);
    assert_eq!(keys(&cached), keys(&stored));
    for (a, b) in cached.iter().zip(&stored) {
      assert!(a.same_content(b));
    }
  }

  #[test]
  fn test_apply_order_is_deleted_added_modified() {
    let (_, mut cache) = setup(&[1, 2, 3]);
    cache
      .update(RecordKey(1), FieldChanges::new().set("city", "X"))
      .unwrap();
    cache.add(customer(5, "Y")).unwrap();
    cache.delete(RecordKey(3)).unwrap();
    cache.add(customer(4, "Z")).unwrap();
    cache.delete(RecordKey(2)).unwrap();

    let result = SyncEngine::default().synchronize(&mut cache);
    let order: Vec<_> = result.rows.iter().map(|r| (r.change, r.key.0)).collect();
    assert_eq!(
      order,
      vec![
        (RowState::Deleted, 2),
        (RowState::Deleted, 3),
        (RowState::Added, 4),
        (RowState::Added, 5),
        (RowState::Modified, 1),
      ]
    );
  }

  #[test]
  fn test_externally_deleted_row_fails_and_stays_pending() {
    let (store, mut cache) = setup(&[1]);
    cache
      .update(RecordKey(1), FieldChanges::new().set("city", "X"))
      .unwrap();
    store.delete(RecordKey(1), None).unwrap();

    let result = SyncEngine::default().synchronize(&mut cache);
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].failure_kind(), Some(ErrorKind::NotFound));
    assert_eq!(cache.row_state(RecordKey(1)), Some(RowState::Modified));
    assert_eq!(
      city(cache.get(RecordKey(1)).unwrap()),
      &FieldValue::from("X")
    );
  }

  #[test]
  fn test_externally_changed_row_conflicts() {
    let (store, mut cache) = setup(&[1]);
    cache
      .update(RecordKey(1), FieldChanges::new().set("city", "X"))
      .unwrap();
    store
      .update(RecordKey(1), &FieldChanges::new().set("phone", "999"), None)
      .unwrap();

    let result = SyncEngine::default().synchronize(&mut cache);
    assert_eq!(result.rows[0].failure_kind(), Some(ErrorKind::Conflict));
    assert_eq!(cache.row_state(RecordKey(1)), Some(RowState::Modified));

    let last_writer_wins = SyncEngine::new(SyncOptions {
      check_versions: false,
      ..SyncOptions::default()
    });
    let result = last_writer_wins.synchronize(&mut cache);
    assert!(result.is_clean());

    let stored = store.get(RecordKey(1)).unwrap().unwrap();
    assert_eq!(city(&stored), &FieldValue::from("X"));
    assert_eq!(stored.get("phone"), Some(&FieldValue::from("999")));
  }

  #[test]
  fn test_partial_failure_keeps_earlier_rows() {
    let (store, mut cache) = setup(&[1]);
    cache.delete(RecordKey(1)).unwrap();
    cache.add(customer(2, "X")).unwrap();
    store.insert(&customer(2, "elsewhere")).unwrap();

    let result = SyncEngine::default().synchronize(&mut cache);
    assert!(result.rows[0].is_applied());
    assert_eq!(result.rows[1].failure_kind(), Some(ErrorKind::DuplicateKey));

    assert!(store.get(RecordKey(1)).unwrap().is_none());
    assert!(cache.row(RecordKey(1)).is_none());
    assert_eq!(cache.row_state(RecordKey(2)), Some(RowState::Added));
    assert_eq!(result.failed_keys(), vec![RecordKey(2)]);
  }

  #[test]
  fn test_outage_skips_remaining_rows() {
    let (store, mut cache) = setup(&[1, 2]);
    cache.delete(RecordKey(1)).unwrap();
    cache.add(customer(3, "X")).unwrap();
    cache
      .update(RecordKey(2), FieldChanges::new().set("city", "Y"))
      .unwrap();
    store.set_available(false);

    let result = SyncEngine::default().synchronize(&mut cache);
    assert_eq!(
      result.rows[0].failure_kind(),
      Some(ErrorKind::StoreUnavailable)
    );
    assert_eq!(result.skipped().count(), 2);
    assert_eq!(cache.pending_count(), 3);

    store.set_available(true);
    let retry = SyncEngine::default().synchronize(&mut cache);
    assert!(retry.is_clean());
    assert_eq!(retry.applied(), 3);
    assert!(!cache.has_pending_changes());
  }

  #[test]
  fn test_outage_without_stop_tries_every_row() {
    let (store, mut cache) = setup(&[1, 2]);
    cache.delete(RecordKey(1)).unwrap();
    cache.delete(RecordKey(2)).unwrap();
    store.set_available(false);

    let engine = SyncEngine::new(SyncOptions {
      stop_on_unavailable: false,
      ..SyncOptions::default()
    });
    let result = engine.synchronize(&mut cache);
    assert_eq!(result.failed().count(), 2);
    assert_eq!(result.skipped().count(), 0);
  }

  #[test]
  fn test_nothing_pending_is_clean() {
    let (_, mut cache) = setup(&[1, 2]);
    let result = SyncEngine::default().synchronize(&mut cache);
    assert!(result.rows.is_empty());
    assert!(result.is_clean());
  }

  #[test]
  fn test_views_converge_after_sync_with_filtered_load() {
    let store = Arc::new(
      InMemoryStore::with_records(&CUSTOMERS, [customer(1, "Gent"), customer(2, "Gent")]).unwrap(),
    );
    let mut cache = DisconnectedCache::new(Arc::clone(&store));
    cache.load(Filter::field_equals("city", "Gent")).unwrap();

    cache
      .update(RecordKey(1), FieldChanges::new().set("city", "X"))
      .unwrap();
    cache.add(customer(3, "Brugge")).unwrap();

    let result = SyncEngine::default().synchronize(&mut cache);
    assert!(result.is_clean());

    let cached = cache.view_cache_only();
    let stored = cache.view_store_only().unwrap();
    assert_eq!(keys(&cached), vec![1, 2, 3]);
    assert_eq!(keys(&cached), keys(&stored));
    for (a, b) in cached.iter().zip(&stored) {
      assert!(a.same_content(b));
    }

    let row = cache.row(RecordKey(1)).unwrap();
    assert!(row.original().unwrap().same_content(row.record()));
  }

  #[test]
  fn test_sqlite_exercise_flow() {
    let db = Database::open_in_memory().unwrap();
    let store = Arc::new(db.customers());
    store.insert(&customer(103, "Nantes")).unwrap();

    let mut cache = DisconnectedCache::new(Arc::clone(&store));
    cache.load(Filter::All).unwrap();
    for n in [8880017, 9990042, 8880123, 9990777] {
      cache.add(customer(n, "city")).unwrap();
    }
    for n in 8880000..8890000 {
      let _ = cache.delete(RecordKey(n));
    }
    let changes = FieldChanges::from_delimited(
      &CUSTOMERS,
      "contact_first_name;city;phone",
      "ABC;DEF;xx32922000000",
    )
    .unwrap();
    cache.update(RecordKey(9990777), changes).unwrap();

    assert_eq!(keys(&cache.view_cache_only()), vec![103, 9990042, 9990777]);
    assert_eq!(keys(&cache.view_store_only().unwrap()), vec![103]);

    let result = SyncEngine::default().synchronize(&mut cache);
    assert!(result.is_clean());
    assert_eq!(result.applied(), 2);

    let stored = store.get(RecordKey(9990777)).unwrap().unwrap();
    assert_eq!(city(&stored), &FieldValue::from("DEF"));
    assert_eq!(
      keys(&cache.view_store_only().unwrap()),
      vec![103, 9990042, 9990777]
    );
  }
}

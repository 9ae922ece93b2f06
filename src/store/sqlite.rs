//! SQLite-backed store.

use chrono::NaiveDate;
use rusqlite::types::{Type, Value};
use rusqlite::{ffi, params_from_iter, Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::{BackingStore, Filter};
use crate::error::{Result, StoreError};
use crate::record::{ETag, FieldChanges, FieldType, FieldValue, Money, Record, RecordKey, TableSchema};

/// Store for one table inside a shared SQLite connection.
///
/// Column names always come from the static schema, never from caller
/// input; values are bound as parameters.
#[derive(Clone)]
pub struct SqliteStore {
  schema: &'static TableSchema,
  conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
  pub fn new(conn: Arc<Mutex<Connection>>, schema: &'static TableSchema) -> Self {
    Self { schema, conn }
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| StoreError::StoreUnavailable(format!("Lock poisoned: {}", e)))
  }

  /// Key column followed by the schema fields, in schema order.
  fn columns(&self) -> String {
    std::iter::once(self.schema.key)
      .chain(self.schema.fields.iter().map(|f| f.name))
      .collect::<Vec<_>>()
      .join(", ")
  }

  fn where_clause(&self, filter: &Filter) -> Result<(String, Vec<Value>)> {
    let key = self.schema.key;
    let clause = match filter {
      Filter::All => (String::new(), Vec::new()),
      Filter::Key(k) => (format!(" WHERE {} = ?", key), vec![Value::Integer(k.0)]),
      Filter::KeyRange { from, to } => (
        format!(" WHERE {} BETWEEN ? AND ?", key),
        vec![Value::Integer(from.0), Value::Integer(to.0)],
      ),
      Filter::FieldEquals { field, value } => {
        let def = self.schema.typed_field(field, value)?;
        if value.is_null() {
          (format!(" WHERE {} IS NULL", def.name), Vec::new())
        } else {
          (format!(" WHERE {} = ?", def.name), vec![to_sql(value)])
        }
      }
    };
    Ok(clause)
  }

  fn read_row(&self, row: &Row<'_>) -> rusqlite::Result<Record> {
    let mut record = Record::new(RecordKey(row.get(0)?));
    for (i, def) in self.schema.fields.iter().enumerate() {
      let idx = i + 1;
      let value: FieldValue = match def.field_type {
        FieldType::Text => row.get::<_, Option<String>>(idx)?.into(),
        FieldType::Integer => row.get::<_, Option<i64>>(idx)?.into(),
        FieldType::Currency => row
          .get::<_, Option<i64>>(idx)?
          .map(Money::from_cents)
          .into(),
        FieldType::Date => match row.get::<_, Option<String>>(idx)? {
          Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map(FieldValue::Date)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))?,
          None => FieldValue::Null,
        },
      };
      record.set(def.name, value);
    }
    Ok(record)
  }

  fn fetch(&self, conn: &Connection, key: RecordKey) -> Result<Option<Record>> {
    let sql = format!(
      "SELECT {} FROM {} WHERE {} = ?",
      self.columns(),
      self.schema.table,
      self.schema.key
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map([key.0], |row| self.read_row(row))?;
    let record = rows.next().transpose()?;
    Ok(record)
  }

  /// Load the stored record and check it against the caller's version.
  fn checked(&self, conn: &Connection, key: RecordKey, expected: Option<&ETag>) -> Result<Record> {
    let current = self.fetch(conn, key)?.ok_or(StoreError::NotFound(key))?;
    if let Some(expected) = expected {
      if current.etag() != *expected {
        return Err(StoreError::Conflict(key));
      }
    }
    Ok(current)
  }
}

/// DDL for a schema's table.
pub(crate) fn create_table_sql(schema: &TableSchema) -> String {
  let mut columns = vec![format!("    {} INTEGER PRIMARY KEY", schema.key)];
  for def in schema.fields {
    let sql_type = match def.field_type {
      FieldType::Text | FieldType::Date => "TEXT",
      FieldType::Integer | FieldType::Currency => "INTEGER",
    };
    let not_null = if def.required { " NOT NULL" } else { "" };
    columns.push(format!("    {} {}{}", def.name, sql_type, not_null));
  }
  format!(
    "CREATE TABLE IF NOT EXISTS {} (\n{}\n);\n",
    schema.table,
    columns.join(",\n")
  )
}

fn to_sql(value: &FieldValue) -> Value {
  match value {
    FieldValue::Null => Value::Null,
    FieldValue::Text(s) => Value::Text(s.clone()),
    FieldValue::Integer(i) => Value::Integer(*i),
    FieldValue::Currency(m) => Value::Integer(m.cents()),
    FieldValue::Date(d) => Value::Text(d.format("%Y-%m-%d").to_string()),
  }
}

fn is_primary_key_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(err, _) if err.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
  )
}

impl BackingStore for SqliteStore {
  fn schema(&self) -> &'static TableSchema {
    self.schema
  }

  fn query(&self, filter: &Filter) -> Result<Vec<Record>> {
    let (clause, params) = self.where_clause(filter)?;
    let sql = format!(
      "SELECT {} FROM {}{} ORDER BY {}",
      self.columns(),
      self.schema.table,
      clause,
      self.schema.key
    );

    let conn = self.lock()?;
    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
      .query_map(params_from_iter(params.iter()), |row| self.read_row(row))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
  }

  fn get(&self, key: RecordKey) -> Result<Option<Record>> {
    let conn = self.lock()?;
    self.fetch(&conn, key)
  }

  fn insert(&self, record: &Record) -> Result<()> {
    let normalized = self.schema.normalize(record)?;
    let key = record.key();

    let placeholders = vec!["?"; self.schema.fields.len() + 1].join(", ");
    let sql = format!(
      "INSERT INTO {} ({}) VALUES ({})",
      self.schema.table,
      self.columns(),
      placeholders
    );
    let mut params = vec![Value::Integer(key.0)];
    params.extend(
      self
        .schema
        .fields
        .iter()
        .map(|def| normalized.get(def.name).map(to_sql).unwrap_or(Value::Null)),
    );

    let conn = self.lock()?;
    conn
      .execute(&sql, params_from_iter(params.iter()))
      .map_err(|e| {
        if is_primary_key_violation(&e) {
          StoreError::DuplicateKey(key)
        } else {
          e.into()
        }
      })?;

    debug!(table = self.schema.table, key = %key, "insert");
    Ok(())
  }

  fn update(
    &self,
    key: RecordKey,
    changes: &FieldChanges,
    expected: Option<&ETag>,
  ) -> Result<Record> {
    self.schema.validate_changes(changes)?;

    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    self.checked(&tx, key, expected)?;

    if !changes.is_empty() {
      let mut assignments = Vec::with_capacity(changes.len());
      let mut params = Vec::with_capacity(changes.len() + 1);
      for (name, value) in changes.iter() {
        let def = self.schema.field(name).ok_or_else(|| {
          StoreError::InvalidRecord(format!("{} has no field '{}'", self.schema.table, name))
        })?;
        assignments.push(format!("{} = ?", def.name));
        params.push(to_sql(value));
      }
      params.push(Value::Integer(key.0));

      let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        self.schema.table,
        assignments.join(", "),
        self.schema.key
      );
      tx.execute(&sql, params_from_iter(params.iter()))?;
    }

    let updated = self.fetch(&tx, key)?.ok_or(StoreError::NotFound(key))?;
    tx.commit()?;

    debug!(table = self.schema.table, key = %key, fields = changes.len(), "update");
    Ok(updated)
  }

  fn delete(&self, key: RecordKey, expected: Option<&ETag>) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    self.checked(&tx, key, expected)?;

    let sql = format!(
      "DELETE FROM {} WHERE {} = ?",
      self.schema.table, self.schema.key
    );
    tx.execute(&sql, [key.0])?;
    tx.commit()?;

    debug!(table = self.schema.table, key = %key, "delete");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db::Database;
  use crate::entity::{Customer, Entity, Order, CUSTOMERS};

  fn customer(number: i64, city: &str) -> Record {
    Record::new(RecordKey(number))
      .with("customer_name", "Firma Peeters")
      .with("contact_last_name", "Jans")
      .with("contact_first_name", "Jan")
      .with("phone", "003212456")
      .with("address_line1", "EEN")
      .with("city", city)
      .with("country", "BE")
      .with("credit_limit", Money::from_cents(5000))
  }

  #[test]
  fn test_create_table_sql() {
    let sql = create_table_sql(&CUSTOMERS);
    assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS customers ("));
    assert!(sql.contains("customer_number INTEGER PRIMARY KEY"));
    assert!(sql.contains("city TEXT NOT NULL"));
    assert!(sql.contains("credit_limit INTEGER,") || sql.contains("credit_limit INTEGER\n"));
  }

  #[test]
  fn test_round_trip_all_field_types() {
    let db = Database::open_in_memory().unwrap();
    let customers = db.customers();
    let orders = db.orders();

    customers.insert(&customer(103, "Nantes")).unwrap();
    let order = Order {
      order_number: 110001,
      order_date: NaiveDate::from_ymd_opt(2018, 12, 1).unwrap(),
      required_date: NaiveDate::from_ymd_opt(2018, 12, 25).unwrap(),
      shipped_date: Some(NaiveDate::from_ymd_opt(2018, 12, 13).unwrap()),
      status: "ok".into(),
      comments: None,
      customer_number: 103,
    };
    orders.insert(&order.to_record()).unwrap();

    let stored = customers.get(RecordKey(103)).unwrap().unwrap();
    let back = Customer::from_record(&stored).unwrap();
    assert_eq!(back.city, "Nantes");
    assert_eq!(back.credit_limit, Some(Money::from_cents(5000)));
    assert_eq!(back.state, None);

    let stored = orders.get(RecordKey(110001)).unwrap().unwrap();
    assert_eq!(Order::from_record(&stored).unwrap(), order);
  }

  #[test]
  fn test_stored_shape_matches_memory_store() {
    let db = Database::open_in_memory().unwrap();
    let sqlite = db.customers();
    let memory = crate::store::InMemoryStore::new(&CUSTOMERS);

    sqlite.insert(&customer(1, "Gent")).unwrap();
    memory.insert(&customer(1, "Gent")).unwrap();

    let a = sqlite.get(RecordKey(1)).unwrap().unwrap();
    let b = memory.get(RecordKey(1)).unwrap().unwrap();
    assert!(a.same_content(&b));
    assert_eq!(a.etag(), b.etag());
  }

  #[test]
  fn test_duplicate_insert() {
    let db = Database::open_in_memory().unwrap();
    let store = db.customers();
    store.insert(&customer(1, "Gent")).unwrap();

    let err = store.insert(&customer(1, "Brugge")).unwrap_err();
    assert_eq!(err, StoreError::DuplicateKey(RecordKey(1)));
  }

  #[test]
  fn test_query_filters() {
    let db = Database::open_in_memory().unwrap();
    let store = db.customers();
    for (n, city) in [(8880001, "Gent"), (8880002, "Brugge"), (9990001, "Gent")] {
      store.insert(&customer(n, city)).unwrap();
    }

    let range = store
      .query(&Filter::KeyRange {
        from: RecordKey(8880000),
        to: RecordKey(8889999),
      })
      .unwrap();
    assert_eq!(range.len(), 2);

    let gent = store.query(&Filter::field_equals("city", "Gent")).unwrap();
    let keys: Vec<_> = gent.iter().map(|r| r.key().0).collect();
    assert_eq!(keys, vec![8880001, 9990001]);

    let no_state = store
      .query(&Filter::field_equals("state", FieldValue::Null))
      .unwrap();
    assert_eq!(no_state.len(), 3);

    assert!(store.query(&Filter::field_equals("planet", "Mars")).is_err());
  }

  #[test]
  fn test_mistyped_filters_rejected_like_memory_store() {
    let db = Database::open_in_memory().unwrap();
    let sqlite = db.customers();
    let memory = crate::store::InMemoryStore::new(&CUSTOMERS);
    let record = customer(1, "5").with("credit_limit", Money::from_cents(50));
    sqlite.insert(&record).unwrap();
    memory.insert(&record).unwrap();

    for filter in [
      Filter::field_equals("city", 5_i64),
      Filter::field_equals("credit_limit", "50.00"),
    ] {
      assert!(
        matches!(sqlite.query(&filter), Err(StoreError::InvalidRecord(_))),
        "sqlite accepted {:?}",
        filter
      );
      assert!(
        matches!(memory.query(&filter), Err(StoreError::InvalidRecord(_))),
        "memory accepted {:?}",
        filter
      );
    }

    let filter = Filter::field_equals("credit_limit", Money::from_cents(50));
    assert_eq!(sqlite.query(&filter).unwrap().len(), 1);
    assert_eq!(memory.query(&filter).unwrap().len(), 1);
  }

  #[test]
  fn test_update_returns_stored_record() {
    let db = Database::open_in_memory().unwrap();
    let store = db.customers();
    store.insert(&customer(1, "Gent")).unwrap();

    let changes = FieldChanges::new()
      .set("city", "DEF")
      .set("sales_rep_employee_number", 1370_i64);
    let updated = store.update(RecordKey(1), &changes, None).unwrap();

    assert_eq!(updated.get("city"), Some(&FieldValue::from("DEF")));
    assert_eq!(
      updated.get("sales_rep_employee_number"),
      Some(&FieldValue::Integer(1370))
    );

    let unchanged = store.update(RecordKey(1), &FieldChanges::new(), None).unwrap();
    assert!(unchanged.same_content(&updated));
  }

  #[test]
  fn test_version_conflict_and_missing_rows() {
    let db = Database::open_in_memory().unwrap();
    let store = db.customers();
    store.insert(&customer(1, "Gent")).unwrap();
    let seen = store.get(RecordKey(1)).unwrap().unwrap().etag();

    store
      .update(RecordKey(1), &FieldChanges::new().set("city", "Brugge"), None)
      .unwrap();

    assert_eq!(
      store.delete(RecordKey(1), Some(&seen)).unwrap_err(),
      StoreError::Conflict(RecordKey(1))
    );
    assert_eq!(
      store.delete(RecordKey(2), None).unwrap_err(),
      StoreError::NotFound(RecordKey(2))
    );

    store.delete(RecordKey(1), None).unwrap();
    assert!(store.get(RecordKey(1)).unwrap().is_none());
  }
}

use color_eyre::{eyre::eyre, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

use crate::entity::{CUSTOMERS, ORDERS, ORDER_DETAILS};
use crate::record::TableSchema;
use crate::store::{create_table_sql, SqliteStore};

/// Tables created on open
static TABLES: &[&TableSchema] = &[&CUSTOMERS, &ORDERS, &ORDER_DETAILS];

/// How long a statement waits on a locked database before failing
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shop database: one SQLite connection shared by all table stores
pub struct Database {
  conn: Arc<Mutex<Connection>>,
}

impl Database {
  /// Open or create the database at `path`, or at the default location
  pub fn open(path: Option<&Path>, busy_timeout: Duration) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create database directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open database at {}: {}", path.display(), e))?;
    conn
      .busy_timeout(busy_timeout)
      .map_err(|e| eyre!("Failed to set busy timeout: {}", e))?;

    info!(path = %path.display(), "opened database");
    Self::from_connection(conn)
  }

  /// Open a private in-memory database
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let db = Self {
      conn: Arc::new(Mutex::new(conn)),
    };
    db.run_migrations()?;
    Ok(db)
  }

  /// Get the default database path
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("winkel").join("winkel.db"))
  }

  /// Create any missing tables
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let ddl: String = TABLES.iter().map(|schema| create_table_sql(schema)).collect();
    conn
      .execute_batch(&ddl)
      .map_err(|e| eyre!("Failed to run migrations: {}", e))?;
    Ok(())
  }

  /// Store handle for one table
  pub fn store(&self, schema: &'static TableSchema) -> SqliteStore {
    SqliteStore::new(Arc::clone(&self.conn), schema)
  }

  pub fn customers(&self) -> SqliteStore {
    self.store(&CUSTOMERS)
  }

  pub fn orders(&self) -> SqliteStore {
    self.store(&ORDERS)
  }

  pub fn order_details(&self) -> SqliteStore {
    self.store(&ORDER_DETAILS)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::{BackingStore, Filter};

  #[test]
  fn test_open_creates_tables() {
    let db = Database::open_in_memory().unwrap();
    assert!(db.customers().query(&Filter::All).unwrap().is_empty());
    assert!(db.orders().query(&Filter::All).unwrap().is_empty());
    assert!(db.order_details().query(&Filter::All).unwrap().is_empty());
  }

  #[test]
  fn test_order_details_listed_per_order() {
    use crate::entity::{Entity, OrderDetail};
    use crate::record::Money;

    let db = Database::open_in_memory().unwrap();
    let details = db.order_details();
    for order_number in [110001, 110002] {
      for line in 1..=3 {
        let detail = OrderDetail {
          order_number,
          order_line_number: line,
          product_code: (line * 111).to_string(),
          quantity_ordered: 100 * line,
          price_each: Money::from_cents(1000 * line),
        };
        details.insert(&detail.to_record()).unwrap();
      }
    }

    let (from, to) = OrderDetail::key_range(110001);
    let lines: Vec<OrderDetail> = details
      .query(&Filter::KeyRange { from, to })
      .unwrap()
      .iter()
      .map(|r| OrderDetail::from_record(r).unwrap())
      .collect();
    assert_eq!(lines.len(), 3);
    assert!(lines.iter().all(|d| d.order_number == 110001));
    assert_eq!(lines[2].price_each, Money::from_cents(3000));
  }
}

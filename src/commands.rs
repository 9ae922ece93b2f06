//! Subcommand handlers. Single-record commands go through the connected
//! accessor; `demo` replays the shop exercise through the cache.

use clap::Args;
use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;

use crate::output::Output;
use winkel::config::Config;
use winkel::entity::{Customer, Entity, Order, OrderDetail, CUSTOMERS};
use winkel::record::Money;
use winkel::{
  ConnectedAccessor, Database, DisconnectedCache, FieldChanges, Filter, Record, RecordKey,
  SyncEngine,
};

/// Key blocks used by the demo: customers added then deleted, and customers kept
const DEMO_DELETED_BLOCK: i64 = 8_880_000;
const DEMO_KEPT_BLOCK: i64 = 9_990_000;
const BLOCK_SIZE: i64 = 10_000;

const ORDER_BLOCK: i64 = 110_000;

#[derive(Args, Debug)]
pub struct CustomerArgs {
  /// Customer number
  #[arg(long)]
  number: i64,
  #[arg(long)]
  name: String,
  #[arg(long)]
  contact_last_name: String,
  #[arg(long)]
  contact_first_name: String,
  #[arg(long)]
  phone: String,
  #[arg(long)]
  address_line1: String,
  #[arg(long)]
  address_line2: Option<String>,
  #[arg(long)]
  city: String,
  #[arg(long)]
  state: Option<String>,
  #[arg(long)]
  postal_code: Option<String>,
  #[arg(long)]
  country: String,
  #[arg(long)]
  sales_rep: Option<i64>,
  /// Amount such as 50.00
  #[arg(long)]
  credit_limit: Option<Money>,
}

impl From<CustomerArgs> for Customer {
  fn from(args: CustomerArgs) -> Self {
    Self {
      customer_number: args.number,
      customer_name: args.name,
      contact_last_name: args.contact_last_name,
      contact_first_name: args.contact_first_name,
      phone: args.phone,
      address_line1: args.address_line1,
      address_line2: args.address_line2,
      city: args.city,
      state: args.state,
      postal_code: args.postal_code,
      country: args.country,
      sales_rep_employee_number: args.sales_rep,
      credit_limit: args.credit_limit,
    }
  }
}

/// Lines written with every sample order
const SAMPLE_ORDER_LINES: i64 = 5;

/// Connected accessor on the table of entity `E`.
fn accessor<E: Entity>(db: &Database) -> ConnectedAccessor<winkel::SqliteStore> {
  ConnectedAccessor::new(Arc::new(db.store(E::schema())))
}

fn customers(db: &Database) -> ConnectedAccessor<winkel::SqliteStore> {
  accessor::<Customer>(db)
}

fn orders(db: &Database) -> ConnectedAccessor<winkel::SqliteStore> {
  accessor::<Order>(db)
}

pub fn list(db: &Database, out: &Output, city: Option<String>) -> Result<()> {
  let filter = city
    .map(|c| Filter::field_equals("city", c))
    .unwrap_or_default();
  let records = customers(db).list(&filter)?;
  out.entities::<Customer>("customers", &records)
}

pub fn get(db: &Database, out: &Output, number: i64) -> Result<()> {
  let record = customers(db).get(RecordKey(number))?;
  out.entity::<Customer>(&record)
}

pub fn add(db: &Database, out: &Output, args: CustomerArgs) -> Result<()> {
  let customer = Customer::from(args);
  customers(db).add(customer.to_record())?;
  out.message(format!("Added customer {}", customer.customer_number));
  Ok(())
}

pub fn update(db: &Database, out: &Output, number: i64, fields: &str, values: &str) -> Result<()> {
  let changes = FieldChanges::from_delimited(&CUSTOMERS, fields, values)?;
  let stored = customers(db).update(RecordKey(number), changes)?;
  out.entity::<Customer>(&stored)
}

pub fn delete(db: &Database, out: &Output, number: i64) -> Result<()> {
  customers(db).delete(RecordKey(number))?;
  out.message(format!("Deleted customer {}", number));
  Ok(())
}

pub fn list_orders(db: &Database, out: &Output, customer: Option<i64>) -> Result<()> {
  let filter = customer
    .map(|c| Filter::field_equals("customer_number", c))
    .unwrap_or_default();
  let records = orders(db).list(&filter)?;
  out.entities::<Order>("orders", &records)
}

pub fn add_order(db: &Database, out: &Output, customer: i64, number: Option<i64>) -> Result<()> {
  let order_table = orders(db);
  let order_number = match number {
    Some(n) => n,
    None => next_order_number(&order_table)?,
  };

  let order = Order {
    order_number,
    order_date: date(2018, 12, 1)?,
    required_date: date(2018, 12, 25)?,
    shipped_date: Some(date(2018, 12, 13)?),
    status: "ok".into(),
    comments: Some("this order has no comments".into()),
    customer_number: customer,
  };
  order_table.add(order.to_record())?;

  let details = accessor::<OrderDetail>(db);
  for line in 1..=SAMPLE_ORDER_LINES {
    let detail = OrderDetail {
      order_number,
      order_line_number: line,
      product_code: (line * 111).to_string(),
      quantity_ordered: 100 * line,
      price_each: Money::from_cents(1000 * line),
    };
    details.add(detail.to_record())?;
  }

  out.entity::<Order>(&order.to_record())?;
  let (from, to) = OrderDetail::key_range(order_number);
  let lines = details.list(&Filter::KeyRange { from, to })?;
  out.entities::<OrderDetail>("details", &lines)
}

/// First unused order number above the order block.
fn next_order_number(accessor: &ConnectedAccessor<winkel::SqliteStore>) -> Result<i64> {
  let taken = accessor.list(&Filter::KeyRange {
    from: RecordKey(ORDER_BLOCK + 1),
    to: RecordKey(ORDER_BLOCK + BLOCK_SIZE - 1),
  })?;
  let next = taken.last().map_or(ORDER_BLOCK + 1, |r| r.key().0 + 1);
  if next >= ORDER_BLOCK + BLOCK_SIZE {
    return Err(eyre!("No free order numbers left above {}", ORDER_BLOCK));
  }
  Ok(next)
}

fn date(y: i32, m: u32, d: u32) -> Result<chrono::NaiveDate> {
  chrono::NaiveDate::from_ymd_opt(y, m, d).ok_or_else(|| eyre!("Invalid date {}-{}-{}", y, m, d))
}

fn sample_customer(number: i64) -> Customer {
  Customer {
    customer_number: number,
    customer_name: "Firma Peeters".into(),
    contact_last_name: "Jans".into(),
    contact_first_name: "Jan".into(),
    phone: "003212456".into(),
    address_line1: "EEN".into(),
    address_line2: Some("TWEE".into()),
    city: "city".into(),
    state: Some("West-Vlaanderen".into()),
    postal_code: Some("XM4545".into()),
    country: "BE".into(),
    sales_rep_employee_number: Some(10101010),
    credit_limit: Some(Money::from_cents(5000)),
  }
}

/// First key in `block` with no row in the snapshot.
fn next_free<S: winkel::BackingStore>(cache: &DisconnectedCache<S>, block: i64) -> Result<RecordKey> {
  (block + 1..block + BLOCK_SIZE)
    .map(RecordKey)
    .find(|key| cache.row(*key).is_none())
    .ok_or_else(|| eyre!("No free customer numbers left above {}", block))
}

fn in_block(record: &Record, block: i64) -> bool {
  (block..block + BLOCK_SIZE).contains(&record.key().0)
}

pub fn demo(db: &Database, config: &Config, out: &Output) -> Result<()> {
  let store = Arc::new(db.customers());
  let mut cache = DisconnectedCache::new(store).with_load_policy(config.load_policy());
  let loaded = cache.load(Filter::All)?;
  out.message(format!("Loaded {} customers into the cache", loaded));

  out.message("\nAdding 6 customers: 3 numbered 888xxxx and 3 numbered 999xxxx, all for 'Jan Jans'");
  let mut last_added = RecordKey(DEMO_KEPT_BLOCK);
  for _ in 0..3 {
    let key = next_free(&cache, DEMO_DELETED_BLOCK)?;
    cache.add(sample_customer(key.0).to_record())?;
    last_added = next_free(&cache, DEMO_KEPT_BLOCK)?;
    cache.add(sample_customer(last_added.0).to_record())?;
  }
  out.views(&cache)?;

  out.message("\nDeleting every customer numbered 888xxxx");
  let doomed: Vec<RecordKey> = cache
    .view_cache_only()
    .iter()
    .filter(|r| in_block(r, DEMO_DELETED_BLOCK))
    .map(Record::key)
    .collect();
  for key in doomed {
    cache.delete(key)?;
  }

  out.message(format!(
    "\nCustomer {} gets contact 'ABC', city 'DEF' and a phone number full of zeros",
    last_added
  ));
  let changes = FieldChanges::from_delimited(
    &CUSTOMERS,
    "contact_first_name;city;phone",
    "ABC;DEF;xx32922000000",
  )?;
  cache.update(last_added, changes)?;
  out.views(&cache)?;

  out.message("\nSynchronizing the cache with the database");
  let result = SyncEngine::new(config.sync_options()).synchronize(&mut cache);
  out.sync_result(&result)?;
  out.views(&cache)?;

  if !result.is_clean() {
    return Err(eyre!(
      "{} row(s) were not synchronized: {:?}",
      result.failed_keys().len(),
      result.failed_keys()
    ));
  }
  Ok(())
}

//! Typed shop entities on top of plain records.

mod customer;
mod order;
mod order_detail;

use chrono::NaiveDate;

use crate::error::{Result, StoreError};
use crate::record::{FieldValue, Money, Record, RecordKey, TableSchema};

pub use customer::{Customer, CUSTOMERS};
pub use order::{Order, ORDERS};
pub use order_detail::{OrderDetail, MAX_ORDER_LINES, ORDER_DETAILS};

/// Entity that maps onto the records of one table.
pub trait Entity: Sized {
  fn schema() -> &'static TableSchema;

  fn key(&self) -> RecordKey;

  fn to_record(&self) -> Record;

  fn from_record(record: &Record) -> Result<Self>;
}

/// Typed accessors over a record, with errors naming the table and field.
struct FieldReader<'a> {
  record: &'a Record,
  table: &'static str,
}

impl<'a> FieldReader<'a> {
  fn new(record: &'a Record, schema: &'static TableSchema) -> Self {
    Self {
      record,
      table: schema.table,
    }
  }

  fn value(&self, name: &str) -> &'a FieldValue {
    self.record.get(name).unwrap_or(&FieldValue::Null)
  }

  fn mismatch(&self, name: &str, expected: &str) -> StoreError {
    StoreError::InvalidRecord(format!(
      "{}.{} of {} is not {}",
      self.table,
      name,
      self.record.key(),
      expected
    ))
  }

  /// Read an optional field, failing if it holds a value of another type.
  fn opt<T>(
    &self,
    name: &str,
    expected: &str,
    read: impl Fn(&'a FieldValue) -> Option<T>,
  ) -> Result<Option<T>> {
    let value = self.value(name);
    if value.is_null() {
      return Ok(None);
    }
    read(value)
      .map(Some)
      .ok_or_else(|| self.mismatch(name, expected))
  }

  fn text(&self, name: &str) -> Result<String> {
    self.opt_text(name)?.ok_or_else(|| self.mismatch(name, "set"))
  }

  fn opt_text(&self, name: &str) -> Result<Option<String>> {
    self.opt(name, "text", |v| v.as_text().map(str::to_string))
  }

  fn integer(&self, name: &str) -> Result<i64> {
    self.opt_integer(name)?.ok_or_else(|| self.mismatch(name, "set"))
  }

  fn opt_integer(&self, name: &str) -> Result<Option<i64>> {
    self.opt(name, "an integer", FieldValue::as_integer)
  }

  fn currency(&self, name: &str) -> Result<Money> {
    self.opt_currency(name)?.ok_or_else(|| self.mismatch(name, "set"))
  }

  fn opt_currency(&self, name: &str) -> Result<Option<Money>> {
    self.opt(name, "a currency amount", FieldValue::as_currency)
  }

  fn date(&self, name: &str) -> Result<NaiveDate> {
    self.opt_date(name)?.ok_or_else(|| self.mismatch(name, "set"))
  }

  fn opt_date(&self, name: &str) -> Result<Option<NaiveDate>> {
    self.opt(name, "a date", FieldValue::as_date)
  }
}

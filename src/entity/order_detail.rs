use serde::Serialize;
use std::fmt;

use super::{Entity, FieldReader};
use crate::error::{Result, StoreError};
use crate::record::{FieldDef, FieldType, Money, Record, RecordKey, TableSchema};

/// Highest line number one order can carry.
pub const MAX_ORDER_LINES: i64 = 99;

/// The `order_details` table.
///
/// Detail lines are identified by order and line number; the single
/// integer key is derived from both as `order_number * 100 + line`.
pub static ORDER_DETAILS: TableSchema = TableSchema {
  table: "order_details",
  key: "detail_number",
  fields: &[
    FieldDef::required("order_number", FieldType::Integer),
    FieldDef::required("order_line_number", FieldType::Integer),
    FieldDef::required("product_code", FieldType::Text),
    FieldDef::required("quantity_ordered", FieldType::Integer),
    FieldDef::required("price_each", FieldType::Currency),
  ],
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDetail {
  pub order_number: i64,
  pub order_line_number: i64,
  pub product_code: String,
  pub quantity_ordered: i64,
  pub price_each: Money,
}

impl OrderDetail {
  /// Record key of line `line` of order `order_number`.
  pub fn detail_key(order_number: i64, line: i64) -> RecordKey {
    RecordKey(order_number * (MAX_ORDER_LINES + 1) + line)
  }

  /// Key range holding every detail line of an order.
  pub fn key_range(order_number: i64) -> (RecordKey, RecordKey) {
    (
      Self::detail_key(order_number, 1),
      Self::detail_key(order_number, MAX_ORDER_LINES),
    )
  }
}

impl Entity for OrderDetail {
  fn schema() -> &'static TableSchema {
    &ORDER_DETAILS
  }

  fn key(&self) -> RecordKey {
    Self::detail_key(self.order_number, self.order_line_number)
  }

  fn to_record(&self) -> Record {
    Record::new(self.key())
      .with("order_number", self.order_number)
      .with("order_line_number", self.order_line_number)
      .with("product_code", self.product_code.as_str())
      .with("quantity_ordered", self.quantity_ordered)
      .with("price_each", self.price_each)
  }

  fn from_record(record: &Record) -> Result<Self> {
    let r = FieldReader::new(record, &ORDER_DETAILS);
    let detail = Self {
      order_number: r.integer("order_number")?,
      order_line_number: r.integer("order_line_number")?,
      product_code: r.text("product_code")?,
      quantity_ordered: r.integer("quantity_ordered")?,
      price_each: r.currency("price_each")?,
    };
    if detail.key() != record.key() {
      return Err(StoreError::InvalidRecord(format!(
        "order_details key {} does not match order {} line {}",
        record.key(),
        detail.order_number,
        detail.order_line_number
      )));
    }
    Ok(detail)
  }
}

impl fmt::Display for OrderDetail {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "order {} line {}: {} x {} at {}",
      self.order_number,
      self.order_line_number,
      self.quantity_ordered,
      self.product_code,
      self.price_each
    )
  }
}

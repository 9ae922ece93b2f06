use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use super::{Entity, FieldReader};
use crate::error::Result;
use crate::record::{FieldDef, FieldType, Record, RecordKey, TableSchema};

/// The `orders` table.
pub static ORDERS: TableSchema = TableSchema {
  table: "orders",
  key: "order_number",
  fields: &[
    FieldDef::required("order_date", FieldType::Date),
    FieldDef::required("required_date", FieldType::Date),
    FieldDef::optional("shipped_date", FieldType::Date),
    FieldDef::required("status", FieldType::Text),
    FieldDef::optional("comments", FieldType::Text),
    FieldDef::required("customer_number", FieldType::Integer),
  ],
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
  pub order_number: i64,
  pub order_date: NaiveDate,
  pub required_date: NaiveDate,
  pub shipped_date: Option<NaiveDate>,
  pub status: String,
  pub comments: Option<String>,
  pub customer_number: i64,
}

impl Entity for Order {
  fn schema() -> &'static TableSchema {
    &ORDERS
  }

  fn key(&self) -> RecordKey {
    RecordKey(self.order_number)
  }

  fn to_record(&self) -> Record {
    Record::new(self.key())
      .with("order_date", self.order_date)
      .with("required_date", self.required_date)
      .with("shipped_date", self.shipped_date)
      .with("status", self.status.as_str())
      .with("comments", self.comments.clone())
      .with("customer_number", self.customer_number)
  }

  fn from_record(record: &Record) -> Result<Self> {
    let r = FieldReader::new(record, &ORDERS);
    Ok(Self {
      order_number: record.key().0,
      order_date: r.date("order_date")?,
      required_date: r.date("required_date")?,
      shipped_date: r.opt_date("shipped_date")?,
      status: r.text("status")?,
      comments: r.opt_text("comments")?,
      customer_number: r.integer("customer_number")?,
    })
  }
}

impl fmt::Display for Order {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "order {} for customer {}: {} ordered {} required {}",
      self.order_number, self.customer_number, self.status, self.order_date, self.required_date
    )?;
    if let Some(shipped) = self.shipped_date {
      write!(f, " shipped {}", shipped)?;
    }
    Ok(())
  }
}

use serde::Serialize;
use std::fmt;

use super::{Entity, FieldReader};
use crate::error::Result;
use crate::record::{FieldDef, FieldType, Money, Record, RecordKey, TableSchema};

/// The `customers` table.
pub static CUSTOMERS: TableSchema = TableSchema {
  table: "customers",
  key: "customer_number",
  fields: &[
    FieldDef::required("customer_name", FieldType::Text),
    FieldDef::required("contact_last_name", FieldType::Text),
    FieldDef::required("contact_first_name", FieldType::Text),
    FieldDef::required("phone", FieldType::Text),
    FieldDef::required("address_line1", FieldType::Text),
    FieldDef::optional("address_line2", FieldType::Text),
    FieldDef::required("city", FieldType::Text),
    FieldDef::optional("state", FieldType::Text),
    FieldDef::optional("postal_code", FieldType::Text),
    FieldDef::required("country", FieldType::Text),
    FieldDef::optional("sales_rep_employee_number", FieldType::Integer),
    FieldDef::optional("credit_limit", FieldType::Currency),
  ],
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Customer {
  pub customer_number: i64,
  pub customer_name: String,
  pub contact_last_name: String,
  pub contact_first_name: String,
  pub phone: String,
  pub address_line1: String,
  pub address_line2: Option<String>,
  pub city: String,
  pub state: Option<String>,
  pub postal_code: Option<String>,
  pub country: String,
  pub sales_rep_employee_number: Option<i64>,
  pub credit_limit: Option<Money>,
}

impl Entity for Customer {
  fn schema() -> &'static TableSchema {
    &CUSTOMERS
  }

  fn key(&self) -> RecordKey {
    RecordKey(self.customer_number)
  }

  fn to_record(&self) -> Record {
    Record::new(self.key())
      .with("customer_name", self.customer_name.as_str())
      .with("contact_last_name", self.contact_last_name.as_str())
      .with("contact_first_name", self.contact_first_name.as_str())
      .with("phone", self.phone.as_str())
      .with("address_line1", self.address_line1.as_str())
      .with("address_line2", self.address_line2.clone())
      .with("city", self.city.as_str())
      .with("state", self.state.clone())
      .with("postal_code", self.postal_code.clone())
      .with("country", self.country.as_str())
      .with("sales_rep_employee_number", self.sales_rep_employee_number)
      .with("credit_limit", self.credit_limit)
  }

  fn from_record(record: &Record) -> Result<Self> {
    let r = FieldReader::new(record, &CUSTOMERS);
    Ok(Self {
      customer_number: record.key().0,
      customer_name: r.text("customer_name")?,
      contact_last_name: r.text("contact_last_name")?,
      contact_first_name: r.text("contact_first_name")?,
      phone: r.text("phone")?,
      address_line1: r.text("address_line1")?,
      address_line2: r.opt_text("address_line2")?,
      city: r.text("city")?,
      state: r.opt_text("state")?,
      postal_code: r.opt_text("postal_code")?,
      country: r.text("country")?,
      sales_rep_employee_number: r.opt_integer("sales_rep_employee_number")?,
      credit_limit: r.opt_currency("credit_limit")?,
    })
  }
}

impl fmt::Display for Customer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} {} ({} {}) {}, {} {}, {} tel {}",
      self.customer_number,
      self.customer_name,
      self.contact_first_name,
      self.contact_last_name,
      self.address_line1,
      self.postal_code.as_deref().unwrap_or(""),
      self.city,
      self.country,
      self.phone
    )?;
    if let Some(limit) = self.credit_limit {
      write!(f, " limit {}", limit)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::record::FieldValue;

  fn sample() -> Customer {
    Customer {
      customer_number: 789789789,
      customer_name: "naam van klant".into(),
      contact_last_name: "achternaam contactpersoon".into(),
      contact_first_name: "voornaampje".into(),
      phone: "003212456".into(),
      address_line1: "EEN !".into(),
      address_line2: Some("TWEE !".into()),
      city: "city".into(),
      state: Some("West-Vlaanderen".into()),
      postal_code: Some("XM4545".into()),
      country: "BE".into(),
      sales_rep_employee_number: Some(10101010),
      credit_limit: Some(Money::from_cents(5000)),
    }
  }

  #[test]
  fn test_record_conversion() {
    let customer = sample();
    let record = customer.to_record();

    assert_eq!(record.key(), RecordKey(789789789));
    assert_eq!(
      record.get("credit_limit"),
      Some(&FieldValue::Currency(Money::from_cents(5000)))
    );
    assert!(CUSTOMERS.normalize(&record).is_ok());
    assert_eq!(Customer::from_record(&record).unwrap(), customer);
  }

  #[test]
  fn test_from_record_missing_required() {
    let record = Record::new(RecordKey(1)).with("customer_name", "X");
    assert!(Customer::from_record(&record).is_err());
  }

  #[test]
  fn test_display() {
    let line = sample().to_string();
    assert!(line.starts_with("789789789 naam van klant (voornaampje"));
    assert!(line.ends_with("limit 50.00"));
  }
}

//! Static table descriptions and record validation.

use super::value::{FieldType, FieldValue};
use super::{FieldChanges, Record};
use crate::error::{Result, StoreError};

/// One column of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
  pub name: &'static str,
  pub field_type: FieldType,
  pub required: bool,
}

impl FieldDef {
  pub const fn required(name: &'static str, field_type: FieldType) -> Self {
    Self {
      name,
      field_type,
      required: true,
    }
  }

  pub const fn optional(name: &'static str, field_type: FieldType) -> Self {
    Self {
      name,
      field_type,
      required: false,
    }
  }
}

/// A table: its name, key column and fixed field set.
#[derive(Debug, PartialEq, Eq)]
pub struct TableSchema {
  pub table: &'static str,
  pub key: &'static str,
  pub fields: &'static [FieldDef],
}

impl TableSchema {
  pub fn field(&self, name: &str) -> Option<&FieldDef> {
    self.fields.iter().find(|f| f.name == name)
  }

  /// Check that all required fields are present and non-null.
  ///
  /// This is the only check the connected accessor performs itself.
  pub fn check_required(&self, record: &Record) -> Result<()> {
    for def in self.fields.iter().filter(|f| f.required) {
      match record.get(def.name) {
        Some(v) if !v.is_null() => {}
        _ => {
          return Err(StoreError::InvalidRecord(format!(
            "{}.{} is required (key {})",
            self.table,
            def.name,
            record.key()
          )))
        }
      }
    }
    Ok(())
  }

  /// Check that `changes` does not null out a required field.
  pub fn check_required_changes(&self, changes: &FieldChanges) -> Result<()> {
    for (name, value) in changes.iter() {
      let required = self.field(name).map(|d| d.required).unwrap_or(false);
      if required && value.is_null() {
        return Err(StoreError::InvalidRecord(format!(
          "{}.{} is required and cannot be cleared",
          self.table, name
        )));
      }
    }
    Ok(())
  }

  /// Validate a full record and fill absent optional fields with `Null`.
  pub fn normalize(&self, record: &Record) -> Result<Record> {
    self.check_known(record.fields().iter())?;
    self.check_required(record)?;

    let mut normalized = Record::new(record.key());
    for def in self.fields {
      let value = record.get(def.name).cloned().unwrap_or(FieldValue::Null);
      normalized.set(def.name, value);
    }
    Ok(normalized)
  }

  /// Validate a change set: known fields, matching types, required kept.
  pub fn validate_changes(&self, changes: &FieldChanges) -> Result<()> {
    self.check_known(changes.iter())?;
    self.check_required_changes(changes)
  }

  /// The field a value is compared with or assigned to.
  ///
  /// Fails with `InvalidRecord` for an unknown field or a non-null value of
  /// another type. Stores call this before matching a `FieldEquals` filter.
  pub fn typed_field(&self, name: &str, value: &FieldValue) -> Result<&FieldDef> {
    let def = self.field(name).ok_or_else(|| {
      StoreError::InvalidRecord(format!("{} has no field '{}'", self.table, name))
    })?;
    if let Some(actual) = value.field_type() {
      if actual != def.field_type {
        return Err(StoreError::InvalidRecord(format!(
          "{}.{} expects {}, got {}",
          self.table, name, def.field_type, actual
        )));
      }
    }
    Ok(def)
  }

  fn check_known<'a, I>(&self, fields: I) -> Result<()>
  where
    I: IntoIterator<Item = (&'a String, &'a FieldValue)>,
  {
    for (name, value) in fields {
      self.typed_field(name, value)?;
    }
    Ok(())
  }
}

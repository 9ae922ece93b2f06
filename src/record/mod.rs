//! Plain records: a key plus named, typed fields.
//!
//! Records carry no behavior beyond merging and diffing their fields. Both
//! access paths and every store exchange them by value.

mod schema;
mod value;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{Result, StoreError};

pub use schema::{FieldDef, TableSchema};
pub use value::{FieldType, FieldValue, Money};

/// Unique, immutable identity of a record (customer number, order number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(pub i64);

impl fmt::Display for RecordKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Version token of a record's content (hex SHA-256).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ETag(String);

impl ETag {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for ETag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// A keyed set of field values.
///
/// Equality and hashing use the key only; use [`Record::same_content`] to
/// compare values as well.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
  key: RecordKey,
  fields: BTreeMap<String, FieldValue>,
}

impl Record {
  pub fn new(key: RecordKey) -> Self {
    Self {
      key,
      fields: BTreeMap::new(),
    }
  }

  /// Builder-style field setter.
  pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
    self.set(name, value);
    self
  }

  pub fn key(&self) -> RecordKey {
    self.key
  }

  pub fn get(&self, name: &str) -> Option<&FieldValue> {
    self.fields.get(name)
  }

  pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
    &self.fields
  }

  pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
    self.fields.insert(name.into(), value.into());
  }

  /// Merge `changes` into this record in place.
  pub fn apply(&mut self, changes: &FieldChanges) {
    for (name, value) in changes.iter() {
      self.fields.insert(name.clone(), value.clone());
    }
  }

  /// The changes that turn `self` into `other`.
  pub fn diff(&self, other: &Record) -> FieldChanges {
    let mut changes = FieldChanges::new();
    for (name, value) in &other.fields {
      if self.fields.get(name) != Some(value) {
        changes.insert(name.clone(), value.clone());
      }
    }
    for name in self.fields.keys() {
      if !other.fields.contains_key(name) {
        changes.insert(name.clone(), FieldValue::Null);
      }
    }
    changes
  }

  /// Key and all field values are equal.
  pub fn same_content(&self, other: &Record) -> bool {
    self.key == other.key && self.fields == other.fields
  }

  /// Content hash used for optimistic concurrency checks.
  pub fn etag(&self) -> ETag {
    let mut hasher = Sha256::new();
    hasher.update(self.key.0.to_le_bytes());
    for (name, value) in &self.fields {
      hasher.update(name.as_bytes());
      hasher.update([0u8]);
      let tag = value.field_type().map(|t| t.to_string()).unwrap_or_default();
      hasher.update(tag.as_bytes());
      hasher.update([0u8]);
      hasher.update(value.to_string().as_bytes());
      hasher.update([0u8]);
    }
    ETag(hex::encode(hasher.finalize()))
  }
}

impl PartialEq for Record {
  fn eq(&self, other: &Self) -> bool {
    self.key == other.key
  }
}

impl Eq for Record {}

impl Hash for Record {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.key.hash(state);
  }
}

/// A set of field assignments to merge into a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldChanges(BTreeMap<String, FieldValue>);

impl FieldChanges {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builder-style assignment.
  pub fn set(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
    self.insert(name, value);
    self
  }

  pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
    self.0.insert(name.into(), value.into());
  }

  pub fn get(&self, name: &str) -> Option<&FieldValue> {
    self.0.get(name)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
    self.0.iter()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Build changes from parallel `;`-separated lists of names and values.
  ///
  /// `"contact_first_name;city"` with `"ABC;DEF"` sets two text fields.
  /// Names and values are trimmed alike, then each value is parsed as its
  /// field's schema type; an empty value clears the field.
  pub fn from_delimited(schema: &TableSchema, names: &str, values: &str) -> Result<Self> {
    let names: Vec<&str> = names.split(';').map(str::trim).collect();
    let values: Vec<&str> = values.split(';').map(str::trim).collect();

    if names.len() != values.len() {
      return Err(StoreError::InvalidRecord(format!(
        "{} field name(s) but {} value(s)",
        names.len(),
        values.len()
      )));
    }

    let mut changes = Self::new();
    for (name, raw) in names.into_iter().zip(values) {
      let def = schema.field(name).ok_or_else(|| {
        StoreError::InvalidRecord(format!("{} has no field '{}'", schema.table, name))
      })?;
      let value = FieldValue::parse_as(def.field_type, raw)
        .map_err(|e| StoreError::InvalidRecord(format!("{}: {}", name, e)))?;
      changes.insert(def.name, value);
    }
    Ok(changes)
  }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for FieldChanges {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    let mut changes = Self::new();
    for (k, v) in iter {
      changes.insert(k, v);
    }
    changes
  }
}

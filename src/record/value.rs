//! Typed field values.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Semantic type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
  Text,
  Integer,
  Currency,
  Date,
}

impl fmt::Display for FieldType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Text => "text",
      Self::Integer => "integer",
      Self::Currency => "currency",
      Self::Date => "date",
    };
    f.write_str(name)
  }
}

/// A currency amount stored as a whole number of cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Money(i64);

impl Money {
  pub fn from_cents(cents: i64) -> Self {
    Self(cents)
  }

  pub fn cents(self) -> i64 {
    self.0
  }
}

impl fmt::Display for Money {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let sign = if self.0 < 0 { "-" } else { "" };
    let abs = self.0.unsigned_abs();
    write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
  }
}

impl FromStr for Money {
  type Err = String;

  /// Parses amounts like `50`, `50.5` or `-12.05`.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim();
    let (negative, digits) = match s.strip_prefix('-') {
      Some(rest) => (true, rest),
      None => (false, s),
    };
    let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));

    let invalid = || format!("invalid currency amount '{}'", s);
    if whole.is_empty() || frac.len() > 2 {
      return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
      return Err(invalid());
    }

    let whole: i64 = whole.parse().map_err(|_| invalid())?;
    let frac: i64 = match frac.len() {
      0 => 0,
      1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
      _ => frac.parse().map_err(|_| invalid())?,
    };
    let cents = whole
      .checked_mul(100)
      .and_then(|c| c.checked_add(frac))
      .ok_or_else(invalid)?;

    Ok(Self(if negative { -cents } else { cents }))
  }
}

impl TryFrom<String> for Money {
  type Error = String;

  fn try_from(s: String) -> Result<Self, Self::Error> {
    s.parse()
  }
}

impl From<Money> for String {
  fn from(m: Money) -> Self {
    m.to_string()
  }
}

/// The value of one record field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
  Null,
  Text(String),
  Integer(i64),
  Currency(Money),
  Date(NaiveDate),
}

impl FieldValue {
  /// Type of the value, `None` for `Null`.
  pub fn field_type(&self) -> Option<FieldType> {
    match self {
      Self::Null => None,
      Self::Text(_) => Some(FieldType::Text),
      Self::Integer(_) => Some(FieldType::Integer),
      Self::Currency(_) => Some(FieldType::Currency),
      Self::Date(_) => Some(FieldType::Date),
    }
  }

  pub fn is_null(&self) -> bool {
    matches!(self, Self::Null)
  }

  pub fn as_text(&self) -> Option<&str> {
    match self {
      Self::Text(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_integer(&self) -> Option<i64> {
    match self {
      Self::Integer(i) => Some(*i),
      _ => None,
    }
  }

  pub fn as_currency(&self) -> Option<Money> {
    match self {
      Self::Currency(m) => Some(*m),
      _ => None,
    }
  }

  pub fn as_date(&self) -> Option<NaiveDate> {
    match self {
      Self::Date(d) => Some(*d),
      _ => None,
    }
  }

  /// Parse user input into a value of the given type.
  ///
  /// An empty string parses to `Null`.
  pub fn parse_as(field_type: FieldType, input: &str) -> Result<Self, String> {
    if input.is_empty() {
      return Ok(Self::Null);
    }
    match field_type {
      FieldType::Text => Ok(Self::Text(input.to_string())),
      FieldType::Integer => input
        .trim()
        .parse()
        .map(Self::Integer)
        .map_err(|_| format!("invalid integer '{}'", input)),
      FieldType::Currency => input.parse().map(Self::Currency),
      FieldType::Date => NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map(Self::Date)
        .map_err(|_| format!("invalid date '{}', expected YYYY-MM-DD", input)),
    }
  }
}

impl fmt::Display for FieldValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Null => Ok(()),
      Self::Text(s) => f.write_str(s),
      Self::Integer(i) => write!(f, "{}", i),
      Self::Currency(m) => write!(f, "{}", m),
      Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
    }
  }
}

impl From<&str> for FieldValue {
  fn from(s: &str) -> Self {
    Self::Text(s.to_string())
  }
}

impl From<String> for FieldValue {
  fn from(s: String) -> Self {
    Self::Text(s)
  }
}

impl From<i64> for FieldValue {
  fn from(i: i64) -> Self {
    Self::Integer(i)
  }
}

impl From<Money> for FieldValue {
  fn from(m: Money) -> Self {
    Self::Currency(m)
  }
}

impl From<NaiveDate> for FieldValue {
  fn from(d: NaiveDate) -> Self {
    Self::Date(d)
  }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
  fn from(v: Option<T>) -> Self {
    v.map(Into::into).unwrap_or(Self::Null)
  }
}

//! Values, rows and the DB-API type objects.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use smallvec::SmallVec;

use crate::error::{DbApiError, Result};

/// A single column value or query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
}

impl Value {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(b) => Some(b),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A result row. Inline storage covers rows with up to 16 columns.
pub type Row = SmallVec<[Value; 16]>;

// ============================================================================
// Type constructors
// ============================================================================

pub fn date(year: i32, month: u32, day: u32) -> Result<Value> {
    NaiveDate::from_ymd_opt(year, month, day)
        .map(Value::Date)
        .ok_or_else(|| DbApiError::DataError(format!("invalid date {year}-{month}-{day}")))
}

pub fn time(hour: u32, minute: u32, second: u32) -> Result<Value> {
    NaiveTime::from_hms_opt(hour, minute, second)
        .map(Value::Time)
        .ok_or_else(|| DbApiError::DataError(format!("invalid time {hour}:{minute}:{second}")))
}

pub fn timestamp(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> Result<Value> {
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| DbApiError::DataError(format!("invalid date {year}-{month}-{day}")))?;
    let time = NaiveTime::from_hms_opt(hour, minute, second)
        .ok_or_else(|| DbApiError::DataError(format!("invalid time {hour}:{minute}:{second}")))?;
    Ok(Value::Timestamp(NaiveDateTime::new(date, time)))
}

fn from_ticks(ticks: f64) -> Result<NaiveDateTime> {
    if !ticks.is_finite() {
        return Err(DbApiError::DataError(format!("ticks must be finite, got {ticks}")));
    }
    let secs = ticks.floor();
    let nanos = ((ticks - secs) * 1e9) as u32;
    DateTime::from_timestamp(secs as i64, nanos)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| DbApiError::DataError(format!("ticks out of range: {ticks}")))
}

/// Ticks are seconds since the epoch, interpreted as UTC.
pub fn date_from_ticks(ticks: f64) -> Result<Value> {
    Ok(Value::Date(from_ticks(ticks)?.date()))
}

pub fn time_from_ticks(ticks: f64) -> Result<Value> {
    let t = from_ticks(ticks)?.time();
    // Sub-second precision is dropped to match Time()
    Ok(Value::Time(t.with_nanosecond(0).unwrap_or(t)))
}

pub fn timestamp_from_ticks(ticks: f64) -> Result<Value> {
    Ok(Value::Timestamp(from_ticks(ticks)?))
}

pub fn binary(data: impl Into<Vec<u8>>) -> Value {
    Value::Blob(data.into())
}

// ============================================================================
// Type objects
// ============================================================================

/// A DB-API type object. Compares equal to every type code in its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeObject {
    String,
    Binary,
    Number,
    Datetime,
    RowId,
}

pub const STRING: TypeObject = TypeObject::String;
pub const BINARY: TypeObject = TypeObject::Binary;
pub const NUMBER: TypeObject = TypeObject::Number;
pub const DATETIME: TypeObject = TypeObject::Datetime;
pub const ROWID: TypeObject = TypeObject::RowId;

impl TypeObject {
    fn codes(self) -> &'static [&'static str] {
        match self {
            TypeObject::String => &["string", "text", "varchar", "char", "uuid"],
            TypeObject::Binary => &["varbinary", "blob", "binary"],
            TypeObject::Number => &[
                "integer", "int", "unsigned", "number", "double", "float", "real", "numeric",
                "decimal", "boolean",
            ],
            TypeObject::Datetime => &["datetime", "date", "time", "timestamp", "interval"],
            TypeObject::RowId => &["rowid"],
        }
    }

    /// Check whether a column type code (as reported in result metadata)
    /// belongs to this group. Length suffixes like `varchar(20)` are ignored.
    pub fn matches(self, type_code: &str) -> bool {
        let base = type_code
            .split('(')
            .next()
            .unwrap_or(type_code)
            .trim()
            .to_ascii_lowercase();
        self.codes().contains(&base.as_str())
    }
}

impl PartialEq<str> for TypeObject {
    fn eq(&self, other: &str) -> bool {
        self.matches(other)
    }
}

impl PartialEq<&str> for TypeObject {
    fn eq(&self, other: &&str) -> bool {
        self.matches(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accessors() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Int(42).as_f64(), Some(42.0));
        assert_eq!(Value::Bool(true).as_i64(), Some(1));
        assert_eq!(Value::from("hi").as_str(), Some("hi"));
        assert_eq!(Value::from(vec![1u8, 2]).as_bytes(), Some(&[1u8, 2][..]));
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_constructors_validate() {
        assert!(date(2024, 2, 29).is_ok());
        assert!(matches!(date(2023, 2, 29), Err(DbApiError::DataError(_))));
        assert!(time(25, 0, 0).is_err());
        assert_eq!(
            timestamp(2024, 1, 2, 3, 4, 5).unwrap(),
            Value::Timestamp(
                NaiveDate::from_ymd_opt(2024, 1, 2)
                    .unwrap()
                    .and_hms_opt(3, 4, 5)
                    .unwrap()
            )
        );
    }

    #[test]
    fn test_from_ticks() {
        assert_eq!(
            date_from_ticks(86_400.0).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(1970, 1, 2).unwrap())
        );
        assert_eq!(
            time_from_ticks(3_661.5).unwrap(),
            Value::Time(NaiveTime::from_hms_opt(1, 1, 1).unwrap())
        );
    }

    #[test]
    fn test_non_finite_ticks_rejected() {
        for ticks in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(date_from_ticks(ticks), Err(DbApiError::DataError(_))));
            assert!(matches!(timestamp_from_ticks(ticks), Err(DbApiError::DataError(_))));
        }
    }

    #[test]
    fn test_type_objects() {
        assert_eq!(STRING, "varchar(20)");
        assert_eq!(NUMBER, "INTEGER");
        assert_eq!(BINARY, "varbinary");
        assert_eq!(DATETIME, "datetime");
        assert!(!STRING.matches("integer"));
        assert!(ROWID.matches("rowid"));
    }
}

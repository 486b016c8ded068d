//! Tagged values and data type tags
//!
//! `Value` is the single representation used for caller filter input, pre-bind
//! transforms and bound parameters. `DataType` is the declared type tag of a
//! constrainable property; `Value::coerce` converts a value into the native
//! representation of a tag.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Rendering used for the string form of date-times
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Rendering used for the string form of dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const JSON_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Declared type of a constrainable property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Untyped; values pass through unchanged
    Empty,
    /// The property is a custom constraint kind
    Object,
    Boolean,
    Int16,
    Int32,
    Int64,
    Single,
    Double,
    DateTime,
    Date,
    String,
    Uuid,
}

impl DataType {
    /// Types for which an empty string is a legitimate value rather than an implied null
    pub fn allows_empty(&self) -> bool {
        matches!(self, DataType::Empty | DataType::String)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Empty => "Empty",
            DataType::Object => "Object",
            DataType::Boolean => "Boolean",
            DataType::Int16 => "Int16",
            DataType::Int32 => "Int32",
            DataType::Int64 => "Int64",
            DataType::Single => "Single",
            DataType::Double => "Double",
            DataType::DateTime => "DateTime",
            DataType::Date => "Date",
            DataType::String => "String",
            DataType::Uuid => "Uuid",
        };
        write!(f, "{}", name)
    }
}

/// Value enumeration for type-safe filter input and parameter binding
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Uuid(Uuid),
}

impl Value {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The type tag this value naturally carries
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Empty,
            Value::Bool(_) => DataType::Boolean,
            Value::Int16(_) => DataType::Int16,
            Value::Int32(_) => DataType::Int32,
            Value::Int64(_) => DataType::Int64,
            Value::Float32(_) => DataType::Single,
            Value::Float64(_) => DataType::Double,
            Value::String(_) => DataType::String,
            Value::DateTime(_) => DataType::DateTime,
            Value::Date(_) => DataType::Date,
            Value::Uuid(_) => DataType::Uuid,
        }
    }

    /// Convert to JSON value
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int16(i) => JsonValue::from(*i),
            Value::Int32(i) => JsonValue::from(*i),
            Value::Int64(i) => JsonValue::from(*i),
            Value::Float32(f) => serde_json::Number::from_f64(*f as f64)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::Float64(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::DateTime(dt) => JsonValue::String(dt.format(JSON_DATETIME_FORMAT).to_string()),
            Value::Date(d) => JsonValue::String(d.format(DATE_FORMAT).to_string()),
            Value::Uuid(u) => JsonValue::String(u.to_string()),
        }
    }

    /// Create a value from JSON, keeping scalars typed and rendering composites as text
    pub fn from_json(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int64(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float64(f)
                } else {
                    Value::String(n.to_string())
                }
            }
            JsonValue::String(s) => Value::String(s.clone()),
            JsonValue::Array(_) | JsonValue::Object(_) => Value::String(json.to_string()),
        }
    }

    /// Convert this value into the native representation of `target`.
    ///
    /// The error carries the reason only; callers attach the column and the
    /// attempted value.
    pub fn coerce(&self, target: DataType) -> Result<Value, String> {
        if self.is_null() {
            return Ok(Value::Null);
        }

        match target {
            DataType::Empty | DataType::Object => Ok(self.clone()),
            DataType::String => Ok(Value::String(self.to_string())),
            DataType::Boolean => self.to_bool().map(Value::Bool),
            DataType::Int16 => {
                let n = self.to_i64()?;
                i16::try_from(n)
                    .map(Value::Int16)
                    .map_err(|_| format!("{} is out of range for Int16", n))
            }
            DataType::Int32 => {
                let n = self.to_i64()?;
                i32::try_from(n)
                    .map(Value::Int32)
                    .map_err(|_| format!("{} is out of range for Int32", n))
            }
            DataType::Int64 => self.to_i64().map(Value::Int64),
            DataType::Single => {
                let f = self.to_f64()?;
                if f.is_finite() && f.abs() > f32::MAX as f64 {
                    return Err(format!("{} is out of range for Single", f));
                }
                Ok(Value::Float32(f as f32))
            }
            DataType::Double => self.to_f64().map(Value::Float64),
            DataType::DateTime => self.to_datetime().map(Value::DateTime),
            DataType::Date => match self {
                Value::Date(d) => Ok(Value::Date(*d)),
                other => other.to_datetime().map(|dt| Value::Date(dt.date())),
            },
            DataType::Uuid => match self {
                Value::Uuid(u) => Ok(Value::Uuid(*u)),
                Value::String(s) => Uuid::parse_str(s.trim())
                    .map(Value::Uuid)
                    .map_err(|e| e.to_string()),
                other => Err(format!("a {} cannot be read as a Uuid", other.data_type())),
            },
        }
    }

    fn to_bool(&self) -> Result<bool, String> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Int16(i) => Ok(*i != 0),
            Value::Int32(i) => Ok(*i != 0),
            Value::Int64(i) => Ok(*i != 0),
            Value::Float32(f) => Ok(*f != 0.0),
            Value::Float64(f) => Ok(*f != 0.0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err("String was not recognized as a valid Boolean".to_string()),
            },
            other => Err(format!("a {} cannot be read as a Boolean", other.data_type())),
        }
    }

    fn to_i64(&self) -> Result<i64, String> {
        match self {
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::Int16(i) => Ok(i64::from(*i)),
            Value::Int32(i) => Ok(i64::from(*i)),
            Value::Int64(i) => Ok(*i),
            Value::Float32(f) => float_to_i64(*f as f64),
            Value::Float64(f) => float_to_i64(*f),
            Value::String(s) => s.trim().parse::<i64>().map_err(|e| e.to_string()),
            other => Err(format!("a {} cannot be read as a number", other.data_type())),
        }
    }

    fn to_f64(&self) -> Result<f64, String> {
        match self {
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Int16(i) => Ok(f64::from(*i)),
            Value::Int32(i) => Ok(f64::from(*i)),
            Value::Int64(i) => Ok(*i as f64),
            Value::Float32(f) => Ok(f64::from(*f)),
            Value::Float64(f) => Ok(*f),
            Value::String(s) => s.trim().parse::<f64>().map_err(|e| e.to_string()),
            other => Err(format!("a {} cannot be read as a number", other.data_type())),
        }
    }

    fn to_datetime(&self) -> Result<NaiveDateTime, String> {
        match self {
            Value::DateTime(dt) => Ok(*dt),
            Value::Date(d) => d
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| format!("{} has no midnight", d)),
            Value::String(s) => parse_datetime(s),
            other => Err(format!("a {} cannot be read as a DateTime", other.data_type())),
        }
    }
}

fn float_to_i64(f: f64) -> Result<i64, String> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Ok(f as i64)
    } else {
        Err(format!("{} is not an integral number", f))
    }
}

fn parse_datetime(text: &str) -> Result<NaiveDateTime, String> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.naive_utc());
    }
    for format in [JSON_DATETIME_FORMAT, DATETIME_FORMAT] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(dt);
        }
    }

    let date = NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map_err(|e| format!("String was not recognized as a valid DateTime ({})", e))?;
    date.and_hms_opt(0, 0, 0)
        .ok_or_else(|| format!("{} has no midnight", date))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int16(i) => write!(f, "{}", i),
            Value::Int32(i) => write!(f, "{}", i),
            Value::Int64(i) => write!(f, "{}", i),
            Value::Float32(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::String(s) => f.write_str(s),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::Uuid(u) => write!(f, "{}", u),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i16> for Value {
    fn from(value: i16) -> Self {
        Value::Int16(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float32(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float64(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::String(value.clone())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTime(value.naive_utc())
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Uuid(value)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_coerces_to_integers_within_range() {
        assert_eq!(Value::from("42").coerce(DataType::Int32), Ok(Value::Int32(42)));
        assert_eq!(Value::from(" 7 ").coerce(DataType::Int16), Ok(Value::Int16(7)));
        assert!(Value::from("70000").coerce(DataType::Int16).is_err());
        assert!(Value::from("abc").coerce(DataType::Int64).is_err());
    }

    #[test]
    fn test_fractional_float_is_not_an_integer() {
        assert_eq!(Value::Float64(4.0).coerce(DataType::Int32), Ok(Value::Int32(4)));
        assert!(Value::Float64(4.5).coerce(DataType::Int32).is_err());
    }

    #[test]
    fn test_boolean_forms() {
        assert_eq!(Value::from("True").coerce(DataType::Boolean), Ok(Value::Bool(true)));
        assert_eq!(Value::from("0").coerce(DataType::Boolean), Ok(Value::Bool(false)));
        assert_eq!(Value::Int64(3).coerce(DataType::Boolean), Ok(Value::Bool(true)));
        assert!(Value::from("maybe").coerce(DataType::Boolean).is_err());
    }

    #[test]
    fn test_datetime_parsing() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();

        assert_eq!(
            Value::from("2024-03-09T10:30:00").coerce(DataType::DateTime),
            Ok(Value::DateTime(expected))
        );
        assert_eq!(
            Value::from("2024-03-09 10:30:00").coerce(DataType::DateTime),
            Ok(Value::DateTime(expected))
        );
        assert_eq!(
            Value::from("2024-03-09T10:30:00Z").coerce(DataType::DateTime),
            Ok(Value::DateTime(expected))
        );
        assert_eq!(
            Value::from("2024-03-09").coerce(DataType::Date),
            Ok(Value::Date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()))
        );
        assert!(Value::from("yesterday").coerce(DataType::DateTime).is_err());
    }

    #[test]
    fn test_everything_coerces_to_string() {
        assert_eq!(Value::Int32(5).coerce(DataType::String), Ok(Value::from("5")));
        assert_eq!(Value::Bool(false).coerce(DataType::String), Ok(Value::from("false")));
    }

    #[test]
    fn test_uuid_coercion() {
        let id = Uuid::new_v4();
        assert_eq!(
            Value::from(id.to_string()).coerce(DataType::Uuid),
            Ok(Value::Uuid(id))
        );
        assert!(Value::Int32(1).coerce(DataType::Uuid).is_err());
    }

    #[test]
    fn test_json_scalars_stay_typed() {
        assert_eq!(Value::from_json(&serde_json::json!(5)), Value::Int64(5));
        assert_eq!(Value::from_json(&serde_json::json!(true)), Value::Bool(true));
        assert_eq!(Value::from_json(&serde_json::json!(null)), Value::Null);
        assert_eq!(
            Value::from_json(&serde_json::json!([1, 2])),
            Value::from("[1,2]")
        );
    }

    #[test]
    fn test_allows_empty() {
        assert!(DataType::String.allows_empty());
        assert!(DataType::Empty.allows_empty());
        assert!(!DataType::Int16.allows_empty());
        assert!(!DataType::DateTime.allows_empty());
    }
}

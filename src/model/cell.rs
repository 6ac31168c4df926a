//! Cell value type and its wire encoding

use chrono::NaiveDateTime;
use serde::de::Error as DeError;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::table::Table;

/// A single typed value stored at a (row, column) position.
///
/// `Absent` is distinct from every other variant and survives round trips
/// through the column representation (sparse columns).
#[derive(Debug, Clone)]
pub enum CellValue {
    Absent,
    Bool(bool),
    Number(f64),
    String(String),
    Date(NaiveDateTime),
    Table(Table),
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CellValue::Absent, CellValue::Absent) => true,
            (CellValue::Bool(a), CellValue::Bool(b)) => a == b,
            (CellValue::Number(a), CellValue::Number(b)) => {
                // Handle NaN comparison
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b
                }
            }
            (CellValue::String(a), CellValue::String(b)) => a == b,
            (CellValue::Date(a), CellValue::Date(b)) => a == b,
            (CellValue::Table(a), CellValue::Table(b)) => a == b,
            _ => false,
        }
    }
}

impl CellValue {
    /// Check whether the value is the absent marker
    pub fn is_absent(&self) -> bool {
        matches!(self, CellValue::Absent)
    }

    /// Build a cell value from a parsed JSON value.
    ///
    /// Primitives map directly; objects are dispatched on their `classTag`
    /// (`Date` and nested `Table` are the tagged variants); `null` is absent.
    pub(crate) fn from_json(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(CellValue::Absent),
            Value::Bool(b) => Ok(CellValue::Bool(*b)),
            Value::Number(n) => Ok(CellValue::Number(n.as_f64().unwrap_or(0.0))),
            Value::String(s) => Ok(CellValue::String(s.clone())),
            Value::Object(obj) => match obj.get("classTag").and_then(Value::as_str) {
                Some("Date") => {
                    let millis = obj
                        .get("timestamp")
                        .and_then(Value::as_i64)
                        .ok_or_else(|| "Date cell without numeric timestamp".to_string())?;
                    millis_to_datetime(millis)
                        .map(CellValue::Date)
                        .ok_or_else(|| format!("timestamp out of range: {millis}"))
                }
                Some("Table") => serde_json::from_value(value.clone())
                    .map(CellValue::Table)
                    .map_err(|e| e.to_string()),
                Some(other) => Err(format!("unknown cell class tag: {other}")),
                None => Err("object cell without class tag".to_string()),
            },
            Value::Array(_) => Err("unexpected array cell".to_string()),
        }
    }
}

/// Millisecond UTC timestamp to a naive datetime
pub(crate) fn millis_to_datetime(millis: i64) -> Option<NaiveDateTime> {
    chrono::DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

/// Naive datetime to a millisecond UTC timestamp
pub(crate) fn datetime_to_millis(datetime: NaiveDateTime) -> i64 {
    datetime.and_utc().timestamp_millis()
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Absent => serializer.serialize_unit(),
            CellValue::Bool(b) => serializer.serialize_bool(*b),
            CellValue::Number(n) => serializer.serialize_f64(*n),
            CellValue::String(s) => serializer.serialize_str(s),
            CellValue::Date(dt) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("classTag", "Date")?;
                map.serialize_entry("timestamp", &datetime_to_millis(*dt))?;
                map.end()
            }
            CellValue::Table(t) => t.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        CellValue::from_json(&value).map_err(D::Error::custom)
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Absent => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::String(s) => write!(f, "{}", s),
            CellValue::Date(dt) => write!(f, "{}", dt),
            CellValue::Table(t) => {
                write!(f, "{}", serde_json::to_string(t).unwrap_or_default())
            }
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(dt: NaiveDateTime) -> Self {
        CellValue::Date(dt)
    }
}

impl From<Table> for CellValue {
    fn from(t: Table) -> Self {
        CellValue::Table(t)
    }
}

impl<T> From<Option<T>> for CellValue
where
    T: Into<CellValue>,
{
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => CellValue::Absent,
        }
    }
}

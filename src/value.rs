//! Dynamic scalar values carried by rows, and decoding of raw driver values into them.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use thiserror::Error;

/// One record: field name to value. Ordered so that rows serialize deterministically.
pub type Row = BTreeMap<String, Value>;

/// Search filter: field name to the values it may equal (OR within a field, AND across fields).
pub type Filter = BTreeMap<String, Vec<Value>>;

/// Canonical scalar value. Every read path produces one of these, whatever the driver returned.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("cannot decode value of type {source_type}")]
    Unsupported { source_type: String },
    #[error("non-finite {source_type} cannot be represented")]
    NonFinite { source_type: &'static str },
    #[error("byte string is not valid UTF-8")]
    InvalidUtf8,
    #[error("'{text}' is not a valid {sql_type}")]
    Mismatch { text: String, sql_type: String },
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view. Text is not coerced.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Timestamp(_) => "timestamp",
        }
    }

    /// Text form used for loose comparisons (path ids and query values arrive as text).
    /// `None` for null, which never equals anything.
    pub fn canonical_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(n) => Some(n.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Timestamp(t) => Some(format_timestamp(t)),
        }
    }

    pub fn loosely_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => self.as_f64() == other.as_f64(),
            _ => self.canonical_text() == other.canonical_text(),
        }
    }

    /// Ordering for primary keys: numbers numerically, everything else by canonical text, nulls first.
    pub fn key_order(&self, other: &Value) -> Ordering {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => self.canonical_text().cmp(&other.canonical_text()),
        }
    }

    /// Convert a JSON body value. Arrays and objects are not scalars and are rejected.
    pub fn from_json(v: &serde_json::Value) -> Result<Self, DecodeError> {
        Ok(match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    return Err(DecodeError::Unsupported {
                        source_type: format!("number {}", n),
                    });
                }
            }
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(_) => {
                return Err(DecodeError::Unsupported {
                    source_type: "array".into(),
                })
            }
            serde_json::Value::Object(_) => {
                return Err(DecodeError::Unsupported {
                    source_type: "object".into(),
                })
            }
        })
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::Number((*n).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Timestamp(t) => serde_json::Value::String(format_timestamp(t)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Timestamp(t) => serializer.serialize_str(&format_timestamp(t)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Timestamp(t)
    }
}

pub fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Accepts RFC 3339 and the common `YYYY-MM-DD HH:MM:SS[.f]` form (read as UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .map(|n| n.and_utc())
}

const BOOL_TYPES: &[&str] = &["boolean", "bool"];
const INTEGER_TYPES: &[&str] = &["smallint", "integer", "int", "int2", "int4", "int8", "bigint", "serial", "bigserial"];
const FLOAT_TYPES: &[&str] = &["real", "float4", "float8", "double precision", "numeric", "decimal"];
const TIMESTAMP_TYPES: &[&str] = &[
    "timestamptz",
    "timestamp",
    "timestamp with time zone",
    "timestamp without time zone",
];

pub fn is_integer_type(sql_type: &str) -> bool {
    INTEGER_TYPES.contains(&sql_type.trim().to_ascii_lowercase().as_str())
}

/// Read request text (query values, path segments) as the logical type of a column.
/// Types without a scalar counterpart stay text.
pub fn from_text(text: &str, sql_type: &str) -> Result<Value, DecodeError> {
    let t = sql_type.trim().to_ascii_lowercase();
    let t = t.as_str();
    let mismatch = || DecodeError::Mismatch {
        text: text.to_string(),
        sql_type: sql_type.to_string(),
    };
    if BOOL_TYPES.contains(&t) {
        parse_bool(text).map(Value::Bool).ok_or_else(mismatch)
    } else if INTEGER_TYPES.contains(&t) {
        text.trim().parse::<i64>().map(Value::Int).map_err(|_| mismatch())
    } else if FLOAT_TYPES.contains(&t) {
        match text.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(Value::Float(f)),
            _ => Err(mismatch()),
        }
    } else if TIMESTAMP_TYPES.contains(&t) {
        parse_timestamp(text).map(Value::Timestamp).ok_or_else(mismatch)
    } else if t == "date" {
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|n| Value::Timestamp(n.and_utc()))
            .ok_or_else(mismatch)
    } else {
        Ok(Value::Text(text.to_string()))
    }
}

/// A value as handed back by a storage driver, before normalization.
#[derive(Clone, Debug, PartialEq)]
pub enum RawValue {
    Null,
    Bytes(Vec<u8>),
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Text(String),
    Uuid(uuid::Uuid),
    Timestamp(DateTime<Utc>),
    NaiveTimestamp(NaiveDateTime),
    Date(NaiveDate),
    Json(serde_json::Value),
    /// Column type the driver layer could not map; carries the driver's type name.
    Unsupported(String),
}

/// Normalize a raw driver value into one canonical value per logical type.
pub fn decode(raw: RawValue) -> Result<Value, DecodeError> {
    Ok(match raw {
        RawValue::Null => Value::Null,
        RawValue::Bytes(b) => {
            let s = String::from_utf8(b).map_err(|_| DecodeError::InvalidUtf8)?;
            match parse_bool(&s) {
                Some(flag) => Value::Bool(flag),
                None => Value::Text(s),
            }
        }
        RawValue::Bool(b) => Value::Bool(b),
        RawValue::I16(n) => Value::Int(n.into()),
        RawValue::I32(n) => Value::Int(n.into()),
        RawValue::I64(n) => Value::Int(n),
        RawValue::F32(f) => finite(f.into(), "f32")?,
        RawValue::F64(f) => finite(f, "f64")?,
        RawValue::Text(s) => Value::Text(s),
        RawValue::Uuid(u) => Value::Text(u.to_string()),
        RawValue::Timestamp(t) => Value::Timestamp(t),
        RawValue::NaiveTimestamp(n) => Value::Timestamp(n.and_utc()),
        RawValue::Date(d) => match d.and_hms_opt(0, 0, 0) {
            Some(n) => Value::Timestamp(n.and_utc()),
            None => {
                return Err(DecodeError::Unsupported {
                    source_type: "date".into(),
                })
            }
        },
        RawValue::Json(j) => Value::from_json(&j).map_err(|_| DecodeError::Unsupported {
            source_type: format!("json {}", json_kind(&j)),
        })?,
        RawValue::Unsupported(source_type) => return Err(DecodeError::Unsupported { source_type }),
    })
}

fn finite(f: f64, source_type: &'static str) -> Result<Value, DecodeError> {
    if f.is_finite() {
        Ok(Value::Float(f))
    } else {
        Err(DecodeError::NonFinite { source_type })
    }
}

/// Boolean spellings accepted from byte-string columns and request text.
fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

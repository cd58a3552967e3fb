//! Typed property values
//!
//! This module defines:
//! - EdmType: the wire tag naming a property's kind
//! - TypedValue: the closed set of property kinds a row can carry
//!
//! ## Type Rules
//!
//! - Eight kinds only: String, Bytes, Boolean, DateTime, Double, Guid, Int32, Int64
//! - The kind is fixed when the value is built; it is never inferred later
//! - `Int32(1) != Int64(1)`: different kinds are NEVER equal
//! - Double uses IEEE-754 equality: `NaN != NaN`, `-0.0 == 0.0`

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Wire tag written next to every property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdmType {
    /// UTF-8 string
    String,
    /// Raw bytes, base64 on the wire
    Binary,
    /// Boolean
    Boolean,
    /// UTC timestamp
    DateTime,
    /// 64-bit float
    Double,
    /// GUID
    Guid,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
}

impl EdmType {
    /// Every kind, in tag order.
    pub const ALL: [EdmType; 8] = [
        EdmType::String,
        EdmType::Binary,
        EdmType::Boolean,
        EdmType::DateTime,
        EdmType::Double,
        EdmType::Guid,
        EdmType::Int32,
        EdmType::Int64,
    ];

    /// Tag as written on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            EdmType::String => "String",
            EdmType::Binary => "Binary",
            EdmType::Boolean => "Boolean",
            EdmType::DateTime => "DateTime",
            EdmType::Double => "Double",
            EdmType::Guid => "GUID",
            EdmType::Int32 => "Int32",
            EdmType::Int64 => "Int64",
        }
    }
}

impl fmt::Display for EdmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised `EdmType` tag
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized EdmType '{0}'")]
pub struct ParseEdmTypeError(pub String);

impl FromStr for EdmType {
    type Err = ParseEdmTypeError;

    /// Case-insensitive; accepts an optional `Edm.` prefix and the `Bytes` alias.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s
            .strip_prefix("Edm.")
            .or_else(|| s.strip_prefix("edm."))
            .unwrap_or(s);
        let kind = match tag.to_ascii_lowercase().as_str() {
            "string" => EdmType::String,
            "binary" | "bytes" => EdmType::Binary,
            "boolean" => EdmType::Boolean,
            "datetime" => EdmType::DateTime,
            "double" => EdmType::Double,
            "guid" => EdmType::Guid,
            "int32" => EdmType::Int32,
            "int64" => EdmType::Int64,
            _ => return Err(ParseEdmTypeError(s.to_string())),
        };
        Ok(kind)
    }
}

/// Why a stringified value could not be read back at its declared kind
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse '{raw}' as {kind}: {reason}")]
pub struct ValueParseError {
    /// Declared kind
    pub kind: EdmType,
    /// Raw wire text
    pub raw: String,
    /// Parser message
    pub reason: String,
}

/// A property value with its kind attached.
///
/// Callers pick the variant when building a row; the `From` impls below map
/// Rust types onto kinds statically (`i32` is always `Int32`, `i64` is
/// always `Int64`).
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// UTF-8 string
    String(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Boolean
    Boolean(bool),
    /// UTC timestamp
    DateTime(DateTime<Utc>),
    /// 64-bit float (IEEE-754)
    Double(f64),
    /// GUID
    Guid(Uuid),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
}

impl TypedValue {
    /// The wire tag for this value
    pub fn edm_type(&self) -> EdmType {
        match self {
            TypedValue::String(_) => EdmType::String,
            TypedValue::Bytes(_) => EdmType::Binary,
            TypedValue::Boolean(_) => EdmType::Boolean,
            TypedValue::DateTime(_) => EdmType::DateTime,
            TypedValue::Double(_) => EdmType::Double,
            TypedValue::Guid(_) => EdmType::Guid,
            TypedValue::Int32(_) => EdmType::Int32,
            TypedValue::Int64(_) => EdmType::Int64,
        }
    }

    /// Stringified form used on the wire.
    ///
    /// `parse(v.edm_type(), &v.to_wire_string()) == Ok(v)` for every value
    /// except `Double(NaN)`, which parses back to a NaN.
    pub fn to_wire_string(&self) -> String {
        match self {
            TypedValue::String(s) => s.clone(),
            TypedValue::Bytes(b) => STANDARD.encode(b),
            TypedValue::Boolean(b) => b.to_string(),
            TypedValue::DateTime(dt) => format_timestamp(dt),
            TypedValue::Double(d) => format_double(*d),
            TypedValue::Guid(g) => g.hyphenated().to_string(),
            TypedValue::Int32(i) => i.to_string(),
            TypedValue::Int64(i) => i.to_string(),
        }
    }

    /// Parse wire text at the declared kind
    pub fn parse(kind: EdmType, raw: &str) -> Result<TypedValue, ValueParseError> {
        let fail = |reason: String| ValueParseError {
            kind,
            raw: raw.to_string(),
            reason,
        };
        let value = match kind {
            EdmType::String => TypedValue::String(raw.to_string()),
            EdmType::Binary => {
                TypedValue::Bytes(STANDARD.decode(raw).map_err(|e| fail(e.to_string()))?)
            }
            EdmType::Boolean => {
                if raw.eq_ignore_ascii_case("true") {
                    TypedValue::Boolean(true)
                } else if raw.eq_ignore_ascii_case("false") {
                    TypedValue::Boolean(false)
                } else {
                    return Err(fail("expected true or false".to_string()));
                }
            }
            EdmType::DateTime => TypedValue::DateTime(parse_timestamp(raw).map_err(fail)?),
            EdmType::Double => TypedValue::Double(
                raw.parse::<f64>().map_err(|e| fail(e.to_string()))?,
            ),
            EdmType::Guid => {
                TypedValue::Guid(Uuid::parse_str(raw).map_err(|e| fail(e.to_string()))?)
            }
            EdmType::Int32 => {
                TypedValue::Int32(raw.parse::<i32>().map_err(|e| fail(e.to_string()))?)
            }
            EdmType::Int64 => {
                TypedValue::Int64(raw.parse::<i64>().map_err(|e| fail(e.to_string()))?)
            }
        };
        Ok(value)
    }

    /// Compare against an untyped literal read at this value's kind.
    ///
    /// Returns `None` when the literal does not parse at this kind or the
    /// values are unordered (NaN).
    pub fn compare_literal(&self, literal: &str) -> Option<Ordering> {
        let other = TypedValue::parse(self.edm_type(), literal).ok()?;
        match (self, &other) {
            (TypedValue::String(a), TypedValue::String(b)) => Some(a.cmp(b)),
            (TypedValue::Bytes(a), TypedValue::Bytes(b)) => Some(a.cmp(b)),
            (TypedValue::Boolean(a), TypedValue::Boolean(b)) => Some(a.cmp(b)),
            (TypedValue::DateTime(a), TypedValue::DateTime(b)) => Some(a.cmp(b)),
            (TypedValue::Double(a), TypedValue::Double(b)) => a.partial_cmp(b),
            (TypedValue::Guid(a), TypedValue::Guid(b)) => Some(a.cmp(b)),
            (TypedValue::Int32(a), TypedValue::Int32(b)) => Some(a.cmp(b)),
            (TypedValue::Int64(a), TypedValue::Int64(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Round-trippable ISO-8601 form: full sub-second precision, `Z` suffix.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse an RFC 3339 timestamp with any offset, normalised to UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| e.to_string())
}

fn format_double(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d == f64::INFINITY {
        "Infinity".to_string()
    } else if d == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        d.to_string()
    }
}

impl From<String> for TypedValue {
    fn from(s: String) -> Self {
        TypedValue::String(s)
    }
}

impl From<&str> for TypedValue {
    fn from(s: &str) -> Self {
        TypedValue::String(s.to_string())
    }
}

impl From<Vec<u8>> for TypedValue {
    fn from(b: Vec<u8>) -> Self {
        TypedValue::Bytes(b)
    }
}

impl From<bool> for TypedValue {
    fn from(b: bool) -> Self {
        TypedValue::Boolean(b)
    }
}

impl From<DateTime<Utc>> for TypedValue {
    fn from(dt: DateTime<Utc>) -> Self {
        TypedValue::DateTime(dt)
    }
}

impl From<f64> for TypedValue {
    fn from(d: f64) -> Self {
        TypedValue::Double(d)
    }
}

impl From<Uuid> for TypedValue {
    fn from(g: Uuid) -> Self {
        TypedValue::Guid(g)
    }
}

impl From<i32> for TypedValue {
    fn from(i: i32) -> Self {
        TypedValue::Int32(i)
    }
}

impl From<i64> for TypedValue {
    fn from(i: i64) -> Self {
        TypedValue::Int64(i)
    }
}

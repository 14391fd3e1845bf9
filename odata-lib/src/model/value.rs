//! Value enum for dynamic property values

use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::FixedOffset;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::types::Geography;

/// A dynamic value that can hold any EDM property value.
///
/// Property getters return the variant matching the property's EDM type.
/// Setters accept any variant that can be coerced into that type, so an
/// `Edm.Int16` property takes `Value::Int64(7)` or `Value::String("7")`
/// as readily as `Value::Int16(7)`.
///
/// # Type Mapping
///
/// | EDM Type | Rust Variant |
/// |----------|--------------|
/// | null | `Null` |
/// | Edm.Boolean | `Bool` |
/// | Edm.Byte / Edm.SByte | `Byte` / `SByte` |
/// | Edm.Int16 / Int32 / Int64 | `Int16` / `Int32` / `Int64` |
/// | Edm.Single / Edm.Double | `Single` / `Double` |
/// | Edm.Decimal | `Decimal` |
/// | Edm.String | `String` |
/// | Edm.Binary | `Binary` |
/// | Edm.Guid | `Guid` |
/// | Edm.Date | `Date` |
/// | Edm.DateTime | `DateTime` |
/// | Edm.DateTimeOffset | `DateTimeOffset` |
/// | Edm.TimeOfDay | `TimeOfDay` |
/// | Edm.Geography* | `Geography` |
/// | enum type | `Enum` (or `Flags` when `IsFlags`) |
/// | complex type | `Complex` |
/// | Collection(T) | `Collection` |
///
/// # Example
///
/// ```
/// use odata_lib::model::Value;
///
/// let name = Value::from("Bread");
/// let price = Value::from(2.5f64);
/// let empty = Value::Null;
/// assert!(empty.is_null());
/// assert_eq!(name.type_name(), "string");
/// # let _ = price;
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Null/empty value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Unsigned 8-bit integer.
    Byte(u8),
    /// Signed 8-bit integer.
    SByte(i8),
    /// 16-bit integer.
    Int16(i16),
    /// 32-bit integer.
    Int32(i32),
    /// 64-bit integer.
    Int64(i64),
    /// 32-bit floating point.
    Single(f32),
    /// 64-bit floating point.
    Double(f64),
    /// Arbitrary precision decimal.
    Decimal(Decimal),
    /// String value.
    String(String),
    /// Binary payload.
    Binary(Vec<u8>),
    /// GUID/UUID value.
    Guid(Uuid),
    /// Calendar date.
    Date(NaiveDate),
    /// Date and time without offset.
    DateTime(NaiveDateTime),
    /// Date and time with a UTC offset.
    DateTimeOffset(DateTime<FixedOffset>),
    /// Time of day.
    TimeOfDay(NaiveTime),
    /// Geography point, line string or polygon.
    Geography(Geography),
    /// A single enum member name.
    Enum(String),
    /// The matched member names of a flags enum, in the order given.
    Flags(Vec<String>),
    /// Complex value: property name to value.
    Complex(BTreeMap<String, Value>),
    /// Homogeneous collection.
    Collection(Vec<Value>),
    /// Untyped JSON, accepted by setters as input.
    Json(serde_json::Value),
}

impl Value {
    /// Returns `true` if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns `true` if this is null or an empty string.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Json(serde_json::Value::Null) => true,
            _ => false,
        }
    }

    /// Returns the type name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Byte(_) => "byte",
            Value::SByte(_) => "sbyte",
            Value::Int16(_) => "int16",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Single(_) => "single",
            Value::Double(_) => "double",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Binary(_) => "binary",
            Value::Guid(_) => "guid",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::DateTimeOffset(_) => "datetimeoffset",
            Value::TimeOfDay(_) => "timeofday",
            Value::Geography(_) => "geography",
            Value::Enum(_) => "enum",
            Value::Flags(_) => "flags",
            Value::Complex(_) => "complex",
            Value::Collection(_) => "collection",
            Value::Json(_) => "json",
        }
    }

    /// Returns the string slice if this is a `String` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Json(serde_json::Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Converts a JSON value into the closest untyped `Value`.
    ///
    /// Scalars map onto `Bool`, `Int64`, `Double` and `String`; objects and
    /// arrays stay `Json` so that typed setters can interpret them.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int64(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Double(f)
                } else {
                    Value::Json(serde_json::Value::Number(n))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            other => Value::Json(other),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Byte(n) => write!(f, "{}", n),
            Value::SByte(n) => write!(f, "{}", n),
            Value::Int16(n) => write!(f, "{}", n),
            Value::Int32(n) => write!(f, "{}", n),
            Value::Int64(n) => write!(f, "{}", n),
            Value::Single(n) => write!(f, "{}", n),
            Value::Double(n) => write!(f, "{}", n),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "{}", s),
            Value::Binary(b) => write!(f, "{} bytes", b.len()),
            Value::Guid(g) => write!(f, "{}", g),
            Value::Date(d) => write!(f, "{}", d),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.f")),
            Value::DateTimeOffset(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::TimeOfDay(t) => write!(f, "{}", t),
            Value::Geography(g) => write!(f, "{}", g.to_wkt()),
            Value::Enum(name) => write!(f, "{}", name),
            Value::Flags(names) => write!(f, "{}", names.join(",")),
            Value::Complex(map) => {
                let parts: Vec<_> = map.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::Collection(items) => {
                let parts: Vec<_> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(","))
            }
            Value::Json(json) => write!(f, "{}", json),
        }
    }
}

// =============================================================================
// From implementations
// =============================================================================

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::Byte(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::SByte(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Single(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Guid(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Value::DateTimeOffset(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::TimeOfDay(v)
    }
}

impl From<Geography> for Value {
    fn from(v: Geography) -> Self {
        Value::Geography(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Complex(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Collection(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

//! EDM property types
//!
//! Every property value is typed by a [`PropertyKind`]: one of the built-in
//! [`EdmType`] primitives, a schema-declared [`EnumType`] or [`ComplexType`],
//! or a collection of another kind. Enum and complex kinds carry their
//! definition as data, so one generic implementation serves every
//! schema-discovered type.

mod collection;
mod complex;
mod enumeration;
pub(crate) mod geography;
mod numeric;
mod temporal;

pub use complex::*;
pub use enumeration::*;
pub use geography::*;

pub(crate) use collection::*;

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use uuid::Uuid;

use super::Value;
use crate::error::ValidationError;

/// A built-in EDM primitive type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdmType {
    Binary,
    Boolean,
    Byte,
    Date,
    DateTime,
    DateTimeOffset,
    Decimal,
    Double,
    GeographyLineString,
    GeographyPoint,
    GeographyPolygon,
    Guid,
    Int16,
    Int32,
    Int64,
    SByte,
    Single,
    String,
    TimeOfDay,
}

impl EdmType {
    /// Every built-in primitive.
    pub const ALL: [EdmType; 19] = [
        EdmType::Binary,
        EdmType::Boolean,
        EdmType::Byte,
        EdmType::Date,
        EdmType::DateTime,
        EdmType::DateTimeOffset,
        EdmType::Decimal,
        EdmType::Double,
        EdmType::GeographyLineString,
        EdmType::GeographyPoint,
        EdmType::GeographyPolygon,
        EdmType::Guid,
        EdmType::Int16,
        EdmType::Int32,
        EdmType::Int64,
        EdmType::SByte,
        EdmType::Single,
        EdmType::String,
        EdmType::TimeOfDay,
    ];

    /// Returns the canonical EDM type name, e.g. `Edm.Int32`.
    pub fn name(&self) -> &'static str {
        match self {
            EdmType::Binary => "Edm.Binary",
            EdmType::Boolean => "Edm.Boolean",
            EdmType::Byte => "Edm.Byte",
            EdmType::Date => "Edm.Date",
            EdmType::DateTime => "Edm.DateTime",
            EdmType::DateTimeOffset => "Edm.DateTimeOffset",
            EdmType::Decimal => "Edm.Decimal",
            EdmType::Double => "Edm.Double",
            EdmType::GeographyLineString => "Edm.GeographyLineString",
            EdmType::GeographyPoint => "Edm.GeographyPoint",
            EdmType::GeographyPolygon => "Edm.GeographyPolygon",
            EdmType::Guid => "Edm.Guid",
            EdmType::Int16 => "Edm.Int16",
            EdmType::Int32 => "Edm.Int32",
            EdmType::Int64 => "Edm.Int64",
            EdmType::SByte => "Edm.SByte",
            EdmType::Single => "Edm.Single",
            EdmType::String => "Edm.String",
            EdmType::TimeOfDay => "Edm.TimeOfDay",
        }
    }

    /// Looks up a primitive by its EDM type name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// Returns the geometry for geography primitives.
    pub fn geography_kind(&self) -> Option<GeographyKind> {
        match self {
            EdmType::GeographyPoint => Some(GeographyKind::Point),
            EdmType::GeographyLineString => Some(GeographyKind::LineString),
            EdmType::GeographyPolygon => Some(GeographyKind::Polygon),
            _ => None,
        }
    }

    fn is_integer(&self) -> bool {
        matches!(
            self,
            EdmType::Byte | EdmType::SByte | EdmType::Int16 | EdmType::Int32 | EdmType::Int64
        )
    }

    fn is_temporal(&self) -> bool {
        matches!(
            self,
            EdmType::Date | EdmType::DateTime | EdmType::DateTimeOffset | EdmType::TimeOfDay
        )
    }

    // =========================================================================
    // Codec
    //
    // `coerce` turns setter input into the typed value, `parse` does the same
    // for the raw wire string. Both validate. `format`, `literal` and `json`
    // render an already validated typed value.
    // =========================================================================

    pub(crate) fn coerce(&self, ctx: &Ctx<'_>, value: &Value) -> Result<Value, ValidationError> {
        if self.is_integer() {
            return numeric::coerce_integer(*self, ctx, value);
        }
        if self.is_temporal() {
            return temporal::coerce(*self, ctx, value);
        }
        if let Some(kind) = self.geography_kind() {
            return geography::coerce(kind, ctx, value).map(Value::Geography);
        }
        match self {
            EdmType::Single | EdmType::Double => numeric::coerce_float(*self, ctx, value),
            EdmType::Decimal => numeric::coerce_decimal(ctx, value),
            EdmType::String => match value {
                Value::String(s) => Ok(Value::String(s.clone())),
                Value::Json(serde_json::Value::String(s)) => Ok(Value::String(s.clone())),
                Value::Complex(_) | Value::Collection(_) | Value::Binary(_) | Value::Json(_) => {
                    Err(ctx.invalid(*self, value, "not a string"))
                }
                other => Ok(Value::String(other.to_string())),
            },
            EdmType::Boolean => match value {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                Value::Json(serde_json::Value::Bool(b)) => Ok(Value::Bool(*b)),
                Value::Byte(_) | Value::SByte(_) | Value::Int16(_) | Value::Int32(_) | Value::Int64(_) => {
                    self.parse(ctx, &value.to_string())
                }
                Value::String(s) => self.parse(ctx, s),
                other => Err(ctx.invalid(*self, other, "not a boolean")),
            },
            EdmType::Guid => match value {
                Value::Guid(g) => Ok(Value::Guid(*g)),
                Value::String(s) => self.parse(ctx, s),
                other => Err(ctx.invalid(*self, other, "not a GUID")),
            },
            EdmType::Binary => match value {
                Value::Binary(bytes) => Ok(Value::Binary(bytes.clone())),
                Value::String(s) => self.parse(ctx, s),
                other => Err(ctx.invalid(*self, other, "not a binary payload")),
            },
            _ => Err(ctx.invalid(*self, value, "unsupported conversion")),
        }
    }

    pub(crate) fn parse(&self, ctx: &Ctx<'_>, raw: &str) -> Result<Value, ValidationError> {
        if self.is_integer() {
            return numeric::parse_integer(*self, ctx, raw);
        }
        if self.is_temporal() {
            return temporal::parse(*self, ctx, raw);
        }
        if let Some(kind) = self.geography_kind() {
            return geography::parse(kind, ctx, raw).map(Value::Geography);
        }
        match self {
            EdmType::Single | EdmType::Double => numeric::parse_float(*self, ctx, raw),
            EdmType::Decimal => numeric::parse_decimal(ctx, raw),
            EdmType::String => Ok(Value::String(raw.to_string())),
            EdmType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(ctx.invalid_raw(*self, raw, "expected true or false")),
            },
            EdmType::Guid => {
                // v2 literals may arrive wrapped: guid'...'
                let trimmed = raw
                    .trim()
                    .strip_prefix("guid'")
                    .and_then(|s| s.strip_suffix('\''))
                    .unwrap_or(raw.trim());
                Uuid::parse_str(trimmed)
                    .map(Value::Guid)
                    .map_err(|e| ctx.invalid_raw(*self, raw, e.to_string()))
            }
            EdmType::Binary => BASE64
                .decode(raw.trim())
                .map(Value::Binary)
                .map_err(|e| ctx.invalid_raw(*self, raw, e.to_string())),
            _ => Err(ctx.invalid_raw(*self, raw, "unsupported type")),
        }
    }

    /// Renders the canonical raw (and XML text) form of a typed value.
    pub(crate) fn format(&self, typed: &Value) -> String {
        match typed {
            Value::Null => String::new(),
            Value::Binary(bytes) => BASE64.encode(bytes),
            Value::Geography(g) => g.to_wkt(),
            Value::Single(f) if f.is_finite() => f.to_string(),
            Value::Single(f) => numeric::format_float(*f as f64),
            Value::Double(f) => numeric::format_float(*f),
            Value::Date(_) | Value::DateTime(_) | Value::DateTimeOffset(_) | Value::TimeOfDay(_) => {
                temporal::format(typed)
            }
            other => other.to_string(),
        }
    }

    /// Renders a typed value as an OData URL literal.
    pub(crate) fn literal(&self, typed: &Value) -> String {
        match typed {
            Value::Null => "null".to_string(),
            Value::String(s) => quote(s),
            Value::Guid(g) => format!("guid'{}'", g),
            Value::Binary(_) => format!("binary'{}'", self.format(typed)),
            Value::Geography(g) => g.to_wkt(),
            Value::Date(_) | Value::DateTime(_) | Value::DateTimeOffset(_) | Value::TimeOfDay(_) => {
                temporal::literal(typed)
            }
            _ => self.format(typed),
        }
    }

    /// Renders a typed value as its JSON payload form.
    pub(crate) fn json(&self, typed: &Value) -> serde_json::Value {
        match typed {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Byte(n) => (*n).into(),
            Value::SByte(n) => (*n).into(),
            Value::Int16(n) => (*n).into(),
            Value::Int32(n) => (*n).into(),
            Value::Int64(n) => (*n).into(),
            Value::Single(f) => numeric::float_json(*f as f64),
            Value::Double(f) => numeric::float_json(*f),
            Value::Decimal(d) => d
                .to_string()
                .parse::<serde_json::Number>()
                .map(serde_json::Value::Number)
                .unwrap_or_else(|_| serde_json::Value::String(d.to_string())),
            Value::Geography(g) => g.to_geojson(),
            _ => serde_json::Value::String(self.format(typed)),
        }
    }
}

impl std::fmt::Display for EdmType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The EDM type of a property: primitive, enum, complex, or a collection.
///
/// Enum and complex kinds share their definition through an `Arc`, so
/// cloning a kind (and every template property built from it) is cheap.
#[derive(Debug, Clone)]
pub enum PropertyKind {
    /// A built-in primitive.
    Primitive(EdmType),
    /// A schema-declared enum type.
    Enum(Arc<EnumType>),
    /// A schema-declared complex type.
    Complex(Arc<ComplexType>),
    /// `Collection(T)` of another kind.
    Collection(Box<PropertyKind>),
}

impl PropertyKind {
    /// Returns the EDM type name, e.g. `Edm.String` or `Collection(NS.Address)`.
    pub fn type_name(&self) -> String {
        match self {
            PropertyKind::Primitive(t) => t.name().to_string(),
            PropertyKind::Enum(e) => e.type_name(),
            PropertyKind::Complex(c) => c.type_name(),
            PropertyKind::Collection(inner) => format!("Collection({})", inner.type_name()),
        }
    }

    /// Returns the primitive type, if this is a primitive kind.
    pub fn primitive(&self) -> Option<EdmType> {
        match self {
            PropertyKind::Primitive(t) => Some(*t),
            _ => None,
        }
    }

    /// Returns `true` for `Collection(T)` kinds.
    pub fn is_collection(&self) -> bool {
        matches!(self, PropertyKind::Collection(_))
    }
}

impl From<EdmType> for PropertyKind {
    fn from(t: EdmType) -> Self {
        PropertyKind::Primitive(t)
    }
}

/// Splits `Collection(X)` into `Some(X)`.
pub fn collection_element_type(type_name: &str) -> Option<&str> {
    type_name
        .strip_prefix("Collection(")
        .and_then(|s| s.strip_suffix(')'))
}

/// Quotes a string as an OData literal, doubling embedded single quotes.
pub fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Validation context for one property.
pub(crate) struct Ctx<'a> {
    pub property: &'a str,
    pub strict: bool,
}

impl Ctx<'_> {
    pub(crate) fn invalid(&self, ty: EdmType, value: &Value, reason: impl Into<String>) -> ValidationError {
        ValidationError::invalid(self.property, ty.name(), value.to_string(), reason)
    }

    pub(crate) fn invalid_raw(&self, ty: EdmType, raw: &str, reason: impl Into<String>) -> ValidationError {
        ValidationError::invalid(self.property, ty.name(), raw, reason)
    }
}

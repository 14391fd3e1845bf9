//! Integer, floating point and decimal codecs
//!
//! Range checks only run in strict mode. A non-strict property keeps an
//! out-of-range value instead, widened to `Int64` (or `Double` for
//! floats), and logs a warning. Unparseable input fails either way.

use std::str::FromStr;

use rust_decimal::Decimal;

use super::Ctx;
use super::EdmType;
use crate::error::ValidationError;
use crate::model::Value;

/// Significant digits an `Edm.Decimal` may carry.
pub(crate) const DECIMAL_MAX_DIGITS: u32 = 29;

fn integer_bounds(ty: EdmType) -> (i128, i128) {
    match ty {
        EdmType::Byte => (u8::MIN as i128, u8::MAX as i128),
        EdmType::SByte => (i8::MIN as i128, i8::MAX as i128),
        EdmType::Int16 => (i16::MIN as i128, i16::MAX as i128),
        EdmType::Int32 => (i32::MIN as i128, i32::MAX as i128),
        _ => (i64::MIN as i128, i64::MAX as i128),
    }
}

fn narrow(ty: EdmType, n: i128) -> Value {
    match ty {
        EdmType::Byte => Value::Byte(n as u8),
        EdmType::SByte => Value::SByte(n as i8),
        EdmType::Int16 => Value::Int16(n as i16),
        EdmType::Int32 => Value::Int32(n as i32),
        _ => Value::Int64(n as i64),
    }
}

fn check_integer(ty: EdmType, ctx: &Ctx<'_>, n: i128) -> Result<Value, ValidationError> {
    let (min, max) = integer_bounds(ty);
    if (min..=max).contains(&n) {
        return Ok(narrow(ty, n));
    }
    if ctx.strict {
        return Err(ValidationError::out_of_range(ctx.property, ty.name(), n, min, max));
    }
    log::warn!(
        "Keeping out-of-range value {} for non-strict property {} ({})",
        n,
        ctx.property,
        ty.name()
    );
    match i64::try_from(n) {
        Ok(wide) => Ok(Value::Int64(wide)),
        Err(_) => Ok(Value::Double(n as f64)),
    }
}

pub(crate) fn parse_integer(ty: EdmType, ctx: &Ctx<'_>, raw: &str) -> Result<Value, ValidationError> {
    let trimmed = raw.trim();
    // v2 services suffix Int64 literals with L
    let digits = trimmed
        .strip_suffix('L')
        .or_else(|| trimmed.strip_suffix('l'))
        .unwrap_or(trimmed);
    match digits.parse::<i128>() {
        Ok(n) => check_integer(ty, ctx, n),
        Err(_) => Err(ctx.invalid_raw(ty, raw, "not an integer")),
    }
}

pub(crate) fn coerce_integer(ty: EdmType, ctx: &Ctx<'_>, value: &Value) -> Result<Value, ValidationError> {
    let n: i128 = match value {
        Value::Byte(n) => *n as i128,
        Value::SByte(n) => *n as i128,
        Value::Int16(n) => *n as i128,
        Value::Int32(n) => *n as i128,
        Value::Int64(n) => *n as i128,
        Value::Single(f) => return coerce_integral_float(ty, ctx, *f as f64),
        Value::Double(f) => return coerce_integral_float(ty, ctx, *f),
        Value::Decimal(d) if d.fract().is_zero() => match d.trunc().to_string().parse::<i128>() {
            Ok(n) => n,
            Err(_) => return Err(ctx.invalid(ty, value, "not an integer")),
        },
        Value::String(s) => return parse_integer(ty, ctx, s),
        Value::Json(serde_json::Value::Number(num)) => match num.as_i64() {
            Some(n) => n as i128,
            None => return Err(ctx.invalid(ty, value, "not an integer")),
        },
        other => return Err(ctx.invalid(ty, other, "not an integer")),
    };
    check_integer(ty, ctx, n)
}

fn coerce_integral_float(ty: EdmType, ctx: &Ctx<'_>, f: f64) -> Result<Value, ValidationError> {
    if !f.is_finite() || f.fract() != 0.0 {
        return Err(ValidationError::invalid(ctx.property, ty.name(), f.to_string(), "not an integer"));
    }
    if f.abs() >= 1.0e38 {
        return Err(ValidationError::out_of_range(
            ctx.property,
            ty.name(),
            f,
            integer_bounds(ty).0,
            integer_bounds(ty).1,
        ));
    }
    check_integer(ty, ctx, f as i128)
}

// =============================================================================
// Floating point
// =============================================================================

fn check_float(ty: EdmType, ctx: &Ctx<'_>, f: f64) -> Result<Value, ValidationError> {
    if ty == EdmType::Double || !f.is_finite() {
        return Ok(match ty {
            EdmType::Single => Value::Single(f as f32),
            _ => Value::Double(f),
        });
    }
    let max = f32::MAX as f64;
    if f.abs() <= max {
        return Ok(Value::Single(f as f32));
    }
    if ctx.strict {
        return Err(ValidationError::out_of_range(ctx.property, ty.name(), f, -max, max));
    }
    log::warn!(
        "Keeping out-of-range value {} for non-strict property {} ({})",
        f,
        ctx.property,
        ty.name()
    );
    Ok(Value::Double(f))
}

pub(crate) fn parse_float(ty: EdmType, ctx: &Ctx<'_>, raw: &str) -> Result<Value, ValidationError> {
    let trimmed = raw.trim();
    let parsed = match trimmed {
        "INF" => Ok(f64::INFINITY),
        "-INF" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        // v2 literals may carry a type suffix: 1.5d, 1.5f
        other => other
            .strip_suffix(['d', 'D', 'f', 'F', 'm', 'M'])
            .unwrap_or(other)
            .parse::<f64>(),
    };
    match parsed {
        Ok(f) => check_float(ty, ctx, f),
        Err(_) => Err(ctx.invalid_raw(ty, raw, "not a number")),
    }
}

pub(crate) fn coerce_float(ty: EdmType, ctx: &Ctx<'_>, value: &Value) -> Result<Value, ValidationError> {
    let f = match value {
        Value::Byte(n) => *n as f64,
        Value::SByte(n) => *n as f64,
        Value::Int16(n) => *n as f64,
        Value::Int32(n) => *n as f64,
        Value::Int64(n) => *n as f64,
        Value::Single(f) => *f as f64,
        Value::Double(f) => *f,
        Value::Decimal(d) => match d.to_string().parse::<f64>() {
            Ok(f) => f,
            Err(_) => return Err(ctx.invalid(ty, value, "not a number")),
        },
        Value::String(s) => return parse_float(ty, ctx, s),
        Value::Json(serde_json::Value::Number(num)) => match num.as_f64() {
            Some(f) => f,
            None => return Err(ctx.invalid(ty, value, "not a number")),
        },
        other => return Err(ctx.invalid(ty, other, "not a number")),
    };
    check_float(ty, ctx, f)
}

/// Renders a float the way OData expects: `INF`, `-INF`, `NaN` or plain digits.
pub(crate) fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f == f64::INFINITY {
        "INF".to_string()
    } else if f == f64::NEG_INFINITY {
        "-INF".to_string()
    } else {
        f.to_string()
    }
}

pub(crate) fn float_json(f: f64) -> serde_json::Value {
    match serde_json::Number::from_f64(f) {
        Some(n) => serde_json::Value::Number(n),
        None => serde_json::Value::String(format_float(f)),
    }
}

// =============================================================================
// Decimal
// =============================================================================

fn significant_digits(d: &Decimal) -> u32 {
    let mantissa = d.normalize().mantissa().unsigned_abs();
    if mantissa == 0 {
        1
    } else {
        mantissa.to_string().len() as u32
    }
}

fn check_decimal(ctx: &Ctx<'_>, raw: &str, d: Decimal) -> Result<Value, ValidationError> {
    if significant_digits(&d) <= DECIMAL_MAX_DIGITS {
        return Ok(Value::Decimal(d));
    }
    if ctx.strict {
        return Err(ValidationError::out_of_range(
            ctx.property,
            EdmType::Decimal.name(),
            raw,
            Decimal::MIN,
            Decimal::MAX,
        ));
    }
    log::warn!(
        "Keeping decimal {} with more than {} digits for non-strict property {}",
        raw,
        DECIMAL_MAX_DIGITS,
        ctx.property
    );
    Ok(Value::Decimal(d))
}

pub(crate) fn parse_decimal(ctx: &Ctx<'_>, raw: &str) -> Result<Value, ValidationError> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix(['m', 'M']).unwrap_or(trimmed);
    let parsed = Decimal::from_str(trimmed).or_else(|_| Decimal::from_scientific(trimmed));
    match parsed {
        Ok(d) => check_decimal(ctx, raw, d),
        // well-formed but too wide for a 96-bit mantissa
        Err(_) if trimmed.parse::<f64>().is_ok_and(f64::is_finite) => Err(ValidationError::out_of_range(
            ctx.property,
            EdmType::Decimal.name(),
            raw,
            Decimal::MIN,
            Decimal::MAX,
        )),
        Err(_) => Err(ctx.invalid_raw(EdmType::Decimal, raw, "not a decimal")),
    }
}

pub(crate) fn coerce_decimal(ctx: &Ctx<'_>, value: &Value) -> Result<Value, ValidationError> {
    let d = match value {
        Value::Decimal(d) => *d,
        Value::Byte(n) => Decimal::from(*n),
        Value::SByte(n) => Decimal::from(*n),
        Value::Int16(n) => Decimal::from(*n),
        Value::Int32(n) => Decimal::from(*n),
        Value::Int64(n) => Decimal::from(*n),
        Value::Single(f) => return parse_decimal(ctx, &f.to_string()),
        Value::Double(f) => return parse_decimal(ctx, &f.to_string()),
        Value::String(s) => return parse_decimal(ctx, s),
        Value::Json(serde_json::Value::Number(num)) => return parse_decimal(ctx, &num.to_string()),
        other => return Err(ctx.invalid(EdmType::Decimal, other, "not a decimal")),
    };
    check_decimal(ctx, &d.to_string(), d)
}

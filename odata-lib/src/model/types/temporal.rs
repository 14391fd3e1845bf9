//! Date and time codecs
//!
//! Each type parses with its own strict format first and falls back to a
//! permissive parser that understands RFC 3339, a few common layouts and
//! the v2 JSON `/Date(ms)/` form. Values are written back in the strict
//! format.

use chrono::DateTime;
use chrono::FixedOffset;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;

use super::Ctx;
use super::EdmType;
use crate::error::ValidationError;
use crate::model::Value;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const DATE_TIME_OFFSET_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%:z";
const TIME_OF_DAY_FORMAT: &str = "%H:%M:%S%.f";

const FALLBACK_DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Whatever the permissive parser managed to read.
enum Loose {
    Offset(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
}

fn parse_strict(ty: EdmType, raw: &str) -> Option<Value> {
    match ty {
        EdmType::Date => NaiveDate::parse_from_str(raw, DATE_FORMAT).ok().map(Value::Date),
        EdmType::DateTime => NaiveDateTime::parse_from_str(raw, DATE_TIME_FORMAT)
            .ok()
            .map(Value::DateTime),
        EdmType::DateTimeOffset => DateTime::parse_from_str(raw, DATE_TIME_OFFSET_FORMAT)
            .ok()
            .map(Value::DateTimeOffset),
        EdmType::TimeOfDay => NaiveTime::parse_from_str(raw, TIME_OF_DAY_FORMAT)
            .ok()
            .map(Value::TimeOfDay),
        _ => None,
    }
}

fn parse_loose(raw: &str) -> Option<Loose> {
    if let Some(dt) = parse_json_date(raw) {
        return Some(Loose::Offset(dt));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(Loose::Offset(dt));
    }
    for format in FALLBACK_DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Loose::Naive(dt));
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        return Some(Loose::Date(d));
    }
    NaiveTime::parse_from_str(raw, TIME_OF_DAY_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
        .map(Loose::Time)
}

/// Parses the v2 JSON form `/Date(1700000000000)/`, optionally `/Date(ms+0060)/`.
fn parse_json_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let inner = raw.strip_prefix("/Date(")?.strip_suffix(")/")?;
    let split = inner.get(1..)?.find(['+', '-']).map(|i| i + 1);
    let (millis, offset_minutes) = match split {
        Some(i) => (&inner[..i], inner[i..].parse::<i32>().ok()?),
        None => (inner, 0),
    };
    let utc = DateTime::from_timestamp_millis(millis.parse().ok()?)?;
    let offset = FixedOffset::east_opt(offset_minutes * 60)?;
    Some(utc.with_timezone(&offset))
}

fn convert(ty: EdmType, loose: Loose) -> Option<Value> {
    match (ty, loose) {
        (EdmType::Date, Loose::Date(d)) => Some(Value::Date(d)),
        (EdmType::Date, Loose::Naive(dt)) => Some(Value::Date(dt.date())),
        (EdmType::Date, Loose::Offset(dt)) => Some(Value::Date(dt.date_naive())),

        (EdmType::DateTime, Loose::Naive(dt)) => Some(Value::DateTime(dt)),
        (EdmType::DateTime, Loose::Offset(dt)) => Some(Value::DateTime(dt.naive_utc())),
        (EdmType::DateTime, Loose::Date(d)) => Some(Value::DateTime(d.and_time(NaiveTime::MIN))),

        (EdmType::DateTimeOffset, Loose::Offset(dt)) => Some(Value::DateTimeOffset(dt)),
        (EdmType::DateTimeOffset, Loose::Naive(dt)) => Some(Value::DateTimeOffset(dt.and_utc().fixed_offset())),
        (EdmType::DateTimeOffset, Loose::Date(d)) => Some(Value::DateTimeOffset(
            d.and_time(NaiveTime::MIN).and_utc().fixed_offset(),
        )),

        (EdmType::TimeOfDay, Loose::Time(t)) => Some(Value::TimeOfDay(t)),
        (EdmType::TimeOfDay, Loose::Naive(dt)) => Some(Value::TimeOfDay(dt.time())),
        (EdmType::TimeOfDay, Loose::Offset(dt)) => Some(Value::TimeOfDay(dt.time())),

        _ => None,
    }
}

pub(crate) fn parse(ty: EdmType, ctx: &Ctx<'_>, raw: &str) -> Result<Value, ValidationError> {
    let trimmed = raw.trim();
    parse_strict(ty, trimmed)
        .or_else(|| parse_loose(trimmed).and_then(|loose| convert(ty, loose)))
        .ok_or_else(|| ctx.invalid_raw(ty, raw, "not a recognizable date/time"))
}

pub(crate) fn coerce(ty: EdmType, ctx: &Ctx<'_>, value: &Value) -> Result<Value, ValidationError> {
    let loose = match value {
        Value::Date(d) => Loose::Date(*d),
        Value::DateTime(dt) => Loose::Naive(*dt),
        Value::DateTimeOffset(dt) => Loose::Offset(*dt),
        Value::TimeOfDay(t) => Loose::Time(*t),
        Value::String(s) => return parse(ty, ctx, s),
        Value::Json(serde_json::Value::String(s)) => return parse(ty, ctx, s),
        other => return Err(ctx.invalid(ty, other, "not a date/time")),
    };
    convert(ty, loose).ok_or_else(|| ctx.invalid(ty, value, "incompatible date/time value"))
}

/// Renders a temporal value in its strict format.
pub(crate) fn format(typed: &Value) -> String {
    match typed {
        Value::Date(d) => d.format(DATE_FORMAT).to_string(),
        Value::DateTime(dt) => dt.format(DATE_TIME_FORMAT).to_string(),
        Value::DateTimeOffset(dt) => dt.format(DATE_TIME_OFFSET_FORMAT).to_string(),
        Value::TimeOfDay(t) => t.format(TIME_OF_DAY_FORMAT).to_string(),
        other => other.to_string(),
    }
}

/// Date and time of day are bare in URLs; the others keep their literal marker.
pub(crate) fn literal(typed: &Value) -> String {
    match typed {
        Value::DateTime(_) => format!("datetime'{}'", format(typed)),
        Value::DateTimeOffset(_) => format!("datetimeoffset'{}'", format(typed)),
        _ => format(typed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTX: Ctx<'static> = Ctx {
        property: "CreatedAt",
        strict: true,
    };

    #[test]
    fn test_strict_formats() {
        let date = parse(EdmType::Date, &CTX, "2024-03-01").unwrap();
        assert_eq!(format(&date), "2024-03-01");
        assert_eq!(literal(&date), "2024-03-01");

        let dt = parse(EdmType::DateTime, &CTX, "2024-03-01T10:20:30").unwrap();
        assert_eq!(literal(&dt), "datetime'2024-03-01T10:20:30'");

        let tod = parse(EdmType::TimeOfDay, &CTX, "10:20:30.5").unwrap();
        assert_eq!(literal(&tod), "10:20:30.500");
    }

    #[test]
    fn test_date_time_offset_keeps_offset() {
        let dto = parse(EdmType::DateTimeOffset, &CTX, "2024-03-01T10:20:30+02:00").unwrap();
        assert_eq!(format(&dto), "2024-03-01T10:20:30+02:00");
        assert_eq!(literal(&dto), "datetimeoffset'2024-03-01T10:20:30+02:00'");
    }

    #[test]
    fn test_fallback_parsing() {
        let dt = parse(EdmType::DateTime, &CTX, "2024-03-01 10:20").unwrap();
        assert_eq!(format(&dt), "2024-03-01T10:20:00");

        let date = parse(EdmType::Date, &CTX, "2024-03-01T10:20:30Z").unwrap();
        assert_eq!(format(&date), "2024-03-01");

        let dto = parse(EdmType::DateTimeOffset, &CTX, "2024-03-01").unwrap();
        assert_eq!(format(&dto), "2024-03-01T00:00:00+00:00");
    }

    #[test]
    fn test_json_date() {
        let dt = parse(EdmType::DateTime, &CTX, "/Date(0)/").unwrap();
        assert_eq!(format(&dt), "1970-01-01T00:00:00");
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = parse(EdmType::Date, &CTX, "yesterday").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { .. }));
    }

    #[test]
    fn test_coerce_across_types() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        assert_eq!(
            coerce(EdmType::Date, &CTX, &Value::DateTime(dt)).unwrap(),
            Value::Date(dt.date())
        );
        assert!(coerce(EdmType::Date, &CTX, &Value::TimeOfDay(dt.time())).is_err());
    }
}

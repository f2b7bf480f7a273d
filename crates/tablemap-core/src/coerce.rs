//! Type coercion between attributes and statement parameters.
//!
//! Outbound, [`to_parameter`] turns an attribute's current value into a
//! [`BindValue`]. Inbound, [`to_attribute_value`] turns a value reported by
//! the database (a generated key, a selected column) into the shape the
//! attribute's setter accepts.

use crate::attribute::{AttributeAccess, AttributeInfo};
use crate::connection::BindValue;
use crate::error::{BindingError, Error, Result, TypeError};
use crate::mapping::{EnumType, TemporalType};
use crate::temporal::{
    MICROS_PER_DAY, format_date, format_time, format_timestamp, parse_date_string,
    parse_time_string, parse_timestamp_string,
};
use crate::types::SqlType;
use crate::value::Value;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Read one attribute of `instance` and shape it for binding at
/// `position`, whose declared type is `param_type`.
///
/// Order of precedence: custom converter, enum ordinal, temporal
/// adaptation; then NULLs bind typed, generic mode binds untyped, join
/// references bind the referenced identity and binary content streams.
pub fn to_parameter<T>(
    attr: &dyn AttributeAccess<T>,
    instance: &T,
    position: usize,
    param_type: &SqlType,
    generic: bool,
) -> Result<BindValue> {
    let info = attr.info();
    let raw = attr.read(instance)?;

    let value = if let Some(converter) = &info.converter {
        let original = raw.clone();
        converter
            .to_column(raw)
            .map_err(|e| binding_error(info, position, param_type, &original, e))?
    } else if info.enum_type == Some(EnumType::Ordinal) {
        enum_ordinal(info, position, param_type, raw)?
    } else if let Some(temporal) = info.temporal {
        let original = raw.clone();
        adapt_temporal(raw, temporal)
            .map_err(|e| binding_error(info, position, param_type, &original, e))?
    } else {
        raw
    };

    if value.is_null() {
        return Ok(BindValue::Null(param_type.clone()));
    }
    if generic {
        return Ok(BindValue::Untyped(value));
    }
    if info.join {
        let sql_type = match attr.relation() {
            Some(relation) => relation.target_id_type(info.referenced_column)?,
            None => param_type.clone(),
        };
        return Ok(BindValue::Reference { value, sql_type });
    }
    if let Value::Bytes(bytes) = value {
        return Ok(BindValue::Stream(bytes));
    }

    let sql_type = match param_type {
        SqlType::Custom(_) => info
            .converter
            .as_ref()
            .and_then(|c| c.column_type())
            .unwrap_or_else(|| declared_column_type(info)),
        declared => declared.clone(),
    };
    Ok(BindValue::Typed { value, sql_type })
}

/// Column type implied by the attribute's own declaration.
fn declared_column_type(info: &AttributeInfo) -> SqlType {
    if info.enum_type == Some(EnumType::Ordinal) {
        return SqlType::Integer;
    }
    match info.temporal {
        Some(TemporalType::Date) => SqlType::Date,
        Some(TemporalType::Time) => SqlType::Time,
        Some(TemporalType::Timestamp) => SqlType::Timestamp,
        None => info.sql_type.clone(),
    }
}

fn enum_ordinal(
    info: &AttributeInfo,
    position: usize,
    param_type: &SqlType,
    raw: Value,
) -> Result<Value> {
    let Value::Text(name) = &raw else {
        return Ok(raw);
    };
    let ordinal = info.enum_codec.and_then(|codec| codec.ordinal_of(name));
    match ordinal {
        Some(ordinal) => Ok(Value::Int(ordinal)),
        None => Err(binding_error(
            info,
            position,
            param_type,
            &raw,
            type_error("enum variant", &raw),
        )),
    }
}

/// Shape an attribute value for the column kind its temporal marker names.
fn adapt_temporal(value: Value, temporal: TemporalType) -> Result<Value> {
    let micros = match value {
        Value::Null => return Ok(Value::Null),
        Value::Timestamp(us) | Value::TimestampTz(us) => us,
        Value::Date(days) => days_to_micros(days)?,
        Value::Time(us) if temporal == TemporalType::Time => return Ok(Value::Time(us)),
        Value::Text(ref s) => parse_timestamp_string(s)?,
        ref other => match other.as_i64() {
            Some(millis) => millis_to_micros(millis)?,
            None => return Err(type_error("date/time value", other)),
        },
    };
    Ok(match temporal {
        TemporalType::Date => Value::Date(days_of(micros)?),
        TemporalType::Time => Value::Time(micros.rem_euclid(MICROS_PER_DAY)),
        TemporalType::Timestamp => Value::Timestamp(micros),
    })
}

fn binding_error(
    info: &AttributeInfo,
    position: usize,
    sql_type: &SqlType,
    value: &Value,
    source: Error,
) -> Error {
    Error::Binding(BindingError {
        sql_type: sql_type.sql_name(),
        value: format!("{value:?}"),
        value_type: value.type_name(),
        attribute: info.qualified_name(),
        position,
        source: Some(Box::new(source)),
    })
}

/// Turn a database-reported value into the attribute's representation.
///
/// `column_type` is the database type name of the originating column when
/// the driver reports one (generated keys do).
pub fn to_attribute_value(info: &AttributeInfo, raw: Value, column_type: Option<&str>) -> Result<Value> {
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let raw = match column_type.and_then(SqlType::from_type_name) {
        Some(source) if matches!(raw, Value::Text(_)) => shape(raw, &source)?,
        _ => raw,
    };

    if let Some(converter) = &info.converter {
        let converted = converter.to_attribute(raw)?;
        return shape(converted, &info.sql_type);
    }
    if info.enum_codec.is_some() || info.join {
        // Enum setters accept names and ordinals; references coerce
        // against the referenced identity when written.
        return Ok(raw);
    }
    if info.temporal.is_some() && info.sql_type.is_integer() {
        let millis = temporal_to_millis(raw)?;
        return shape(millis, &info.sql_type);
    }
    shape(raw, &info.sql_type)
}

fn temporal_to_millis(value: Value) -> Result<Value> {
    let millis = match value {
        Value::Date(days) => i64::from(days)
            .checked_mul(MILLIS_PER_DAY)
            .ok_or_else(|| overflow("TIMESTAMP", i64::from(days)))?,
        Value::Time(us) | Value::Timestamp(us) | Value::TimestampTz(us) => us.div_euclid(1000),
        Value::Text(ref s) => parse_timestamp_string(s)
            .or_else(|_| parse_time_string(s))?
            .div_euclid(1000),
        other => return Ok(other),
    };
    Ok(Value::BigInt(millis))
}

/// Convert `value` to the representation of `target`.
#[allow(clippy::cast_possible_truncation)]
pub fn shape(value: Value, target: &SqlType) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match target {
        SqlType::TinyInt => {
            let v = integer_of(&value)?;
            i8::try_from(v).map(Value::TinyInt).map_err(|_| overflow("TINYINT", v))
        }
        SqlType::SmallInt => {
            let v = integer_of(&value)?;
            i16::try_from(v).map(Value::SmallInt).map_err(|_| overflow("SMALLINT", v))
        }
        SqlType::Integer => {
            let v = integer_of(&value)?;
            i32::try_from(v).map(Value::Int).map_err(|_| overflow("INTEGER", v))
        }
        SqlType::BigInt => integer_of(&value).map(Value::BigInt),
        SqlType::Real => float_of(&value).map(|f| Value::Float(f as f32)),
        SqlType::Double => float_of(&value).map(Value::Double),
        SqlType::Decimal { .. } => match value {
            Value::Decimal(_) => Ok(value),
            Value::Text(s) => Ok(Value::Decimal(s)),
            Value::Float(f) => Ok(Value::Decimal(f.to_string())),
            Value::Double(f) => Ok(Value::Decimal(f.to_string())),
            other => match other.as_i64() {
                Some(v) => Ok(Value::Decimal(v.to_string())),
                None => Err(type_error("DECIMAL", &other)),
            },
        },
        SqlType::Boolean => match &value {
            Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Ok(Value::Bool(true)),
                "false" | "f" | "0" => Ok(Value::Bool(false)),
                _ => Err(type_error("BOOLEAN", &value)),
            },
            other => other
                .as_bool()
                .map(Value::Bool)
                .ok_or_else(|| type_error("BOOLEAN", other)),
        },
        SqlType::Char(_) | SqlType::VarChar(_) | SqlType::Text => match value {
            Value::Text(_) => Ok(value),
            Value::Decimal(s) => Ok(Value::Text(s)),
            Value::Date(d) => Ok(Value::Text(format_date(d))),
            Value::Time(t) => Ok(Value::Text(format_time(t))),
            Value::Timestamp(ts) | Value::TimestampTz(ts) => Ok(Value::Text(format_timestamp(ts))),
            Value::Float(f) => Ok(Value::Text(f.to_string())),
            Value::Double(f) => Ok(Value::Text(f.to_string())),
            other => match other.as_i64() {
                Some(v) if !matches!(other, Value::Bool(_)) => Ok(Value::Text(v.to_string())),
                _ => Err(type_error("TEXT", &other)),
            },
        },
        SqlType::VarBinary(_) | SqlType::Blob => match value {
            Value::Bytes(_) => Ok(value),
            Value::Text(s) => Ok(Value::Bytes(s.into_bytes())),
            Value::Uuid(u) => Ok(Value::Bytes(u.to_vec())),
            other => Err(type_error("BLOB", &other)),
        },
        SqlType::Date => match value {
            Value::Date(_) => Ok(value),
            Value::Timestamp(us) | Value::TimestampTz(us) => days_of(us).map(Value::Date),
            Value::Text(s) => match parse_date_string(&s) {
                Ok(days) => Ok(Value::Date(days)),
                Err(_) => days_of(parse_timestamp_string(&s)?).map(Value::Date),
            },
            other => match other.as_i64() {
                Some(millis) => days_of(millis_to_micros(millis)?).map(Value::Date),
                None => Err(type_error("DATE", &other)),
            },
        },
        SqlType::Time => match value {
            Value::Time(_) => Ok(value),
            Value::Timestamp(us) | Value::TimestampTz(us) => {
                Ok(Value::Time(us.rem_euclid(MICROS_PER_DAY)))
            }
            Value::Text(s) => match parse_time_string(&s) {
                Ok(us) => Ok(Value::Time(us)),
                Err(_) => Ok(Value::Time(parse_timestamp_string(&s)?.rem_euclid(MICROS_PER_DAY))),
            },
            other => match other.as_i64() {
                Some(millis) => Ok(Value::Time(millis.rem_euclid(MILLIS_PER_DAY) * 1000)),
                None => Err(type_error("TIME", &other)),
            },
        },
        SqlType::Timestamp | SqlType::TimestampTz => {
            let micros = match value {
                Value::Timestamp(us) | Value::TimestampTz(us) => us,
                Value::Date(days) => days_to_micros(days)?,
                Value::Text(ref s) => parse_timestamp_string(s)?,
                ref other => match other.as_i64() {
                    Some(millis) => millis_to_micros(millis)?,
                    None => return Err(type_error("TIMESTAMP", other)),
                },
            };
            Ok(if *target == SqlType::TimestampTz {
                Value::TimestampTz(micros)
            } else {
                Value::Timestamp(micros)
            })
        }
        SqlType::Uuid => match value {
            Value::Uuid(_) => Ok(value),
            Value::Bytes(ref b) if b.len() == 16 => {
                let mut out = [0u8; 16];
                out.copy_from_slice(b);
                Ok(Value::Uuid(out))
            }
            Value::Text(ref s) => parse_uuid(s).map(Value::Uuid).ok_or_else(|| type_error("UUID", &value)),
            other => Err(type_error("UUID", &other)),
        },
        SqlType::Json => match value {
            Value::Json(_) => Ok(value),
            Value::Text(s) => serde_json::from_str(&s).map(Value::Json).map_err(|e| {
                Error::Type(TypeError {
                    expected: "JSON",
                    actual: e.to_string(),
                    column: None,
                    rust_type: None,
                })
            }),
            other => Err(type_error("JSON", &other)),
        },
        SqlType::Custom(_) => Ok(value),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integer_of(value: &Value) -> Result<i64> {
    if let Some(v) = value.as_i64() {
        return Ok(v);
    }
    match value {
        Value::Float(_) | Value::Double(_) => {
            let f = value.as_f64().unwrap_or(f64::NAN);
            let truncated = f as i64;
            if f.fract() == 0.0 && truncated as f64 == f {
                return Ok(truncated);
            }
            Err(type_error("integer", value))
        }
        Value::Decimal(s) | Value::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| type_error("integer", value)),
        _ => Err(type_error("integer", value)),
    }
}

fn float_of(value: &Value) -> Result<f64> {
    match value {
        Value::Text(s) => s.trim().parse().map_err(|_| type_error("floating point", value)),
        Value::Bool(_) => Err(type_error("floating point", value)),
        other => other.as_f64().ok_or_else(|| type_error("floating point", other)),
    }
}

fn days_to_micros(days: i32) -> Result<i64> {
    i64::from(days)
        .checked_mul(MICROS_PER_DAY)
        .ok_or_else(|| overflow("TIMESTAMP", i64::from(days)))
}

fn millis_to_micros(millis: i64) -> Result<i64> {
    millis
        .checked_mul(1000)
        .ok_or_else(|| overflow("TIMESTAMP", millis))
}

fn days_of(micros: i64) -> Result<i32> {
    let days = micros.div_euclid(MICROS_PER_DAY);
    i32::try_from(days).map_err(|_| overflow("DATE", days))
}

fn parse_uuid(s: &str) -> Option<[u8; 16]> {
    let hex: Vec<u8> = s.bytes().filter(|b| *b != b'-').collect();
    if hex.len() != 32 {
        return None;
    }
    let mut out = [0u8; 16];
    for (i, pair) in hex.chunks(2).enumerate() {
        let text = std::str::from_utf8(pair).ok()?;
        out[i] = u8::from_str_radix(text, 16).ok()?;
    }
    Some(out)
}

fn type_error(expected: &'static str, actual: &Value) -> Error {
    Error::Type(TypeError {
        expected,
        actual: format!("{} {:?}", actual.type_name(), actual),
        column: None,
        rust_type: None,
    })
}

fn overflow(expected: &'static str, value: i64) -> Error {
    Error::Type(TypeError {
        expected,
        actual: format!("{value} is out of range"),
        column: None,
        rust_type: None,
    })
}

//! Custom attribute converters.
//!
//! A converter sits between an attribute and its column. Outbound it turns
//! the attribute value into what the column stores; inbound it turns a
//! column value back into the attribute's representation. Converters see
//! NULL too and should pass it through unless they mean otherwise.

use std::fmt;

use crate::error::{Error, Result, TypeError};
use crate::temporal::{MICROS_PER_DAY, Timestamp};
use crate::types::SqlType;
use crate::value::Value;

/// Bidirectional conversion for one attribute.
pub trait AttributeConverter: fmt::Debug + Send + Sync {
    /// Attribute value to column value.
    fn to_column(&self, attribute: Value) -> Result<Value>;

    /// Column value to attribute value.
    fn to_attribute(&self, column: Value) -> Result<Value>;

    /// Type of the column this converter writes, when it is fixed.
    fn column_type(&self) -> Option<SqlType> {
        None
    }
}

/// Epoch milliseconds (`i64`) stored in a TIMESTAMP column.
#[derive(Debug, Clone, Copy, Default)]
pub struct MillisTimestampConverter;

impl AttributeConverter for MillisTimestampConverter {
    fn to_column(&self, attribute: Value) -> Result<Value> {
        match attribute {
            Value::Null => Ok(Value::Null),
            other => {
                let millis = other
                    .as_i64()
                    .ok_or_else(|| mismatch("epoch milliseconds", &other))?;
                Timestamp::checked_from_millis(millis)
                    .map(|ts| Value::Timestamp(ts.0))
                    .ok_or_else(|| out_of_range("TIMESTAMP", millis))
            }
        }
    }

    fn to_attribute(&self, column: Value) -> Result<Value> {
        match column {
            Value::Null => Ok(Value::Null),
            Value::Timestamp(micros) | Value::TimestampTz(micros) => {
                Ok(Value::BigInt(Timestamp(micros).as_millis()))
            }
            Value::Text(s) => {
                let micros = crate::temporal::parse_timestamp_string(&s)?;
                Ok(Value::BigInt(Timestamp(micros).as_millis()))
            }
            other => Err(mismatch("TIMESTAMP", &other)),
        }
    }

    fn column_type(&self) -> Option<SqlType> {
        Some(SqlType::Timestamp)
    }
}

/// Epoch milliseconds (`i64`) stored in a TIME column, keeping only the
/// time of day.
#[derive(Debug, Clone, Copy, Default)]
pub struct MillisTimeConverter;

impl AttributeConverter for MillisTimeConverter {
    fn to_column(&self, attribute: Value) -> Result<Value> {
        match attribute {
            Value::Null => Ok(Value::Null),
            other => {
                let millis = other
                    .as_i64()
                    .ok_or_else(|| mismatch("epoch milliseconds", &other))?;
                Ok(Value::Time(millis.rem_euclid(MICROS_PER_DAY / 1000) * 1000))
            }
        }
    }

    fn to_attribute(&self, column: Value) -> Result<Value> {
        match column {
            Value::Null => Ok(Value::Null),
            Value::Time(micros) => Ok(Value::BigInt(micros.div_euclid(1000))),
            Value::Text(s) => {
                let micros = crate::temporal::parse_time_string(&s)?;
                Ok(Value::BigInt(micros.div_euclid(1000)))
            }
            other => Err(mismatch("TIME", &other)),
        }
    }

    fn column_type(&self) -> Option<SqlType> {
        Some(SqlType::Time)
    }
}

fn mismatch(expected: &'static str, actual: &Value) -> Error {
    Error::Type(TypeError {
        expected,
        actual: actual.type_name().to_string(),
        column: None,
        rust_type: None,
    })
}

fn out_of_range(expected: &'static str, millis: i64) -> Error {
    Error::Type(TypeError {
        expected,
        actual: format!("out of range: {} ms", millis),
        column: None,
        rust_type: None,
    })
}

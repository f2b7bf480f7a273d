//! Database connection traits.
//!
//! The write engine talks to a database only through these two traits:
//!
//! - [`Connection`] prepares parameterized statements, optionally asking the
//!   driver to report generated key columns.
//! - [`Statement`] binds positional parameters, executes single updates or
//!   batches and exposes parameter metadata and generated keys.
//!
//! Everything is synchronous. A prepared statement borrows its connection
//! mutably and releases driver resources when dropped, so every exit path of
//! a write operation closes what it opened.

use std::fmt;

use crate::error::Result;
use crate::types::SqlType;
use crate::value::Value;

/// One parameter value ready for binding.
///
/// The variant decides how a driver binds it: typed, as a NULL of a declared
/// type, as streamed binary content, as the identity of a referenced row, or
/// untyped (driver infers the type from the value).
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    /// SQL NULL of the statement's declared parameter type.
    Null(SqlType),
    /// A value bound with an explicit SQL type.
    Typed { value: Value, sql_type: SqlType },
    /// Large binary content.
    Stream(Vec<u8>),
    /// Identity value of a referenced row (join columns).
    Reference { value: Value, sql_type: SqlType },
    /// A value bound without type information.
    Untyped(Value),
}

impl BindValue {
    /// The value that ends up in the database, NULL for typed nulls.
    pub fn value(&self) -> Value {
        match self {
            BindValue::Null(_) => Value::Null,
            BindValue::Typed { value, .. }
            | BindValue::Reference { value, .. }
            | BindValue::Untyped(value) => value.clone(),
            BindValue::Stream(bytes) => Value::Bytes(bytes.clone()),
        }
    }

    /// The declared SQL type, if the variant carries one.
    pub fn sql_type(&self) -> Option<&SqlType> {
        match self {
            BindValue::Null(t) => Some(t),
            BindValue::Typed { sql_type, .. } | BindValue::Reference { sql_type, .. } => {
                Some(sql_type)
            }
            BindValue::Stream(_) => Some(&SqlType::Blob),
            BindValue::Untyped(_) => None,
        }
    }
}

/// A database-generated key, as reported after an insert.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedKey {
    /// Raw value returned by the database.
    pub value: Value,
    /// Database type name of the key column (e.g. "INTEGER", "BIGINT").
    pub column_type: String,
}

impl GeneratedKey {
    pub fn new(value: Value, column_type: impl Into<String>) -> Self {
        Self {
            value,
            column_type: column_type.into(),
        }
    }
}

/// A prepared statement.
///
/// Parameter positions are 1-based, like the SQL placeholders they bind.
pub trait Statement {
    /// The SQL text this statement was prepared from.
    fn sql(&self) -> &str;

    /// Declared type of every parameter, in placeholder order.
    ///
    /// Drivers without parameter metadata report [`SqlType::Custom`].
    fn parameter_types(&mut self) -> Result<Vec<SqlType>>;

    /// Bind one parameter.
    fn bind(&mut self, position: usize, value: BindValue) -> Result<()>;

    /// Forget all bound parameters.
    fn clear_parameters(&mut self) -> Result<()>;

    /// Execute with the bound parameters and return rows affected.
    fn execute_update(&mut self) -> Result<u64>;

    /// Snapshot the bound parameters as one batch entry.
    fn add_batch(&mut self) -> Result<()>;

    /// Execute all batch entries and return per-entry row counts.
    fn execute_batch(&mut self) -> Result<Vec<u64>>;

    /// Keys generated by the most recent execution.
    ///
    /// After a batch a driver may report fewer keys than rows; callers must
    /// not assume one key per entry.
    fn generated_keys(&mut self) -> Result<Vec<GeneratedKey>>;
}

/// A database connection capable of preparing statements.
pub trait Connection {
    /// The statement type, borrowing the connection while it lives.
    type Stmt<'conn>: Statement
    where
        Self: 'conn;

    /// Prepare a statement.
    ///
    /// A non-empty `key_columns` asks the driver to track generated values
    /// of those columns for [`Statement::generated_keys`].
    fn prepare(&mut self, sql: &str, key_columns: &[&str]) -> Result<Self::Stmt<'_>>;

    /// Prepare, bind every argument untyped and execute once.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let mut stmt = self.prepare(sql, &[])?;
        for (i, param) in params.iter().enumerate() {
            stmt.bind(i + 1, BindValue::Untyped(param.clone()))?;
        }
        stmt.execute_update()
    }
}

impl fmt::Display for BindValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindValue::Null(t) => write!(f, "NULL::{}", t.sql_name()),
            BindValue::Typed { value, sql_type } => write!(f, "{:?}::{}", value, sql_type.sql_name()),
            BindValue::Stream(bytes) => write!(f, "<{} bytes>", bytes.len()),
            BindValue::Reference { value, sql_type } => {
                write!(f, "ref {:?}::{}", value, sql_type.sql_name())
            }
            BindValue::Untyped(value) => write!(f, "{:?}", value),
        }
    }
}

//! SQL type definitions and mapping.

/// SQL data types known to the binding and coercion layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlType {
    // Integer types
    TinyInt,
    SmallInt,
    Integer,
    BigInt,

    // Floating point
    Real,
    Double,

    // Fixed precision
    Decimal { precision: u8, scale: u8 },

    Boolean,

    // String types
    Char(u32),
    VarChar(u32),
    Text,

    // Binary types
    VarBinary(u32),
    Blob,

    // Date/time types
    Date,
    Time,
    Timestamp,
    TimestampTz,

    Uuid,
    Json,

    /// Type reported by a driver that has no closer mapping.
    Custom(&'static str),
}

impl SqlType {
    /// Get the SQL type name for this type.
    pub fn sql_name(&self) -> String {
        match self {
            SqlType::TinyInt => "TINYINT".to_string(),
            SqlType::SmallInt => "SMALLINT".to_string(),
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::Real => "REAL".to_string(),
            SqlType::Double => "DOUBLE PRECISION".to_string(),
            SqlType::Decimal { precision, scale } => format!("DECIMAL({}, {})", precision, scale),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::Char(len) => format!("CHAR({})", len),
            SqlType::VarChar(len) => format!("VARCHAR({})", len),
            SqlType::Text => "TEXT".to_string(),
            SqlType::VarBinary(len) => format!("VARBINARY({})", len),
            SqlType::Blob => "BLOB".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::Time => "TIME".to_string(),
            SqlType::Timestamp => "TIMESTAMP".to_string(),
            SqlType::TimestampTz => "TIMESTAMPTZ".to_string(),
            SqlType::Uuid => "UUID".to_string(),
            SqlType::Json => "JSON".to_string(),
            SqlType::Custom(name) => (*name).to_string(),
        }
    }

    /// Map a database column type name (as reported for generated keys or
    /// parameter metadata) onto a known type.
    ///
    /// Matching ignores case and any length/precision suffix.
    pub fn from_type_name(name: &str) -> Option<SqlType> {
        let upper = name.trim().to_ascii_uppercase();
        let base = upper.split('(').next().unwrap_or("").trim();
        let ty = match base {
            "TINYINT" | "INT1" => SqlType::TinyInt,
            "SMALLINT" | "INT2" | "SMALLSERIAL" => SqlType::SmallInt,
            "INT" | "INTEGER" | "INT4" | "SERIAL" | "MEDIUMINT" => SqlType::Integer,
            "BIGINT" | "INT8" | "BIGSERIAL" | "IDENTITY" => SqlType::BigInt,
            "REAL" | "FLOAT4" | "FLOAT" => SqlType::Real,
            "DOUBLE" | "DOUBLE PRECISION" | "FLOAT8" => SqlType::Double,
            "DECIMAL" | "NUMERIC" => SqlType::Decimal {
                precision: 0,
                scale: 0,
            },
            "BOOL" | "BOOLEAN" | "BIT" => SqlType::Boolean,
            "CHAR" | "CHARACTER" => SqlType::Char(0),
            "VARCHAR" | "CHARACTER VARYING" | "NVARCHAR" => SqlType::VarChar(0),
            "TEXT" | "CLOB" | "STRING" => SqlType::Text,
            "VARBINARY" | "BINARY" | "BYTEA" => SqlType::VarBinary(0),
            "BLOB" => SqlType::Blob,
            "DATE" => SqlType::Date,
            "TIME" => SqlType::Time,
            "TIMESTAMP" | "DATETIME" => SqlType::Timestamp,
            "TIMESTAMPTZ" | "TIMESTAMP WITH TIME ZONE" => SqlType::TimestampTz,
            "UUID" => SqlType::Uuid,
            "JSON" | "JSONB" => SqlType::Json,
            _ => return None,
        };
        Some(ty)
    }

    /// Check if this type is numeric.
    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            SqlType::TinyInt
                | SqlType::SmallInt
                | SqlType::Integer
                | SqlType::BigInt
                | SqlType::Real
                | SqlType::Double
                | SqlType::Decimal { .. }
        )
    }

    /// Check if this type is an integer type.
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            SqlType::TinyInt | SqlType::SmallInt | SqlType::Integer | SqlType::BigInt
        )
    }

    /// Check if this type is text-based.
    pub const fn is_text(&self) -> bool {
        matches!(self, SqlType::Char(_) | SqlType::VarChar(_) | SqlType::Text)
    }

    /// Check if this type carries binary content.
    pub const fn is_binary(&self) -> bool {
        matches!(self, SqlType::VarBinary(_) | SqlType::Blob)
    }

    /// Check if this type is a date/time type.
    pub const fn is_temporal(&self) -> bool {
        matches!(
            self,
            SqlType::Date | SqlType::Time | SqlType::Timestamp | SqlType::TimestampTz
        )
    }
}

/// Trait for types that have a corresponding SQL type.
pub trait TypeInfo {
    /// The SQL type for this Rust type.
    const SQL_TYPE: SqlType;

    /// Whether this type is nullable by default.
    const NULLABLE: bool = false;

    /// Rust-side type name used in diagnostics.
    const TYPE_NAME: &'static str;
}

macro_rules! type_info {
    ($($ty:ty => $sql:expr),* $(,)?) => {
        $(
            impl TypeInfo for $ty {
                const SQL_TYPE: SqlType = $sql;
                const TYPE_NAME: &'static str = stringify!($ty);
            }
        )*
    };
}

type_info! {
    i8 => SqlType::TinyInt,
    i16 => SqlType::SmallInt,
    i32 => SqlType::Integer,
    i64 => SqlType::BigInt,
    f32 => SqlType::Real,
    f64 => SqlType::Double,
    bool => SqlType::Boolean,
    String => SqlType::Text,
    Vec<u8> => SqlType::Blob,
    serde_json::Value => SqlType::Json,
}

impl<T: TypeInfo> TypeInfo for Option<T> {
    const SQL_TYPE: SqlType = T::SQL_TYPE;
    const NULLABLE: bool = true;
    const TYPE_NAME: &'static str = T::TYPE_NAME;
}

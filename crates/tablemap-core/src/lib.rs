//! Core types and metadata resolution for tablemap.
//!
//! This crate holds everything the write engine builds on:
//!
//! - `Entity` and the declarative `Mapping` a mapped type describes itself with
//! - access-type resolution into `Introspected` descriptors, cached by `Registry`
//! - `AttributeAccess` for reading and writing one attribute of an instance
//! - the coercion layer between attribute values and statement parameters
//! - the synchronous `Connection`/`Statement` contract drivers implement

mod access;
pub mod attribute;
pub mod coerce;
pub mod connection;
pub mod convert;
pub mod error;
pub mod identifiers;
pub mod introspected;
pub mod mapping;
pub mod registry;
pub mod relation;
pub mod temporal;
pub mod types;
pub mod value;

pub use attribute::{AttributeAccess, AttributeInfo, FieldAccess, PropertyAccess};
pub use connection::{BindValue, Connection, GeneratedKey, Statement};
pub use convert::{AttributeConverter, MillisTimeConverter, MillisTimestampConverter};
pub use error::{
    AccessError, BindingError, ConfigError, ConnectionError, ConnectionErrorKind, Error,
    MetadataError, QueryError, QueryErrorKind, Result, TypeError,
};
pub use identifiers::{Identifier, quote_ident};
pub use introspected::Introspected;
pub use mapping::{
    AccessType, Accessors, AttributeValue, ClassDecl, ClassKind, ColumnSpec, Entity, EnumCodec,
    EnumType, JoinColumnSpec, Mapping, Marker, Member, Persistable, SqlEnum, TemporalType,
};
pub use registry::Registry;
pub use relation::{CollectionLink, ReferenceLink, Relation};
pub use temporal::{Date, Time, Timestamp};
pub use types::{SqlType, TypeInfo};
pub use value::Value;

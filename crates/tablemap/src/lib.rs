//! tablemap - a metadata-driven object-to-row write engine.
//!
//! A mapped type describes its class hierarchy once, through
//! [`Entity::mapping`]. tablemap resolves that description into attribute
//! descriptors (field or property access, per level and per member), then
//! synthesizes and caches INSERT, UPDATE and DELETE statements and runs them
//! on any driver implementing [`Connection`]:
//!
//! - identities generated by the database are copied back onto inserted
//!   instances, batched inserts included
//! - converters, enum and temporal markers shape values before binding
//! - to-one references are stored as the referenced row's identity
//!
//! # Quick Start
//!
//! ```ignore
//! use tablemap::prelude::*;
//!
//! #[derive(Default)]
//! struct Hero {
//!     id: i64,
//!     name: String,
//! }
//!
//! impl Entity for Hero {
//!     fn mapping() -> Mapping<Self> {
//!         Mapping::new().level(
//!             ClassDecl::entity("Hero")
//!                 .table("heroes")
//!                 .member(
//!                     Member::field("id", Accessors::scalar(|h: &Hero| h.id, |h, v| h.id = v))
//!                         .id()
//!                         .generated(),
//!                 )
//!                 .member(Member::field(
//!                     "name",
//!                     Accessors::scalar(|h: &Hero| h.name.clone(), |h, v| h.name = v),
//!                 )),
//!         )
//!     }
//! }
//!
//! fn example(conn: &mut impl Connection) -> Result<()> {
//!     let mut hero = Hero { id: 0, name: "Spider-Man".to_string() };
//!     tablemap::insert(conn, &mut hero)?;
//!     assert!(hero.id > 0);
//!
//!     hero.name = "Peter".to_string();
//!     tablemap::update(conn, &mut hero)?;
//!     tablemap::delete(conn, &hero)?;
//!     Ok(())
//! }
//! ```
//!
//! Nothing here commits or rolls back; transaction boundaries belong to the
//! caller's connection.

pub mod config;
pub mod writer;

pub use tablemap_core::{
    AccessType, Accessors, AttributeAccess, AttributeConverter, AttributeInfo, AttributeValue,
    BindValue, ClassDecl, ClassKind, Connection, Date, Entity, EnumType, Error, GeneratedKey,
    Identifier, Introspected, Mapping, Marker, Member, MillisTimeConverter,
    MillisTimestampConverter, Registry, Result, SqlEnum, SqlType, Statement, TemporalType, Time,
    Timestamp, TypeInfo, Value,
};
pub use tablemap_query::{StatementCache, StatementCaches};

pub use config::{generic_binding_mode, set_generic_binding_mode, statement_cache_size};
pub use writer::{OrmWriter, default_writer};

/// Insert one instance with the default writer.
pub fn insert<T: Entity>(conn: &mut impl Connection, obj: &mut T) -> Result<u64> {
    default_writer().insert(conn, obj)
}

/// Insert instances one statement execution at a time with the default
/// writer.
pub fn insert_not_batched<T: Entity>(conn: &mut impl Connection, objs: &mut [T]) -> Result<u64> {
    default_writer().insert_not_batched(conn, objs)
}

/// Insert instances as one batch with the default writer.
pub fn insert_batched<T: Entity>(
    conn: &mut impl Connection,
    objs: &mut [T],
    set_generated_values: bool,
) -> Result<u64> {
    default_writer().insert_batched(conn, objs, set_generated_values)
}

pub fn update<T: Entity>(conn: &mut impl Connection, obj: &mut T) -> Result<u64> {
    default_writer().update(conn, obj)
}

pub fn update_excluding<T: Entity>(
    conn: &mut impl Connection,
    obj: &mut T,
    excluded: &[&str],
) -> Result<u64> {
    default_writer().update_excluding(conn, obj, excluded)
}

pub fn delete<T: Entity>(conn: &mut impl Connection, obj: &T) -> Result<u64> {
    default_writer().delete(conn, obj)
}

pub fn delete_by_id<T: Entity>(conn: &mut impl Connection, ids: &[Value]) -> Result<u64> {
    default_writer().delete_by_id::<T>(conn, ids)
}

pub fn delete_by_where_clause<T: Entity>(
    conn: &mut impl Connection,
    clause: &str,
    args: &[Value],
) -> Result<u64> {
    default_writer().delete_by_where_clause::<T>(conn, clause, args)
}

pub fn delete_objects<T: Entity>(conn: &mut impl Connection, objs: &[T]) -> Result<u64> {
    default_writer().delete_objects(conn, objs)
}

/// Run arbitrary parameterized SQL with the default writer.
pub fn execute_update(conn: &mut impl Connection, sql: &str, args: &[Value]) -> Result<u64> {
    default_writer().execute_update(conn, sql, args)
}

/// Drop the default writer's resolved metadata and statement caches.
pub fn clear_caches() {
    default_writer().clear_caches();
}

/// Commonly used items.
///
/// ```ignore
/// use tablemap::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        AccessType, Accessors, ClassDecl, Connection, Entity, EnumType, Error, Mapping, Member,
        OrmWriter, Result, SqlEnum, Statement, TemporalType, Value,
    };
}

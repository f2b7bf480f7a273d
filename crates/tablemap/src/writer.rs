//! The write engine.
//!
//! [`OrmWriter`] turns instances of mapped types into INSERT, UPDATE and
//! DELETE statements on a caller-supplied [`Connection`], binds their
//! attribute values and copies database-generated identities back onto the
//! instances.
//!
//! The writer never commits or rolls back. Every error is returned as is,
//! after the failing SQL has been logged.

use std::any::TypeId;
use std::sync::{Arc, LazyLock};

use tracing::{debug, error, warn};

use tablemap_core::coerce;
use tablemap_core::{
    AttributeAccess, AttributeValue, BindValue, Connection, Entity, Error, GeneratedKey,
    Introspected, Registry, Result, SqlType, Statement, Value,
};
use tablemap_query::{StatementCaches, synth};

use crate::config;

static DEFAULT_WRITER: LazyLock<OrmWriter> = LazyLock::new(OrmWriter::new);

/// The process-wide writer used by the crate-level functions.
pub fn default_writer() -> &'static OrmWriter {
    &DEFAULT_WRITER
}

/// Metadata registry plus statement caches, and the write operations that
/// use them.
pub struct OrmWriter {
    registry: Registry,
    caches: StatementCaches,
    generic_binding: Option<bool>,
}

impl Default for OrmWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl OrmWriter {
    /// A writer whose caches hold [`config::statement_cache_size`] entries.
    pub fn new() -> Self {
        Self::with_cache_size(config::statement_cache_size())
    }

    pub fn with_cache_size(max_size: usize) -> Self {
        Self {
            registry: Registry::new(),
            caches: StatementCaches::new(max_size),
            generic_binding: None,
        }
    }

    /// Pin generic binding for this writer instead of following
    /// [`config::generic_binding_mode`].
    pub fn generic_binding(mut self, enabled: bool) -> Self {
        self.generic_binding = Some(enabled);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn caches(&self) -> &StatementCaches {
        &self.caches
    }

    /// Resolved metadata of `T`, from the registry.
    pub fn introspect<T: Entity>(&self) -> Result<Arc<Introspected<T>>> {
        self.registry.get::<T>()
    }

    /// Drop all resolved metadata and cached statement text.
    pub fn clear_caches(&self) {
        self.registry.clear();
        self.caches.clear();
        debug!("Cleared metadata and statement caches");
    }

    fn is_generic(&self) -> bool {
        self.generic_binding
            .unwrap_or_else(config::generic_binding_mode)
    }

    /// Insert one instance and assign its generated identity, if the type
    /// has one and the instance does not carry a positive identity yet.
    #[tracing::instrument(level = "debug", skip(self, conn, obj), fields(entity = std::any::type_name::<T>()))]
    pub fn insert<T: Entity>(&self, conn: &mut impl Connection, obj: &mut T) -> Result<u64> {
        let meta = self.introspect::<T>()?;
        let sql = self.insert_sql(&meta);
        let key_columns = generated_key_columns(&meta);

        let mut stmt = prepare(conn, &sql, &key_columns)?;
        let param_types = stmt.parameter_types()?;
        let attrs: Vec<_> = meta.insertable().collect();
        bind_attributes(&mut stmt, &attrs, obj, 1, &param_types, self.is_generic())?;
        let count = execute(&mut stmt, &sql)?;
        fill_generated_id(&meta, &mut stmt, obj)?;
        Ok(count)
    }

    /// Insert every instance with its own execution of one prepared
    /// statement. The first failure aborts the remaining inserts.
    #[tracing::instrument(level = "debug", skip(self, conn, objs), fields(entity = std::any::type_name::<T>(), count = objs.len()))]
    pub fn insert_not_batched<T: Entity>(
        &self,
        conn: &mut impl Connection,
        objs: &mut [T],
    ) -> Result<u64> {
        if objs.is_empty() {
            return Ok(0);
        }
        let meta = self.introspect::<T>()?;
        let sql = self.insert_sql(&meta);
        let key_columns = generated_key_columns(&meta);

        let mut stmt = prepare(conn, &sql, &key_columns)?;
        let param_types = stmt.parameter_types()?;
        let attrs: Vec<_> = meta.insertable().collect();
        let generic = self.is_generic();
        let mut total = 0;
        for (i, obj) in objs.iter_mut().enumerate() {
            bind_attributes(&mut stmt, &attrs, obj, 1, &param_types, generic)?;
            total += execute(&mut stmt, &sql).inspect_err(|_| {
                error!(entity = meta.entity_name(), index = i, "Insert failed");
            })?;
            fill_generated_id(&meta, &mut stmt, obj)?;
            stmt.clear_parameters()?;
        }
        Ok(total)
    }

    /// Insert all instances in one batch execution.
    ///
    /// Generated identities are assigned only when `set_generated_values`
    /// is set and the driver reports exactly one key per instance; keys are
    /// matched to instances in submission order. Fewer keys leave every
    /// identity unset. Types that reference themselves are rejected.
    #[tracing::instrument(level = "debug", skip(self, conn, objs), fields(entity = std::any::type_name::<T>(), count = objs.len()))]
    pub fn insert_batched<T: Entity>(
        &self,
        conn: &mut impl Connection,
        objs: &mut [T],
        set_generated_values: bool,
    ) -> Result<u64> {
        if objs.is_empty() {
            return Ok(0);
        }
        let meta = self.introspect::<T>()?;
        if meta.has_self_join_column() {
            return Err(Error::config(format!(
                "batched insert is not supported for {}: it has a self-referencing column",
                meta.entity_name()
            )));
        }
        let sql = self.insert_sql(&meta);
        let request_keys = set_generated_values && meta.has_generated_id();
        let key_columns = if request_keys {
            generated_key_columns(&meta)
        } else {
            Vec::new()
        };

        let mut stmt = prepare(conn, &sql, &key_columns)?;
        let param_types = stmt.parameter_types()?;
        let attrs: Vec<_> = meta.insertable().collect();
        let generic = self.is_generic();
        for obj in objs.iter() {
            bind_attributes(&mut stmt, &attrs, obj, 1, &param_types, generic)?;
            stmt.add_batch()?;
        }
        let counts = stmt.execute_batch().map_err(|e| failed(e, &sql))?;

        if let (true, Some(attr)) = (request_keys, meta.generated_id()) {
            let keys = stmt.generated_keys()?;
            if keys.len() == objs.len() {
                for (obj, key) in objs.iter_mut().zip(&keys) {
                    if attr.read(obj)?.is_unassigned_id() {
                        assign_key(&**attr, obj, key)?;
                    }
                }
            } else {
                warn!(
                    entity = meta.entity_name(),
                    rows = objs.len(),
                    keys = keys.len(),
                    "Driver did not report one generated key per row, identities left unset"
                );
            }
        }
        Ok(counts.iter().sum())
    }

    /// Update the row of `obj`: every updatable column is set, the row is
    /// found by its identity columns.
    #[tracing::instrument(level = "debug", skip(self, conn, obj), fields(entity = std::any::type_name::<T>()))]
    pub fn update<T: Entity>(&self, conn: &mut impl Connection, obj: &mut T) -> Result<u64> {
        self.update_with(conn, obj, &[])
    }

    /// Like [`update`](Self::update), leaving out the columns whose raw
    /// names appear in `excluded`. Statements built this way are not cached.
    #[tracing::instrument(level = "debug", skip(self, conn, obj), fields(entity = std::any::type_name::<T>()))]
    pub fn update_excluding<T: Entity>(
        &self,
        conn: &mut impl Connection,
        obj: &mut T,
        excluded: &[&str],
    ) -> Result<u64> {
        self.update_with(conn, obj, excluded)
    }

    fn update_with<T: Entity>(
        &self,
        conn: &mut impl Connection,
        obj: &mut T,
        excluded: &[&str],
    ) -> Result<u64> {
        let meta = self.introspect::<T>()?;
        require_ids(&meta)?;
        let set_attrs = meta.updatable_excluding(excluded);
        if set_attrs.is_empty() {
            return Err(Error::config(format!(
                "{} has no updatable columns left to set",
                meta.entity_name()
            )));
        }
        let sql: Arc<str> = if excluded.is_empty() {
            self.caches.update_sql(TypeId::of::<T>(), || {
                let sql = synth::update_sql(&meta, &[]);
                debug!(sql = %sql, "Synthesized UPDATE");
                sql
            })
        } else {
            Arc::from(synth::update_sql(&meta, excluded))
        };

        let mut stmt = prepare(conn, &sql, &[])?;
        let param_types = stmt.parameter_types()?;
        let generic = self.is_generic();
        let next = bind_attributes(&mut stmt, &set_attrs, obj, 1, &param_types, generic)?;
        let ids: Vec<_> = meta.id_attributes().collect();
        bind_attributes(&mut stmt, &ids, obj, next, &param_types, generic)?;
        let count = execute(&mut stmt, &sql)?;
        fill_generated_id(&meta, &mut stmt, obj)?;
        Ok(count)
    }

    /// Delete the row of `obj`, found by its identity columns.
    #[tracing::instrument(level = "debug", skip(self, conn, obj), fields(entity = std::any::type_name::<T>()))]
    pub fn delete<T: Entity>(&self, conn: &mut impl Connection, obj: &T) -> Result<u64> {
        let meta = self.introspect::<T>()?;
        require_ids(&meta)?;
        let ids = meta.actual_ids(obj)?;
        self.execute_update(conn, &synth::delete_by_id_sql(&meta), &ids)
    }

    /// Delete the row whose identity columns hold `ids`, in identity
    /// column order.
    #[tracing::instrument(level = "debug", skip(self, conn), fields(entity = std::any::type_name::<T>()))]
    pub fn delete_by_id<T: Entity>(&self, conn: &mut impl Connection, ids: &[Value]) -> Result<u64> {
        let meta = self.introspect::<T>()?;
        require_ids(&meta)?;
        let expected = meta.id_column_names().len();
        if ids.len() != expected {
            return Err(Error::config(format!(
                "{} has {} identity column(s) but {} value(s) were given",
                meta.entity_name(),
                expected,
                ids.len()
            )));
        }
        self.execute_update(conn, &synth::delete_by_id_sql(&meta), ids)
    }

    /// Delete the rows matching `clause`, appended verbatim after WHERE.
    #[tracing::instrument(level = "debug", skip(self, conn), fields(entity = std::any::type_name::<T>()))]
    pub fn delete_by_where_clause<T: Entity>(
        &self,
        conn: &mut impl Connection,
        clause: &str,
        args: &[Value],
    ) -> Result<u64> {
        let meta = self.introspect::<T>()?;
        self.execute_update(conn, &synth::delete_where_sql(&meta, clause), args)
    }

    /// Delete the rows of all `objs` with one statement.
    #[tracing::instrument(level = "debug", skip(self, conn, objs), fields(entity = std::any::type_name::<T>(), count = objs.len()))]
    pub fn delete_objects<T: Entity>(&self, conn: &mut impl Connection, objs: &[T]) -> Result<u64> {
        if objs.is_empty() {
            return Ok(0);
        }
        let meta = self.introspect::<T>()?;
        require_ids(&meta)?;
        let mut args = Vec::with_capacity(objs.len() * meta.id_column_names().len());
        for obj in objs {
            args.extend(meta.actual_ids(obj)?);
        }
        self.execute_update(conn, &synth::delete_objects_sql(&meta, objs.len()), &args)
    }

    /// Prepare `sql`, bind `args` positionally and execute it once.
    ///
    /// NULL arguments bind as NULLs of the declared parameter type; every
    /// other argument binds untyped.
    #[tracing::instrument(level = "debug", skip(self, conn, args))]
    pub fn execute_update(
        &self,
        conn: &mut impl Connection,
        sql: &str,
        args: &[Value],
    ) -> Result<u64> {
        debug!(sql, params = args.len(), "Executing update");
        let mut stmt = prepare(conn, sql, &[])?;
        let param_types = stmt.parameter_types().map_err(|e| failed(e, sql))?;
        for (i, arg) in args.iter().enumerate() {
            let position = i + 1;
            let value = if arg.is_null() {
                BindValue::Null(param_type_at(&param_types, position))
            } else {
                BindValue::Untyped(arg.clone())
            };
            stmt.bind(position, value).map_err(|e| failed(e, sql))?;
        }
        execute(&mut stmt, sql)
    }

    fn insert_sql<T: Entity>(&self, meta: &Introspected<T>) -> Arc<str> {
        self.caches.insert_sql(TypeId::of::<T>(), || {
            let sql = synth::insert_sql(meta);
            debug!(sql = %sql, "Synthesized INSERT");
            sql
        })
    }
}

fn require_ids<T>(meta: &Introspected<T>) -> Result<()> {
    if meta.id_column_names().is_empty() {
        return Err(Error::config(format!(
            "no identity columns declared for {}",
            meta.entity_name()
        )));
    }
    Ok(())
}

/// Raw identity column names to request as generated keys.
fn generated_key_columns<T>(meta: &Introspected<T>) -> Vec<&str> {
    if !meta.has_generated_id() {
        return Vec::new();
    }
    meta.id_attributes()
        .map(|a| a.info().column.raw())
        .collect()
}

fn prepare<'c, C: Connection>(
    conn: &'c mut C,
    sql: &str,
    key_columns: &[&str],
) -> Result<C::Stmt<'c>> {
    conn.prepare(sql, key_columns).map_err(|e| failed(e, sql))
}

fn execute<S: Statement>(stmt: &mut S, sql: &str) -> Result<u64> {
    debug!(sql, "Executing statement");
    stmt.execute_update().map_err(|e| failed(e, sql))
}

fn failed(e: Error, sql: &str) -> Error {
    error!(sql, error = %e, "Statement failed");
    e.with_sql(sql)
}

fn param_type_at(param_types: &[SqlType], position: usize) -> SqlType {
    param_types
        .get(position - 1)
        .cloned()
        .unwrap_or(SqlType::Custom("ANY"))
}

/// Bind `attrs` of `obj` from `first` on; returns the next free position.
fn bind_attributes<T, S: Statement>(
    stmt: &mut S,
    attrs: &[&Arc<dyn AttributeAccess<T>>],
    obj: &T,
    first: usize,
    param_types: &[SqlType],
    generic: bool,
) -> Result<usize> {
    let mut position = first;
    for attr in attrs {
        let param_type = param_type_at(param_types, position);
        let value = coerce::to_parameter(&***attr, obj, position, &param_type, generic)?;
        stmt.bind(position, value)?;
        position += 1;
    }
    Ok(position)
}

/// Copy the first generated key onto `obj` unless it already carries an
/// identity.
fn fill_generated_id<T, S: Statement>(
    meta: &Introspected<T>,
    stmt: &mut S,
    obj: &mut T,
) -> Result<()> {
    let Some(attr) = meta.generated_id() else {
        return Ok(());
    };
    let current = attr.read(obj)?;
    if !current.is_unassigned_id() {
        debug!(
            entity = meta.entity_name(),
            id = ?current,
            "Instance already has an identity, keeping it"
        );
        return Ok(());
    }
    let keys = stmt.generated_keys()?;
    if let Some(key) = keys.first() {
        assign_key(&**attr, obj, key)?;
    }
    Ok(())
}

fn assign_key<T>(attr: &dyn AttributeAccess<T>, obj: &mut T, key: &GeneratedKey) -> Result<()> {
    let value = coerce::to_attribute_value(attr.info(), key.value.clone(), Some(&key.column_type))?;
    debug!(attribute = attr.info().name, id = ?value, "Assigning generated identity");
    attr.write(obj, AttributeValue::Scalar(value))
}

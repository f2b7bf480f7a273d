//! SQLite connection and prepared statement.
//!
//! [`SqliteConnection`] implements the tablemap [`Connection`] contract on
//! top of the C API. Statements keep their bound parameters on the Rust side
//! and bind them right before each step, which is what makes batches cheap
//! to snapshot.

// Allow casts in FFI code where we need to match C types exactly
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::borrow_as_ptr)]

use crate::ffi;
use crate::types;
use std::ffi::{CStr, CString, c_int};
use std::marker::PhantomData;
use std::ptr;
use tablemap_core::{
    BindValue, Connection, Error, GeneratedKey, SqlType, Statement, Value,
    error::{ConnectionError, ConnectionErrorKind, QueryError, QueryErrorKind},
};

/// Configuration for opening SQLite connections.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to the database file, or ":memory:" for in-memory database.
    pub path: String,
    pub flags: OpenFlags,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

/// Flags controlling how the database is opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFlags {
    pub read_only: bool,
    pub read_write: bool,
    /// Create the database if it doesn't exist.
    pub create: bool,
    /// Enable URI filename interpretation.
    pub uri: bool,
    /// Open in multi-thread mode.
    pub no_mutex: bool,
    /// Open in serialized mode.
    pub full_mutex: bool,
}

impl OpenFlags {
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Read-write access; the database must exist.
    pub fn read_write() -> Self {
        Self {
            read_write: true,
            ..Default::default()
        }
    }

    pub fn create_read_write() -> Self {
        Self {
            read_write: true,
            create: true,
            ..Default::default()
        }
    }

    fn to_sqlite_flags(self) -> c_int {
        let mut flags = 0;

        if self.read_only {
            flags |= ffi::SQLITE_OPEN_READONLY;
        }
        if self.read_write {
            flags |= ffi::SQLITE_OPEN_READWRITE;
        }
        if self.create {
            flags |= ffi::SQLITE_OPEN_CREATE;
        }
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }
        if self.no_mutex {
            flags |= ffi::SQLITE_OPEN_NOMUTEX;
        }
        if self.full_mutex {
            flags |= ffi::SQLITE_OPEN_FULLMUTEX;
        }

        // Default to read-write if no mode specified
        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }

        flags
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            flags: OpenFlags::create_read_write(),
            busy_timeout_ms: 5000,
        }
    }
}

impl SqliteConfig {
    /// Create a new config for a file-based database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Create a new config for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }
}

/// A connection to a SQLite database.
///
/// Statements borrow the connection mutably, so one connection runs one
/// statement at a time.
pub struct SqliteConnection {
    db: *mut ffi::sqlite3,
    path: String,
}

// SAFETY: the handle is only used through &mut self or from the owning
// thread; SQLite's default threading mode tolerates moving it.
unsafe impl Send for SqliteConnection {}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteConnection {
    /// Open a new SQLite connection with the given configuration.
    pub fn open(config: &SqliteConfig) -> Result<Self, Error> {
        let c_path = CString::new(config.path.as_str()).map_err(|_| {
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: "Invalid path: contains null byte".to_string(),
                source: None,
            })
        })?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let flags = config.flags.to_sqlite_flags();

        // SAFETY: We pass valid pointers and check the return value
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };

        if rc != ffi::SQLITE_OK {
            let msg = if db.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: db is valid, errmsg returns a valid C string
                unsafe {
                    let msg = errmsg(db);
                    ffi::sqlite3_close_v2(db);
                    msg
                }
            };

            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: format!("Failed to open database: {}", msg),
                source: None,
            }));
        }

        if config.busy_timeout_ms > 0 {
            // SAFETY: db is valid
            unsafe {
                ffi::sqlite3_busy_timeout(db, config.busy_timeout_ms as c_int);
            }
        }

        tracing::debug!(path = %config.path, "Opened SQLite database");
        Ok(Self {
            db,
            path: config.path.clone(),
        })
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, Error> {
        Self::open(&SqliteConfig::memory())
    }

    pub fn open_file(path: impl Into<String>) -> Result<Self, Error> {
        Self::open(&SqliteConfig::file(path))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Execute SQL directly without preparing (for DDL, etc.)
    pub fn execute_raw(&self, sql: &str) -> Result<(), Error> {
        let c_sql = CString::new(sql).map_err(|_| nul_in_sql(sql))?;
        let mut err: *mut std::ffi::c_char = ptr::null_mut();

        // SAFETY: All pointers are valid
        let rc = unsafe { ffi::sqlite3_exec(self.db, c_sql.as_ptr(), None, ptr::null_mut(), &mut err) };

        if rc != ffi::SQLITE_OK {
            let msg = if err.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: err was allocated by SQLite and is freed once read
                unsafe {
                    let msg = CStr::from_ptr(err).to_string_lossy().into_owned();
                    ffi::sqlite3_free(err.cast());
                    msg
                }
            };
            return Err(query_error(error_code_to_kind(rc), sql, msg));
        }

        Ok(())
    }

    /// Run a query and collect every row as positional values.
    pub fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Vec<Value>>, Error> {
        let stmt = prepare_stmt(self.db, sql)?;
        let result = self.query_prepared(stmt, sql, params);
        // SAFETY: stmt is valid and not used after this point
        unsafe { ffi::sqlite3_finalize(stmt) };
        result
    }

    fn query_prepared(
        &self,
        stmt: *mut ffi::sqlite3_stmt,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<Vec<Value>>, Error> {
        for (i, param) in params.iter().enumerate() {
            // SAFETY: stmt is valid, index is 1-based
            let rc = unsafe { types::bind_value(stmt, (i + 1) as c_int, param) };
            if rc != ffi::SQLITE_OK {
                return Err(bind_error(self.db, sql, i + 1));
            }
        }

        // SAFETY: stmt is valid
        let col_count = unsafe { ffi::sqlite3_column_count(stmt) };
        let mut rows = Vec::new();
        loop {
            // SAFETY: stmt is valid
            match unsafe { ffi::sqlite3_step(stmt) } {
                ffi::SQLITE_ROW => {
                    // SAFETY: we just got SQLITE_ROW
                    let row = (0..col_count)
                        .map(|i| unsafe { types::read_column(stmt, i) })
                        .collect();
                    rows.push(row);
                }
                ffi::SQLITE_DONE => return Ok(rows),
                _ => return Err(step_error(self.db, sql)),
            }
        }
    }

    /// Get the last insert rowid.
    pub fn last_insert_rowid(&self) -> i64 {
        // SAFETY: db is valid
        unsafe { ffi::sqlite3_last_insert_rowid(self.db) }
    }

    /// Get the number of rows changed by the last statement.
    pub fn changes(&self) -> u64 {
        // SAFETY: db is valid
        u64::try_from(unsafe { ffi::sqlite3_changes(self.db) }).unwrap_or(0)
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        if !self.db.is_null() {
            // SAFETY: db is valid; close_v2 defers until statements finalize
            unsafe {
                ffi::sqlite3_close_v2(self.db);
            }
        }
    }
}

impl Connection for SqliteConnection {
    type Stmt<'conn> = SqliteStatement<'conn>;

    fn prepare(&mut self, sql: &str, key_columns: &[&str]) -> Result<SqliteStatement<'_>, Error> {
        let stmt = prepare_stmt(self.db, sql)?;
        // SAFETY: stmt is valid
        let count = unsafe { ffi::sqlite3_bind_parameter_count(stmt) };
        Ok(SqliteStatement {
            db: self.db,
            stmt,
            sql: sql.to_string(),
            params: vec![None; usize::try_from(count).unwrap_or(0)],
            batch: Vec::new(),
            track_keys: !key_columns.is_empty(),
            keys: Vec::new(),
            _conn: PhantomData,
        })
    }
}

/// A prepared SQLite statement.
///
/// SQLite has no parameter type metadata; every parameter reports
/// `Custom("ANY")`. When generated keys were requested, each executed row
/// reports its rowid as an `INTEGER` key, batches included.
pub struct SqliteStatement<'conn> {
    db: *mut ffi::sqlite3,
    stmt: *mut ffi::sqlite3_stmt,
    sql: String,
    params: Vec<Option<BindValue>>,
    batch: Vec<Vec<Option<BindValue>>>,
    track_keys: bool,
    keys: Vec<GeneratedKey>,
    _conn: PhantomData<&'conn mut SqliteConnection>,
}

impl SqliteStatement<'_> {
    /// Bind `params`, step once and return the change count.
    fn step_with(&mut self, params: &[Option<BindValue>]) -> Result<u64, Error> {
        // SAFETY: stmt is valid for the lifetime of self
        unsafe {
            ffi::sqlite3_reset(self.stmt);
            ffi::sqlite3_clear_bindings(self.stmt);
        }
        for (i, param) in params.iter().enumerate() {
            let Some(param) = param else { continue };
            // SAFETY: stmt is valid, index is within the parameter count
            let rc = unsafe { types::bind_param(self.stmt, (i + 1) as c_int, param) };
            if rc != ffi::SQLITE_OK {
                return Err(bind_error(self.db, &self.sql, i + 1));
            }
        }

        // SAFETY: stmt is valid
        match unsafe { ffi::sqlite3_step(self.stmt) } {
            ffi::SQLITE_DONE | ffi::SQLITE_ROW => {
                // SAFETY: db is valid
                let changes = u64::try_from(unsafe { ffi::sqlite3_changes(self.db) }).unwrap_or(0);
                if self.track_keys && changes > 0 {
                    // SAFETY: db is valid
                    let rowid = unsafe { ffi::sqlite3_last_insert_rowid(self.db) };
                    self.keys.push(GeneratedKey::new(Value::BigInt(rowid), "INTEGER"));
                }
                Ok(changes)
            }
            _ => {
                let err = step_error(self.db, &self.sql);
                // SAFETY: stmt is valid; reset clears the failed step
                unsafe { ffi::sqlite3_reset(self.stmt) };
                Err(err)
            }
        }
    }
}

impl Statement for SqliteStatement<'_> {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn parameter_types(&mut self) -> Result<Vec<SqlType>, Error> {
        Ok(vec![SqlType::Custom("ANY"); self.params.len()])
    }

    fn bind(&mut self, position: usize, value: BindValue) -> Result<(), Error> {
        let count = self.params.len();
        match position.checked_sub(1).and_then(|i| self.params.get_mut(i)) {
            Some(slot) => {
                *slot = Some(value);
                Ok(())
            }
            None => Err(query_error(
                QueryErrorKind::Database,
                &self.sql,
                format!(
                    "Failed to bind parameter {}: statement has {} parameter(s)",
                    position, count
                ),
            )),
        }
    }

    fn clear_parameters(&mut self) -> Result<(), Error> {
        self.params.iter_mut().for_each(|p| *p = None);
        Ok(())
    }

    fn execute_update(&mut self) -> Result<u64, Error> {
        self.keys.clear();
        let params = std::mem::take(&mut self.params);
        let result = self.step_with(&params);
        self.params = params;
        result
    }

    fn add_batch(&mut self) -> Result<(), Error> {
        self.batch.push(self.params.clone());
        Ok(())
    }

    fn execute_batch(&mut self) -> Result<Vec<u64>, Error> {
        self.keys.clear();
        let batch = std::mem::take(&mut self.batch);
        let mut counts = Vec::with_capacity(batch.len());
        for params in &batch {
            counts.push(self.step_with(params)?);
        }
        tracing::trace!(sql = %self.sql, entries = counts.len(), "Executed batch");
        Ok(counts)
    }

    fn generated_keys(&mut self) -> Result<Vec<GeneratedKey>, Error> {
        Ok(self.keys.clone())
    }
}

impl Drop for SqliteStatement<'_> {
    fn drop(&mut self) {
        // SAFETY: stmt is valid and not used after drop
        unsafe {
            ffi::sqlite3_finalize(self.stmt);
        }
    }
}

fn prepare_stmt(db: *mut ffi::sqlite3, sql: &str) -> Result<*mut ffi::sqlite3_stmt, Error> {
    let c_sql = CString::new(sql).map_err(|_| nul_in_sql(sql))?;
    let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();

    // SAFETY: All pointers are valid
    let rc = unsafe {
        ffi::sqlite3_prepare_v2(
            db,
            c_sql.as_ptr(),
            c_sql.as_bytes().len() as c_int,
            &mut stmt,
            ptr::null_mut(),
        )
    };

    if rc != ffi::SQLITE_OK {
        return Err(step_error(db, sql));
    }

    Ok(stmt)
}

/// # Safety
/// `db` must be a valid connection handle.
unsafe fn errmsg(db: *mut ffi::sqlite3) -> String {
    unsafe {
        let ptr = ffi::sqlite3_errmsg(db);
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

fn bind_error(db: *mut ffi::sqlite3, sql: &str, param_index: usize) -> Error {
    // SAFETY: db is valid
    let msg = unsafe { errmsg(db) };
    query_error(
        QueryErrorKind::Database,
        sql,
        format!("Failed to bind parameter {}: {}", param_index, msg),
    )
}

fn step_error(db: *mut ffi::sqlite3, sql: &str) -> Error {
    // SAFETY: db is valid
    let (msg, code) = unsafe { (errmsg(db), ffi::sqlite3_errcode(db)) };
    query_error(error_code_to_kind(code), sql, msg)
}

fn nul_in_sql(sql: &str) -> Error {
    query_error(QueryErrorKind::Syntax, sql, "SQL contains null byte".to_string())
}

fn query_error(kind: QueryErrorKind, sql: &str, message: String) -> Error {
    Error::Query(QueryError {
        kind,
        sql: Some(sql.to_string()),
        message,
        source: None,
    })
}

fn error_code_to_kind(code: c_int) -> QueryErrorKind {
    // Extended codes carry the primary code in the low byte.
    match code & 0xff {
        ffi::SQLITE_CONSTRAINT => QueryErrorKind::Constraint,
        ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => QueryErrorKind::Busy,
        ffi::SQLITE_PERM | ffi::SQLITE_AUTH => QueryErrorKind::Permission,
        ffi::SQLITE_NOTFOUND => QueryErrorKind::NotFound,
        ffi::SQLITE_TOOBIG => QueryErrorKind::DataTruncation,
        _ => QueryErrorKind::Database,
    }
}

//! Shared fixtures: a connection that records what the writer asks of it,
//! and a handful of mapped types.

#![allow(dead_code)]

use std::collections::BTreeMap;

use tablemap::{
    Accessors, BindValue, ClassDecl, Connection, Entity, EnumType, Error, GeneratedKey, Mapping,
    Member, MillisTimestampConverter, Result, SqlEnum, SqlType, Statement, Value,
};
use tablemap_core::error::{QueryError, QueryErrorKind};

#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub sql: String,
    pub key_columns: Vec<String>,
}

/// Records prepared SQL and every executed parameter row.
///
/// Each executed row with key columns requested reports the next value of
/// `next_key` as an `INTEGER` generated key.
#[derive(Debug)]
pub struct RecordingConnection {
    pub prepared: Vec<Prepared>,
    /// Bound parameters of every executed row, batch rows included.
    pub executions: Vec<Vec<BindValue>>,
    pub batches: usize,
    pub clears: usize,
    pub open_statements: usize,
    pub param_types: Option<Vec<SqlType>>,
    pub next_key: i64,
    /// Report at most this many keys after a batch.
    pub batch_key_limit: Option<usize>,
    /// Fail the execution with this index (0-based, over all rows).
    pub fail_on_execution: Option<usize>,
}

impl Default for RecordingConnection {
    fn default() -> Self {
        Self {
            prepared: Vec::new(),
            executions: Vec::new(),
            batches: 0,
            clears: 0,
            open_statements: 0,
            param_types: None,
            next_key: 100,
            batch_key_limit: None,
            fail_on_execution: None,
        }
    }
}

impl RecordingConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sql(&self) -> Vec<&str> {
        self.prepared.iter().map(|p| p.sql.as_str()).collect()
    }

    pub fn last_sql(&self) -> &str {
        self.prepared.last().map_or("", |p| p.sql.as_str())
    }

    pub fn last_binds(&self) -> &[BindValue] {
        self.executions.last().map_or(&[], Vec::as_slice)
    }

    /// Bound values of the last execution, type information dropped.
    pub fn last_values(&self) -> Vec<Value> {
        self.last_binds().iter().map(BindValue::value).collect()
    }
}

impl Connection for RecordingConnection {
    type Stmt<'conn> = RecordingStatement<'conn>;

    fn prepare(&mut self, sql: &str, key_columns: &[&str]) -> Result<RecordingStatement<'_>> {
        self.prepared.push(Prepared {
            sql: sql.to_string(),
            key_columns: key_columns.iter().map(|c| (*c).to_string()).collect(),
        });
        self.open_statements += 1;
        Ok(RecordingStatement {
            sql: sql.to_string(),
            track_keys: !key_columns.is_empty(),
            params: BTreeMap::new(),
            batch: Vec::new(),
            keys: Vec::new(),
            conn: self,
        })
    }
}

pub struct RecordingStatement<'c> {
    conn: &'c mut RecordingConnection,
    sql: String,
    track_keys: bool,
    params: BTreeMap<usize, BindValue>,
    batch: Vec<Vec<BindValue>>,
    keys: Vec<GeneratedKey>,
}

impl RecordingStatement<'_> {
    fn run(&mut self, row: Vec<BindValue>) -> Result<u64> {
        if self.conn.fail_on_execution == Some(self.conn.executions.len()) {
            return Err(Error::Query(QueryError {
                kind: QueryErrorKind::Constraint,
                sql: None,
                message: "UNIQUE constraint failed".to_string(),
                source: None,
            }));
        }
        self.conn.executions.push(row);
        if self.track_keys {
            let key = self.conn.next_key;
            self.conn.next_key += 1;
            self.keys.push(GeneratedKey::new(Value::BigInt(key), "INTEGER"));
        }
        Ok(1)
    }
}

impl Statement for RecordingStatement<'_> {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn parameter_types(&mut self) -> Result<Vec<SqlType>> {
        Ok(self.conn.param_types.clone().unwrap_or_else(|| {
            vec![SqlType::Custom("ANY"); self.sql.matches('?').count()]
        }))
    }

    fn bind(&mut self, position: usize, value: BindValue) -> Result<()> {
        assert!(position >= 1, "positions are 1-based");
        self.params.insert(position, value);
        Ok(())
    }

    fn clear_parameters(&mut self) -> Result<()> {
        self.conn.clears += 1;
        self.params.clear();
        Ok(())
    }

    fn execute_update(&mut self) -> Result<u64> {
        self.keys.clear();
        let row = self.params.values().cloned().collect();
        self.run(row)
    }

    fn add_batch(&mut self) -> Result<()> {
        self.batch.push(self.params.values().cloned().collect());
        Ok(())
    }

    fn execute_batch(&mut self) -> Result<Vec<u64>> {
        self.keys.clear();
        self.conn.batches += 1;
        let rows = std::mem::take(&mut self.batch);
        let mut counts = Vec::with_capacity(rows.len());
        for row in rows {
            counts.push(self.run(row)?);
        }
        if let Some(limit) = self.conn.batch_key_limit {
            self.keys.truncate(limit);
        }
        Ok(counts)
    }

    fn generated_keys(&mut self) -> Result<Vec<GeneratedKey>> {
        Ok(self.keys.clone())
    }
}

impl Drop for RecordingStatement<'_> {
    fn drop(&mut self) {
        self.conn.open_statements -= 1;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Status {
    #[default]
    Active,
    Suspended,
    Closed,
}

impl SqlEnum for Status {
    fn variants() -> &'static [Self] {
        &[Status::Active, Status::Suspended, Status::Closed]
    }

    fn name(&self) -> &'static str {
        match self {
            Status::Active => "ACTIVE",
            Status::Suspended => "SUSPENDED",
            Status::Closed => "CLOSED",
        }
    }
}

/// Generated identity, a converter, enums stored both ways and a
/// transient attribute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub created: i64,
    pub status: Status,
    pub tier: Status,
    pub notes: String,
}

impl Customer {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            created: 1_700_000_000_000,
            ..Self::default()
        }
    }
}

impl Entity for Customer {
    fn mapping() -> Mapping<Self> {
        Mapping::new().level(
            ClassDecl::entity("Customer")
                .table("customers")
                .member(
                    Member::field("id", Accessors::scalar(|c: &Customer| c.id, |c, v| c.id = v))
                        .id()
                        .generated(),
                )
                .member(Member::field(
                    "name",
                    Accessors::scalar(|c: &Customer| c.name.clone(), |c, v| c.name = v),
                ))
                .member(
                    Member::field(
                        "email",
                        Accessors::scalar(|c: &Customer| c.email.clone(), |c, v| c.email = v),
                    )
                    .column("email_address"),
                )
                .member(
                    Member::field(
                        "created",
                        Accessors::scalar(|c: &Customer| c.created, |c, v| c.created = v),
                    )
                    .column("created_at")
                    .not_updatable()
                    .convert(MillisTimestampConverter),
                )
                .member(Member::field(
                    "status",
                    Accessors::enumerated(|c: &Customer| c.status, |c, v| c.status = v),
                ))
                .member(
                    Member::field(
                        "tier",
                        Accessors::enumerated(|c: &Customer| c.tier, |c, v| c.tier = v),
                    )
                    .enumerated(EnumType::String),
                )
                .member(
                    Member::field(
                        "notes",
                        Accessors::scalar(|c: &Customer| c.notes.clone(), |c, v| c.notes = v),
                    )
                    .transient(),
                ),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Product {
    pub id: i64,
    pub sku: String,
}

impl Product {
    pub fn with_id(id: i64, sku: &str) -> Self {
        Self {
            id,
            sku: sku.to_string(),
        }
    }
}

impl Entity for Product {
    fn mapping() -> Mapping<Self> {
        Mapping::new().level(
            ClassDecl::entity("Product")
                .table("products")
                .member(
                    Member::field("id", Accessors::scalar(|p: &Product| p.id, |p, v| p.id = v))
                        .id()
                        .generated(),
                )
                .member(Member::field(
                    "sku",
                    Accessors::scalar(|p: &Product| p.sku.clone(), |p, v| p.sku = v),
                )),
        )
    }
}

/// Composite identity and a reference stored in a join column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderLine {
    pub order_id: i64,
    pub line_no: i32,
    pub product: Option<Product>,
    pub quantity: i32,
}

impl Entity for OrderLine {
    fn mapping() -> Mapping<Self> {
        Mapping::new().level(
            ClassDecl::entity("OrderLine")
                .table("order_lines")
                .member(
                    Member::field(
                        "order_id",
                        Accessors::scalar(|l: &OrderLine| l.order_id, |l, v| l.order_id = v),
                    )
                    .id(),
                )
                .member(
                    Member::field(
                        "line_no",
                        Accessors::scalar(|l: &OrderLine| l.line_no, |l, v| l.line_no = v),
                    )
                    .id(),
                )
                .member(
                    Member::field(
                        "product",
                        Accessors::reference(
                            |l: &OrderLine| l.product.as_ref(),
                            |l, p| l.product = p,
                        ),
                    )
                    .many_to_one()
                    .join_column("product_id"),
                )
                .member(Member::field(
                    "quantity",
                    Accessors::scalar(|l: &OrderLine| l.quantity, |l, v| l.quantity = v),
                )),
        )
    }
}

/// References its own type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Employee {
    pub id: i64,
    pub name: String,
    pub manager: Option<Box<Employee>>,
}

impl Entity for Employee {
    fn mapping() -> Mapping<Self> {
        Mapping::new().level(
            ClassDecl::entity("Employee")
                .table("employees")
                .member(
                    Member::field("id", Accessors::scalar(|e: &Employee| e.id, |e, v| e.id = v))
                        .id()
                        .generated(),
                )
                .member(Member::field(
                    "name",
                    Accessors::scalar(|e: &Employee| e.name.clone(), |e, v| e.name = v),
                ))
                .member(
                    Member::field(
                        "manager",
                        Accessors::reference(
                            |e: &Employee| e.manager.as_deref(),
                            |e, m: Option<Employee>| e.manager = m.map(Box::new),
                        ),
                    )
                    .many_to_one()
                    .join_column("manager_id"),
                ),
        )
    }
}

/// No identity at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditEntry {
    pub message: String,
}

impl Entity for AuditEntry {
    fn mapping() -> Mapping<Self> {
        Mapping::new().level(ClassDecl::entity("AuditEntry").table("audit_log").member(
            Member::field(
                "message",
                Accessors::scalar(|a: &AuditEntry| a.message.clone(), |a, v| a.message = v),
            ),
        ))
    }
}

/// Property access spread over a mapped superclass and the entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Account {
    pub id: i64,
    pub balance: i64,
    pub audit_code: String,
}

impl Entity for Account {
    fn mapping() -> Mapping<Self> {
        Mapping::new()
            .level(
                ClassDecl::mapped_superclass("Ledger")
                    .member(
                        Member::property("balance", Accessors::getter(|a: &Account| a.balance))
                            .column("balance_cents"),
                    )
                    .member(Member::property(
                        "audit_code",
                        Accessors::getter(|a: &Account| a.audit_code.clone()),
                    )),
            )
            .level(
                ClassDecl::entity("Account")
                    .member(
                        Member::property(
                            "id",
                            Accessors::scalar(|a: &Account| a.id, |a, v| a.id = v),
                        )
                        .id()
                        .generated(),
                    )
                    .member(Member::property(
                        "balance",
                        Accessors::setter(|a: &mut Account, v| a.balance = v),
                    )),
            )
    }
}

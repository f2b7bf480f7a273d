//! End-to-end writes against an in-memory SQLite database.

mod support;

use support::{Customer, Employee, OrderLine, Product, Status};
use tablemap::{Error, OrmWriter, Value};
use tablemap_core::error::QueryErrorKind;
use tablemap_sqlite::SqliteConnection;

const SCHEMA: &str = "
    CREATE TABLE customers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        email_address TEXT,
        created_at TEXT NOT NULL,
        status INTEGER NOT NULL,
        tier TEXT NOT NULL
    );
    CREATE TABLE products (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        sku TEXT NOT NULL
    );
    CREATE TABLE order_lines (
        order_id INTEGER NOT NULL,
        line_no INTEGER NOT NULL,
        product_id INTEGER REFERENCES products(id),
        quantity INTEGER NOT NULL,
        PRIMARY KEY (order_id, line_no)
    );
    CREATE TABLE employees (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        manager_id INTEGER REFERENCES employees(id)
    );
";

fn setup() -> (OrmWriter, SqliteConnection) {
    let conn = SqliteConnection::open_memory().unwrap();
    conn.execute_raw(SCHEMA).unwrap();
    (OrmWriter::with_cache_size(16).generic_binding(false), conn)
}

fn count(conn: &SqliteConnection, table: &str) -> i64 {
    let rows = conn
        .query(&format!("SELECT COUNT(*) FROM {table}"), &[])
        .unwrap();
    rows[0][0].as_i64().unwrap()
}

#[test]
fn insert_round_trips_through_sqlite() {
    let (writer, mut conn) = setup();
    let mut customer = Customer {
        email: Some("hi@example.com".into()),
        status: Status::Suspended,
        tier: Status::Closed,
        notes: "not stored".into(),
        ..Customer::named("Hi")
    };

    writer.insert(&mut conn, &mut customer).unwrap();
    assert_eq!(customer.id, 1);
    assert_eq!(customer.name, "Hi");

    let rows = conn
        .query(
            "SELECT name, email_address, created_at, status, tier FROM customers WHERE id = ?",
            &[Value::BigInt(customer.id)],
        )
        .unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row[0], Value::Text("Hi".into()));
    assert_eq!(row[1], Value::Text("hi@example.com".into()));
    assert!(row[2].as_str().unwrap().starts_with("2023-11-14"));
    assert_eq!(row[3], Value::BigInt(1));
    assert_eq!(row[4], Value::Text("CLOSED".into()));

    // A second insert gets the next id.
    let mut other = Customer::named("Other");
    writer.insert(&mut conn, &mut other).unwrap();
    assert_eq!(other.id, 2);
}

#[test]
fn batched_insert_assigns_sequential_ids() {
    let (writer, mut conn) = setup();
    let mut customers: Vec<Customer> = ["a", "b", "c"]
        .iter()
        .map(|n| Customer::named(n))
        .collect();

    assert_eq!(
        writer.insert_batched(&mut conn, &mut customers, true).unwrap(),
        3
    );

    let ids: Vec<i64> = customers.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(count(&conn, "customers"), 3);
}

#[test]
fn not_batched_insert_surfaces_constraint_failures() {
    let (writer, mut conn) = setup();
    let mut customers = vec![
        Customer::named("dup"),
        Customer::named("dup"),
        Customer::named("never"),
    ];

    let err = writer
        .insert_not_batched(&mut conn, &mut customers)
        .unwrap_err();

    match &err {
        Error::Query(q) => assert_eq!(q.kind, QueryErrorKind::Constraint),
        other => panic!("expected constraint error, got {other:?}"),
    }
    assert!(err.sql().unwrap().starts_with("INSERT INTO customers"));
    assert_eq!(customers[0].id, 1);
    assert_eq!(customers[2].id, 0);
    // Nothing is rolled back by the writer.
    assert_eq!(count(&conn, "customers"), 1);
}

#[test]
fn update_and_delete_affect_the_identified_rows() {
    let (writer, mut conn) = setup();
    let mut customers = vec![
        Customer::named("a"),
        Customer::named("b"),
        Customer::named("c"),
    ];
    writer
        .insert_batched(&mut conn, &mut customers, true)
        .unwrap();

    customers[1].name = "renamed".into();
    customers[1].email = Some("b@example.com".into());
    assert_eq!(writer.update(&mut conn, &mut customers[1]).unwrap(), 1);

    customers[2].email = Some("ignored@example.com".into());
    customers[2].name = "kept?".into();
    writer
        .update_excluding(&mut conn, &mut customers[2], &["email_address"])
        .unwrap();

    let rows = conn
        .query(
            "SELECT name, email_address FROM customers ORDER BY id",
            &[],
        )
        .unwrap();
    assert_eq!(
        rows,
        vec![
            vec![Value::Text("a".into()), Value::Null],
            vec![
                Value::Text("renamed".into()),
                Value::Text("b@example.com".into())
            ],
            vec![Value::Text("kept?".into()), Value::Null],
        ]
    );

    assert_eq!(writer.delete(&mut conn, &customers[0]).unwrap(), 1);
    assert_eq!(
        writer
            .delete_by_id::<Customer>(&mut conn, &[Value::BigInt(customers[1].id)])
            .unwrap(),
        1
    );
    assert_eq!(writer.delete(&mut conn, &customers[0]).unwrap(), 0);
    assert_eq!(count(&conn, "customers"), 1);
}

#[test]
fn delete_objects_and_where_clause() {
    let (writer, mut conn) = setup();
    let mut customers: Vec<Customer> = ["ann", "bob", "amy", "cid"]
        .iter()
        .map(|n| Customer::named(n))
        .collect();
    writer
        .insert_batched(&mut conn, &mut customers, true)
        .unwrap();

    let removed = writer
        .delete_by_where_clause::<Customer>(&mut conn, "name LIKE ?", &[Value::Text("a%".into())])
        .unwrap();
    assert_eq!(removed, 2);

    let removed = writer.delete_objects(&mut conn, &customers).unwrap();
    assert_eq!(removed, 2);
    assert_eq!(count(&conn, "customers"), 0);
}

#[test]
fn references_store_the_target_identity() {
    let (writer, mut conn) = setup();
    let mut product = Product::with_id(0, "SKU-1");
    writer.insert(&mut conn, &mut product).unwrap();

    let mut lines = vec![
        OrderLine {
            order_id: 10,
            line_no: 1,
            product: Some(product.clone()),
            quantity: 2,
        },
        OrderLine {
            order_id: 10,
            line_no: 2,
            product: None,
            quantity: 1,
        },
    ];
    writer.insert_batched(&mut conn, &mut lines, true).unwrap();

    let rows = conn
        .query(
            "SELECT line_no, product_id FROM order_lines ORDER BY line_no",
            &[],
        )
        .unwrap();
    assert_eq!(
        rows,
        vec![
            vec![Value::BigInt(1), Value::BigInt(product.id)],
            vec![Value::BigInt(2), Value::Null],
        ]
    );

    let removed = writer
        .delete_by_id::<OrderLine>(&mut conn, &[Value::BigInt(10), Value::Int(2)])
        .unwrap();
    assert_eq!(removed, 1);
}

#[test]
fn self_referencing_rows_insert_one_at_a_time() {
    let (writer, mut conn) = setup();
    let mut boss = Employee {
        name: "Boss".into(),
        ..Employee::default()
    };
    writer.insert(&mut conn, &mut boss).unwrap();

    let mut hire = Employee {
        name: "Hire".into(),
        manager: Some(Box::new(boss.clone())),
        ..Employee::default()
    };
    writer.insert(&mut conn, &mut hire).unwrap();
    assert_eq!(hire.id, 2);

    let rows = conn
        .query("SELECT manager_id FROM employees WHERE id = ?", &[Value::BigInt(hire.id)])
        .unwrap();
    assert_eq!(rows[0][0], Value::BigInt(boss.id));

    let mut batch = vec![Employee::default()];
    assert!(
        writer
            .insert_batched(&mut conn, &mut batch, true)
            .unwrap_err()
            .is_config()
    );
    assert_eq!(count(&conn, "employees"), 2);
}

#[test]
fn execute_update_runs_arbitrary_sql() {
    let (writer, mut conn) = setup();
    let changed = writer
        .execute_update(
            &mut conn,
            "INSERT INTO products(sku) VALUES (?), (?)",
            &[Value::Text("x".into()), Value::Text("y".into())],
        )
        .unwrap();
    assert_eq!(changed, 2);

    let err = writer
        .execute_update(&mut conn, "DELETE FROM nowhere WHERE id = ?", &[Value::Int(1)])
        .unwrap_err();
    assert_eq!(err.sql(), Some("DELETE FROM nowhere WHERE id = ?"));
}

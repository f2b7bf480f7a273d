//! SQL text for the write statements of a mapped type.
//!
//! All statements use `?` placeholders and the delimited spelling of table
//! and column names. Callers bind parameters in the order the columns
//! appear in the text.

use tablemap_core::Introspected;

/// `INSERT INTO t(c1,c2) VALUES (?,?)` over the insertable attributes.
pub fn insert_sql<T>(meta: &Introspected<T>) -> String {
    let columns: Vec<&str> = meta
        .insertable()
        .map(|a| a.info().column.delimited())
        .collect();
    format!(
        "INSERT INTO {}({}) VALUES ({})",
        meta.delimited_table_name(),
        columns.join(","),
        placeholders(columns.len())
    )
}

/// `UPDATE t SET c1=?,c2=? WHERE id=?` over the updatable attributes
/// minus `excluded` (raw column names).
pub fn update_sql<T>(meta: &Introspected<T>, excluded: &[&str]) -> String {
    let assignments: Vec<String> = meta
        .updatable_excluding(excluded)
        .iter()
        .map(|a| format!("{}=?", a.info().column.delimited()))
        .collect();
    format!(
        "UPDATE {} SET {} WHERE {}",
        meta.delimited_table_name(),
        assignments.join(","),
        id_predicate(meta)
    )
}

/// `DELETE FROM t WHERE id=? AND id2=?`.
pub fn delete_by_id_sql<T>(meta: &Introspected<T>) -> String {
    format!(
        "DELETE FROM {} WHERE {}",
        meta.delimited_table_name(),
        id_predicate(meta)
    )
}

/// `DELETE FROM t WHERE <clause>`, the clause taken verbatim.
pub fn delete_where_sql<T>(meta: &Introspected<T>, clause: &str) -> String {
    format!("DELETE FROM {} WHERE {}", meta.delimited_table_name(), clause)
}

/// DELETE for `count` rows at once: `id IN (?,?)` for a single identity
/// column, one parenthesized conjunction per row otherwise.
pub fn delete_objects_sql<T>(meta: &Introspected<T>, count: usize) -> String {
    let ids = meta.id_column_names();
    let predicate = if let [id] = ids.as_slice() {
        format!("{} IN ({})", id, placeholders(count))
    } else {
        let group = format!("({})", id_predicate(meta));
        vec![group; count].join(" OR ")
    };
    format!(
        "DELETE FROM {} WHERE {}",
        meta.delimited_table_name(),
        predicate
    )
}

fn id_predicate<T>(meta: &Introspected<T>) -> String {
    meta.id_column_names()
        .iter()
        .map(|id| format!("{id}=?"))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(",")
}

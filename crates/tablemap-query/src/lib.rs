//! SQL synthesis for tablemap.
//!
//! `tablemap-query` turns resolved `Introspected` metadata into the text of
//! the INSERT, UPDATE and DELETE statements the writer executes, and keeps
//! bounded per-type caches of that text.
//!
//! Statements use `?` placeholders throughout; drivers with another
//! placeholder syntax translate them when preparing.

pub mod cache;
pub mod synth;

pub use cache::{StatementCache, StatementCaches};
pub use synth::{delete_by_id_sql, delete_objects_sql, delete_where_sql, insert_sql, update_sql};

//! Relational (`SQLite`) catalog backend.
//!
//! ## Module Structure
//!
//! - [`connection`]: Connection handling ([`Mutex<Connection>`](rusqlite::Connection), lock acquisition, configuration)
//! - [`sql`]: SQL helper functions (filter, FTS query, and upsert rendering)
//! - [`file_row`]: Row conversion driven by the declarative schema
//! - [`backend`]: The [`SqliteCatalogBackend`] itself
//!
//! Every upsert is one `IMMEDIATE` transaction over the primary table, the
//! side tables, tags, relationships, and the text-search table.

mod backend;
mod connection;
mod file_row;
mod sql;

pub use backend::SqliteCatalogBackend;
pub use connection::{acquire_lock, configure_connection, ensure_wal};
pub use file_row::{file_params, json_to_sql, read_fields, sql_to_json};
pub use sql::{CONTAINS_FN, build_filter_clause_numbered, build_fts_query};

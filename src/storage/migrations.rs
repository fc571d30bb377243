//! `SQLite` migration system for schema management.
//!
//! Migrations are embedded in the binary and applied in order when the
//! relational backend opens a database. The applied version is tracked with
//! `PRAGMA user_version`, so re-opening an up-to-date database is a no-op.
//!
//! # Usage
//!
//! ```rust,ignore
//! use metacat::storage::migrations::{MIGRATIONS, MigrationRunner};
//!
//! MigrationRunner::new(&mut conn).run(MIGRATIONS)?;
//! ```

use crate::storage::schema;
use crate::{Error, Result};
use rusqlite::{Connection, TransactionBehavior};

/// A single migration with version and statements.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Migration version (sequential, starting at 1).
    pub version: i32,
    /// Human-readable description.
    pub description: &'static str,
    /// Produces the statements to apply.
    pub statements: fn() -> Vec<String>,
}

/// Every migration of the relational schema.
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "Initial catalog schema",
    statements: schema::schema_statements,
}];

/// Maximum version across a set of migrations.
#[must_use]
pub const fn max_version(migrations: &[Migration]) -> i32 {
    let mut max = 0;
    let mut i = 0;
    while i < migrations.len() {
        if migrations[i].version > max {
            max = migrations[i].version;
        }
        i += 1;
    }
    max
}

/// Applies pending migrations to one connection.
pub struct MigrationRunner<'a> {
    conn: &'a mut Connection,
}

impl<'a> MigrationRunner<'a> {
    /// Creates a runner for the given connection.
    #[must_use]
    pub const fn new(conn: &'a mut Connection) -> Self {
        Self { conn }
    }

    /// Returns the current schema version.
    ///
    /// # Errors
    ///
    /// Returns an error if the pragma cannot be read.
    pub fn current_version(&self) -> Result<i32> {
        self.conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .map_err(|e| Error::OperationFailed {
                operation: "read_user_version".to_string(),
                cause: e.to_string(),
            })
    }

    /// Runs all pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails; the failing migration is rolled
    /// back in full.
    pub fn run(&mut self, migrations: &[Migration]) -> Result<i32> {
        let mut current = self.current_version()?;
        for migration in migrations {
            if migration.version > current {
                self.apply(migration)?;
                current = migration.version;
            }
        }
        Ok(current)
    }

    /// Applies a single migration within a transaction.
    fn apply(&mut self, migration: &Migration) -> Result<()> {
        let failed = |stage: &str, e: rusqlite::Error| Error::OperationFailed {
            operation: format!("migration_v{}_{stage}", migration.version),
            cause: e.to_string(),
        };

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| failed("begin_tx", e))?;

        for statement in (migration.statements)() {
            tx.execute_batch(&statement).map_err(|e| Error::OperationFailed {
                operation: format!(
                    "migration_v{}: {}",
                    migration.version, migration.description
                ),
                cause: e.to_string(),
            })?;
        }

        tx.pragma_update(None, "user_version", migration.version)
            .map_err(|e| failed("record", e))?;

        tx.commit().map_err(|e| failed("commit", e))?;

        tracing::info!(
            version = migration.version,
            description = migration.description,
            "Applied migration"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE name = ?1",
            [name],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            > 0
    }

    #[test]
    fn test_run_creates_schema() {
        let mut conn = Connection::open_in_memory().unwrap();
        let version = MigrationRunner::new(&mut conn).run(MIGRATIONS).unwrap();
        assert_eq!(version, max_version(MIGRATIONS));

        for table in ["files", "image_metadata", "font_metadata", "exif_data", "file_tags"] {
            assert!(table_exists(&conn, table), "{table} missing");
        }
        assert!(table_exists(&conn, "files_fts"));
        assert!(table_exists(&conn, "idx_files_category"));
    }

    #[test]
    fn test_run_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        MigrationRunner::new(&mut conn).run(MIGRATIONS).unwrap();
        let version = MigrationRunner::new(&mut conn).run(MIGRATIONS).unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_columns_match_field_map() {
        let mut conn = Connection::open_in_memory().unwrap();
        MigrationRunner::new(&mut conn).run(MIGRATIONS).unwrap();

        for table in std::iter::once(&schema::FILES_TABLE).chain(schema::SIDE_TABLES) {
            let mut stmt = conn
                .prepare(&format!("PRAGMA table_info({})", table.name))
                .unwrap();
            let columns: Vec<String> = stmt
                .query_map([], |row| row.get::<_, String>(1))
                .unwrap()
                .map(std::result::Result::unwrap)
                .collect();
            for spec in table.columns {
                assert!(
                    columns.iter().any(|c| c == spec.column),
                    "{}.{} missing",
                    table.name,
                    spec.column
                );
            }
        }
    }

    #[test]
    fn test_max_version() {
        assert_eq!(max_version(&[]), 0);
        assert_eq!(max_version(MIGRATIONS), 1);
    }
}

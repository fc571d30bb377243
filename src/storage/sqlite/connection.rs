//! Connection handling for the `SQLite` backend.
//!
//! This module provides utilities for managing `SQLite` connections with proper
//! mutex handling, poison recovery, and the pragmas the catalog relies on.

use super::sql::CONTAINS_FN;
use crate::services::contains_ignore_case;
use crate::{Error, Result};
use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;
use std::sync::{Mutex, MutexGuard};

/// Helper to acquire mutex lock with poison recovery.
///
/// If the mutex is poisoned (due to a panic in a previous critical section),
/// we recover the inner value and log a warning. This prevents cascading
/// failures when one operation panics.
///
/// # Examples
///
/// ```ignore
/// use std::sync::Mutex;
/// use metacat::storage::sqlite::acquire_lock;
///
/// let mutex = Mutex::new(connection);
/// let guard = acquire_lock(&mutex);
/// ```
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            // The connection is still usable; any open transaction was rolled
            // back when its guard dropped during the panic
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Configures a `SQLite` connection for the catalog.
///
/// # Configuration Applied
///
/// - **WAL mode**: Write-Ahead Logging for crash safety and concurrent readers
/// - **NORMAL synchronous**: Balances durability with performance
/// - **`busy_timeout`**: 5 seconds to handle lock contention gracefully
/// - **`foreign_keys`**: Enforces referential integrity so deletes cascade
///
/// It also registers the `contains_ci` scalar function used by free-text
/// filters, so SQL and in-memory matching share one comparison.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if foreign keys cannot be enabled or the
/// function cannot be registered.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    // journal_mode returns a row ("wal", or "memory" for in-memory databases),
    // so the result is ignored rather than run through execute_batch
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    let _ = conn.pragma_update(None, "busy_timeout", "5000");

    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(|e| Error::OperationFailed {
            operation: "enable_foreign_keys".to_string(),
            cause: e.to_string(),
        })?;

    conn.create_scalar_function(
        CONTAINS_FN,
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let haystack: Option<String> = ctx.get(0)?;
            let needle: Option<String> = ctx.get(1)?;
            Ok(match (haystack, needle) {
                (Some(haystack), Some(needle)) => contains_ignore_case(&haystack, &needle),
                _ => false,
            })
        },
    )
    .map_err(|e| Error::OperationFailed {
        operation: "register_contains_fn".to_string(),
        cause: e.to_string(),
    })?;

    Ok(())
}

/// Verifies that a file-backed connection runs in WAL mode.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if the journal mode cannot be read or is
/// anything other than `wal`.
pub fn ensure_wal(conn: &Connection) -> Result<()> {
    let journal_mode: String = conn
        .pragma_query_value(None, "journal_mode", |row| row.get(0))
        .map_err(|e| Error::OperationFailed {
            operation: "read_journal_mode".to_string(),
            cause: e.to_string(),
        })?;
    if journal_mode.eq_ignore_ascii_case("wal") {
        Ok(())
    } else {
        Err(Error::OperationFailed {
            operation: "enable_wal".to_string(),
            cause: format!("journal mode is '{journal_mode}'"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_acquire_lock_success() {
        let mutex = Mutex::new(42);
        let guard = acquire_lock(&mutex);
        assert_eq!(*guard, 42);
    }

    #[test]
    fn test_acquire_lock_concurrent() {
        let mutex = Arc::new(Mutex::new(0));
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let mutex = Arc::clone(&mutex);
                thread::spawn(move || {
                    *acquire_lock(&mutex) += 1;
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*acquire_lock(&mutex), 10);
    }

    #[test]
    fn test_acquire_lock_recovers_from_poison() {
        let mutex = Arc::new(Mutex::new(1));
        let poisoner = Arc::clone(&mutex);
        let _ = thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the mutex");
        })
        .join();

        assert!(mutex.is_poisoned());
        assert_eq!(*acquire_lock(&mutex), 1);
    }

    #[test]
    fn test_configure_connection() {
        let conn = Connection::open_in_memory().unwrap();
        configure_connection(&conn).unwrap();

        // In-memory SQLite databases cannot use WAL mode - they report "memory"
        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .unwrap();
        assert!(
            journal_mode.eq_ignore_ascii_case("wal") || journal_mode.eq_ignore_ascii_case("memory"),
            "Expected 'wal' or 'memory' journal mode, got '{journal_mode}'"
        );

        let foreign_keys: i32 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(foreign_keys, 1);

        let busy_timeout: i32 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .unwrap();
        assert_eq!(busy_timeout, 5000);
    }

    #[test]
    fn test_contains_function_is_case_insensitive() {
        let conn = Connection::open_in_memory().unwrap();
        configure_connection(&conn).unwrap();

        let hit: bool = conn
            .query_row("SELECT contains_ci('Ünïcode Beach.JPG', 'beach.jpg')", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert!(hit);

        let null: bool = conn
            .query_row("SELECT contains_ci(NULL, 'x')", [], |row| row.get(0))
            .unwrap();
        assert!(!null);
    }

    #[test]
    fn test_ensure_wal() {
        let dir = tempfile::TempDir::new().unwrap();
        let conn = Connection::open(dir.path().join("wal.db")).unwrap();
        configure_connection(&conn).unwrap();
        assert!(ensure_wal(&conn).is_ok());

        // In-memory databases never leave "memory" mode
        let memory = Connection::open_in_memory().unwrap();
        configure_connection(&memory).unwrap();
        assert!(matches!(
            ensure_wal(&memory),
            Err(Error::OperationFailed { operation, .. }) if operation == "enable_wal"
        ));
    }
}

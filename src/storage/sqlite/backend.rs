//! `SQLite` catalog backend.
//!
//! Renders the logical schema as a primary `files` table, one side table per
//! metadata slot, an EXIF payload table, a tag dictionary with a join table,
//! a relationship table, and an FTS5 table over name/path/content/tags.

use super::connection::{acquire_lock, configure_connection, ensure_wal};
use super::file_row::{file_params, read_fields, record_from_fields, side_params};
use super::sql::{build_filter_clause_numbered, build_fts_query, files_upsert_sql, side_upsert_sql};
use crate::models::{
    FileFilter, FileId, FileRecord, Relationship, RelationshipKind, normalize_relationships,
    normalize_tags,
};
use crate::services::QueryEngine;
use crate::storage::metrics::observe;
use crate::storage::migrations::{MIGRATIONS, MigrationRunner};
use crate::storage::router::{self, Fields, MetadataSlot, SlotPayload};
use crate::storage::schema::{
    EXIF_TABLE, FILE_TAGS_TABLE, FILES_TABLE, FILES_TABLE_NAME, FTS_TABLE, RELATIONSHIPS_TABLE,
    TAGS_TABLE,
};
use crate::storage::{BackendKind, CatalogBackend};
use crate::{Error, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params, params_from_iter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::instrument;

const BACKEND: &str = "relational";

fn failed(operation: &str) -> impl FnOnce(rusqlite::Error) -> Error + '_ {
    move |e| Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

fn initialization(cause: impl std::fmt::Display) -> Error {
    Error::Initialization {
        backend: BackendKind::Relational,
        cause: cause.to_string(),
    }
}

/// `SQLite`-based catalog backend.
///
/// # Concurrency Model
///
/// Uses a `Mutex<Connection>` for thread-safe access. Each upsert runs in a
/// `BEGIN IMMEDIATE` transaction, so concurrent writers are serialized and a
/// failed upsert leaves no partial rows behind.
pub struct SqliteCatalogBackend {
    /// Connection to the `SQLite` database.
    ///
    /// Protected by Mutex because `rusqlite::Connection` is not `Sync`.
    conn: Mutex<Connection>,
    /// Path to the `SQLite` database (None for in-memory).
    db_path: Option<PathBuf>,
}

impl SqliteCatalogBackend {
    /// Opens (or creates) a catalog database at `db_path`.
    ///
    /// Missing parent directories are created. The schema is migrated to the
    /// current version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Initialization`] if the location is unwritable, the
    /// file is not a usable database, or WAL journaling cannot be enabled.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// use metacat::storage::SqliteCatalogBackend;
    ///
    /// let backend = SqliteCatalogBackend::open("./catalog.db")?;
    /// # Ok::<(), metacat::Error>(())
    /// ```
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| initialization(format!("cannot create {}: {e}", parent.display())))?;
        }
        let conn = Connection::open(&db_path).map_err(initialization)?;
        Self::initialize(conn, Some(db_path))
    }

    /// Creates an in-memory catalog database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Initialization`] if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(initialization)?;
        Self::initialize(conn, None)
    }

    fn initialize(mut conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        configure_connection(&conn).map_err(initialization)?;
        if db_path.is_some() {
            ensure_wal(&conn).map_err(initialization)?;
        }
        let version = MigrationRunner::new(&mut conn)
            .run(MIGRATIONS)
            .map_err(initialization)?;
        tracing::debug!(version, path = ?db_path, "Opened relational catalog");
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Ranked full-text term search over name, path, content, and tags.
    ///
    /// Terms are OR-ed and ranked by BM25. Scores are normalized into `(0, 1)`,
    /// higher is better. Returns `(path, score)` pairs, best first.
    ///
    /// # Errors
    ///
    /// Returns an error if the search query fails.
    #[instrument(
        skip(self, query),
        fields(operation = "search_terms", backend = BACKEND, query_length = query.len(), limit = limit)
    )]
    pub fn search_terms(&self, query: &str, limit: usize) -> Result<Vec<(String, f64)>> {
        let start = Instant::now();
        let result = (|| {
            let Some(fts_query) = build_fts_query(query) else {
                return Ok(Vec::new());
            };
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);

            let conn = acquire_lock(&self.conn);
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT f.path, bm25({FTS_TABLE}) AS score
                     FROM {FTS_TABLE}
                     JOIN {FILES_TABLE_NAME} f ON f.id = {FTS_TABLE}.rowid
                     WHERE {FTS_TABLE} MATCH ?1
                     ORDER BY score
                     LIMIT ?2"
                ))
                .map_err(failed("prepare_search"))?;

            let rows = stmt
                .query_map(params![fts_query, limit], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
                })
                .map_err(failed("execute_search"))?;

            let mut results = Vec::new();
            for row in rows {
                let (path, score) = row.map_err(failed("read_search_row"))?;
                // bm25() is negative and more negative is better; negate and
                // squash through a sigmoid so scores land in (0, 1)
                let normalized = 1.0 / (1.0 + (0.5 * score).exp());
                results.push((path, normalized));
            }
            Ok(results)
        })();
        observe(BACKEND, "search_terms", start, result)
    }

    fn file_select_sql(where_clause: &str) -> String {
        let columns = FILES_TABLE
            .columns
            .iter()
            .map(|c| format!("f.{}", c.column))
            .collect::<Vec<_>>()
            .join(", ");
        format!("SELECT f.id, {columns} FROM {FILES_TABLE_NAME} f WHERE {where_clause}")
    }

    fn id_for_path(conn: &Connection, path: &str) -> Result<Option<i64>> {
        conn.query_row(
            &format!("SELECT id FROM {FILES_TABLE_NAME} WHERE path = ?1"),
            [path],
            |row| row.get(0),
        )
        .optional()
        .map_err(failed("lookup_file_id"))
    }

    /// Writes every part of a record; runs inside the caller's transaction.
    fn write_record(
        conn: &Connection,
        record: &FileRecord,
        tags: &[String],
        relationships: &[Relationship],
        payloads: &[SlotPayload],
    ) -> Result<FileId> {
        let values = file_params(record)?;
        let before = conn.last_insert_rowid();
        conn.execute(&files_upsert_sql(), params_from_iter(values.iter()))
            .map_err(failed("upsert_file"))?;
        let inserted = conn.last_insert_rowid();

        // The update branch of an upsert yields no rowid; resolve it by path
        let id = if inserted == before {
            Self::id_for_path(conn, &record.path)?.ok_or_else(|| {
                Error::ConstraintViolation(format!("no row for '{}' after upsert", record.path))
            })?
        } else {
            inserted
        };

        for slot in MetadataSlot::ALL {
            let table = slot.table();
            if let Some(payload) = payloads.iter().find(|p| p.slot == slot) {
                let mut values = vec![SqlValue::Integer(id)];
                values.extend(side_params(table, &payload.fields)?);
                conn.execute(&side_upsert_sql(table), params_from_iter(values.iter()))
                    .map_err(failed("upsert_side_table"))?;
            } else {
                conn.execute(
                    &format!("DELETE FROM {} WHERE file_id = ?1", table.name),
                    [id],
                )
                .map_err(failed("clear_side_table"))?;
            }
        }

        let exif_written = match &record.exif {
            Some(exif) => conn.execute(
                &format!(
                    "INSERT INTO {EXIF_TABLE} (file_id, payload) VALUES (?1, ?2)
                     ON CONFLICT(file_id) DO UPDATE SET payload = excluded.payload"
                ),
                params![id, exif.to_string()],
            ),
            None => conn.execute(&format!("DELETE FROM {EXIF_TABLE} WHERE file_id = ?1"), [id]),
        };
        exif_written.map_err(failed("write_exif"))?;

        // Tags are replaced wholesale
        conn.execute(
            &format!("DELETE FROM {FILE_TAGS_TABLE} WHERE file_id = ?1"),
            [id],
        )
        .map_err(failed("clear_tags"))?;
        for tag in tags {
            conn.execute(
                &format!("INSERT OR IGNORE INTO {TAGS_TABLE} (name) VALUES (?1)"),
                [tag],
            )
            .map_err(failed("insert_tag"))?;
            conn.execute(
                &format!(
                    "INSERT INTO {FILE_TAGS_TABLE} (file_id, tag_id)
                     SELECT ?1, id FROM {TAGS_TABLE} WHERE name = ?2"
                ),
                params![id, tag],
            )
            .map_err(failed("attach_tag"))?;
        }
        Self::prune_tags(conn)?;

        conn.execute(
            &format!("DELETE FROM {RELATIONSHIPS_TABLE} WHERE source_id = ?1"),
            [id],
        )
        .map_err(failed("clear_relationships"))?;
        for relationship in relationships {
            conn.execute(
                &format!(
                    "INSERT INTO {RELATIONSHIPS_TABLE} (source_id, target_path, kind, weight)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(source_id, target_path, kind) DO UPDATE SET weight = excluded.weight"
                ),
                params![
                    id,
                    relationship.target,
                    relationship.kind.as_str(),
                    relationship.weight
                ],
            )
            .map_err(failed("insert_relationship"))?;
        }

        // Name and path come from the stored row, which keeps its name on update
        conn.execute(&format!("DELETE FROM {FTS_TABLE} WHERE rowid = ?1"), [id])
            .map_err(failed("clear_fts"))?;
        conn.execute(
            &format!(
                "INSERT INTO {FTS_TABLE} (rowid, name, path, content, tags)
                 SELECT id, name, path, ?2, ?3 FROM {FILES_TABLE_NAME} WHERE id = ?1"
            ),
            params![id, record.content, tags.join(" ")],
        )
        .map_err(failed("index_fts"))?;

        Ok(FileId::new(id))
    }

    /// Drops dictionary tags no file references any more.
    fn prune_tags(conn: &Connection) -> Result<()> {
        conn.execute(
            &format!(
                "DELETE FROM {TAGS_TABLE}
                 WHERE id NOT IN (SELECT tag_id FROM {FILE_TAGS_TABLE})"
            ),
            [],
        )
        .map_err(failed("prune_tags"))?;
        Ok(())
    }

    /// Loads everything a record owns on top of its primary-table fields.
    fn hydrate(conn: &Connection, id: i64, fields: Fields) -> Result<FileRecord> {
        let mut record = record_from_fields(fields)?;
        let primary = router::primary_slot(record.category);

        let mut payloads = Vec::new();
        for slot in MetadataSlot::ALL {
            if !slot.is_secondary() && Some(slot) != primary {
                continue;
            }
            let table = slot.table();
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM {} WHERE file_id = ?1",
                        table.column_list(),
                        table.name
                    ),
                    [id],
                    |row| Ok(read_fields(row, table, 0)),
                )
                .optional()
                .map_err(failed("read_side_table"))?;
            match row {
                Some(Ok(fields)) => payloads.push(SlotPayload { slot, fields }),
                Some(Err(e)) => {
                    tracing::warn!(path = %record.path, slot = slot.key(), error = %e, "Dropping malformed metadata");
                },
                None => {},
            }
        }
        router::assemble(record.category, &record.path, payloads).apply_to(&mut record);

        let exif: Option<String> = conn
            .query_row(
                &format!("SELECT payload FROM {EXIF_TABLE} WHERE file_id = ?1"),
                [id],
                |row| row.get(0),
            )
            .optional()
            .map_err(failed("read_exif"))?;
        record.exif = exif.and_then(|payload| match serde_json::from_str(&payload) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(path = %record.path, error = %e, "Dropping malformed exif payload");
                None
            },
        });

        let mut stmt = conn
            .prepare_cached(&format!(
                "SELECT t.name FROM {FILE_TAGS_TABLE} ft JOIN {TAGS_TABLE} t ON t.id = ft.tag_id
                 WHERE ft.file_id = ?1 ORDER BY ft.rowid"
            ))
            .map_err(failed("prepare_read_tags"))?;
        record.tags = stmt
            .query_map([id], |row| row.get(0))
            .map_err(failed("read_tags"))?
            .collect::<rusqlite::Result<Vec<String>>>()
            .map_err(failed("read_tags"))?;

        let mut stmt = conn
            .prepare_cached(&format!(
                "SELECT target_path, kind, weight FROM {RELATIONSHIPS_TABLE}
                 WHERE source_id = ?1 ORDER BY id"
            ))
            .map_err(failed("prepare_read_relationships"))?;
        let edges = stmt
            .query_map([id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                ))
            })
            .map_err(failed("read_relationships"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(failed("read_relationships"))?;
        record.relationships = edges
            .into_iter()
            .filter_map(|(target, kind, weight)| {
                let Some(kind) = RelationshipKind::parse(&kind) else {
                    tracing::warn!(path = %record.path, kind = %kind, "Skipping relationship of unknown kind");
                    return None;
                };
                Some(Relationship {
                    target,
                    kind,
                    weight,
                })
            })
            .collect();

        record.content = conn
            .query_row(
                &format!("SELECT content FROM {FTS_TABLE} WHERE rowid = ?1"),
                [id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
            .map_err(failed("read_content"))?
            .flatten();

        Ok(record)
    }
}

impl CatalogBackend for SqliteCatalogBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Relational
    }

    #[instrument(
        skip(self, record),
        fields(operation = "upsert", backend = BACKEND, path = %record.path)
    )]
    fn upsert(&mut self, record: &FileRecord) -> Result<FileId> {
        let start = Instant::now();
        let result = (|| {
            let payloads = router::split(record)?;
            let tags = normalize_tags(&record.tags);
            let relationships = normalize_relationships(&record.relationships);

            let mut conn = acquire_lock(&self.conn);
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(failed("begin_transaction"))?;
            // Dropping the transaction on error rolls it back
            let id = Self::write_record(&tx, record, &tags, &relationships, &payloads)?;
            tx.commit().map_err(failed("commit_transaction"))?;
            Ok(id)
        })();
        observe(BACKEND, "upsert", start, result)
    }

    #[instrument(skip(self), fields(operation = "get_by_path", backend = BACKEND))]
    fn get_by_path(&self, path: &str) -> Result<Option<FileRecord>> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            let row = conn
                .query_row(&Self::file_select_sql("f.path = ?1"), [path], |row| {
                    Ok((row.get::<_, i64>(0)?, read_fields(row, &FILES_TABLE, 1)))
                })
                .optional()
                .map_err(failed("get_file"))?;
            match row {
                Some((id, fields)) => Self::hydrate(&conn, id, fields?).map(Some),
                None => Ok(None),
            }
        })();
        observe(BACKEND, "get_by_path", start, result)
    }

    #[instrument(skip(self, filter), fields(operation = "query", backend = BACKEND))]
    fn query(&self, filter: &FileFilter) -> Result<Vec<FileRecord>> {
        let start = Instant::now();
        let result = (|| {
            let (clause, params, _) = build_filter_clause_numbered(filter, 1);
            let sql = Self::file_select_sql(&format!("1 = 1{clause} ORDER BY f.id"));

            let conn = acquire_lock(&self.conn);
            let rows = {
                let mut stmt = conn.prepare(&sql).map_err(failed("prepare_query"))?;
                stmt.query_map(params_from_iter(params.iter()), |row| {
                    Ok((row.get::<_, i64>(0)?, read_fields(row, &FILES_TABLE, 1)))
                })
                .map_err(failed("execute_query"))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(failed("read_query_row"))?
            };

            let mut records = Vec::with_capacity(rows.len());
            for (id, fields) in rows {
                let record = Self::hydrate(&conn, id, fields?)?;
                if QueryEngine::matches_fields(&filter.fields, &record) {
                    records.push(record);
                }
            }
            Ok(records)
        })();
        observe(BACKEND, "query", start, result)
    }

    #[instrument(skip(self), fields(operation = "delete", backend = BACKEND))]
    fn delete(&mut self, path: &str) -> Result<bool> {
        let start = Instant::now();
        let result = (|| {
            let mut conn = acquire_lock(&self.conn);
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(failed("begin_transaction"))?;
            // Side tables, tags, and relationships cascade; a trigger clears FTS
            let deleted = tx
                .execute(
                    &format!("DELETE FROM {FILES_TABLE_NAME} WHERE path = ?1"),
                    [path],
                )
                .map_err(failed("delete_file"))?;
            if deleted > 0 {
                Self::prune_tags(&tx)?;
            }
            tx.commit().map_err(failed("commit_transaction"))?;
            Ok(deleted > 0)
        })();
        observe(BACKEND, "delete", start, result)
    }

    #[instrument(skip(self), fields(operation = "flush", backend = BACKEND))]
    fn flush(&mut self) -> Result<()> {
        let start = Instant::now();
        // Every write commits its own transaction
        observe(BACKEND, "flush", start, Ok(()))
    }

    #[instrument(skip(self), fields(operation = "count", backend = BACKEND))]
    fn count(&self) -> Result<usize> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            let count: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {FILES_TABLE_NAME}"), [], |row| {
                    row.get(0)
                })
                .map_err(failed("count_files"))?;
            Ok(usize::try_from(count).unwrap_or(0))
        })();
        observe(BACKEND, "count", start, result)
    }
}

//! SQL helper functions for the `SQLite` backend.
//!
//! This module provides utilities for SQL query construction, including:
//! - Filter clause building with numbered parameters
//! - FTS5 query quoting
//! - Upsert statement rendering from the declarative schema

use crate::models::{DateField, FileFilter};
use crate::storage::schema::{
    FILE_TAGS_TABLE, FILES_TABLE, FTS_TABLE, OVERWRITE_ON_CONFLICT, TAGS_TABLE, TableSpec,
};
use rusqlite::types::Value;

/// Name of the SQL function registered for case-insensitive substring tests.
pub const CONTAINS_FN: &str = "contains_ci";

/// Column of the primary table holding a date field.
#[must_use]
pub const fn date_column(field: DateField) -> &'static str {
    match field {
        DateField::Created => "created_at",
        DateField::Modified => "modified_at",
        DateField::Accessed => "accessed_at",
        DateField::Processed => "processed_at",
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Builds a WHERE clause from a file filter with numbered parameters.
///
/// The primary table must be aliased `f`. Field-path predicates are not
/// rendered; callers apply them to the decoded records.
///
/// # Returns
///
/// A tuple containing:
/// - The WHERE clause string (prefixed with " AND " if non-empty)
/// - Vector of parameter values
/// - The next available parameter index
///
/// # Examples
///
/// ```ignore
/// use metacat::models::{Category, FileFilter};
/// use metacat::storage::sqlite::build_filter_clause_numbered;
///
/// let filter = FileFilter::new().with_category(Category::Image).with_extension("png");
///
/// let (clause, params, next_idx) = build_filter_clause_numbered(&filter, 1);
/// // clause = " AND f.category = ?1 AND f.extension = ?2"
/// // next_idx = 3
/// ```
#[must_use]
pub fn build_filter_clause_numbered(
    filter: &FileFilter,
    start_param: usize,
) -> (String, Vec<Value>, usize) {
    let mut conditions = Vec::new();
    let mut params = Vec::new();
    let mut param_idx = start_param;

    if let Some(category) = filter.category {
        conditions.push(format!("f.category = ?{param_idx}"));
        param_idx += 1;
        params.push(Value::Text(category.as_str().to_string()));
    }

    if let Some(ref extension) = filter.extension {
        conditions.push(format!("f.extension = ?{param_idx}"));
        param_idx += 1;
        params.push(Value::Text(extension.clone()));
    }

    if let Some(min) = filter.size.min {
        conditions.push(format!("f.size >= ?{param_idx}"));
        param_idx += 1;
        params.push(Value::Integer(saturating_i64(min)));
    }

    if let Some(max) = filter.size.max {
        conditions.push(format!("f.size <= ?{param_idx}"));
        param_idx += 1;
        params.push(Value::Integer(saturating_i64(max)));
    }

    if let Some(range) = filter.date {
        let column = date_column(range.field);
        if let Some(from) = range.from {
            conditions.push(format!("f.{column} >= ?{param_idx}"));
            param_idx += 1;
            params.push(Value::Integer(from));
        }
        if let Some(to) = range.to {
            conditions.push(format!("f.{column} <= ?{param_idx}"));
            param_idx += 1;
            params.push(Value::Integer(to));
        }
    }

    // Tag filtering (OR logic - must have ANY tag)
    if !filter.tags.is_empty() {
        let placeholders: Vec<String> = filter
            .tags
            .iter()
            .map(|tag| {
                let p = format!("?{param_idx}");
                param_idx += 1;
                params.push(Value::Text(tag.clone()));
                p
            })
            .collect();
        conditions.push(format!(
            "EXISTS (SELECT 1 FROM {FILE_TAGS_TABLE} ft JOIN {TAGS_TABLE} t ON t.id = ft.tag_id \
             WHERE ft.file_id = f.id AND t.name IN ({}))",
            placeholders.join(",")
        ));
    }

    // Free text: any of name, path, content, or a tag contains the term
    if let Some(text) = filter.text.as_deref().filter(|t| !t.is_empty()) {
        let p = format!("?{param_idx}");
        param_idx += 1;
        params.push(Value::Text(text.to_string()));
        conditions.push(format!(
            "({CONTAINS_FN}(f.name, {p}) OR {CONTAINS_FN}(f.path, {p}) \
             OR EXISTS (SELECT 1 FROM {FTS_TABLE} x WHERE x.rowid = f.id AND {CONTAINS_FN}(x.content, {p})) \
             OR EXISTS (SELECT 1 FROM {FILE_TAGS_TABLE} ft JOIN {TAGS_TABLE} t ON t.id = ft.tag_id \
             WHERE ft.file_id = f.id AND {CONTAINS_FN}(t.name, {p})))"
        ));
    }

    let clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" AND {}", conditions.join(" AND "))
    };

    (clause, params, param_idx)
}

/// Builds an FTS5 `MATCH` expression from free text.
///
/// Every whitespace-separated term is quoted so FTS5 operators (`-`, `*`,
/// `"`, `:`) in the input are matched literally; terms are OR-ed together.
/// Returns `None` when the input has no terms.
#[must_use]
pub fn build_fts_query(query: &str) -> Option<String> {
    let terms: Vec<_> = query.split_whitespace().collect();
    if terms.is_empty() {
        return None;
    }
    let estimated_len = terms.iter().map(|t| t.len() + 8).sum::<usize>();
    let mut fts_query = String::with_capacity(estimated_len);
    for (i, term) in terms.iter().enumerate() {
        if i > 0 {
            fts_query.push_str(" OR ");
        }
        fts_query.push('"');
        fts_query.push_str(&term.replace('"', "\"\""));
        fts_query.push('"');
    }
    Some(fts_query)
}

/// Renders the primary-table upsert keyed on `path`.
///
/// On conflict only the columns in [`OVERWRITE_ON_CONFLICT`] are replaced.
#[must_use]
pub fn files_upsert_sql() -> String {
    let columns = FILES_TABLE.column_list();
    let placeholders = numbered_placeholders(FILES_TABLE.columns.len());
    let updates = OVERWRITE_ON_CONFLICT
        .iter()
        .map(|c| format!("{c} = excluded.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({columns}) VALUES ({placeholders}) \
         ON CONFLICT(path) DO UPDATE SET {updates}",
        FILES_TABLE.name
    )
}

/// Renders a side-table upsert keyed on `file_id`; `?1` binds the file id.
#[must_use]
pub fn side_upsert_sql(table: &TableSpec) -> String {
    let columns = table.column_list();
    let placeholders = numbered_placeholders(table.columns.len() + 1);
    let updates = table
        .columns
        .iter()
        .map(|c| format!("{0} = excluded.{0}", c.column))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} (file_id, {columns}) VALUES ({placeholders}) \
         ON CONFLICT(file_id) DO UPDATE SET {updates}",
        table.name
    )
}

fn numbered_placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

//! Row conversion between `SQLite` values and record fields.
//!
//! Conversions are driven by the [`ColumnSpec`]s declared in the schema: a
//! record is serialized to a field map, each declared column picks its field
//! out of that map, and reads build the same map back from the row. One
//! declarative field map serves both directions.

use crate::models::FileRecord;
use crate::storage::router::Fields;
use crate::storage::schema::{ColumnKind, ColumnSpec, FILES_TABLE, TableSpec};
use crate::{Error, Result};
use rusqlite::Row;
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

/// Converts one field value into the column's `SQLite` value.
///
/// # Errors
///
/// Returns [`Error::ConstraintViolation`] if a required value is missing or a
/// value does not fit the column kind.
pub fn json_to_sql(column: &ColumnSpec, value: Option<&Value>) -> Result<SqlValue> {
    let violation = |detail: &str| {
        Error::ConstraintViolation(format!("column '{}' {detail}", column.column))
    };

    let value = match value {
        None | Some(Value::Null) if column.required => return Err(violation("is required")),
        None | Some(Value::Null) => return Ok(SqlValue::Null),
        Some(value) => value,
    };

    match column.kind {
        ColumnKind::Integer => value
            .as_i64()
            .map(SqlValue::Integer)
            .ok_or_else(|| violation(&format!("cannot hold {value} as a 64-bit integer"))),
        ColumnKind::Real => value
            .as_f64()
            .map(SqlValue::Real)
            .ok_or_else(|| violation(&format!("cannot hold {value} as a real"))),
        ColumnKind::Text => value
            .as_str()
            .map(|s| SqlValue::Text(s.to_string()))
            .ok_or_else(|| violation(&format!("cannot hold {value} as text"))),
        ColumnKind::Bool => value
            .as_bool()
            .map(|b| SqlValue::Integer(i64::from(b)))
            .ok_or_else(|| violation(&format!("cannot hold {value} as a boolean"))),
        ColumnKind::Json => Ok(SqlValue::Text(value.to_string())),
    }
}

/// Converts one `SQLite` value back into a field value.
///
/// # Errors
///
/// Returns [`Error::MalformedPayload`] if a JSON column does not parse or the
/// value is a blob.
pub fn sql_to_json(column: &ColumnSpec, value: SqlValue) -> Result<Value> {
    let malformed = |cause: String| Error::MalformedPayload {
        field: column.field.to_string(),
        cause,
    };

    match (column.kind, value) {
        (_, SqlValue::Null) => Ok(Value::Null),
        (ColumnKind::Bool, SqlValue::Integer(i)) => Ok(Value::Bool(i != 0)),
        (_, SqlValue::Integer(i)) => Ok(Value::from(i)),
        (_, SqlValue::Real(f)) => Ok(Value::from(f)),
        (ColumnKind::Json, SqlValue::Text(s)) => {
            serde_json::from_str(&s).map_err(|e| malformed(e.to_string()))
        },
        (_, SqlValue::Text(s)) => Ok(Value::String(s)),
        (_, SqlValue::Blob(_)) => Err(malformed("unexpected blob".to_string())),
    }
}

/// Serializes a record into field values for the primary table's columns.
///
/// # Errors
///
/// Returns [`Error::ConstraintViolation`] if the record cannot be represented
/// (for example a size beyond the signed 64-bit range).
pub fn file_params(record: &FileRecord) -> Result<Vec<SqlValue>> {
    let value = serde_json::to_value(record)
        .map_err(|e| Error::ConstraintViolation(format!("record not serializable: {e}")))?;
    let Value::Object(fields) = value else {
        return Err(Error::ConstraintViolation(
            "record serialized to non-object".to_string(),
        ));
    };
    FILES_TABLE
        .columns
        .iter()
        .map(|column| json_to_sql(column, fields.get(column.field)))
        .collect()
}

/// Serializes side-table fields into column values.
///
/// # Errors
///
/// Returns [`Error::ConstraintViolation`] if a value does not fit its column.
pub fn side_params(table: &TableSpec, fields: &Fields) -> Result<Vec<SqlValue>> {
    table
        .columns
        .iter()
        .map(|column| json_to_sql(column, fields.get(column.field)))
        .collect()
}

/// Reads a table's columns from `row`, starting at `offset`, into a field map.
///
/// Null columns are left out so model defaults apply.
///
/// # Errors
///
/// Returns an error if a column cannot be read or decoded.
pub fn read_fields(row: &Row<'_>, table: &TableSpec, offset: usize) -> Result<Fields> {
    let mut fields = Fields::new();
    for (i, column) in table.columns.iter().enumerate() {
        let raw: SqlValue = row.get(offset + i).map_err(|e| Error::OperationFailed {
            operation: format!("read_{}_{}", table.name, column.column),
            cause: e.to_string(),
        })?;
        let value = sql_to_json(column, raw)?;
        if !value.is_null() {
            fields.insert(column.field.to_string(), value);
        }
    }
    Ok(fields)
}

/// Builds a record from primary-table fields.
///
/// Collections and attachments are left empty; the backend fills them in.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if the fields do not form a record.
pub fn record_from_fields(fields: Fields) -> Result<FileRecord> {
    if let Some(category) = fields.get("category").and_then(Value::as_str) {
        if crate::models::Category::parse(category).is_none() {
            tracing::warn!(category, "Unknown stored category, reading as other");
        }
    }
    serde_json::from_value(Value::Object(fields)).map_err(|e| Error::OperationFailed {
        operation: "decode_file_row".to_string(),
        cause: e.to_string(),
    })
}

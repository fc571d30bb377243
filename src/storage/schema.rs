//! Canonical logical schema.
//!
//! Table names, column names, column kinds, and the mapping from column names
//! to in-memory field names are declared here once. The relational backend
//! renders its DDL and its row conversions from these declarations, the
//! document backend stores records under the field names, and the query
//! engine uses [`resolve_field_path`] so either spelling addresses the same
//! value.

/// Version marker written into the persisted document.
pub const DOCUMENT_FORMAT_VERSION: u32 = 1;

/// Primary table name.
pub const FILES_TABLE_NAME: &str = "files";
/// Opaque EXIF payload side table.
pub const EXIF_TABLE: &str = "exif_data";
/// Tag dictionary table.
pub const TAGS_TABLE: &str = "tags";
/// File-to-tag join table.
pub const FILE_TAGS_TABLE: &str = "file_tags";
/// Relationship edge table.
pub const RELATIONSHIPS_TABLE: &str = "relationships";
/// FTS5 text-search table.
pub const FTS_TABLE: &str = "files_fts";

/// Storage kind of a column, shared by both backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Signed 64-bit integer.
    Integer,
    /// Double precision float.
    Real,
    /// UTF-8 text.
    Text,
    /// Boolean stored as 0/1.
    Bool,
    /// Nested JSON stored as text.
    Json,
}

impl ColumnKind {
    /// Returns the `SQLite` column type.
    #[must_use]
    pub const fn sql_type(self) -> &'static str {
        match self {
            Self::Integer | Self::Bool => "INTEGER",
            Self::Real => "REAL",
            Self::Text | Self::Json => "TEXT",
        }
    }
}

/// One column of a table and the record field it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Column name in the relational store.
    pub column: &'static str,
    /// Field name in records and documents.
    pub field: &'static str,
    /// Storage kind.
    pub kind: ColumnKind,
    /// Whether the column is `NOT NULL`.
    pub required: bool,
}

const fn col(column: &'static str, field: &'static str, kind: ColumnKind) -> ColumnSpec {
    ColumnSpec {
        column,
        field,
        kind,
        required: false,
    }
}

const fn req(column: &'static str, field: &'static str, kind: ColumnKind) -> ColumnSpec {
    ColumnSpec {
        column,
        field,
        kind,
        required: true,
    }
}

/// A table keyed either by its own identity or by the owning file's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    /// Table name.
    pub name: &'static str,
    /// Data columns (the key column is implicit).
    pub columns: &'static [ColumnSpec],
}

impl TableSpec {
    /// Comma-separated data column names.
    #[must_use]
    pub fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.column)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.column == name)
    }
}

use ColumnKind::{Bool, Integer, Json, Real, Text};

/// The primary file table. Its key column is `id`.
pub const FILES_TABLE: TableSpec = TableSpec {
    name: FILES_TABLE_NAME,
    columns: &[
        req("path", "path", Text),
        req("name", "name", Text),
        req("extension", "extension", Text),
        req("size", "size", Integer),
        req("created_at", "createdAt", Integer),
        req("modified_at", "modifiedAt", Integer),
        req("accessed_at", "accessedAt", Integer),
        col("mime_type", "mimeType", Text),
        req("category", "category", Text),
        col("fast_hash", "fastHash", Text),
        col("strong_hash", "strongHash", Text),
        req("processed_at", "processedAt", Integer),
        req("processing_duration_ms", "processingDurationMs", Integer),
        req("schema_version", "schemaVersion", Integer),
    ],
};

/// Columns overwritten when an upsert hits an existing path.
///
/// Everything else (identity, creation time, name, extension) keeps the
/// stored value.
pub const OVERWRITE_ON_CONFLICT: &[&str] = &[
    "size",
    "modified_at",
    "accessed_at",
    "mime_type",
    "category",
    "fast_hash",
    "strong_hash",
    "processed_at",
    "processing_duration_ms",
    "schema_version",
];

/// Image side table.
pub const IMAGE_TABLE: TableSpec = TableSpec {
    name: "image_metadata",
    columns: &[
        col("width", "width", Integer),
        col("height", "height", Integer),
        col("aspect_ratio", "aspectRatio", Real),
        col("color_space", "colorSpace", Text),
        col("bit_depth", "bitDepth", Integer),
        col("has_alpha", "hasAlpha", Bool),
        col("dominant_colors", "dominantColors", Json),
        col("perceptual_hash", "perceptualHash", Text),
        col("thumbnail_path", "thumbnailPath", Text),
    ],
};

/// Video side table.
pub const VIDEO_TABLE: TableSpec = TableSpec {
    name: "video_metadata",
    columns: &[
        col("duration_secs", "durationSecs", Real),
        col("width", "width", Integer),
        col("height", "height", Integer),
        col("frame_rate", "frameRate", Real),
        col("video_codec", "videoCodec", Text),
        col("audio_codec", "audioCodec", Text),
        col("container", "container", Text),
    ],
};

/// Audio side table.
pub const AUDIO_TABLE: TableSpec = TableSpec {
    name: "audio_metadata",
    columns: &[
        col("duration_secs", "durationSecs", Real),
        col("bitrate", "bitrate", Integer),
        col("sample_rate", "sampleRate", Integer),
        col("channels", "channels", Integer),
        col("codec", "codec", Text),
        col("title", "title", Text),
        col("artist", "artist", Text),
        col("album", "album", Text),
        col("year", "year", Integer),
        col("genre", "genre", Text),
        col("track", "track", Integer),
    ],
};

/// Document side table.
pub const DOCUMENT_TABLE: TableSpec = TableSpec {
    name: "document_metadata",
    columns: &[
        col("page_count", "pageCount", Integer),
        col("word_count", "wordCount", Integer),
        col("char_count", "charCount", Integer),
        col("author", "author", Text),
        col("title", "title", Text),
        col("subject", "subject", Text),
        col("language", "language", Text),
    ],
};

/// Code side table.
pub const CODE_TABLE: TableSpec = TableSpec {
    name: "code_metadata",
    columns: &[
        col("language", "language", Text),
        col("total_lines", "totalLines", Integer),
        col("code_lines", "codeLines", Integer),
        col("comment_lines", "commentLines", Integer),
        col("blank_lines", "blankLines", Integer),
        col("complexity", "complexity", Real),
    ],
};

/// Archive side table.
pub const ARCHIVE_TABLE: TableSpec = TableSpec {
    name: "archive_metadata",
    columns: &[
        col("format", "format", Text),
        col("compression_ratio", "compressionRatio", Real),
        col("entry_count", "entryCount", Integer),
        col("encrypted", "encrypted", Bool),
    ],
};

/// Office facet side table.
pub const OFFICE_TABLE: TableSpec = TableSpec {
    name: "office_metadata",
    columns: &[
        col("application", "application", Text),
        col("author", "author", Text),
        col("last_modified_by", "lastModifiedBy", Text),
        col("company", "company", Text),
        col("title", "title", Text),
        col("revision", "revision", Integer),
        col("page_count", "pageCount", Integer),
        col("slide_count", "slideCount", Integer),
        col("sheet_count", "sheetCount", Integer),
    ],
};

/// Font facet side table.
pub const FONT_TABLE: TableSpec = TableSpec {
    name: "font_metadata",
    columns: &[
        col("family", "family", Text),
        col("subfamily", "subfamily", Text),
        col("full_name", "fullName", Text),
        col("version", "version", Text),
        col("designer", "designer", Text),
        col("glyph_count", "glyphCount", Integer),
        col("format", "format", Text),
    ],
};

/// Every side table keyed 1:1 by file identity.
pub const SIDE_TABLES: &[TableSpec] = &[
    IMAGE_TABLE,
    VIDEO_TABLE,
    AUDIO_TABLE,
    DOCUMENT_TABLE,
    CODE_TABLE,
    ARCHIVE_TABLE,
    OFFICE_TABLE,
    FONT_TABLE,
];

/// Columns backed by an index for query performance.
pub const INDEXED_FILE_COLUMNS: &[&str] =
    &["category", "extension", "modified_at", "size", "strong_hash"];

/// Maps a column name to its field name across all tables.
#[must_use]
pub fn field_for_column(column: &str) -> Option<&'static str> {
    std::iter::once(&FILES_TABLE)
        .chain(SIDE_TABLES)
        .flat_map(|t| t.columns.iter())
        .find(|c| c.column == column)
        .map(|c| c.field)
}

/// Normalizes a dot-addressed field path so each segment uses field names.
///
/// Segments spelled as column names (`modified_at`) are translated to field
/// names (`modifiedAt`); anything else passes through unchanged.
#[must_use]
pub fn resolve_field_path(path: &str) -> String {
    path.split('.')
        .map(|segment| field_for_column(segment).unwrap_or(segment))
        .collect::<Vec<_>>()
        .join(".")
}

/// Renders `CREATE TABLE` for the primary table.
#[must_use]
pub fn files_table_ddl() -> String {
    let mut columns = vec!["id INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
    for c in FILES_TABLE.columns {
        let mut def = format!("{} {}", c.column, c.kind.sql_type());
        if c.required {
            def.push_str(" NOT NULL");
        }
        if c.column == "path" {
            def.push_str(" UNIQUE");
        }
        columns.push(def);
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        FILES_TABLE.name,
        columns.join(",\n    ")
    )
}

/// Renders `CREATE TABLE` for a side table keyed by owning file identity.
#[must_use]
pub fn side_table_ddl(table: &TableSpec) -> String {
    let mut columns = vec![format!(
        "file_id INTEGER PRIMARY KEY REFERENCES {FILES_TABLE_NAME}(id) ON DELETE CASCADE"
    )];
    for c in table.columns {
        let mut def = format!("{} {}", c.column, c.kind.sql_type());
        if c.required {
            def.push_str(" NOT NULL");
        }
        columns.push(def);
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        table.name,
        columns.join(",\n    ")
    )
}

/// All DDL statements of the current schema, in dependency order.
#[must_use]
pub fn schema_statements() -> Vec<String> {
    let mut statements = vec![files_table_ddl()];
    statements.extend(SIDE_TABLES.iter().map(side_table_ddl));
    statements.push(format!(
        "CREATE TABLE IF NOT EXISTS {EXIF_TABLE} (
    file_id INTEGER PRIMARY KEY REFERENCES {FILES_TABLE_NAME}(id) ON DELETE CASCADE,
    payload TEXT NOT NULL
)"
    ));
    statements.push(format!(
        "CREATE TABLE IF NOT EXISTS {TAGS_TABLE} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
)"
    ));
    statements.push(format!(
        "CREATE TABLE IF NOT EXISTS {FILE_TAGS_TABLE} (
    file_id INTEGER NOT NULL REFERENCES {FILES_TABLE_NAME}(id) ON DELETE CASCADE,
    tag_id INTEGER NOT NULL REFERENCES {TAGS_TABLE}(id) ON DELETE CASCADE,
    PRIMARY KEY (file_id, tag_id)
)"
    ));
    statements.push(format!(
        "CREATE TABLE IF NOT EXISTS {RELATIONSHIPS_TABLE} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL REFERENCES {FILES_TABLE_NAME}(id) ON DELETE CASCADE,
    target_path TEXT NOT NULL,
    kind TEXT NOT NULL,
    weight REAL,
    UNIQUE (source_id, target_path, kind)
)"
    ));
    statements.push(format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS {FTS_TABLE} USING fts5(name, path, content, tags)"
    ));
    // FTS5 tables cannot carry foreign keys
    statements.push(format!(
        "CREATE TRIGGER IF NOT EXISTS files_fts_delete AFTER DELETE ON {FILES_TABLE_NAME}
BEGIN
    DELETE FROM {FTS_TABLE} WHERE rowid = old.id;
END"
    ));
    for column in INDEXED_FILE_COLUMNS {
        statements.push(format!(
            "CREATE INDEX IF NOT EXISTS idx_{FILES_TABLE_NAME}_{column} ON {FILES_TABLE_NAME}({column})"
        ));
    }
    statements.push(format!(
        "CREATE INDEX IF NOT EXISTS idx_{FILE_TAGS_TABLE}_tag ON {FILE_TAGS_TABLE}(tag_id)"
    ));
    statements.push(format!(
        "CREATE INDEX IF NOT EXISTS idx_{RELATIONSHIPS_TABLE}_target ON {RELATIONSHIPS_TABLE}(target_path)"
    ));
    statements
}

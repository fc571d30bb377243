//! On-disk document format.
//!
//! ```json
//! {
//!   "version": 1,
//!   "generatedAt": "2024-05-01T12:00:00Z",
//!   "nextId": 3,
//!   "summary": { "totalFiles": 2, "totalSize": 4096, "categories": {...}, "extensions": {...}, "lastScanAt": ... },
//!   "files": [ { "id": 1, "path": "...", "metadata": { "image": {...}, "office": {...} }, ... } ]
//! }
//! ```
//!
//! Stored files mirror the primary table's columns under their field names,
//! with slot payloads nested under `metadata` instead of side tables.

use crate::models::{
    Category, CatalogStats, FileId, FileRecord, Relationship, SCHEMA_VERSION,
};
use crate::storage::router::{self, Fields, MetadataSlot, SlotPayload};
use crate::storage::schema::DOCUMENT_FORMAT_VERSION;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The whole persisted catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDocument {
    /// Format version marker.
    pub version: u32,
    /// When this document was written.
    pub generated_at: DateTime<Utc>,
    /// Next identity to assign.
    #[serde(default = "first_id")]
    pub next_id: i64,
    /// Derived summary block.
    #[serde(default)]
    pub summary: CatalogStats,
    /// Records in insertion order.
    #[serde(default)]
    pub files: Vec<StoredFile>,
}

const fn first_id() -> i64 {
    1
}

impl CatalogDocument {
    /// An empty document stamped now.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            version: DOCUMENT_FORMAT_VERSION,
            generated_at: Utc::now(),
            next_id: first_id(),
            summary: CatalogStats::default(),
            files: Vec::new(),
        }
    }
}

/// Serializable record format for document storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    id: i64,
    path: String,
    name: String,
    extension: String,
    size: u64,
    created_at: i64,
    modified_at: i64,
    accessed_at: i64,
    #[serde(default)]
    mime_type: Option<String>,
    category: String,
    #[serde(default)]
    fast_hash: Option<String>,
    #[serde(default)]
    strong_hash: Option<String>,
    #[serde(default)]
    processed_at: i64,
    #[serde(default)]
    processing_duration_ms: u64,
    #[serde(default = "default_schema_version")]
    schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    /// Slot payloads keyed by slot name.
    #[serde(default, skip_serializing_if = "Fields::is_empty")]
    metadata: Fields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exif: Option<Value>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    relationships: Vec<Relationship>,
}

const fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl StoredFile {
    /// Encodes a record, routing its metadata into slot payloads.
    ///
    /// # Errors
    ///
    /// Returns an error if the record's metadata does not fit its category.
    pub fn encode(id: FileId, record: &FileRecord) -> Result<Self> {
        let metadata = router::split(record)?
            .into_iter()
            .map(|payload| (payload.slot.key().to_string(), Value::Object(payload.fields)))
            .collect();
        Ok(Self {
            id: id.get(),
            path: record.path.clone(),
            name: record.name.clone(),
            extension: record.extension.clone(),
            size: record.size,
            created_at: record.created_at,
            modified_at: record.modified_at,
            accessed_at: record.accessed_at,
            mime_type: record.mime_type.clone(),
            category: record.category.as_str().to_string(),
            fast_hash: record.fast_hash.clone(),
            strong_hash: record.strong_hash.clone(),
            processed_at: record.processed_at,
            processing_duration_ms: record.processing_duration_ms,
            schema_version: record.schema_version,
            content: record.content.clone(),
            metadata,
            exif: record.exif.clone(),
            tags: record.tags.clone(),
            relationships: record.relationships.clone(),
        })
    }

    /// Decodes into an identity and record. Malformed metadata is dropped.
    #[must_use]
    pub fn decode(self) -> (FileId, FileRecord) {
        let category = Category::parse(&self.category).unwrap_or_else(|| {
            tracing::warn!(path = %self.path, category = %self.category, "Unknown stored category, reading as other");
            Category::Other
        });

        let payloads: Vec<SlotPayload> = self
            .metadata
            .into_iter()
            .filter_map(|(key, value)| {
                let Some(slot) = MetadataSlot::from_key(&key) else {
                    tracing::warn!(path = %self.path, key = %key, "Skipping unknown metadata slot");
                    return None;
                };
                match value {
                    Value::Object(fields) => Some(SlotPayload { slot, fields }),
                    other => {
                        tracing::warn!(path = %self.path, slot = slot.key(), value = %other, "Dropping malformed metadata");
                        None
                    },
                }
            })
            .collect();
        let attachments = router::assemble(category, &self.path, payloads);

        let mut record = FileRecord {
            path: self.path,
            name: self.name,
            extension: self.extension,
            size: self.size,
            created_at: self.created_at,
            modified_at: self.modified_at,
            accessed_at: self.accessed_at,
            mime_type: self.mime_type,
            category,
            fast_hash: self.fast_hash,
            strong_hash: self.strong_hash,
            processed_at: self.processed_at,
            processing_duration_ms: self.processing_duration_ms,
            schema_version: self.schema_version,
            content: self.content,
            metadata: None,
            office: None,
            font: None,
            exif: self.exif,
            tags: self.tags,
            relationships: self.relationships,
        };
        attachments.apply_to(&mut record);
        (FileId::new(self.id), record)
    }
}

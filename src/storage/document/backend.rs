//! JSON document catalog backend.

use super::format::{CatalogDocument, StoredFile};
use crate::models::{
    CatalogStats, FileFilter, FileId, FileRecord, normalize_relationships, normalize_tags,
};
use crate::services::QueryEngine;
use crate::storage::metrics::observe;
use crate::storage::router;
use crate::storage::schema::DOCUMENT_FORMAT_VERSION;
use crate::storage::{BackendKind, CatalogBackend};
use crate::{Error, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::instrument;

const BACKEND: &str = "document";

fn initialization(cause: impl std::fmt::Display) -> Error {
    Error::Initialization {
        backend: BackendKind::Document,
        cause: cause.to_string(),
    }
}

/// Catalog backend holding every record in memory and persisting them as one
/// JSON document.
///
/// # Durability
///
/// Upserts and deletes only change the in-memory state. Nothing reaches disk
/// until [`CatalogBackend::flush`] runs, so a process that exits without
/// flushing loses every change since the last flush. Callers that need
/// durability flush explicitly, at the latest on shutdown.
///
/// # Concurrency
///
/// Mutation requires `&mut self` and no file locking is performed; a single
/// process is expected to own the document.
#[derive(Debug)]
pub struct DocumentCatalogBackend {
    path: PathBuf,
    entries: Vec<(FileId, FileRecord)>,
    positions: HashMap<String, usize>,
    next_id: i64,
    summary: CatalogStats,
    dirty: bool,
}

impl DocumentCatalogBackend {
    /// Opens the document at `path`, creating an empty one if absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Initialization`] if the document cannot be created,
    /// cannot be read, does not parse, or has a newer format version.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let document = if path.exists() {
            let json = fs::read_to_string(&path)
                .map_err(|e| initialization(format!("cannot read {}: {e}", path.display())))?;
            let document: CatalogDocument = serde_json::from_str(&json)
                .map_err(|e| initialization(format!("corrupt document {}: {e}", path.display())))?;
            if document.version > DOCUMENT_FORMAT_VERSION {
                return Err(initialization(format!(
                    "document version {} is newer than supported version {DOCUMENT_FORMAT_VERSION}",
                    document.version
                )));
            }
            document
        } else {
            // Writing the empty document up front surfaces unwritable locations
            let document = CatalogDocument::empty();
            write_document(&path, &document).map_err(initialization)?;
            document
        };

        let mut backend = Self {
            path,
            entries: Vec::with_capacity(document.files.len()),
            positions: HashMap::with_capacity(document.files.len()),
            next_id: document.next_id,
            summary: CatalogStats::default(),
            dirty: false,
        };
        for stored in document.files {
            let (id, record) = stored.decode();
            backend.next_id = backend.next_id.max(id.get() + 1);
            backend.positions.insert(record.path.clone(), backend.entries.len());
            backend.entries.push((id, record));
        }
        backend.refresh_summary();
        tracing::debug!(path = %backend.path.display(), files = backend.entries.len(), "Opened document catalog");
        Ok(backend)
    }

    /// Returns the document path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the summary block as of the last mutation.
    #[must_use]
    pub const fn summary(&self) -> &CatalogStats {
        &self.summary
    }

    /// Returns true if there are changes not yet flushed.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn refresh_summary(&mut self) {
        self.summary = CatalogStats::from_records(self.entries.iter().map(|(_, r)| r));
    }

    fn reindex(&mut self) {
        self.positions = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (_, r))| (r.path.clone(), i))
            .collect();
    }

    fn to_document(&self) -> Result<CatalogDocument> {
        let files = self
            .entries
            .iter()
            .map(|(id, record)| StoredFile::encode(*id, record))
            .collect::<Result<Vec<_>>>()?;
        Ok(CatalogDocument {
            version: DOCUMENT_FORMAT_VERSION,
            generated_at: Utc::now(),
            next_id: self.next_id,
            summary: self.summary.clone(),
            files,
        })
    }
}

/// Writes the document to a sibling temp file, then renames it into place.
fn write_document(path: &Path, document: &CatalogDocument) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
            operation: "create_document_dir".to_string(),
            cause: format!("{}: {e}", parent.display()),
        })?;
    }

    let json = serde_json::to_string_pretty(document).map_err(|e| Error::OperationFailed {
        operation: "serialize_document".to_string(),
        cause: e.to_string(),
    })?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, json).map_err(|e| Error::OperationFailed {
        operation: "write_document".to_string(),
        cause: format!("{}: {e}", tmp.display()),
    })?;
    fs::rename(&tmp, path).map_err(|e| Error::OperationFailed {
        operation: "replace_document".to_string(),
        cause: format!("{}: {e}", path.display()),
    })
}

impl CatalogBackend for DocumentCatalogBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Document
    }

    #[instrument(
        skip(self, record),
        fields(operation = "upsert", backend = BACKEND, path = %record.path)
    )]
    fn upsert(&mut self, record: &FileRecord) -> Result<FileId> {
        let start = Instant::now();
        let result = (|| {
            router::validate(record)?;
            let mut incoming = record.clone();
            incoming.tags = normalize_tags(&record.tags);
            incoming.relationships = normalize_relationships(&record.relationships);

            let id = if let Some(&position) = self.positions.get(&record.path) {
                let (id, stored) = &mut self.entries[position];
                // Identity-derived fields keep their stored values
                incoming.created_at = stored.created_at;
                incoming.name = std::mem::take(&mut stored.name);
                incoming.extension = std::mem::take(&mut stored.extension);
                *stored = incoming;
                *id
            } else {
                let id = FileId::new(self.next_id);
                self.next_id += 1;
                self.positions.insert(incoming.path.clone(), self.entries.len());
                self.entries.push((id, incoming));
                id
            };

            self.refresh_summary();
            self.dirty = true;
            Ok(id)
        })();
        observe(BACKEND, "upsert", start, result)
    }

    #[instrument(skip(self), fields(operation = "get_by_path", backend = BACKEND))]
    fn get_by_path(&self, path: &str) -> Result<Option<FileRecord>> {
        let start = Instant::now();
        let record = self
            .positions
            .get(path)
            .map(|&position| self.entries[position].1.clone());
        observe(BACKEND, "get_by_path", start, Ok(record))
    }

    #[instrument(skip(self, filter), fields(operation = "query", backend = BACKEND))]
    fn query(&self, filter: &FileFilter) -> Result<Vec<FileRecord>> {
        let start = Instant::now();
        let records = self
            .entries
            .iter()
            .filter(|(_, record)| QueryEngine::matches(filter, record))
            .map(|(_, record)| record.clone())
            .collect();
        observe(BACKEND, "query", start, Ok(records))
    }

    #[instrument(skip(self), fields(operation = "delete", backend = BACKEND))]
    fn delete(&mut self, path: &str) -> Result<bool> {
        let start = Instant::now();
        let deleted = if let Some(position) = self.positions.remove(path) {
            self.entries.remove(position);
            self.reindex();
            self.refresh_summary();
            self.dirty = true;
            true
        } else {
            false
        };
        observe(BACKEND, "delete", start, Ok(deleted))
    }

    #[instrument(
        skip(self),
        fields(operation = "flush", backend = BACKEND, files = self.entries.len())
    )]
    fn flush(&mut self) -> Result<()> {
        let start = Instant::now();
        let result = self
            .to_document()
            .and_then(|document| write_document(&self.path, &document));
        if result.is_ok() {
            self.dirty = false;
        }
        observe(BACKEND, "flush", start, result)
    }

    #[instrument(skip(self), fields(operation = "count", backend = BACKEND))]
    fn count(&self) -> Result<usize> {
        let start = Instant::now();
        observe(BACKEND, "count", start, Ok(self.entries.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, CategoryMetadata, ImageMetadata, Relationship, RelationshipKind};
    use crate::storage::metrics::testing;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_record(path: &str, size: u64) -> FileRecord {
        let mut record = FileRecord::new(path, Category::Image)
            .with_size(size)
            .with_tags(["beach"])
            .with_metadata(CategoryMetadata::Image(ImageMetadata {
                width: 800,
                height: 600,
                perceptual_hash: Some("0f0f0f0f0f0f0f0f".to_string()),
                ..Default::default()
            }));
        record.created_at = 1_000;
        record.processed_at = 5_000;
        record.exif = Some(json!({"ISO": 200}));
        record
    }

    fn open_in(dir: &TempDir) -> DocumentCatalogBackend {
        DocumentCatalogBackend::open(dir.path().join("catalog.json")).unwrap()
    }

    #[test]
    fn test_open_creates_empty_document() {
        let dir = TempDir::new().unwrap();
        let backend = open_in(&dir);
        assert!(backend.path().exists());
        assert_eq!(backend.count().unwrap(), 0);
        assert!(!backend.is_dirty());
    }

    #[test]
    fn test_upsert_and_get() {
        let dir = TempDir::new().unwrap();
        let mut backend = open_in(&dir);
        let record = create_test_record("/photos/a.jpg", 100);

        let id = backend.upsert(&record).unwrap();
        assert_eq!(id, FileId::new(1));
        assert_eq!(backend.get_by_path("/photos/a.jpg").unwrap(), Some(record));
        assert!(backend.is_dirty());
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let dir = TempDir::new().unwrap();
        let mut backend = open_in(&dir);
        backend.upsert(&create_test_record("/a.jpg", 1)).unwrap();
        backend.upsert(&create_test_record("/b.jpg", 2)).unwrap();

        let mut updated = create_test_record("/a.jpg", 10);
        updated.created_at = 99;
        let id = backend.upsert(&updated.with_tags(["x"])).unwrap();

        assert_eq!(id, FileId::new(1));
        let records = backend.all_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].path, "/a.jpg");
        assert_eq!(records[0].size, 10);
        assert_eq!(records[0].created_at, 1_000);
        assert_eq!(records[0].tags, vec!["x"]);
    }

    #[test]
    fn test_summary_recomputed_after_each_upsert() {
        let dir = TempDir::new().unwrap();
        let mut backend = open_in(&dir);
        backend.upsert(&create_test_record("/a.jpg", 100)).unwrap();
        assert_eq!(backend.summary().total_size, 100);

        backend.upsert(&create_test_record("/b.png", 50)).unwrap();
        let summary = backend.summary();
        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.total_size, 150);
        assert_eq!(summary.extensions.get("png"), Some(&1));
        assert_eq!(summary.last_scan_at, Some(5_000));
    }

    #[test]
    fn test_unflushed_changes_are_not_on_disk() {
        let dir = TempDir::new().unwrap();
        let mut backend = open_in(&dir);
        backend.upsert(&create_test_record("/a.jpg", 100)).unwrap();

        let reopened = open_in(&dir);
        assert!(reopened.get_by_path("/a.jpg").unwrap().is_none());

        backend.flush().unwrap();
        assert!(!backend.is_dirty());
        let reopened = open_in(&dir);
        assert_eq!(
            reopened.get_by_path("/a.jpg").unwrap(),
            Some(create_test_record("/a.jpg", 100))
        );
    }

    #[test]
    fn test_identity_continues_after_reopen() {
        let dir = TempDir::new().unwrap();
        let mut backend = open_in(&dir);
        backend.upsert(&create_test_record("/a.jpg", 1)).unwrap();
        backend.upsert(&create_test_record("/b.jpg", 1)).unwrap();
        backend.delete("/b.jpg").unwrap();
        backend.close().unwrap();

        let mut reopened = open_in(&dir);
        let id = reopened.upsert(&create_test_record("/c.jpg", 1)).unwrap();
        assert_eq!(id, FileId::new(3));
    }

    #[test]
    fn test_delete() {
        let dir = TempDir::new().unwrap();
        let mut backend = open_in(&dir);
        backend.upsert(&create_test_record("/a.jpg", 1)).unwrap();
        backend.upsert(&create_test_record("/b.jpg", 2)).unwrap();

        assert!(backend.delete("/a.jpg").unwrap());
        assert!(!backend.delete("/a.jpg").unwrap());
        assert_eq!(backend.summary().total_files, 1);
        assert!(backend.get_by_path("/b.jpg").unwrap().is_some());
    }

    #[test]
    fn test_rejects_mismatched_metadata() {
        let dir = TempDir::new().unwrap();
        let mut backend = open_in(&dir);
        let mut record = create_test_record("/a.jpg", 1);
        record.category = Category::Video;

        assert!(matches!(
            backend.upsert(&record),
            Err(Error::ConstraintViolation(_))
        ));
        assert_eq!(backend.count().unwrap(), 0);
    }

    #[test]
    fn test_open_corrupt_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            DocumentCatalogBackend::open(&path),
            Err(Error::Initialization {
                backend: BackendKind::Document,
                ..
            })
        ));
    }

    #[test]
    fn test_open_future_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        fs::write(
            &path,
            r#"{"version": 99, "generatedAt": "2024-01-01T00:00:00Z", "files": []}"#,
        )
        .unwrap();

        assert!(matches!(
            DocumentCatalogBackend::open(&path),
            Err(Error::Initialization { .. })
        ));
    }

    #[test]
    fn test_open_unwritable_location() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();

        assert!(matches!(
            DocumentCatalogBackend::open(blocker.join("catalog.json")),
            Err(Error::Initialization { .. })
        ));
    }

    #[test]
    fn test_malformed_metadata_in_document_is_dropped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        let mut backend = DocumentCatalogBackend::open(&path).unwrap();
        backend.upsert(&create_test_record("/a.jpg", 1)).unwrap();
        backend.flush().unwrap();

        let mut raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        raw["files"][0]["metadata"]["image"] = json!("garbage");
        fs::write(&path, raw.to_string()).unwrap();

        let reopened = DocumentCatalogBackend::open(&path).unwrap();
        let record = reopened.get_by_path("/a.jpg").unwrap().unwrap();
        assert!(record.metadata.is_none());
        assert_eq!(record.tags, vec!["beach"]);
    }

    #[test]
    fn test_every_operation_reports_metrics() {
        let dir = TempDir::new().unwrap();
        let mut backend = open_in(&dir);
        let log = testing::capture(|| {
            backend.upsert(&create_test_record("/a.jpg", 1)).unwrap();
            backend.get_by_path("/a.jpg").unwrap();
            backend.query(&FileFilter::new()).unwrap();
            backend.count().unwrap();
            backend.delete("/a.jpg").unwrap();
            backend.delete("/a.jpg").unwrap();
            backend.flush().unwrap();
        });

        let operations: Vec<_> = log
            .operations(BACKEND)
            .into_iter()
            .map(|(operation, status)| {
                assert_eq!(status, "success");
                operation
            })
            .collect();
        assert_eq!(
            operations,
            vec!["upsert", "get_by_path", "query", "count", "delete", "delete", "flush"]
        );
    }

    #[test]
    fn test_duplicate_relationships_collapse() {
        let dir = TempDir::new().unwrap();
        let mut backend = open_in(&dir);
        let mut record = create_test_record("/a.jpg", 1);
        record.relationships = vec![
            Relationship::new("/b.jpg", RelationshipKind::SimilarTo).with_weight(0.1),
            Relationship::new("/b.jpg", RelationshipKind::SimilarTo).with_weight(0.9),
        ];
        backend.upsert(&record).unwrap();

        let stored = backend.get_by_path("/a.jpg").unwrap().unwrap();
        assert_eq!(
            stored.relationships,
            vec![Relationship::new("/b.jpg", RelationshipKind::SimilarTo).with_weight(0.9)]
        );
    }
}

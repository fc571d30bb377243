//! Storage coordinator.
//!
//! A [`Catalog`] owns the backends selected by the storage mode and is the
//! handle applications pass around. Writes fan out to every active backend;
//! reads come from the relational backend when it is active, otherwise from
//! the document backend, and are never merged.
//!
//! # Partial failure
//!
//! A dual-mode write is attempted on both backends even when the first one
//! fails. Nothing is rolled back: if one backend accepts the record and the
//! other rejects it, the backends disagree until the record is written again.
//! The caller receives [`Error::BackendWrite`] naming each failing backend.

use super::{BackendKind, CatalogBackend, DocumentCatalogBackend, SqliteCatalogBackend};
use crate::config::{StorageConfig, StorageMode};
use crate::models::{
    Category, CatalogStats, DuplicateGroup, FileFilter, FileId, FileRecord, QueryResult, QuerySpec,
    SimilarFile,
};
use crate::services::deduplication::DEFAULT_THRESHOLD;
use crate::services::{DuplicateDetector, QueryEngine, SimilarityIndex};
use crate::{BackendFailure, Error, Result};
use tracing::instrument;

/// Handle over the active storage backends.
///
/// Close the catalog with [`Catalog::close`] to surface flush errors. A
/// catalog dropped without closing flushes best-effort and only logs
/// failures.
pub struct Catalog {
    relational: Option<SqliteCatalogBackend>,
    document: Option<DocumentCatalogBackend>,
    mode: StorageMode,
    closed: bool,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("mode", &self.mode)
            .field("relational", &self.relational.is_some())
            .field("document", &self.document.is_some())
            .finish_non_exhaustive()
    }
}

impl Catalog {
    /// Opens the backends selected by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a required path is missing, or
    /// [`Error::Initialization`] if a backend cannot be opened.
    #[instrument(skip(config), fields(operation = "open", mode = %config.mode))]
    pub fn open(config: &StorageConfig) -> Result<Self> {
        config.validate()?;

        let relational = match (&config.database_path, config.mode.uses_relational()) {
            (Some(path), true) => Some(SqliteCatalogBackend::open(path)?),
            _ => None,
        };
        let document = match (&config.document_path, config.mode.uses_document()) {
            (Some(path), true) => Some(DocumentCatalogBackend::open(path)?),
            _ => None,
        };

        tracing::info!(mode = %config.mode, "Opened catalog");
        Self::from_backends(relational, document)
    }

    /// Builds a catalog over already opened backends.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if both backends are absent.
    pub fn from_backends(
        relational: Option<SqliteCatalogBackend>,
        document: Option<DocumentCatalogBackend>,
    ) -> Result<Self> {
        let mode = match (&relational, &document) {
            (Some(_), Some(_)) => StorageMode::Dual,
            (Some(_), None) => StorageMode::Relational,
            (None, Some(_)) => StorageMode::Document,
            (None, None) => {
                return Err(Error::InvalidInput(
                    "a catalog needs at least one storage backend".to_string(),
                ));
            },
        };
        Ok(Self {
            relational,
            document,
            mode,
            closed: false,
        })
    }

    /// Returns the storage mode.
    #[must_use]
    pub const fn mode(&self) -> StorageMode {
        self.mode
    }

    /// Returns the relational backend if active.
    #[must_use]
    pub const fn relational(&self) -> Option<&SqliteCatalogBackend> {
        self.relational.as_ref()
    }

    /// Returns the document backend if active.
    #[must_use]
    pub const fn document(&self) -> Option<&DocumentCatalogBackend> {
        self.document.as_ref()
    }

    fn reader(&self) -> Result<&dyn CatalogBackend> {
        if let Some(relational) = &self.relational {
            return Ok(relational);
        }
        self.document
            .as_ref()
            .map(|document| document as &dyn CatalogBackend)
            .ok_or_else(|| Error::InvalidInput("no storage backend is active".to_string()))
    }

    fn active_mut(&mut self) -> Vec<&mut dyn CatalogBackend> {
        let mut active: Vec<&mut dyn CatalogBackend> = Vec::with_capacity(2);
        if let Some(relational) = self.relational.as_mut() {
            active.push(relational);
        }
        if let Some(document) = self.document.as_mut() {
            active.push(document);
        }
        active
    }

    /// Applies `write` to every active backend and collects the successes in
    /// backend order. With a single backend its error is returned as is.
    fn fan_out<T>(
        &mut self,
        operation: &'static str,
        mut write: impl FnMut(&mut dyn CatalogBackend) -> Result<T>,
    ) -> Result<Vec<T>> {
        let active = self.active_mut();
        let single = active.len() == 1;
        let mut values = Vec::with_capacity(active.len());
        let mut failures = Vec::new();

        for backend in active {
            let kind = backend.kind();
            match write(backend) {
                Ok(value) => values.push(value),
                Err(error) if single => return Err(error),
                Err(error) => {
                    tracing::warn!(operation, backend = %kind, error = %error, "Backend write failed");
                    failures.push(BackendFailure {
                        backend: kind,
                        error: Box::new(error),
                    });
                },
            }
        }

        if failures.is_empty() {
            Ok(values)
        } else {
            metrics::counter!("catalog_partial_writes_total", "operation" => operation)
                .increment(1);
            Err(Error::BackendWrite { failures })
        }
    }

    /// Writes a record to every active backend.
    ///
    /// Returns the relational identity when that backend is active, the
    /// document identity otherwise.
    ///
    /// # Errors
    ///
    /// With one backend, returns its error. In dual mode, returns
    /// [`Error::BackendWrite`] if either backend fails; the other backend's
    /// write stands.
    #[instrument(
        skip(self, record),
        fields(operation = "upsert_file", mode = %self.mode, path = %record.path)
    )]
    pub fn upsert_file(&mut self, record: &FileRecord) -> Result<FileId> {
        self.fan_out("upsert_file", |backend| backend.upsert(record))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidInput("no storage backend is active".to_string()))
    }

    /// Removes a record from every active backend.
    ///
    /// Returns true if any backend held the record.
    ///
    /// # Errors
    ///
    /// Same policy as [`Catalog::upsert_file`].
    #[instrument(skip(self), fields(operation = "delete_file", mode = %self.mode))]
    pub fn delete_file(&mut self, path: &str) -> Result<bool> {
        Ok(self
            .fan_out("delete_file", |backend| backend.delete(path))?
            .into_iter()
            .any(|removed| removed))
    }

    /// Looks up a record by path.
    ///
    /// # Errors
    ///
    /// Returns an error if the read backend fails.
    pub fn get_file(&self, path: &str) -> Result<Option<FileRecord>> {
        self.reader()?.get_by_path(path)
    }

    /// Filters, sorts, and paginates the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a zero page size, or the read
    /// backend's error.
    #[instrument(skip(self, spec), fields(operation = "query_files", mode = %self.mode))]
    pub fn query_files(&self, spec: &QuerySpec) -> Result<QueryResult> {
        let records = self.reader()?.query(&spec.filter)?;
        QueryEngine::finish(records, spec)
    }

    /// Queries one backend directly, bypassing the read preference.
    ///
    /// An inactive backend yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns the backend's error.
    pub fn query_backend(&self, kind: BackendKind, filter: &FileFilter) -> Result<Vec<FileRecord>> {
        let backend: Option<&dyn CatalogBackend> = match kind {
            BackendKind::Relational => self.relational.as_ref().map(|b| b as &dyn CatalogBackend),
            BackendKind::Document => self.document.as_ref().map(|b| b as &dyn CatalogBackend),
        };
        backend.map_or_else(|| Ok(Vec::new()), |backend| backend.query(filter))
    }

    /// Finds images whose fingerprint is within `threshold` bits of the
    /// record at `path` (default 5).
    ///
    /// An unknown path or a record without a fingerprint yields an empty
    /// result.
    ///
    /// # Errors
    ///
    /// Returns the read backend's error.
    #[instrument(skip(self), fields(operation = "find_similar", mode = %self.mode))]
    pub fn find_similar(&self, path: &str, threshold: Option<u32>) -> Result<Vec<SimilarFile>> {
        let reader = self.reader()?;
        let Some(reference) = reader.get_by_path(path)? else {
            return Ok(Vec::new());
        };
        if reference.perceptual_hash().is_none() {
            return Ok(Vec::new());
        }
        let images = reader.query(&FileFilter::new().with_category(Category::Image))?;
        Ok(SimilarityIndex::find_similar(
            &reference,
            &images,
            threshold.unwrap_or(DEFAULT_THRESHOLD),
        ))
    }

    /// Groups records sharing a strong content hash, largest groups first.
    ///
    /// # Errors
    ///
    /// Returns the read backend's error.
    #[instrument(skip(self), fields(operation = "find_duplicates", mode = %self.mode))]
    pub fn find_duplicates(&self) -> Result<Vec<DuplicateGroup>> {
        Ok(DuplicateDetector::find_duplicates(
            self.reader()?.all_records()?,
        ))
    }

    /// Computes aggregate statistics from the read backend.
    ///
    /// # Errors
    ///
    /// Returns the read backend's error.
    pub fn stats(&self) -> Result<CatalogStats> {
        if self.relational.is_none()
            && let Some(document) = &self.document
        {
            return Ok(document.summary().clone());
        }
        let records = self.reader()?.all_records()?;
        Ok(CatalogStats::from_records(&records))
    }

    /// Persists pending document changes.
    ///
    /// # Errors
    ///
    /// Same policy as [`Catalog::upsert_file`].
    pub fn flush(&mut self) -> Result<()> {
        self.fan_out("flush", |backend| backend.flush()).map(drop)
    }

    /// Flushes and closes every backend.
    ///
    /// # Errors
    ///
    /// Returns the flush error; the backends are closed either way.
    #[instrument(skip(self), fields(operation = "close", mode = %self.mode))]
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.flush()
    }
}

impl Drop for Catalog {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "Failed to flush catalog on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryMetadata, ImageMetadata};
    use tempfile::TempDir;

    fn dual_config(dir: &TempDir) -> StorageConfig {
        StorageConfig::new(StorageMode::Dual)
            .with_database_path(dir.path().join("catalog.db"))
            .with_document_path(dir.path().join("catalog.json"))
    }

    fn image(path: &str, hash: &str) -> FileRecord {
        FileRecord::new(path, Category::Image)
            .with_size(10)
            .with_metadata(CategoryMetadata::Image(ImageMetadata {
                perceptual_hash: Some(hash.to_string()),
                ..Default::default()
            }))
    }

    #[test]
    fn test_open_requires_paths() {
        let result = Catalog::open(&StorageConfig::new(StorageMode::Dual));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_from_backends_requires_one() {
        assert!(Catalog::from_backends(None, None).is_err());
        let catalog =
            Catalog::from_backends(Some(SqliteCatalogBackend::in_memory().unwrap()), None).unwrap();
        assert_eq!(catalog.mode(), StorageMode::Relational);
    }

    #[test]
    fn test_mode_selects_backends() {
        let dir = TempDir::new().unwrap();
        let config = StorageConfig::new(StorageMode::Document)
            .with_database_path(dir.path().join("unused.db"))
            .with_document_path(dir.path().join("catalog.json"));
        let catalog = Catalog::open(&config).unwrap();

        assert!(catalog.relational().is_none());
        assert!(catalog.document().is_some());
        assert!(!dir.path().join("unused.db").exists());
    }

    #[test]
    fn test_inactive_backend_reads_empty() {
        let dir = TempDir::new().unwrap();
        let config =
            StorageConfig::new(StorageMode::Document).with_document_path(dir.path().join("c.json"));
        let mut catalog = Catalog::open(&config).unwrap();
        catalog.upsert_file(&image("/a.jpg", "00")).unwrap();

        let relational = catalog
            .query_backend(BackendKind::Relational, &FileFilter::new())
            .unwrap();
        assert!(relational.is_empty());
        assert_eq!(
            catalog
                .query_backend(BackendKind::Document, &FileFilter::new())
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_single_backend_error_is_not_wrapped() {
        let mut catalog =
            Catalog::from_backends(Some(SqliteCatalogBackend::in_memory().unwrap()), None).unwrap();
        let record = FileRecord::new("/huge.bin", Category::Other).with_size(u64::MAX);

        assert!(matches!(
            catalog.upsert_file(&record),
            Err(Error::ConstraintViolation(_))
        ));
    }

    #[test]
    fn test_dual_partial_failure_keeps_successful_write() {
        let dir = TempDir::new().unwrap();
        let mut catalog = Catalog::open(&dual_config(&dir)).unwrap();
        let record = FileRecord::new("/huge.bin", Category::Other).with_size(u64::MAX);

        let err = catalog.upsert_file(&record).unwrap_err();
        assert_eq!(err.failed_backends(), vec![BackendKind::Relational]);
        assert!(catalog.get_file("/huge.bin").unwrap().is_none());
        assert_eq!(
            catalog
                .query_backend(BackendKind::Document, &FileFilter::new())
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_find_similar_via_catalog() {
        let mut catalog =
            Catalog::from_backends(Some(SqliteCatalogBackend::in_memory().unwrap()), None).unwrap();
        catalog.upsert_file(&image("/ref.jpg", "0000000000000000")).unwrap();
        catalog.upsert_file(&image("/near.jpg", "0000000000000003")).unwrap();
        catalog.upsert_file(&image("/far.jpg", "ffffffffffffffff")).unwrap();

        let similar = catalog.find_similar("/ref.jpg", None).unwrap();
        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].record.path, "/near.jpg");
        assert_eq!(similar[0].distance, 2);

        assert_eq!(catalog.find_similar("/ref.jpg", Some(64)).unwrap().len(), 2);
        assert!(catalog.find_similar("/missing.jpg", None).unwrap().is_empty());
    }

    #[test]
    fn test_stats_match_across_modes() {
        let dir = TempDir::new().unwrap();
        let mut catalog = Catalog::open(&dual_config(&dir)).unwrap();
        catalog.upsert_file(&image("/a.jpg", "00")).unwrap();
        catalog
            .upsert_file(&FileRecord::new("/b.rs", Category::Code).with_size(5))
            .unwrap();

        let relational = catalog.stats().unwrap();
        let document = catalog.document().unwrap().summary().clone();
        assert_eq!(relational, document);
        assert_eq!(relational.total_files, 2);
        assert_eq!(relational.total_size, 15);
    }

    #[test]
    fn test_drop_flushes_document() {
        let dir = TempDir::new().unwrap();
        let config =
            StorageConfig::new(StorageMode::Document).with_document_path(dir.path().join("c.json"));
        {
            let mut catalog = Catalog::open(&config).unwrap();
            catalog.upsert_file(&image("/a.jpg", "00")).unwrap();
        }

        let reopened = Catalog::open(&config).unwrap();
        assert!(reopened.get_file("/a.jpg").unwrap().is_some());
    }

    #[test]
    fn test_delete_file_everywhere() {
        let dir = TempDir::new().unwrap();
        let mut catalog = Catalog::open(&dual_config(&dir)).unwrap();
        catalog.upsert_file(&image("/a.jpg", "00")).unwrap();

        assert!(catalog.delete_file("/a.jpg").unwrap());
        assert!(!catalog.delete_file("/a.jpg").unwrap());
        for kind in [BackendKind::Relational, BackendKind::Document] {
            assert!(catalog.query_backend(kind, &FileFilter::new()).unwrap().is_empty());
        }
    }
}

//! Catalog backend trait.

use crate::Result;
use crate::models::{FileFilter, FileId, FileRecord};
use crate::storage::BackendKind;

/// Trait for catalog storage backends.
///
/// A backend persists [`FileRecord`]s keyed by path. Upserting a path that is
/// already stored updates the record in place and keeps its [`FileId`].
/// Records come back in first-insertion order; sorting and pagination belong
/// to the query engine.
pub trait CatalogBackend: Send {
    /// Returns which backend this is.
    fn kind(&self) -> BackendKind;

    /// Inserts or updates a record, returning its identity.
    fn upsert(&mut self, record: &FileRecord) -> Result<FileId>;

    /// Retrieves a record by path.
    fn get_by_path(&self, path: &str) -> Result<Option<FileRecord>>;

    /// Returns every record matching `filter`.
    fn query(&self, filter: &FileFilter) -> Result<Vec<FileRecord>>;

    /// Deletes a record and everything it owns. Returns false if absent.
    fn delete(&mut self, path: &str) -> Result<bool>;

    /// Makes pending writes durable.
    fn flush(&mut self) -> Result<()>;

    /// Returns every stored record.
    fn all_records(&self) -> Result<Vec<FileRecord>> {
        self.query(&FileFilter::default())
    }

    /// Returns the number of stored records.
    fn count(&self) -> Result<usize> {
        Ok(self.all_records()?.len())
    }

    /// Flushes and releases the backend.
    fn close(mut self) -> Result<()>
    where
        Self: Sized,
    {
        self.flush()
    }
}

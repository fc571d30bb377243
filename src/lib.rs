//! # Metacat
//!
//! A catalog of file metadata with a queryable store.
//!
//! Metacat receives normalized file records (produced by an external scanner
//! and extractor pipeline) and persists them into one or two storage backends,
//! then answers filter/sort/paginate queries, perceptual near-duplicate
//! searches, and exact-duplicate grouping over the catalog.
//!
//! ## Features
//!
//! - Dual-backend persistence: transactional `SQLite` store, flat JSON document, or both
//! - One logical schema rendered into both physical representations
//! - Tagged-union category metadata with independent office/font attachments
//! - Backend-agnostic query engine (filters, free-text search, stable sort, pagination)
//! - Hamming-distance similarity over 64-bit perceptual fingerprints
//! - Exact duplicate grouping over strong content hashes
//!
//! ## Example
//!
//! ```rust,ignore
//! use metacat::{Catalog, StorageConfig, StorageMode, QuerySpec, FileFilter};
//!
//! let config = StorageConfig::new(StorageMode::Dual)
//!     .with_database_path("catalog.db")
//!     .with_document_path("catalog.json");
//! let mut catalog = Catalog::open(&config)?;
//! catalog.upsert_file(&record)?;
//!
//! let page = catalog.query_files(&QuerySpec::new(FileFilter::new().with_extension("jpg")))?;
//! catalog.close()?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::{CatalogConfig, StorageConfig, StorageMode};
pub use models::{
    Category, CategoryMetadata, DuplicateGroup, FileFilter, FileId, FileRecord, Pagination,
    QueryResult, QuerySpec, Relationship, RelationshipKind, SimilarFile, SortDirection, SortSpec,
};
pub use services::{DuplicateDetector, QueryEngine, SimilarityIndex};
pub use storage::{BackendKind, Catalog, CatalogBackend};

/// A single backend failure inside an aggregated fan-out write.
#[derive(Debug)]
pub struct BackendFailure {
    /// The backend that rejected the write.
    pub backend: storage::BackendKind,
    /// The error it raised.
    pub error: Box<Error>,
}

/// Error type for metacat operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Page size of zero, storage mode missing a required path |
/// | `Initialization` | Backend location unwritable, database or document corrupt |
/// | `ConstraintViolation` | Record inconsistent with the schema (wrong metadata variant, oversized values) |
/// | `MalformedPayload` | A stored free-form payload fails to parse (always swallowed by readers) |
/// | `OperationFailed` | Any other `SQLite` or filesystem failure |
/// | `BackendWrite` | One or more backends failed during a dual-mode fan-out write |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A backend could not be opened or initialized.
    ///
    /// Raised when:
    /// - The backend location cannot be created or written
    /// - The existing database or document file is corrupt
    /// - Schema creation or migration fails
    #[error("failed to initialize {backend} backend: {cause}")]
    Initialization {
        /// The backend being opened.
        backend: storage::BackendKind,
        /// The underlying cause.
        cause: String,
    },

    /// A record violated a schema constraint.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// A stored free-form payload could not be decoded.
    #[error("malformed payload in '{field}': {cause}")]
    MalformedPayload {
        /// The field holding the payload.
        field: String,
        /// The parse failure.
        cause: String,
    },

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A fan-out write failed on one or more backends.
    ///
    /// Backends that succeeded are not rolled back.
    #[error("write failed on {}", describe_failures(.failures))]
    BackendWrite {
        /// Each failing backend with its error.
        failures: Vec<BackendFailure>,
    },
}

impl Error {
    /// Returns the backends named by a [`Error::BackendWrite`], empty otherwise.
    #[must_use]
    pub fn failed_backends(&self) -> Vec<storage::BackendKind> {
        match self {
            Self::BackendWrite { failures } => failures.iter().map(|f| f.backend).collect(),
            _ => Vec::new(),
        }
    }
}

fn describe_failures(failures: &[BackendFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} backend ({})", f.backend, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for metacat operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in milliseconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
///
/// # Examples
///
/// ```rust
/// use metacat::current_timestamp_ms;
///
/// assert!(current_timestamp_ms() > 0);
/// ```
#[must_use]
pub fn current_timestamp_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| i64::try_from(d.as_millis()).ok())
        .unwrap_or(0)
}

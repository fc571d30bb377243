//! Data models for metacat.
//!
//! This module contains the logical schema shared by every storage backend.

mod analysis;
mod file;
mod metadata;
mod query;

pub use analysis::{CatalogStats, DuplicateGroup, SimilarFile};
pub use file::{
    Category, FileId, FileRecord, Relationship, RelationshipKind, SCHEMA_VERSION,
    normalize_relationships, normalize_tags,
};
pub use metadata::{
    ArchiveMetadata, AudioMetadata, CategoryMetadata, CodeMetadata, DocumentMetadata,
    FontMetadata, ImageMetadata, OfficeMetadata, VideoMetadata,
};
pub use query::{
    DateField, DateRange, FieldMatch, FileFilter, Pagination, QueryResult, QuerySpec, SizeRange,
    SortDirection, SortSpec,
};

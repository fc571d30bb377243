//! Storage layer.
//!
//! This module provides a dual-backend storage architecture:
//! - **Relational**: transactional `SQLite` store with per-category side tables
//! - **Document**: a single JSON document held in memory and flushed explicitly
//!
//! Both backends render the one logical schema declared in [`schema`] and
//! dispatch category metadata through the [`router`]. The [`Catalog`]
//! coordinator owns whichever backends the configured mode activates.

// Allow cast precision loss for score calculations where exact precision is not critical.
#![allow(clippy::cast_precision_loss)]
// Allow significant_drop_tightening - dropping database connections slightly early
// provides no meaningful benefit.
#![allow(clippy::significant_drop_tightening)]
// Allow match_same_arms for explicit enum handling.
#![allow(clippy::match_same_arms)]

mod catalog;
mod metrics;
pub mod document;
pub mod migrations;
pub mod router;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use catalog::Catalog;
pub use document::DocumentCatalogBackend;
pub use sqlite::SqliteCatalogBackend;
pub use traits::CatalogBackend;

use std::fmt;

/// Identifies one of the two physical backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// The `SQLite` store.
    Relational,
    /// The flat JSON document.
    Document,
}

impl BackendKind {
    /// Returns the backend name as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Relational => "relational",
            Self::Document => "document",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

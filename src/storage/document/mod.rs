//! Document (JSON) catalog backend.
//!
//! The whole catalog lives in memory as an ordered list and is written to a
//! single JSON document only when flushed.

mod backend;
mod format;

pub use backend::DocumentCatalogBackend;
pub use format::{CatalogDocument, StoredFile};

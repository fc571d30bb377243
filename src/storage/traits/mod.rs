//! Storage backend traits.

mod backend;

pub use backend::CatalogBackend;

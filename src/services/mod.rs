//! Query and analysis services.
//!
//! Services operate on records handed out by the storage backends and hold no
//! state of their own.

pub mod deduplication;
mod query;

pub use deduplication::{DuplicateDetector, SimilarityIndex, hamming_distance};
pub use query::{QueryEngine, contains_ignore_case};

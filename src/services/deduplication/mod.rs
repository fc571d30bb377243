//! Duplicate and near-duplicate analysis.
//!
//! Two independent checks run over catalog records:
//! 1. **Exact match**: records grouped by their strong content hash
//! 2. **Perceptual similarity**: Hamming distance between 64-bit image fingerprints
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                       Catalog                        │
//! │  ┌────────────────────┐  ┌─────────────────────────┐ │
//! │  │ DuplicateDetector  │  │ SimilarityIndex         │ │
//! │  │                    │  │                         │ │
//! │  │ strong hash        │  │ XOR + popcount over     │ │
//! │  │ grouping           │  │ hex fingerprints        │ │
//! │  └────────────────────┘  └─────────────────────────┘ │
//! └──────────────────────────────────────────────────────┘
//! ```

mod exact_match;
mod perceptual;

pub use exact_match::DuplicateDetector;
pub use perceptual::{DEFAULT_THRESHOLD, FINGERPRINT_BITS, SimilarityIndex, hamming_distance};

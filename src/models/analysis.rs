//! Results of catalog analysis: similarity, duplicates, statistics.

use super::FileRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A record found near a reference fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarFile {
    /// The matching record.
    pub record: FileRecord,
    /// Hamming distance to the reference fingerprint.
    pub distance: u32,
    /// `1 - distance / 64`.
    pub score: f64,
}

/// A set of two or more records sharing one strong content hash.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    /// The shared strong hash.
    pub hash: String,
    /// Member records, in catalog order.
    pub files: Vec<FileRecord>,
    /// Number of members.
    pub count: usize,
    /// Sum of member sizes.
    pub total_size: u64,
    /// Bytes freed by keeping only one copy.
    pub reclaimable_size: u64,
}

impl DuplicateGroup {
    /// Returns the member paths.
    #[must_use]
    pub fn paths(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.path.as_str()).collect()
    }
}

/// Aggregate counts over the catalog.
///
/// This is also the summary block of the persisted document format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogStats {
    /// Number of records.
    pub total_files: usize,
    /// Sum of record sizes in bytes.
    pub total_size: u64,
    /// Record count per category.
    pub categories: BTreeMap<String, usize>,
    /// Record count per extension (empty extension keyed as `""`).
    pub extensions: BTreeMap<String, usize>,
    /// Latest `processedAt` across records.
    pub last_scan_at: Option<i64>,
}

impl CatalogStats {
    /// Computes statistics over a record set.
    #[must_use]
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a FileRecord>,
    {
        let mut stats = Self::default();
        for record in records {
            stats.total_files += 1;
            stats.total_size = stats.total_size.saturating_add(record.size);
            *stats
                .categories
                .entry(record.category.as_str().to_string())
                .or_default() += 1;
            *stats
                .extensions
                .entry(record.extension.clone())
                .or_default() += 1;
            stats.last_scan_at = stats.last_scan_at.max(Some(record.processed_at));
        }
        stats
    }
}

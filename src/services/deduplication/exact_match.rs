//! Exact duplicate grouping by strong content hash.

use crate::models::{DuplicateGroup, FileRecord};
use std::collections::HashMap;
use std::time::Instant;
use tracing::instrument;

/// Groups records that share a strong content hash.
///
/// # How it works
///
/// 1. Skips records without a strong hash
/// 2. Buckets the rest by hash, keeping catalog order inside each bucket
/// 3. Keeps buckets with two or more members
/// 4. Orders groups by combined size, largest first
#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateDetector;

impl DuplicateDetector {
    /// Returns every duplicate group among `records`.
    ///
    /// Groups with equal total size are ordered by hash. The first member of
    /// each group is treated as the copy to keep when computing
    /// `reclaimable_size`.
    #[instrument(skip(records), fields(operation = "find_duplicates"))]
    #[allow(clippy::cast_precision_loss)]
    pub fn find_duplicates<I>(records: I) -> Vec<DuplicateGroup>
    where
        I: IntoIterator<Item = FileRecord>,
    {
        let start = Instant::now();
        let mut order: Vec<String> = Vec::new();
        let mut buckets: HashMap<String, Vec<FileRecord>> = HashMap::new();

        for record in records {
            let Some(hash) = record.strong_hash.clone().filter(|h| !h.is_empty()) else {
                continue;
            };
            let bucket = buckets.entry(hash).or_insert_with_key(|hash| {
                order.push(hash.clone());
                Vec::new()
            });
            bucket.push(record);
        }

        let mut groups: Vec<DuplicateGroup> = order
            .into_iter()
            .filter_map(|hash| {
                let files = buckets.remove(&hash)?;
                if files.len() < 2 {
                    return None;
                }
                let total_size = files.iter().fold(0u64, |acc, f| acc.saturating_add(f.size));
                let kept = files.first().map_or(0, |f| f.size);
                Some(DuplicateGroup {
                    hash,
                    count: files.len(),
                    total_size,
                    reclaimable_size: total_size.saturating_sub(kept),
                    files,
                })
            })
            .collect();
        groups.sort_by(|a, b| {
            b.total_size
                .cmp(&a.total_size)
                .then_with(|| a.hash.cmp(&b.hash))
        });

        metrics::histogram!("deduplication_scan_duration_ms", "checker" => "exact_match")
            .record(start.elapsed().as_millis() as f64);
        tracing::debug!(groups = groups.len(), "Duplicate scan complete");
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn file(path: &str, size: u64, hash: Option<&str>) -> FileRecord {
        let record = FileRecord::new(path, Category::Other).with_size(size);
        match hash {
            Some(h) => record.with_strong_hash(h),
            None => record,
        }
    }

    #[test]
    fn test_groups_sorted_by_total_size() {
        let records = vec![
            file("/d", 50, Some("H2")),
            file("/a", 100, Some("H1")),
            file("/e", 50, Some("H2")),
            file("/b", 200, Some("H1")),
            file("/c", 300, Some("H1")),
        ];
        let groups = DuplicateDetector::find_duplicates(records);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].hash, "H1");
        assert_eq!(groups[0].count, 3);
        assert_eq!(groups[0].total_size, 600);
        assert_eq!(groups[0].paths(), vec!["/a", "/b", "/c"]);
        assert_eq!(groups[0].reclaimable_size, 500);
        assert_eq!(groups[1].hash, "H2");
        assert_eq!(groups[1].count, 2);
        assert_eq!(groups[1].total_size, 100);
        assert_eq!(groups[1].reclaimable_size, 50);
    }

    #[test]
    fn test_singletons_and_unhashed_excluded() {
        let records = vec![
            file("/a", 1, Some("H1")),
            file("/b", 1, None),
            file("/c", 1, None),
            file("/d", 1, Some("")),
            file("/e", 1, Some("")),
        ];
        assert!(DuplicateDetector::find_duplicates(records).is_empty());
    }

    #[test]
    fn test_equal_totals_ordered_by_hash() {
        let records = vec![
            file("/1", 10, Some("zz")),
            file("/2", 10, Some("zz")),
            file("/3", 10, Some("aa")),
            file("/4", 10, Some("aa")),
        ];
        let groups = DuplicateDetector::find_duplicates(records);
        assert_eq!(groups[0].hash, "aa");
        assert_eq!(groups[1].hash, "zz");
    }
}

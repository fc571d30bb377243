//! Property-based tests for query evaluation and fingerprint distance.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Concatenated pages reproduce the unpaginated result exactly once
//! - Sorting by an unknown field path is the identity
//! - Sorting is stable for equal keys
//! - Hamming distance is a symmetric bit count
//! - Tag normalization is idempotent

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use metacat::models::normalize_tags;
use metacat::services::hamming_distance;
use metacat::{Category, FileFilter, FileRecord, QueryEngine, QuerySpec, SortSpec};
use proptest::prelude::*;

fn records(sizes: &[u64]) -> Vec<FileRecord> {
    sizes
        .iter()
        .enumerate()
        .map(|(i, size)| FileRecord::new(format!("/f/{i}.bin"), Category::Other).with_size(*size))
        .collect()
}

fn paths(records: &[FileRecord]) -> Vec<String> {
    records.iter().map(|r| r.path.clone()).collect()
}

proptest! {
    /// Property: pages concatenate to the sorted, unpaginated result.
    #[test]
    fn prop_pagination_law(
        sizes in prop::collection::vec(0u64..100, 0..60),
        page_size in 1usize..12,
    ) {
        let all = records(&sizes);
        let sorted = QuerySpec::new(FileFilter::new()).sorted_by(SortSpec::ascending("size"));
        let unpaged = QueryEngine::execute(all.clone(), &sorted).unwrap();

        let first =
            QueryEngine::execute(all.clone(), &sorted.clone().paginated(1, page_size)).unwrap();
        prop_assert_eq!(first.total_pages, sizes.len().div_ceil(page_size));

        let mut concatenated = Vec::new();
        for page in 1..=first.total_pages + 1 {
            let spec = sorted.clone().paginated(page, page_size);
            let result = QueryEngine::execute(all.clone(), &spec).unwrap();
            prop_assert_eq!(result.total, sizes.len());
            concatenated.extend(result.items);
        }
        prop_assert_eq!(paths(&concatenated), paths(&unpaged.items));
    }

    /// Property: an unknown sort field leaves any input order unchanged.
    #[test]
    fn prop_unknown_sort_field_is_identity(
        sizes in prop::collection::vec(any::<u64>(), 0..40),
        field in "[a-z]{3,8}\\.[a-z]{3,8}",
    ) {
        let original = records(&sizes);
        let mut sorted = original.clone();
        QueryEngine::sort(&mut sorted, &SortSpec::ascending(format!("nothing.{field}")));
        prop_assert_eq!(paths(&sorted), paths(&original));
    }

    /// Property: records with equal keys keep their relative order.
    #[test]
    fn prop_sort_is_stable(
        sizes in prop::collection::vec(0u64..4, 0..40),
        descending in any::<bool>(),
    ) {
        let mut sorted = records(&sizes);
        let spec = if descending {
            SortSpec::descending("size")
        } else {
            SortSpec::ascending("size")
        };
        QueryEngine::sort(&mut sorted, &spec);

        let index = |r: &FileRecord| r.path[3..r.path.len() - 4].parse::<usize>().unwrap();
        for pair in sorted.windows(2) {
            if pair[0].size == pair[1].size {
                prop_assert!(index(&pair[0]) < index(&pair[1]));
            }
        }
    }

    /// Property: distance counts exactly the flipped bits, symmetrically.
    #[test]
    fn prop_hamming_distance(h in any::<u64>(), mask in any::<u64>()) {
        let a = format!("{h:016x}");
        let b = format!("{:016x}", h ^ mask);
        prop_assert_eq!(hamming_distance(&a, &a), Some(0));
        prop_assert_eq!(hamming_distance(&a, &b), Some(mask.count_ones()));
        prop_assert_eq!(hamming_distance(&a, &b), hamming_distance(&b, &a));
    }

    /// Property: fingerprints of different widths are never compared.
    #[test]
    fn prop_unequal_widths_are_incomparable(h in any::<u64>(), short in any::<u32>()) {
        let a = format!("{h:016x}");
        let b = format!("{short:08x}");
        prop_assert_eq!(hamming_distance(&a, &b), None);
    }

    /// Property: normalizing tags twice changes nothing.
    #[test]
    fn prop_normalize_tags_idempotent(tags in prop::collection::vec("[ a-c]{0,4}", 0..12)) {
        let once = normalize_tags(&tags);
        prop_assert_eq!(normalize_tags(&once), once.clone());
        prop_assert!(once.iter().all(|t| !t.is_empty() && t.trim() == t));
    }
}

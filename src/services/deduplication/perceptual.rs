//! Perceptual near-duplicate search.
//!
//! Image records may carry a perceptual fingerprint: the hex encoding of a
//! 64-bit hash where visually similar images differ in few bits.

use crate::models::{Category, FileRecord, SimilarFile};
use std::time::Instant;
use tracing::instrument;

/// Width of a perceptual fingerprint in bits.
pub const FINGERPRINT_BITS: u32 = 64;

/// Default maximum Hamming distance for a match.
pub const DEFAULT_THRESHOLD: u32 = 5;

/// Counts differing bits between two hex fingerprints.
///
/// Returns `None` (infinitely distant) when either value is not valid hex or
/// the decoded lengths differ.
///
/// # Example
///
/// ```rust
/// use metacat::services::hamming_distance;
///
/// assert_eq!(hamming_distance("ff00", "ff01"), Some(1));
/// assert_eq!(hamming_distance("ff00", "ff"), None);
/// ```
#[must_use]
pub fn hamming_distance(a: &str, b: &str) -> Option<u32> {
    let a = hex::decode(a).ok()?;
    let b = hex::decode(b).ok()?;
    if a.len() != b.len() {
        return None;
    }
    Some(a.iter().zip(&b).map(|(x, y)| (x ^ y).count_ones()).sum())
}

/// Finds images whose fingerprint lies within a distance threshold.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityIndex;

impl SimilarityIndex {
    /// Returns candidates near `reference`, best match first.
    ///
    /// Only image records with a fingerprint are considered; the reference
    /// itself (by path) is never returned. A reference without a fingerprint
    /// yields nothing. Equal scores keep candidate order.
    #[instrument(
        skip(reference, candidates),
        fields(operation = "find_similar", path = %reference.path)
    )]
    #[allow(clippy::cast_precision_loss)]
    pub fn find_similar<'a, I>(
        reference: &FileRecord,
        candidates: I,
        threshold: u32,
    ) -> Vec<SimilarFile>
    where
        I: IntoIterator<Item = &'a FileRecord>,
    {
        let start = Instant::now();
        let Some(fingerprint) = reference.perceptual_hash() else {
            tracing::debug!("Reference has no perceptual fingerprint");
            return Vec::new();
        };

        let mut similar: Vec<SimilarFile> = candidates
            .into_iter()
            .filter(|c| c.category == Category::Image && c.path != reference.path)
            .filter_map(|candidate| {
                let distance = hamming_distance(fingerprint, candidate.perceptual_hash()?)?;
                (distance <= threshold).then(|| SimilarFile {
                    record: candidate.clone(),
                    distance,
                    score: 1.0 - f64::from(distance) / f64::from(FINGERPRINT_BITS),
                })
            })
            .collect();
        similar.sort_by(|a, b| b.score.total_cmp(&a.score));

        metrics::histogram!("similarity_search_duration_ms", "checker" => "perceptual")
            .record(start.elapsed().as_millis() as f64);
        tracing::debug!(matches = similar.len(), "Similarity search complete");
        similar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryMetadata, ImageMetadata};
    use proptest::prelude::*;
    use test_case::test_case;

    fn image(path: &str, hash: Option<&str>) -> FileRecord {
        FileRecord::new(path, Category::Image).with_metadata(CategoryMetadata::Image(
            ImageMetadata {
                perceptual_hash: hash.map(str::to_string),
                ..Default::default()
            },
        ))
    }

    #[test_case("0000000000000000", "0000000000000000", Some(0) ; "identical")]
    #[test_case("0000000000000000", "ffffffffffffffff", Some(64) ; "all bits")]
    #[test_case("0f0f0f0f0f0f0f0f", "0f0f0f0f0f0f0f0e", Some(1) ; "one bit")]
    #[test_case("ABCDEF0123456789", "abcdef0123456789", Some(0) ; "hex case")]
    #[test_case("00", "0000", None ; "unequal length")]
    #[test_case("zz", "00", None ; "not hex")]
    fn test_hamming_distance(a: &str, b: &str, expected: Option<u32>) {
        assert_eq!(hamming_distance(a, b), expected);
    }

    #[test]
    fn test_find_similar_threshold_and_order() {
        let reference = image("/ref.jpg", Some("0000000000000000"));
        let candidates = vec![
            reference.clone(),
            image("/far.jpg", Some("00000000000000ff")),
            image("/three.jpg", Some("0000000000000007")),
            image("/one.jpg", Some("0000000000000001")),
            image("/none.jpg", None),
            image("/short.jpg", Some("00")),
        ];

        let similar = SimilarityIndex::find_similar(&reference, &candidates, DEFAULT_THRESHOLD);
        let found: Vec<_> = similar.iter().map(|s| s.record.path.as_str()).collect();
        assert_eq!(found, vec!["/one.jpg", "/three.jpg"]);
        assert_eq!(similar[0].distance, 1);
        assert!((similar[0].score - (1.0 - 1.0 / 64.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_find_similar_ignores_non_images() {
        let reference = image("/ref.jpg", Some("0000000000000000"));
        let mut video = image("/clip.mp4", Some("0000000000000000"));
        video.category = Category::Video;

        assert!(SimilarityIndex::find_similar(&reference, [&video], 5).is_empty());
    }

    #[test]
    fn test_find_similar_without_fingerprint() {
        let reference = image("/ref.jpg", None);
        let other = image("/other.jpg", Some("0000000000000000"));
        assert!(SimilarityIndex::find_similar(&reference, [&other], 64).is_empty());
    }

    proptest! {
        #[test]
        fn prop_distance_to_self_is_zero(h in any::<u64>()) {
            let hex = format!("{h:016x}");
            prop_assert_eq!(hamming_distance(&hex, &hex), Some(0));
        }

        #[test]
        fn prop_distance_symmetric(a in any::<u64>(), b in any::<u64>()) {
            let (a, b) = (format!("{a:016x}"), format!("{b:016x}"));
            prop_assert_eq!(hamming_distance(&a, &b), hamming_distance(&b, &a));
        }

        #[test]
        fn prop_distance_counts_flipped_bits(h in any::<u64>(), mask in any::<u64>()) {
            let a = format!("{h:016x}");
            let b = format!("{:016x}", h ^ mask);
            prop_assert_eq!(hamming_distance(&a, &b), Some(mask.count_ones()));
        }
    }
}

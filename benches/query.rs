//! Benchmarks for catalog queries and analysis.
//!
//! Benchmark targets:
//! - 1,000 records, filtered + sorted + paginated query: <20ms
//! - 10,000 records, similarity scan: <10ms
//!
//! These benchmarks cover:
//! - Relational query pushdown plus hydration
//! - In-memory document filtering
//! - Hamming-distance similarity scan
//! - Exact duplicate grouping

// Criterion macros generate items without docs - this is expected for benchmarks
// Benchmarks use expect/unwrap for simplicity - panics are acceptable in benchmarks
#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tempfile::TempDir;

use metacat::models::ImageMetadata;
use metacat::{
    Catalog, Category, CategoryMetadata, DuplicateDetector, FileFilter, FileRecord, QuerySpec,
    SimilarityIndex, SortSpec, StorageConfig, StorageMode,
};

// ============================================================================
// Helper Functions
// ============================================================================

fn synthetic_record(i: u64) -> FileRecord {
    let category = if i % 3 == 0 { Category::Image } else { Category::Document };
    let mut record = FileRecord::new(format!("/data/{}/file_{i}.bin", i % 17), category)
        .with_size(i * 37 % 10_000)
        .with_strong_hash(format!("hash-{}", i % 250))
        .with_tags([format!("tag{}", i % 7)]);
    if category == Category::Image {
        record.metadata = Some(CategoryMetadata::Image(ImageMetadata {
            width: 640,
            height: 480,
            perceptual_hash: Some(format!("{:016x}", i.wrapping_mul(0x9E37_79B9_7F4A_7C15))),
            ..Default::default()
        }));
    }
    record
}

fn populated_catalog(dir: &TempDir, mode: StorageMode, count: u64) -> Catalog {
    let config = StorageConfig::new(mode)
        .with_database_path(dir.path().join("bench.db"))
        .with_document_path(dir.path().join("bench.json"));
    let mut catalog = Catalog::open(&config).expect("Failed to open catalog");
    for i in 0..count {
        catalog
            .upsert_file(&synthetic_record(i))
            .expect("Failed to upsert");
    }
    catalog
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_files");
    let spec = QuerySpec::new(
        FileFilter::new()
            .with_tag("tag3")
            .with_size_range(Some(1_000), None),
    )
    .sorted_by(SortSpec::descending("size"))
    .paginated(1, 25);

    for mode in [StorageMode::Relational, StorageMode::Document] {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let catalog = populated_catalog(&dir, mode, 1_000);
        group.bench_with_input(BenchmarkId::new("mode", mode), &spec, |b, spec| {
            b.iter(|| black_box(catalog.query_files(spec).unwrap()));
        });
    }
    group.finish();
}

fn bench_similarity(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_similar");
    for count in [1_000u64, 10_000] {
        let records: Vec<_> = (0..count).map(synthetic_record).collect();
        let reference = records[0].clone();
        group.bench_with_input(BenchmarkId::new("records", count), &records, |b, records| {
            b.iter(|| black_box(SimilarityIndex::find_similar(&reference, records, 12)));
        });
    }
    group.finish();
}

fn bench_duplicates(c: &mut Criterion) {
    let records: Vec<_> = (0..10_000).map(synthetic_record).collect();
    c.bench_function("find_duplicates/10000", |b| {
        b.iter(|| black_box(DuplicateDetector::find_duplicates(records.clone())));
    });
}

criterion_group!(benches, bench_query, bench_similarity, bench_duplicates);
criterion_main!(benches);

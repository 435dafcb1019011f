//! Indexed lookup versus full collection scan

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use shelfdb_core::payload_from_value;
use shelfdb_core::query::QueryProcessor;
use shelfdb_core::storage::{StorageConfig, StorageEngine};
use tempfile::TempDir;

const DOCUMENTS: usize = 1_000;

fn lookup_benchmark(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let engine = StorageEngine::new(StorageConfig {
        data_dir: dir.path().to_path_buf(),
        sync_writes: false,
    })
    .unwrap();
    let db = engine.create_database("bench").unwrap();

    for i in 0..DOCUMENTS {
        let payload = payload_from_value(json!({
            "user": format!("user-{}", i),
            "group": format!("group-{}", i % 10),
        }))
        .unwrap();
        db.create_document("events", payload, Some("user")).unwrap();
    }

    let queries = QueryProcessor::new(&db);

    c.bench_function("indexed_lookup", |b| {
        b.iter(|| {
            queries
                .find_by_indexed_property("events", "user", black_box("user-500"))
                .unwrap()
        })
    });

    c.bench_function("full_scan_lookup", |b| {
        b.iter(|| {
            queries
                .find_by_indexed_property("events", "group", black_box("group-5"))
                .unwrap()
        })
    });
}

criterion_group!(benches, lookup_benchmark);
criterion_main!(benches);

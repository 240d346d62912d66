//! Performance benchmarks for path expressions and the backend store
//!
//! Run with: `cargo bench -p confdb-core`
//!
//! These benchmarks measure the hot paths of every facade call:
//! - Path expression parsing
//! - Evaluation over a document with many collection members
//! - A full locked write cycle (load, mutate, snapshot, save)

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use confdb_core::db::{Backend, Document, PathExpr};
use confdb_core::DatabaseConfig;
use serde_json::{json, Value};
use tempfile::TempDir;

/// Generate a document with `count` interfaces and one route per interface
fn generate_document(count: usize) -> Value {
    let interfaces: Vec<Value> = (0..count)
        .map(|i| json!({ "uuid": format!("if-{}", i), "name": format!("eth{}", i), "mtu": 1500 }))
        .collect();
    let routes: Vec<Value> = (0..count)
        .map(|i| json!({ "uuid": format!("rt-{}", i), "interface": format!("if-{}", i) }))
        .collect();
    json!({
        "system": { "hostname": "bench" },
        "network": { "interface": interfaces, "route": routes }
    })
}

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_member_predicate", |b| {
        b.iter(|| PathExpr::parse(black_box("/network/interface[name='eth1' or name='eth2']")))
    });

    c.bench_function("parse_reference_query", |b| {
        b.iter(|| PathExpr::parse(black_box("//*[*='if-42' and uuid!='if-42']")))
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let document = Document::from_value(generate_document(1000)).unwrap();

    let by_key = PathExpr::parse("/network/interface[uuid='if-500']").unwrap();
    c.bench_function("evaluate_key_lookup_1000", |b| {
        b.iter(|| document.get(black_box(&by_key)))
    });

    let all = PathExpr::parse("/network/interface").unwrap();
    c.bench_function("evaluate_list_1000", |b| {
        b.iter(|| document.get_list(black_box(&all)))
    });

    let referenced = PathExpr::parse("//*[*='if-500' and uuid!='if-500']").unwrap();
    c.bench_function("evaluate_descendant_scan_1000", |b| {
        b.iter(|| document.exists(black_box(&referenced)))
    });
}

fn bench_write_cycle(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bench.json");
    std::fs::write(&path, generate_document(100).to_string()).unwrap();

    let mut config = DatabaseConfig::new(&path);
    config.max_revisions = Some(10);
    let mut backend = Backend::open(&config).unwrap();

    c.bench_function("backend_replace_with_snapshot", |b| {
        b.iter_batched(
            || json!({ "hostname": "bench", "ntp": true }),
            |values| backend.replace("/system", values).unwrap(),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_parse, bench_evaluate, bench_write_cycle);
criterion_main!(benches);

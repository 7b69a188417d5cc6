//! Performance benchmarks for the event store.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sequent::{EventFilter, EventInput, InMemoryRepository, Repository};
use serde_json::{json, Map};

fn visit(entity: &str, i: u64) -> EventInput {
    let mut payload = Map::new();
    payload.insert("url".to_string(), json!(format!("https://example.com/{i}")));
    payload.insert("html_status".to_string(), json!(200));
    EventInput::new("page-visited")
        .with_entity(entity)
        .with_payload(payload)
}

/// Benchmark raw append throughput.
fn bench_append(c: &mut Criterion) {
    c.bench_function("append", |b| {
        let repo = InMemoryRepository::new();
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            black_box(repo.append(visit("page-1", i)).unwrap());
        });
    });
}

/// Benchmark filtered replay over logs of varying length.
fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay");

    for log_len in [100u64, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("log_len", log_len), &log_len, |b, &len| {
            let repo = InMemoryRepository::new();
            for i in 0..len {
                repo.append(visit(&format!("page-{}", i % 10), i)).unwrap();
            }

            let filter = EventFilter::entity("page-3");
            b.iter(|| {
                black_box(repo.replay(&filter).unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_append, bench_replay);
criterion_main!(benches);

// Criterion benchmarks for dating retrieval

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dating_retrieval::core::{
    distance::haversine_distance, filters::FilterEngine, partition::partition, BatchFetcher,
};
use dating_retrieval::models::{FilterCriteria, Location, UserRecord};
use dating_retrieval::services::InMemoryStore;
use std::collections::HashSet;
use std::sync::Arc;

fn create_candidate(id: usize, lat: f64, lng: f64) -> UserRecord {
    let mut record = UserRecord::new(format!("u{}", id));
    record.name = Some(format!("User {}", id));
    record.age = Some(21 + (id % 15) as u32);
    record.interests = if id % 3 == 0 {
        vec!["hiking".to_string(), "cooking".to_string()]
    } else {
        vec!["chess".to_string()]
    };
    record.location = Some(Location::new(lat, lng));
    record.is_profile_complete = true;
    record
}

fn candidates(count: usize) -> Vec<UserRecord> {
    (0..count)
        .map(|i| {
            let offset = (i as f64 * 0.002) % 1.0;
            create_candidate(i, 13.7563 + offset, 100.5018 + offset)
        })
        .collect()
}

fn bench_haversine_distance(c: &mut Criterion) {
    c.bench_function("haversine_distance", |b| {
        b.iter(|| {
            haversine_distance(
                black_box(13.7563),
                black_box(100.5018),
                black_box(13.80),
                black_box(100.55),
            )
        });
    });
}

fn bench_partition(c: &mut Criterion) {
    let ids: Vec<String> = (0..200).map(|i| format!("u{}", i)).collect();

    c.bench_function("partition_200_ids", |b| {
        b.iter(|| partition(black_box(&ids), black_box(30)));
    });
}

fn bench_filter_engine(c: &mut Criterion) {
    let criteria = FilterCriteria {
        interests: HashSet::from(["hiking".to_string()]),
        max_distance_km: 50.0,
        limit: 50,
        ..Default::default()
    };
    let viewer = Some(Location::new(13.7563, 100.5018));

    let mut group = c.benchmark_group("filter_engine");

    for candidate_count in [100, 500, 1000].iter() {
        let pool = candidates(*candidate_count);

        group.bench_with_input(
            BenchmarkId::new("filter", candidate_count),
            candidate_count,
            |b, _| {
                b.iter(|| {
                    let engine = FilterEngine::new(&criteria, "viewer", viewer);
                    black_box(engine.filter(pool.clone()))
                });
            },
        );
    }

    group.finish();
}

fn bench_batch_fetch(c: &mut Criterion) {
    let store = Arc::new(InMemoryStore::with_users(30, candidates(500)));
    let fetcher = BatchFetcher::new(store);
    let ids: Vec<String> = (0..200).map(|i| format!("u{}", i * 2)).collect();

    c.bench_function("batch_fetch_200_ids", |b| {
        b.iter(|| tokio_test::block_on(fetcher.fetch(black_box(&ids))));
    });
}

criterion_group!(
    benches,
    bench_haversine_distance,
    bench_partition,
    bench_filter_engine,
    bench_batch_fetch
);

criterion_main!(benches);

//! Benchmark: cache lookups and handle traffic

use archetype_cache::{GlobalId, MockBackend, ResourceCache, Texture};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn populated_cache(entries: usize) -> (ResourceCache, Vec<GlobalId>) {
    let cache = ResourceCache::new(MockBackend::new());
    let ids = (0..entries)
        .map(|i| {
            let id = GlobalId::new();
            cache.add_with_id::<Texture>(&format!("textures/tile{i}.png"), id);
            id
        })
        .collect();
    (cache, ids)
}

fn cache_lookup_benchmark(c: &mut Criterion) {
    let (cache, ids) = populated_cache(1_000);

    c.bench_function("get_by_name", |b| {
        b.iter(|| black_box(cache.get::<Texture>(black_box("textures/tile500.png"))))
    });

    c.bench_function("get_by_id", |b| {
        b.iter(|| black_box(cache.get_by_id::<Texture>(black_box(ids[500]))))
    });

    c.bench_function("find_by_predicate", |b| {
        b.iter(|| black_box(cache.find::<Texture>(|name, _| name.ends_with("tile999.png"))))
    });

    let handle = cache.get::<Texture>("textures/tile1.png");
    c.bench_function("strong_reference_round_trip", |b| {
        b.iter(|| black_box(handle.create_strong_reference()))
    });
}

fn cache_population_benchmark(c: &mut Criterion) {
    c.bench_function("add_and_unload_1000", |b| {
        b.iter(|| {
            let (cache, _) = populated_cache(1_000);
            cache.unload_all();
            black_box(cache.len())
        })
    });
}

criterion_group!(benches, cache_lookup_benchmark, cache_population_benchmark);
criterion_main!(benches);

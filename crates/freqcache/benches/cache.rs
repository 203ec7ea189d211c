use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use freqcache::{BoundedFrequencyCache, CoalescingCache, SharedCache};

fn bench_cached_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("cached_get");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_1kb_cached", |b| {
        let cache = SharedCache::new(1000).unwrap();
        let data = vec![b'x'; 1024];

        // Warm the cache
        for id in 0..100u64 {
            cache.insert(id, data.clone());
        }

        let mut counter = 0u64;
        b.iter(|| {
            black_box(cache.get_or_compute(counter % 100, || Ok::<_, ()>(data.clone())).unwrap());
            counter += 1;
        });
    });

    group.finish();
}

fn bench_eviction(c: &mut Criterion) {
    let mut group = c.benchmark_group("eviction");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("miss_with_eviction", |b| {
        let mut cache = BoundedFrequencyCache::new(1000).unwrap();

        // Spread usage counts so eviction crosses several buckets
        for id in 0..1000u64 {
            for _ in 0..(id % 8) {
                let _ = cache.get_or_compute(id, || Ok::<_, ()>(id));
            }
        }

        let mut counter = 1000u64;
        b.iter(|| {
            black_box(cache.get_or_compute(counter, || Ok::<_, ()>(counter)).ok());
            counter += 1;
        });
    });

    group.finish();
}

fn bench_mixed_skewed(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("hot_set_90_10", |b| {
        let cache = SharedCache::new(100).unwrap();

        let mut counter = 0u64;
        b.iter(|| {
            // 90% of calls go to 50 hot keys
            let key = if counter % 10 == 0 {
                10_000 + counter
            } else {
                counter % 50
            };
            black_box(cache.get_or_compute(key, || Ok::<_, ()>(key)).ok());
            counter += 1;
        });
    });

    group.bench_function("hot_set_90_10_coalescing", |b| {
        let cache = CoalescingCache::new(100).unwrap();

        let mut counter = 0u64;
        b.iter(|| {
            let key = if counter % 10 == 0 {
                10_000 + counter
            } else {
                counter % 50
            };
            black_box(cache.get_or_compute(key, || Ok::<_, ()>(key)).ok());
            counter += 1;
        });
    });

    group.finish();
}

criterion_group!(benches, bench_cached_get, bench_eviction, bench_mixed_skewed);
criterion_main!(benches);

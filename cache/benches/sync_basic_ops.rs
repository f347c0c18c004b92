use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};
use stowage::{Cache, CacheBuilder};

const NUM_ITEMS: u64 = 10_000;

fn build_cache(store_by_value: bool) -> Cache<u64, u64> {
  let builder = CacheBuilder::new("bench", "bench").store_by_value(store_by_value);
  let builder = if store_by_value { builder.bincode() } else { builder };
  let cache = builder.build().unwrap();
  cache.start().unwrap();
  for i in 0..NUM_ITEMS {
    cache.put(i, i).unwrap();
  }
  cache
}

fn single_threaded(c: &mut Criterion) {
  let mut group = c.benchmark_group("SingleThreaded");
  group.throughput(Throughput::Elements(1));

  for (label, store_by_value) in [("ByReference", false), ("ByValue", true)] {
    let cache = build_cache(store_by_value);

    group.bench_function(BenchmarkId::new("GetHit", label), |b| {
      let mut i = 0;
      b.iter(|| {
        i = (i + 1) % NUM_ITEMS;
        black_box(cache.get(&i).unwrap());
      })
    });

    group.bench_function(BenchmarkId::new("GetMiss", label), |b| {
      let mut i = NUM_ITEMS;
      b.iter(|| {
        i += 1;
        black_box(cache.get(&i).unwrap());
      })
    });

    group.bench_function(BenchmarkId::new("Put", label), |b| {
      let mut i = 0;
      b.iter(|| {
        i = (i + 1) % NUM_ITEMS;
        cache.put(black_box(i), i).unwrap();
      })
    });
  }

  group.finish();
}

fn concurrent_gets(c: &mut Criterion) {
  let mut group = c.benchmark_group("ConcurrentGetHit");

  for concurrency in [2usize, 4, 8] {
    let cache = build_cache(false);
    group.throughput(Throughput::Elements(concurrency as u64 * NUM_ITEMS));

    group.bench_with_input(
      BenchmarkId::from_parameter(concurrency),
      &concurrency,
      |b, &concurrency| {
        b.iter_custom(|iters| {
          let mut total = Duration::ZERO;
          for _ in 0..iters {
            let barrier = Arc::new(Barrier::new(concurrency + 1));
            let handles: Vec<_> = (0..concurrency)
              .map(|_| {
                let cache = cache.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                  barrier.wait();
                  for key in 0..NUM_ITEMS {
                    black_box(cache.get(&key).unwrap());
                  }
                })
              })
              .collect();

            barrier.wait();
            let start = Instant::now();
            for handle in handles {
              handle.join().unwrap();
            }
            total += start.elapsed();
          }
          total
        })
      },
    );
  }

  group.finish();
}

criterion_group!(benches, single_threaded, concurrent_gets);
criterion_main!(benches);

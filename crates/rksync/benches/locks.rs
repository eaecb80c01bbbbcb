//! Uncontended fast-path costs of the lock types and pool dispatch.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rksync::{
    fast_lock, fast_unlock, ExclusiveLock, LockStrategy, PoolConfig, ReadWriteLock, ThreadPool,
};

fn bench_exclusive(c: &mut Criterion) {
    let mut group = c.benchmark_group("exclusive");
    let lock = ExclusiveLock::new();

    group.bench_function("lock_unlock", |b| {
        b.iter(|| {
            black_box(fast_lock(&lock));
            fast_unlock(&lock);
        })
    });

    group.bench_function("guard", |b| {
        b.iter(|| {
            let _g = black_box(lock.guard());
        })
    });

    group.bench_function("std_mutex_baseline", |b| {
        let m = std::sync::Mutex::new(0u64);
        b.iter(|| {
            if let Ok(mut v) = m.lock() {
                *v += 1;
            }
        })
    });

    group.finish();
}

fn bench_rwlock(c: &mut Criterion) {
    let mut group = c.benchmark_group("rwlock");
    let lock = ReadWriteLock::new();

    group.bench_function("read", |b| {
        b.iter(|| {
            black_box(lock.read_lock());
            lock.unlock();
        })
    });

    group.bench_function("write", |b| {
        b.iter(|| {
            black_box(lock.write_lock());
            lock.unlock();
        })
    });

    group.bench_function("try_write_then_read", |b| {
        b.iter(|| {
            black_box(lock.acquire(LockStrategy::TryForWritingThenTryForReading));
            lock.unlock();
        })
    });

    group.bench_function("write_downgrade", |b| {
        b.iter(|| {
            let r = lock.write().downgrade();
            black_box(&r);
        })
    });

    group.finish();
}

fn bench_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool");
    let pool = match ThreadPool::with_config(PoolConfig::new().num_workers(2)) {
        Ok(pool) => pool,
        Err(e) => panic!("pool: {}", e),
    };

    group.bench_function("submit_wait", |b| {
        b.iter(|| {
            if let Ok(h) = pool.submit(|| {}) {
                black_box(h.wait());
            }
        })
    });

    group.finish();
    pool.reap_threads();
}

criterion_group!(benches, bench_exclusive, bench_rwlock, bench_pool);
criterion_main!(benches);

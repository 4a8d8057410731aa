use criterion::{criterion_group, criterion_main, Criterion};
use tso::oracle::store::InMemoryTimestampStore;
use tso::oracle::TimestampOracle;

fn bench_oracle_next(c: &mut Criterion) {
    let mut oracle =
        TimestampOracle::open(Box::new(InMemoryTimestampStore::default()), 10_000_000, 1_000_000)
            .unwrap();
    c.bench_function("oracle_next", |b| {
        b.iter(|| oracle.next().unwrap());
    });
}

criterion_group!(benches, bench_oracle_next);
criterion_main!(benches);

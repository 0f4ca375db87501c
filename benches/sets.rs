use criterion::{black_box, criterion_group, criterion_main, Criterion};
use crossbeam_skiplist::SkipSet;
use skiplog::{LinkedLog, NoLog, SharedLog, SkipListSet};

fn insert_unlogged(c: &mut Criterion) {
    let upper = black_box(1_000);
    let mut seed: u16 = rand::random();

    c.bench_function("skiplog_insert", |b| {
        b.iter(|| {
            let list = SkipListSet::<u16, NoLog>::new();

            for _ in 0..upper {
                seed ^= seed << 6;
                seed ^= seed >> 11;
                seed ^= seed << 5;
                list.add(0, seed);
            }
        })
    });
}

fn insert_crossbeam(c: &mut Criterion) {
    let upper = black_box(1_000);
    let mut seed: u16 = rand::random();

    c.bench_function("crossbeam_insert", |b| {
        b.iter(|| {
            let list = SkipSet::new();

            for _ in 0..upper {
                seed ^= seed << 6;
                seed ^= seed >> 11;
                seed ^= seed << 5;
                list.insert(seed);
            }
        })
    });
}

fn mixed_shared_log(c: &mut Criterion) {
    let upper = black_box(1_000);
    let mut seed: u16 = rand::random();

    c.bench_function("skiplog_mixed_shared_log", |b| {
        b.iter(|| {
            let list = SkipListSet::<u16, SharedLog>::new();

            for _ in 0..upper {
                seed ^= seed << 6;
                seed ^= seed >> 11;
                seed ^= seed << 5;
                if seed % 5 == 0 {
                    list.remove(0, &seed);
                } else {
                    list.add(0, seed);
                }
            }
        })
    });
}

fn mixed_linked_log(c: &mut Criterion) {
    let upper = black_box(1_000);
    let mut seed: u16 = rand::random();

    c.bench_function("skiplog_mixed_linked_log", |b| {
        b.iter(|| {
            let list = SkipListSet::<u16, LinkedLog>::new();

            for _ in 0..upper {
                seed ^= seed << 6;
                seed ^= seed >> 11;
                seed ^= seed << 5;
                if seed % 5 == 0 {
                    list.remove(0, &seed);
                } else {
                    list.add(0, seed);
                }
            }
        })
    });
}

criterion_group!(
    benches,
    insert_unlogged,
    insert_crossbeam,
    mixed_shared_log,
    mixed_linked_log
);
criterion_main!(benches);

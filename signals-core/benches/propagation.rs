//! Benchmarks for write propagation and lazy re-evaluation.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use signals_core::reactive::{batch, computed, effect, signal, Computed};

/// One signal feeding a chain of `n` computeds, observed by an effect.
fn bench_deep_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("deep_chain");

    for n in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("write", n), &n, |b, &n| {
            let src = signal(0i64);
            let mut tail: Computed<i64> = computed({
                let src = src.clone();
                move |_| src.get()
            });
            for _ in 1..n {
                let prev = tail.clone();
                tail = computed(move |_| prev.get() + 1);
            }
            let e = effect({
                let tail = tail.clone();
                move || {
                    black_box(tail.get());
                }
            });

            let mut i = 0;
            b.iter(|| {
                i += 1;
                src.set(i);
            });
            e.dispose();
        });
    }

    group.finish();
}

/// One signal read by `n` effects.
fn bench_wide_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("wide_fanout");

    for n in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("write", n), &n, |b, &n| {
            let src = signal(0i64);
            let effects: Vec<_> = (0..n)
                .map(|_| {
                    let src = src.clone();
                    effect(move || {
                        black_box(src.get());
                    })
                })
                .collect();

            let mut i = 0;
            b.iter(|| {
                i += 1;
                src.set(i);
            });
            for e in effects {
                e.dispose();
            }
        });
    }

    group.finish();
}

/// Writes that change a signal but not the parity computed in front of a
/// large subgraph: measures the cost of the dirty check alone.
fn bench_short_circuit(c: &mut Criterion) {
    let mut group = c.benchmark_group("short_circuit");

    for n in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("write", n), &n, |b, &n| {
            let src = signal(0i64);
            let parity = computed({
                let src = src.clone();
                move |_| src.get() % 2
            });
            let effects: Vec<_> = (0..n)
                .map(|k| {
                    let parity = parity.clone();
                    let derived = computed(move |_| parity.get() + k as i64);
                    effect(move || {
                        black_box(derived.get());
                    })
                })
                .collect();

            let mut i = 0;
            b.iter(|| {
                i += 2;
                src.set(i);
            });
            for e in effects {
                e.dispose();
            }
        });
    }

    group.finish();
}

/// Many writes coalesced into one flush.
fn bench_batched_writes(c: &mut Criterion) {
    let mut group = c.benchmark_group("batched_writes");

    for n in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("batch", n), &n, |b, &n| {
            let signals: Vec<_> = (0..n).map(|_| signal(0i64)).collect();
            let sum = computed({
                let signals = signals.clone();
                move |_| signals.iter().map(|s| s.get()).sum::<i64>()
            });
            let e = effect(move || {
                black_box(sum.get());
            });

            let mut i = 0;
            b.iter(|| {
                i += 1;
                batch(|| {
                    for s in &signals {
                        s.set(i);
                    }
                });
            });
            e.dispose();
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_deep_chain,
    bench_wide_fanout,
    bench_short_circuit,
    bench_batched_writes
);
criterion_main!(benches);

//! Benchmark for the `Eff` program type's own operations: construction,
//! `map`/`flat_map` chains, `send`, and `ap`/`product` batching.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use effrow::prelude::*;
use std::any::Any;
use std::hint::black_box;

struct Noop;
impl EffectOp for Noop {
    type Op<X: 'static> = X;
    fn erase<X: 'static>(op: X) -> Box<dyn Any> {
        Box::new(op)
    }
}

fn benchmark_pure(criterion: &mut Criterion) {
    criterion.bench_function("eff_pure", |bencher| {
        bencher.iter(|| {
            let computation: Eff<NoFx, i32> = Eff::pure(black_box(42));
            black_box(run(computation))
        });
    });
}

fn benchmark_map_chain(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("eff_map_chain");

    for chain_length in [1, 10, 100] {
        group.bench_with_input(
            BenchmarkId::from_parameter(chain_length),
            &chain_length,
            |bencher, &length| {
                bencher.iter(|| {
                    let mut computation: Eff<NoFx, i32> = Eff::pure(1);
                    for _ in 0..length {
                        computation = computation.map(|x| x + 1);
                    }
                    black_box(run(computation))
                });
            },
        );
    }

    group.finish();
}

fn benchmark_flat_map_chain(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("eff_flat_map_chain");

    for chain_length in [1, 10, 100, 10_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(chain_length),
            &chain_length,
            |bencher, &length| {
                bencher.iter(|| {
                    let mut computation: Eff<NoFx, i64> = Eff::pure(0);
                    for _ in 0..length {
                        computation = computation.flat_map(|x| Eff::pure(x + 1));
                    }
                    black_box(run(computation))
                });
            },
        );
    }

    group.finish();
}

fn benchmark_send_and_interpret(criterion: &mut Criterion) {
    criterion.bench_function("eff_send_interpret", |bencher| {
        bencher.iter(|| {
            let program: Eff<Fx1<Noop>, i32> =
                send::<Noop, Fx1<Noop>, AtLeaf, i32>(black_box(0)).map(|x| x + 1);
            let result: Eff<NoFx, i32> =
                interpret::<Noop, Fx1<Noop>, AtLeaf, i32, NoFx, i32>(program, Eff::Pure, |_op| {
                    Box::new(41_i32)
                });
            black_box(run(result))
        });
    });
}

fn benchmark_ap_batches(criterion: &mut Criterion) {
    criterion.bench_function("eff_ap_merges_batches", |bencher| {
        bencher.iter(|| {
            let fa: Eff<Fx1<Noop>, i32> = send::<Noop, Fx1<Noop>, AtLeaf, i32>(black_box(10));
            let ff: Eff<Fx1<Noop>, Box<dyn FnOnce(i32) -> i32>> =
                send::<Noop, Fx1<Noop>, AtLeaf, Box<dyn FnOnce(i32) -> i32>>(Box::new(|x| x + 1));
            let combined = ap(ff, fa);
            let result: Eff<NoFx, i32> = interpret_unsafe::<Noop, Fx1<Noop>, AtLeaf, i32, NoFx>(
                combined,
                |op| op,
            );
            black_box(run(result))
        });
    });

    criterion.bench_function("eff_product_pairs_answers", |bencher| {
        bencher.iter(|| {
            let fa: Eff<Fx1<Noop>, i32> = Eff::pure(black_box(1));
            let fb: Eff<Fx1<Noop>, i32> = Eff::pure(black_box(2));
            let paired: Eff<Fx1<Noop>, (i32, i32)> = product(fa, fb);
            black_box(run_pure(paired))
        });
    });
}

criterion_group!(
    benches,
    benchmark_pure,
    benchmark_map_chain,
    benchmark_flat_map_chain,
    benchmark_send_and_interpret,
    benchmark_ap_batches,
);
criterion_main!(benches);

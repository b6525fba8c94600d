//! Benchmarks for composition and synthesis.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use infraflow::config::AppConfig;
use infraflow::reference;
use infraflow::template::{synthesize, synthesize_stack};

fn compose_benchmark(c: &mut Criterion) {
    let config = AppConfig::default();
    c.bench_function("compose_reference_pipeline", |b| {
        b.iter(|| reference::test_pipeline(black_box(&config)))
    });
}

fn synth_benchmark(c: &mut Criterion) {
    let config = AppConfig::default();
    let Ok(pipeline) = reference::test_pipeline(&config) else {
        return;
    };
    let Ok(stack) = reference::test_resources_stack(&config) else {
        return;
    };

    c.bench_function("synthesize_pipeline", |b| {
        b.iter(|| synthesize(black_box(&pipeline), &config.limits))
    });
    c.bench_function("synthesize_resources_stack", |b| {
        b.iter(|| synthesize_stack(black_box(&stack)))
    });
}

criterion_group!(benches, compose_benchmark, synth_benchmark);
criterion_main!(benches);

//! Trigger expression parsing benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use reconf_bench::{prototype_expression, random_expression};
use reconf_expression::{ParseOptions, TriggerExpression};

/// Benchmark parsing expressions of growing size.
fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    for operands in [1, 4, 16, 64].iter() {
        let text = random_expression("web1.example.com", *operands);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(operands), &text, |b, text| {
            b.iter(|| {
                let parsed = TriggerExpression::parse(black_box(text)).unwrap();
                black_box(parsed);
            });
        });
    }
    group.finish();
}

/// Benchmark parsing prototypes with discovery macros.
fn bench_parse_prototype(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_prototype");

    for operands in [1, 8].iter() {
        let text = prototype_expression("web1", *operands);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(operands), &text, |b, text| {
            b.iter(|| {
                let parsed =
                    TriggerExpression::parse_with(black_box(text), ParseOptions::prototype())
                        .unwrap();
                black_box(parsed);
            });
        });
    }
    group.finish();
}

/// Benchmark extracting host/key references from a parsed expression.
fn bench_host_items(c: &mut Criterion) {
    let parsed = TriggerExpression::parse(&random_expression("web1", 16)).unwrap();
    c.bench_function("host_items_16", |b| {
        b.iter(|| black_box(parsed.host_items()));
    });
}

criterion_group!(
    benches,
    bench_parse,
    bench_parse_prototype,
    bench_host_items
);
criterion_main!(benches);

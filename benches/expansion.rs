//! Expansion Benchmarks
//!
//! Run with: cargo bench --bench expansion

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use tokio::runtime::Runtime;
use promptweave::config::Config;
use promptweave::directives::{scan, DirectiveRegistry, RegistryCache};
use promptweave::engine::{ExpansionContext, Expander};
use promptweave::host::Services;
use promptweave::variables::MemoryStorage;

const TEMPLATE: &str = "Hello {{user}}. Today is {{day}}. \
    {{set visits:0}}{{increment:visits}}You have visited {{get visits}} times. \
    {{cutoff 12:{{input}} and then some more text}} {{ignore:{{set seen:yes}}}}";

fn expander() -> Expander {
    let services = Services::new(Arc::new(MemoryStorage::new()));
    Expander::new(&Config::default(), RegistryCache::builtin(), services)
}

fn benchmark_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scanner");
    group.throughput(Throughput::Bytes(TEMPLATE.len() as u64));

    group.bench_function("scan_template", |b| {
        b.iter(|| scan(black_box(TEMPLATE)));
    });

    let registry = DirectiveRegistry::builtin().unwrap();
    group.bench_function("check_for_directives", |b| {
        b.iter(|| registry.check_for_directives(black_box(TEMPLATE)).len());
    });

    group.finish();
}

fn benchmark_expand(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let expander = expander();
    let expander = &expander;

    let mut group = c.benchmark_group("expand");

    group.bench_function("plain_text", |b| {
        b.to_async(&rt).iter(|| async move {
            expander
                .expand_text(black_box("no directives in here at all"), ExpansionContext::new())
                .await
                .unwrap()
        });
    });

    group.bench_function("mixed_template", |b| {
        b.to_async(&rt).iter(|| async move {
            let seed: ExpansionContext = [("input", "the seeded input")].into_iter().collect();
            expander.expand_text(black_box(TEMPLATE), seed).await.unwrap()
        });
    });

    for copies in [1usize, 10, 50].iter() {
        let template = TEMPLATE.repeat(*copies);
        group.throughput(Throughput::Elements(*copies as u64));
        group.bench_with_input(format!("{}_copies", copies), &template, |b, template| {
            b.to_async(&rt).iter(|| async move {
                expander
                    .expand_text(template, ExpansionContext::new())
                    .await
                    .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_scan, benchmark_expand);
criterion_main!(benches);

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use module_reconfig::classloading::NamedExclusiveSingleOperations;
use module_reconfig::module::{ClassloaderModuleContext, ModuleOpenRequest};
use module_reconfig::reconfig::AggregatedOpenInstructions;
use module_reconfig::runtime::{InMemoryRuntime, ModuleRuntime};

fn benchmark_uncontended_produce(c: &mut Criterion) {
    let operations: NamedExclusiveSingleOperations<usize, ()> =
        NamedExclusiveSingleOperations::new();

    c.bench_function("exclusive_uncontended_produce", |b| {
        b.iter(|| {
            operations
                .exclusive_execution(
                    black_box("com.example.Widget"),
                    |_| None,
                    |name, extra: usize| Ok(name.len() + extra),
                    black_box(7),
                )
                .unwrap()
        })
    });
}

fn benchmark_precheck_hit(c: &mut Criterion) {
    let operations: NamedExclusiveSingleOperations<usize, ()> =
        NamedExclusiveSingleOperations::new();

    c.bench_function("exclusive_precheck_hit", |b| {
        b.iter(|| {
            operations
                .exclusive_execution(
                    black_box("com.example.Widget"),
                    |name| Some(name.len()),
                    |_, ()| Err(()),
                    (),
                )
                .unwrap()
        })
    });
}

fn benchmark_aggregate(c: &mut Criterion) {
    let memory = InMemoryRuntime::new();
    memory
        .define_module("java.base", &["java.lang", "java.util", "java.io"])
        .unwrap();
    memory.define_module("other.module", &["org.other"]).unwrap();
    let loader = memory.new_loader("app");
    let runtime: Arc<dyn ModuleRuntime> = Arc::new(memory);

    let requests: Vec<ModuleOpenRequest> = ["java.lang", "java.util", "java.io"]
        .iter()
        .flat_map(|package| {
            [
                ModuleOpenRequest::to_all_unnamed("java.base", [*package]).unwrap(),
                ModuleOpenRequest::new("java.base", "other.module", [*package]).unwrap(),
            ]
        })
        .collect();

    c.bench_function("aggregate_open_instructions", |b| {
        b.iter(|| {
            let context = ClassloaderModuleContext::new(Arc::clone(&runtime), &loader);
            black_box(AggregatedOpenInstructions::aggregate(black_box(&requests), &context))
        })
    });
}

criterion_group!(
    benches,
    benchmark_uncontended_produce,
    benchmark_precheck_hit,
    benchmark_aggregate
);
criterion_main!(benches);

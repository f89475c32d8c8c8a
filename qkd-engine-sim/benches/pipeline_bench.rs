use bb84::prelude::ProtocolKind;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use qkd_engine_sim::config::{LabParameters, SimulationParameters, SimulationRequest};
use qkd_engine_sim::engine::SimulationOrchestrator;
use qkd_engine_sim::lab::LabSimulator;
use qkd_engine_sim::metrics;

fn benchmark_single_run(c: &mut Criterion) {
    let orchestrator = SimulationOrchestrator::new();
    let mut group = c.benchmark_group("single_run");
    for n in [64usize, 1024, 16_384] {
        let request = SimulationRequest::auto(n).with_seed(1);
        group.bench_with_input(BenchmarkId::from_parameter(n), &request, |b, request| {
            b.iter(|| orchestrator.run(black_box(request)))
        });
    }
    group.finish();

    for kind in ProtocolKind::ALL {
        let request = SimulationRequest::auto(1024).with_seed(2).with_parameters(SimulationParameters {
            protocol_variant: kind,
            ..SimulationParameters::default()
        });
        c.bench_function(&format!("run_1k_{:?}", kind), |b| b.iter(|| orchestrator.run(black_box(&request))));
    }
}

fn benchmark_metrics(c: &mut Criterion) {
    let result = SimulationOrchestrator::new()
        .run(&SimulationRequest::auto(4096).with_seed(3))
        .unwrap();
    c.bench_function("metrics_4k", |b| b.iter(|| metrics::compute(black_box(&result))));
}

fn benchmark_lab(c: &mut Criterion) {
    let sim = LabSimulator::new(LabParameters::default()).unwrap();
    c.bench_function("lab_10k_photons", |b| b.iter(|| sim.run(black_box(10_000), Some(4))));
}

criterion_group!(benches, benchmark_single_run, benchmark_metrics, benchmark_lab);
criterion_main!(benches);

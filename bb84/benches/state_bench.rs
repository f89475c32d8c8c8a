use bb84::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn benchmark_photon_operations(c: &mut Criterion) {
    let variant = StandardBb84::default();
    let detector = DetectorModel::ideal();

    c.bench_function("prepare_photon", |b| {
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| variant.prepare(black_box(true), &mut rng));
    });

    c.bench_function("measure_photon", |b| {
        let mut rng = StdRng::seed_from_u64(2);
        let photon = variant.prepare(true, &mut rng);
        b.iter(|| variant.measure(black_box(&photon), &detector, &mut rng));
    });

    c.bench_function("channel_transmit_1k", |b| {
        let mut rng = StdRng::seed_from_u64(3);
        let bits: Vec<bool> = (0..1000).map(|_| rng.gen()).collect();
        let channel = ChannelModel::new(10_000.0, 0.05);
        b.iter(|| channel.transmit(black_box(&bits), &mut rng));
    });
}

fn benchmark_post_processing(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(4);
    let alice: Vec<bool> = (0..1024).map(|_| rng.gen()).collect();
    let bob: Vec<bool> = alice.iter().map(|&b| b ^ (rng.gen::<f64>() < 0.05)).collect();

    c.bench_function("cascade_1k", |b| {
        b.iter(|| reconcile(ErrorCorrectionMethod::Cascade, black_box(&alice), black_box(&bob)))
    });

    c.bench_function("winnow_1k", |b| {
        b.iter(|| reconcile(ErrorCorrectionMethod::Winnow, black_box(&alice), black_box(&bob)))
    });

    c.bench_function("toeplitz_1k", |b| {
        b.iter(|| amplify(PrivacyAmplificationMethod::Toeplitz, black_box(&alice), 0.5, 7))
    });
}

criterion_group!(benches, benchmark_photon_operations, benchmark_post_processing);
criterion_main!(benches);

//! Per-effect runtime throughput

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pf_core::ProcessSpec;
use pf_engine::{EffectKind, EffectRuntime, create_effect};

const BLOCK: usize = 256;

fn bench_effects(c: &mut Criterion) {
    let mut group = c.benchmark_group("effect_stereo_256");
    let source: Vec<f64> = (0..BLOCK).map(|i| (i as f64 * 0.03).sin() * 0.5).collect();

    for kind in EffectKind::ALL {
        let mut runtime = EffectRuntime::new(create_effect(kind));
        runtime.prepare(ProcessSpec::new(48000.0, BLOCK));
        let mut left = source.clone();
        let mut right = source.clone();

        group.bench_with_input(BenchmarkId::from_parameter(format!("{kind:?}")), &kind, |b, _| {
            b.iter(|| {
                left.copy_from_slice(&source);
                right.copy_from_slice(&source);
                runtime.process_stereo(black_box(&mut left), black_box(&mut right));
            })
        });
    }
    group.finish();
}

fn bench_mono_path(c: &mut Criterion) {
    let mut runtime = EffectRuntime::new(create_effect(EffectKind::Chorus));
    runtime.prepare(ProcessSpec::new(48000.0, BLOCK));
    let source: Vec<f64> = (0..BLOCK).map(|i| (i as f64 * 0.03).sin() * 0.5).collect();
    let mut buffer = source.clone();

    c.bench_function("chorus_mono_256", |b| {
        b.iter(|| {
            buffer.copy_from_slice(&source);
            runtime.process(black_box(&mut buffer));
        })
    });
}

criterion_group!(benches, bench_effects, bench_mono_path);
criterion_main!(benches);

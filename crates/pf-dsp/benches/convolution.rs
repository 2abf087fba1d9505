//! Partitioned convolution benchmarks

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pf_dsp::convolution::BlockConvolver;

fn impulse_response(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| (-(i as f64) / (len as f64 * 0.2)).exp() * ((i * 7919) % 17) as f64 / 17.0)
        .collect()
}

fn bench_block_convolver(c: &mut Criterion) {
    let mut group = c.benchmark_group("block_convolver");
    let block = 256;
    let input: Vec<f64> = (0..block).map(|i| (i as f64 * 0.05).sin()).collect();
    let mut output = vec![0.0; block];

    for &ir_len in &[512usize, 4096, 48_000] {
        let mut conv = BlockConvolver::with_ir(&impulse_response(ir_len), block);
        group.bench_with_input(BenchmarkId::from_parameter(ir_len), &ir_len, |b, _| {
            b.iter(|| conv.process_block(black_box(&input), black_box(&mut output)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_block_convolver);
criterion_main!(benches);

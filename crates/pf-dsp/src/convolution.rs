//! Uniform partitioned FFT convolution
//!
//! The IR is cut into `block_size` segments, each transformed once at
//! prepare time (FFT size `2·block_size`, RealFFT half spectra). Every
//! input block is transformed once, pushed into a frequency-domain delay
//! line, multiply-accumulated against all partitions, inverse transformed
//! and overlap-added. FFT cost per block does not depend on IR length.
//!
//! Streaming through `process_sample` buffers one block, so latency is
//! exactly `block_size` for any IR length. With no IR loaded the
//! convolver passes the dry signal (with the same latency when streaming).

use std::sync::Arc;

use pf_core::{ImpulseResponse, Sample};
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;

use crate::{Processor, StereoProcessor};

// ============ Constants ============

pub const MIN_BLOCK_SIZE: usize = 16;
pub const MAX_BLOCK_SIZE: usize = 8192;
pub const DEFAULT_BLOCK_SIZE: usize = 256;

const ZERO: Complex<f64> = Complex { re: 0.0, im: 0.0 };

// ============ Partitioned IR ============

/// Frequency-domain IR segments for one channel
struct PartitionedIr {
    spectra: Vec<Vec<Complex<f64>>>,
    ir_len: usize,
}

impl PartitionedIr {
    fn new(ir: &[Sample], block_size: usize, forward: &Arc<dyn RealToComplex<f64>>) -> Self {
        let fft_size = block_size * 2;
        let mut padded = forward.make_input_vec();
        let mut scratch = forward.make_scratch_vec();

        let spectra = ir
            .chunks(block_size)
            .map(|segment| {
                padded.fill(0.0);
                padded[..segment.len()].copy_from_slice(segment);
                let mut spectrum = vec![ZERO; fft_size / 2 + 1];
                let result = forward.process_with_scratch(&mut padded, &mut spectrum, &mut scratch);
                debug_assert!(result.is_ok(), "IR segment FFT length mismatch");
                spectrum
            })
            .collect();

        Self {
            spectra,
            ir_len: ir.len(),
        }
    }

    #[inline]
    fn len(&self) -> usize {
        self.spectra.len()
    }
}

// ============ Block Convolver ============

/// Single-channel uniform partitioned convolver
pub struct BlockConvolver {
    block_size: usize,
    forward: Arc<dyn RealToComplex<f64>>,
    inverse: Arc<dyn ComplexToReal<f64>>,
    ir: Option<PartitionedIr>,
    /// Frequency delay line: spectra of the most recent input blocks
    fdl: Vec<Vec<Complex<f64>>>,
    fdl_pos: usize,
    time_buf: Vec<f64>,
    accum: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
    overlap: Vec<f64>,
    input_fifo: Vec<f64>,
    output_fifo: Vec<f64>,
    fifo_pos: usize,
}

impl BlockConvolver {
    /// Unloaded convolver (dry passthrough) for `block_size`.
    pub fn new(block_size: usize) -> Self {
        let block_size = block_size.clamp(MIN_BLOCK_SIZE, MAX_BLOCK_SIZE);
        let fft_size = block_size * 2;

        let mut planner = RealFftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);
        let scratch_len = forward.get_scratch_len().max(inverse.get_scratch_len());

        Self {
            block_size,
            forward,
            inverse,
            ir: None,
            fdl: Vec::new(),
            fdl_pos: 0,
            time_buf: vec![0.0; fft_size],
            accum: vec![ZERO; fft_size / 2 + 1],
            scratch: vec![ZERO; scratch_len],
            overlap: vec![0.0; block_size],
            input_fifo: vec![0.0; block_size],
            output_fifo: vec![0.0; block_size],
            fifo_pos: 0,
        }
    }

    /// Convolver loaded with `ir`, partitioned at `block_size`.
    pub fn with_ir(ir: &[Sample], block_size: usize) -> Self {
        let mut convolver = Self::new(block_size);
        convolver.load(ir);
        convolver
    }

    /// Partition `ir` at `block_size` (allocates: call off the audio
    /// thread). Replaces any previous IR and clears all history.
    pub fn prepare(&mut self, ir: &[Sample], block_size: usize) {
        let block_size = block_size.clamp(MIN_BLOCK_SIZE, MAX_BLOCK_SIZE);
        if block_size != self.block_size {
            *self = Self::new(block_size);
        }
        self.load(ir);
    }

    fn load(&mut self, ir: &[Sample]) {
        if ir.is_empty() {
            self.unload();
            return;
        }
        let partitioned = PartitionedIr::new(ir, self.block_size, &self.forward);
        log::debug!(
            "partitioned {} IR samples into {} blocks of {}",
            partitioned.ir_len,
            partitioned.len(),
            self.block_size
        );

        let bins = self.block_size + 1;
        self.fdl = vec![vec![ZERO; bins]; partitioned.len()];
        self.ir = Some(partitioned);
        self.reset();
    }

    /// Back to dry passthrough.
    pub fn unload(&mut self) {
        self.ir = None;
        self.fdl.clear();
        self.reset();
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.ir.is_some()
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Latency of the streaming path; independent of IR length.
    #[inline]
    pub fn latency_samples(&self) -> usize {
        self.block_size
    }

    /// Number of IR partitions (0 when unloaded)
    pub fn num_partitions(&self) -> usize {
        self.ir.as_ref().map_or(0, PartitionedIr::len)
    }

    /// Convolve `input_fifo` into `output_fifo`.
    fn convolve(&mut self) {
        let Some(ir) = &self.ir else {
            self.output_fifo.copy_from_slice(&self.input_fifo);
            return;
        };
        let b = self.block_size;
        let partitions = ir.len();

        self.time_buf[..b].copy_from_slice(&self.input_fifo);
        self.time_buf[b..].fill(0.0);
        let result = self.forward.process_with_scratch(
            &mut self.time_buf,
            &mut self.fdl[self.fdl_pos],
            &mut self.scratch,
        );
        debug_assert!(result.is_ok(), "forward FFT length mismatch");

        self.accum.fill(ZERO);
        for (j, h) in ir.spectra.iter().enumerate() {
            let slot = (self.fdl_pos + partitions - j) % partitions;
            for ((acc, x), h) in self.accum.iter_mut().zip(&self.fdl[slot]).zip(h) {
                *acc += x * h;
            }
        }
        // DC and Nyquist bins of a real signal are real
        self.accum[0].im = 0.0;
        self.accum[b].im = 0.0;

        let result = self
            .inverse
            .process_with_scratch(&mut self.accum, &mut self.time_buf, &mut self.scratch);
        debug_assert!(result.is_ok(), "inverse FFT length mismatch");

        let scale = 1.0 / (2 * b) as f64;
        for i in 0..b {
            self.output_fifo[i] = self.time_buf[i] * scale + self.overlap[i];
            self.overlap[i] = self.time_buf[b + i] * scale;
        }

        self.fdl_pos = (self.fdl_pos + 1) % partitions;
    }

    /// Convolve exactly one block with no added latency. `input` and
    /// `output` must be `block_size` long; a streaming instance should not
    /// mix this with `process_sample`.
    pub fn process_block(&mut self, input: &[Sample], output: &mut [Sample]) {
        debug_assert_eq!(input.len(), self.block_size);
        debug_assert_eq!(output.len(), self.block_size);
        let n = input.len().min(output.len()).min(self.block_size);

        self.input_fifo[..n].copy_from_slice(&input[..n]);
        self.input_fifo[n..].fill(0.0);
        self.convolve();
        output[..n].copy_from_slice(&self.output_fifo[..n]);
    }

    /// Streaming convolution, `block_size` samples of latency.
    #[inline]
    pub fn process_sample(&mut self, input: Sample) -> Sample {
        self.input_fifo[self.fifo_pos] = input;
        let output = self.output_fifo[self.fifo_pos];
        self.fifo_pos += 1;
        if self.fifo_pos == self.block_size {
            self.convolve();
            self.fifo_pos = 0;
        }
        output
    }

    /// Clear all history, keep the IR.
    pub fn reset(&mut self) {
        for spectrum in &mut self.fdl {
            spectrum.fill(ZERO);
        }
        self.fdl_pos = 0;
        self.overlap.fill(0.0);
        self.input_fifo.fill(0.0);
        self.output_fifo.fill(0.0);
        self.fifo_pos = 0;
    }
}

// ============ Stereo Convolver ============

/// Two streaming convolvers fed from one (mono or stereo) IR
pub struct StereoConvolver {
    left: BlockConvolver,
    right: BlockConvolver,
}

impl StereoConvolver {
    /// Unloaded (dry) pair
    pub fn new(block_size: usize) -> Self {
        Self {
            left: BlockConvolver::new(block_size),
            right: BlockConvolver::new(block_size),
        }
    }

    /// Channel 0 drives left; channel 1 (or channel 0 again for mono IRs)
    /// drives right.
    pub fn with_ir(ir: &ImpulseResponse, block_size: usize) -> Self {
        Self {
            left: BlockConvolver::with_ir(ir.channel(0), block_size),
            right: BlockConvolver::with_ir(ir.channel(1), block_size),
        }
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.left.is_loaded()
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.left.block_size()
    }

    #[inline]
    pub fn latency_samples(&self) -> usize {
        self.left.latency_samples()
    }
}

impl Processor for StereoConvolver {
    fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }

    fn latency(&self) -> usize {
        self.latency_samples()
    }
}

impl StereoProcessor for StereoConvolver {
    #[inline]
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        (
            self.left.process_sample(left),
            self.right.process_sample(right),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct_convolution(x: &[f64], h: &[f64]) -> Vec<f64> {
        let mut y = vec![0.0; x.len()];
        for n in 0..x.len() {
            for (k, &hk) in h.iter().enumerate() {
                if k <= n {
                    y[n] += hk * x[n - k];
                }
            }
        }
        y
    }

    fn test_signal(len: usize) -> Vec<f64> {
        let mut state = 12345u32;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1103515245).wrapping_add(12345);
                (state >> 16) as f64 / 32768.0 - 1.0
            })
            .collect()
    }

    #[test]
    fn test_unloaded_block_is_dry() {
        let mut conv = BlockConvolver::new(64);
        let input = test_signal(64);
        let mut output = vec![0.0; 64];
        conv.process_block(&input, &mut output);
        assert_eq!(input, output);
        assert!(!conv.is_loaded());
    }

    #[test]
    fn test_block_matches_direct_convolution() {
        let block = 32;
        let ir = test_signal(100);
        let input = test_signal(block * 10);
        let expected = direct_convolution(&input, &ir);

        let mut conv = BlockConvolver::with_ir(&ir, block);
        assert_eq!(conv.num_partitions(), 4);

        let mut output = vec![0.0; input.len()];
        for (inp, out) in input.chunks(block).zip(output.chunks_mut(block)) {
            conv.process_block(inp, out);
        }
        for (a, b) in output.iter().zip(&expected) {
            assert!((a - b).abs() < 1e-9, "{a} vs {b}");
        }
    }

    #[test]
    fn test_reprepare_at_any_block_size_matches_direct() {
        let ir = test_signal(150);
        let mut conv = BlockConvolver::new(16);
        for block in [16, 48, 100, 16] {
            conv.prepare(&ir, block);
            let input = test_signal(block * 6);
            let expected = direct_convolution(&input, &ir);

            let mut output = vec![0.0; input.len()];
            for (inp, out) in input.chunks(block).zip(output.chunks_mut(block)) {
                conv.process_block(inp, out);
            }
            for (a, b) in output.iter().zip(&expected) {
                assert!((a - b).abs() < 1e-9, "block {block}: {a} vs {b}");
            }
        }
    }

    #[test]
    fn test_streaming_latency_is_block_size() {
        let block = 64;
        let mut conv = BlockConvolver::with_ir(&[1.0], block);
        let input = test_signal(block * 6);
        let output: Vec<f64> = input.iter().map(|&x| conv.process_sample(x)).collect();

        assert!(output[..block].iter().all(|&v| v == 0.0));
        for i in 0..input.len() - block {
            assert!((output[i + block] - input[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_block_size_clamped() {
        assert_eq!(BlockConvolver::new(1).block_size(), MIN_BLOCK_SIZE);
        assert_eq!(BlockConvolver::new(1 << 20).block_size(), MAX_BLOCK_SIZE);
    }

    #[test]
    fn test_reset_clears_tail() {
        let mut conv = BlockConvolver::with_ir(&test_signal(200), 16);
        for x in test_signal(100) {
            conv.process_sample(x);
        }
        conv.reset();
        for _ in 0..400 {
            assert_eq!(conv.process_sample(0.0), 0.0);
        }
    }

    #[test]
    fn test_stereo_uses_mono_ir_for_both_sides() {
        let ir = ImpulseResponse::mono(vec![0.5], 48000.0);
        let mut conv = StereoConvolver::with_ir(&ir, 16);
        let mut last = (0.0, 0.0);
        for i in 0..32 {
            let x = if i == 0 { 1.0 } else { 0.0 };
            let out = conv.process_sample(x, -x);
            if i == 16 {
                last = out;
            }
        }
        assert!((last.0 - 0.5).abs() < 1e-12);
        assert!((last.1 + 0.5).abs() < 1e-12);
    }
}

//! WAV decoding via hound
//!
//! Integer PCM of any width hound accepts (8/16/24/32) is scaled by
//! `2^(bits-1)`; 32-bit float is taken as is. Samples come back
//! deinterleaved, one `Vec` per channel.

use std::io::Read;
use std::path::Path;

use pf_core::Sample;

use crate::error::{FileError, FileResult};

/// Source encoding of a decoded file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    Int8,
    Int16,
    Int24,
    Int32,
    Float32,
}

impl BitDepth {
    pub fn bits(self) -> u16 {
        match self {
            BitDepth::Int8 => 8,
            BitDepth::Int16 => 16,
            BitDepth::Int24 => 24,
            BitDepth::Int32 | BitDepth::Float32 => 32,
        }
    }

    fn from_spec(spec: &hound::WavSpec) -> FileResult<Self> {
        match (spec.bits_per_sample, spec.sample_format) {
            (8, hound::SampleFormat::Int) => Ok(BitDepth::Int8),
            (16, hound::SampleFormat::Int) => Ok(BitDepth::Int16),
            (24, hound::SampleFormat::Int) => Ok(BitDepth::Int24),
            (32, hound::SampleFormat::Int) => Ok(BitDepth::Int32),
            (32, hound::SampleFormat::Float) => Ok(BitDepth::Float32),
            (bits, format) => Err(FileError::UnsupportedFormat(format!(
                "{bits}-bit {format:?}"
            ))),
        }
    }
}

/// Decoded audio, deinterleaved
#[derive(Debug, Clone)]
pub struct WavData {
    pub channels: Vec<Vec<Sample>>,
    pub sample_rate: u32,
    pub bit_depth: BitDepth,
}

impl WavData {
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn num_frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }
}

/// Read a WAV file from disk
pub fn read_wav<P: AsRef<Path>>(path: P) -> FileResult<WavData> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(FileError::NotFound(path.display().to_string()));
    }
    let reader = hound::WavReader::open(path)?;
    decode(reader)
}

/// Read WAV data from any byte source
pub fn read_wav_from<R: Read>(source: R) -> FileResult<WavData> {
    let reader = hound::WavReader::new(source)?;
    decode(reader)
}

fn decode<R: Read>(reader: hound::WavReader<R>) -> FileResult<WavData> {
    let spec = reader.spec();
    let bit_depth = BitDepth::from_spec(&spec)?;
    let num_channels = spec.channels as usize;
    if num_channels == 0 {
        return Err(FileError::InvalidFile("zero channels".into()));
    }
    if spec.sample_rate == 0 {
        return Err(FileError::InvalidFile("zero sample rate".into()));
    }

    let interleaved: Vec<Sample> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(|v| v as f64))
            .collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1u64 << (spec.bits_per_sample - 1)) as f64;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f64 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    let num_frames = interleaved.len() / num_channels;
    let mut channels = vec![Vec::with_capacity(num_frames); num_channels];
    for frame in interleaved.chunks_exact(num_channels) {
        for (channel, &sample) in channels.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }

    Ok(WavData {
        channels,
        sample_rate: spec.sample_rate,
        bit_depth,
    })
}

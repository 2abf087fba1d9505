//! Immutable impulse response shared between effect instances
//!
//! Loaded and conditioned on a control thread, then handed to effects as an
//! `Arc<ImpulseResponse>`. Nothing mutates it after construction.

use crate::Sample;

/// Multichannel impulse response at a fixed sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseResponse {
    channels: Vec<Vec<Sample>>,
    sample_rate: f64,
}

impl ImpulseResponse {
    /// Channels shorter than the longest are zero-padded. Empty input yields
    /// a single silent sample so partitioning always has one block.
    pub fn new(mut channels: Vec<Vec<Sample>>, sample_rate: f64) -> Self {
        if channels.is_empty() {
            channels.push(Vec::new());
        }
        let len = channels.iter().map(Vec::len).max().unwrap_or(0).max(1);
        for channel in &mut channels {
            channel.resize(len, 0.0);
            for s in channel.iter_mut() {
                if !s.is_finite() {
                    *s = 0.0;
                }
            }
        }

        Self {
            channels,
            sample_rate,
        }
    }

    pub fn mono(samples: Vec<Sample>, sample_rate: f64) -> Self {
        Self::new(vec![samples], sample_rate)
    }

    /// Length-1 unit impulse (identity convolution)
    pub fn unit_impulse(sample_rate: f64) -> Self {
        Self::mono(vec![1.0], sample_rate)
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Length in samples (all channels share it)
    #[inline]
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Channel `index`, falling back to the last channel so a mono IR
    /// serves both sides of a stereo effect.
    #[inline]
    pub fn channel(&self, index: usize) -> &[Sample] {
        let last = self.channels.len() - 1;
        &self.channels[index.min(last)]
    }

    pub fn channels(&self) -> &[Vec<Sample>] {
        &self.channels
    }

    pub fn into_channels(self) -> Vec<Vec<Sample>> {
        self.channels
    }

    /// Absolute peak across all channels
    pub fn peak(&self) -> Sample {
        self.channels
            .iter()
            .flat_map(|c| c.iter())
            .fold(0.0, |peak: Sample, &s| peak.max(s.abs()))
    }

    /// True when every sample is zero. Convolving with it would mute the
    /// signal, so loaders reject such IRs.
    pub fn is_silent(&self) -> bool {
        self.peak() == 0.0
    }

    /// Scale so the absolute peak equals `target`. Silent IRs are returned
    /// unchanged.
    pub fn normalized_to_peak(mut self, target: Sample) -> Self {
        let peak = self.peak();
        if peak > 0.0 {
            let gain = target / peak;
            for channel in &mut self.channels {
                for s in channel.iter_mut() {
                    *s *= gain;
                }
            }
        }
        self
    }

    /// Length in seconds
    pub fn duration_secs(&self) -> f64 {
        self.len() as f64 / self.sample_rate
    }
}

//! Sample types

/// Type alias for audio samples (always f64 for maximum precision)
pub type Sample = f64;

/// Stereo sample pair
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    #[inline]
    pub const fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    #[inline]
    pub const fn mono(value: Sample) -> Self {
        Self {
            left: value,
            right: value,
        }
    }

    /// Mid (average) of both channels
    #[inline]
    pub fn mid(self) -> Sample {
        (self.left + self.right) * 0.5
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.left.is_finite() && self.right.is_finite()
    }
}

/// True when every sample in the slice is exactly zero.
#[inline]
pub fn is_silent(block: &[Sample]) -> bool {
    block.iter().all(|&s| s == 0.0)
}

/// True when every sample in the slice is finite.
#[inline]
pub fn all_finite(block: &[Sample]) -> bool {
    block.iter().all(|s| s.is_finite())
}

//! In-memory waveform shared by every pipeline stage
//!
//! The pipeline works on mono, 16-bit signed PCM only. The channel count and
//! sample width are therefore not stored; they are constants of the type.

use serde::{Deserialize, Serialize};

/// Channel count of every buffer in the pipeline
pub const CHANNELS: u16 = 1;

/// Sample width in bits of every buffer in the pipeline
pub const BITS_PER_SAMPLE: u16 = 16;

/// Mono 16-bit waveform
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioBuffer {
    /// PCM samples
    pub samples: Vec<i16>,

    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a buffer from raw PCM samples
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Create a buffer of `len` zero samples
    pub fn silent(len: usize, sample_rate: u32) -> Self {
        Self::new(vec![0; len], sample_rate)
    }

    /// Build a buffer from normalized f32 samples (-1.0..=1.0), saturating out-of-range values
    pub fn from_f32(samples: &[f32], sample_rate: u32) -> Self {
        Self::new(samples.iter().map(|&s| f32_to_i16(s)).collect(), sample_rate)
    }

    /// Samples normalized to -1.0..1.0
    pub fn to_f32(&self) -> Vec<f32> {
        self.samples.iter().map(|&s| i16_to_f32(s)).collect()
    }

    /// Always mono
    pub fn channels(&self) -> u16 {
        CHANNELS
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Get the duration of this audio in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / self.sample_rate as u64
    }

    /// Number of samples spanned by `ms` milliseconds at this buffer's rate
    pub fn ms_to_samples(&self, ms: f32) -> usize {
        if ms <= 0.0 {
            return 0;
        }
        (ms as f64 * self.sample_rate as f64 / 1000.0).round() as usize
    }

    /// Same sample rate, new samples
    pub fn with_samples(&self, samples: Vec<i16>) -> Self {
        Self::new(samples, self.sample_rate)
    }
}

pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

/// `as` saturates on float-to-int casts, so out-of-range input clips instead of wrapping
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32768.0).round() as i16
}

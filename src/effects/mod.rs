//! Layered voice effects: pitch wobble, reverb, high-pass
//!
//! The chain is deterministic: the same buffer and configuration always
//! produce the same samples.

pub mod filter;
pub mod pitch;
pub mod reverb;

pub use pitch::PitchShifter;

use crate::audio::AudioBuffer;
use crate::{Result, VoiceError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Parameters of the effects chain
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsConfig {
    /// Samples per independently pitch-shifted chunk
    pub chunk_size: usize,

    /// Divisor applied to the chunk offset before taking its sine
    pub wobble_period: f64,

    /// Peak pitch deviation in octaves
    pub wobble_depth_octaves: f64,

    /// Base echo delay in milliseconds
    pub reverb_delay_ms: f32,

    /// Attenuation per echo tap in decibels
    pub reverb_decay_db: f32,

    /// High-pass cutoff in Hz
    pub high_pass_cutoff_hz: f32,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            wobble_period: 100.0,
            wobble_depth_octaves: 0.1,
            reverb_delay_ms: 20.0,
            reverb_decay_db: 0.05,
            high_pass_cutoff_hz: 1000.0,
        }
    }
}

impl EffectsConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(VoiceError::ConfigError(
                "Effects chunk size must be greater than 0".into(),
            ));
        }
        if !(self.wobble_period.is_finite() && self.wobble_period > 0.0) {
            return Err(VoiceError::ConfigError(format!(
                "Wobble period must be positive, got {}",
                self.wobble_period
            )));
        }
        if !self.wobble_depth_octaves.is_finite() {
            return Err(VoiceError::ConfigError("Wobble depth must be finite".into()));
        }
        if !(self.reverb_delay_ms.is_finite() && self.reverb_delay_ms >= 0.0) {
            return Err(VoiceError::ConfigError(format!(
                "Reverb delay must be non-negative, got {}",
                self.reverb_delay_ms
            )));
        }
        if !self.reverb_decay_db.is_finite() {
            return Err(VoiceError::ConfigError("Reverb decay must be finite".into()));
        }
        if !(self.high_pass_cutoff_hz.is_finite() && self.high_pass_cutoff_hz > 0.0) {
            return Err(VoiceError::ConfigError(format!(
                "High-pass cutoff must be positive, got {}",
                self.high_pass_cutoff_hz
            )));
        }
        Ok(())
    }

    /// Pitch shift in octaves for the chunk starting at sample `offset`
    pub fn wobble_octaves(&self, offset: usize) -> f64 {
        (offset as f64 / self.wobble_period).sin() * self.wobble_depth_octaves
    }
}

/// Applies pitch wobble, reverb and high-pass filtering, in that order
pub struct EffectsEngine {
    config: EffectsConfig,
    shifter: PitchShifter,
}

impl EffectsEngine {
    pub fn new(config: EffectsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            shifter: PitchShifter::new(),
        })
    }

    pub fn config(&self) -> &EffectsConfig {
        &self.config
    }

    /// Run the full chain
    pub fn process(&self, input: &AudioBuffer) -> Result<AudioBuffer> {
        if input.sample_rate == 0 {
            return Err(VoiceError::EffectsError(
                "Input buffer has a zero sample rate".into(),
            ));
        }
        if input.is_empty() {
            return Ok(input.clone());
        }

        let wobbled = self.pitch_wobble(input)?;
        let reverberated = self.reverb(&wobbled);
        let filtered = self.high_pass(&reverberated)?;

        debug!(
            "Applied effects to {} samples at {} Hz",
            filtered.len(),
            filtered.sample_rate
        );
        Ok(filtered)
    }

    /// Shift each chunk by its own amount and concatenate the results
    pub fn pitch_wobble(&self, input: &AudioBuffer) -> Result<AudioBuffer> {
        let chunk_size = self.config.chunk_size;
        let mut output = Vec::with_capacity(input.len());

        for (index, chunk) in input.samples.chunks(chunk_size).enumerate() {
            let octaves = self.config.wobble_octaves(index * chunk_size);
            let semitones = (12.0 * octaves) as f32;

            let block = AudioBuffer::new(chunk.to_vec(), input.sample_rate).to_f32();
            let shifted = self.shifter.shift(&block, semitones)?;
            output.extend(AudioBuffer::from_f32(&shifted, input.sample_rate).samples);
        }

        Ok(input.with_samples(output))
    }

    pub fn reverb(&self, input: &AudioBuffer) -> AudioBuffer {
        reverb::add_reverb(
            input,
            self.config.reverb_delay_ms,
            self.config.reverb_decay_db,
        )
    }

    pub fn high_pass(&self, input: &AudioBuffer) -> Result<AudioBuffer> {
        let filtered = filter::high_pass(
            &input.samples,
            input.sample_rate,
            self.config.high_pass_cutoff_hz,
        )?;
        Ok(input.with_samples(filtered))
    }
}

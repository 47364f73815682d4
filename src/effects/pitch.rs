//! Phase-vocoder pitch shifting
//!
//! A block is time-stretched by `2^(-semitones/12)` in the STFT domain and
//! then resampled back to its original length, which moves the pitch while
//! keeping the duration.

use crate::audio::resampler::resample_to_len;
use crate::{Result, VoiceError};
use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// STFT frame length
pub const FRAME_LEN: usize = 256;

/// STFT hop (quarter frame)
pub const HOP_LEN: usize = 64;

/// Blocks shorter than this are passed through unchanged
pub const MIN_SHIFT_LEN: usize = 32;

/// Shifts below this many semitones are treated as no shift
const SEMITONE_EPSILON: f32 = 1e-6;

/// Phase-vocoder pitch shifter with cached FFT plans
pub struct PitchShifter {
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
}

impl Default for PitchShifter {
    fn default() -> Self {
        Self::new()
    }
}

impl PitchShifter {
    pub fn new() -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(FRAME_LEN);
        let inverse = planner.plan_fft_inverse(FRAME_LEN);

        // Periodic Hann
        let window = (0..FRAME_LEN)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / FRAME_LEN as f32).cos())
            .collect();

        Self {
            forward,
            inverse,
            window,
        }
    }

    /// Shift `samples` by `semitones`, returning a block of the same length
    pub fn shift(&self, samples: &[f32], semitones: f32) -> Result<Vec<f32>> {
        if !semitones.is_finite() {
            return Err(VoiceError::EffectsError(format!(
                "Invalid pitch shift: {} semitones",
                semitones
            )));
        }

        let n = samples.len();
        if n < MIN_SHIFT_LEN || semitones.abs() < SEMITONE_EPSILON {
            return Ok(samples.to_vec());
        }

        let rate = 2f32.powf(-semitones / 12.0);
        let stretched = self.time_stretch(samples, rate);
        let shifted = resample_to_len(&stretched, rate as f64, n)?;

        if shifted.iter().any(|s| !s.is_finite()) {
            return Err(VoiceError::EffectsError(
                "Pitch shift produced non-finite samples".into(),
            ));
        }

        Ok(shifted)
    }

    /// Change duration by `1 / rate` without changing pitch
    pub fn time_stretch(&self, samples: &[f32], rate: f32) -> Vec<f32> {
        let target_len = (samples.len() as f32 / rate).round() as usize;
        let spectrum = self.stft(samples);
        let stretched = phase_vocoder(&spectrum, rate);
        self.istft(&stretched, target_len)
    }

    /// Centered STFT, keeping bins 0..=FRAME_LEN/2
    fn stft(&self, samples: &[f32]) -> Vec<Vec<Complex32>> {
        let pad = FRAME_LEN / 2;
        let n_frames = 1 + samples.len().div_ceil(HOP_LEN);
        let padded_len = (n_frames - 1) * HOP_LEN + FRAME_LEN;

        let mut padded = vec![0.0f32; padded_len];
        padded[pad..pad + samples.len()].copy_from_slice(samples);

        let bins = FRAME_LEN / 2 + 1;
        let mut frames = Vec::with_capacity(n_frames);
        let mut buffer = vec![Complex32::new(0.0, 0.0); FRAME_LEN];

        for frame in 0..n_frames {
            let start = frame * HOP_LEN;
            for (i, slot) in buffer.iter_mut().enumerate() {
                *slot = Complex32::new(padded[start + i] * self.window[i], 0.0);
            }
            self.forward.process(&mut buffer);
            frames.push(buffer[..bins].to_vec());
        }

        frames
    }

    /// Overlap-add inverse STFT normalized by the summed squared window
    fn istft(&self, frames: &[Vec<Complex32>], target_len: usize) -> Vec<f32> {
        let pad = FRAME_LEN / 2;
        if frames.is_empty() {
            return vec![0.0; target_len];
        }

        let total = (frames.len() - 1) * HOP_LEN + FRAME_LEN;
        let mut signal = vec![0.0f32; total];
        let mut window_sum = vec![0.0f32; total];
        let mut buffer = vec![Complex32::new(0.0, 0.0); FRAME_LEN];
        let scale = 1.0 / FRAME_LEN as f32;

        for (index, bins) in frames.iter().enumerate() {
            // Rebuild the full spectrum from the non-negative bins
            for (k, slot) in buffer.iter_mut().enumerate() {
                *slot = if k < bins.len() {
                    bins[k]
                } else {
                    bins[FRAME_LEN - k].conj()
                };
            }
            self.inverse.process(&mut buffer);

            let start = index * HOP_LEN;
            for i in 0..FRAME_LEN {
                let w = self.window[i];
                signal[start + i] += buffer[i].re * scale * w;
                window_sum[start + i] += w * w;
            }
        }

        for (sample, &norm) in signal.iter_mut().zip(window_sum.iter()) {
            if norm > 1e-8 {
                *sample /= norm;
            }
        }

        let mut output: Vec<f32> = signal.into_iter().skip(pad).take(target_len).collect();
        output.resize(target_len, 0.0);
        output
    }
}

/// Resample STFT frames in time by `rate`, keeping phase continuity per bin
fn phase_vocoder(frames: &[Vec<Complex32>], rate: f32) -> Vec<Vec<Complex32>> {
    if frames.is_empty() {
        return Vec::new();
    }

    let bins = frames[0].len();
    let zero = vec![Complex32::new(0.0, 0.0); bins];

    // Expected phase advance of each bin over one hop
    let phase_advance: Vec<f32> = (0..bins)
        .map(|k| 2.0 * PI * HOP_LEN as f32 * k as f32 / FRAME_LEN as f32)
        .collect();

    let mut phase_acc: Vec<f32> = frames[0].iter().map(|c| c.arg()).collect();
    let mut output = Vec::new();

    let mut step = 0.0f32;
    while step < frames.len() as f32 {
        let index = step.floor() as usize;
        let alpha = step - index as f32;
        let left = frames.get(index).unwrap_or(&zero);
        let right = frames.get(index + 1).unwrap_or(&zero);

        let mut frame = Vec::with_capacity(bins);
        for k in 0..bins {
            let magnitude = (1.0 - alpha) * left[k].norm() + alpha * right[k].norm();
            frame.push(Complex32::from_polar(magnitude, phase_acc[k]));

            let mut delta = right[k].arg() - left[k].arg() - phase_advance[k];
            delta -= 2.0 * PI * (delta / (2.0 * PI)).round();
            phase_acc[k] += phase_advance[k] + delta;
        }
        output.push(frame);

        step += rate;
    }

    output
}

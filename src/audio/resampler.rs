use crate::{Result, VoiceError};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Upper bound on zero-fed flush passes while draining the resampler's delay line
const MAX_FLUSH_PASSES: usize = 256;

/// One-shot sinc resampler for short mono blocks
///
/// Pitch shifting resamples every chunk by a slightly different ratio, so the
/// resampler is sized to the block, fed once, then flushed with silence until
/// its output delay has been drained.
pub struct AudioResampler {
    resampler: SincFixedIn<f32>,
    ratio: f64,
}

impl AudioResampler {
    /// Create a resampler for a block of `frames` samples
    ///
    /// # Arguments
    /// * `ratio` - Output rate divided by input rate
    /// * `frames` - Exact length of the block that will be resampled
    pub fn new(ratio: f64, frames: usize) -> Result<Self> {
        if !(ratio.is_finite() && ratio > 0.0) {
            return Err(VoiceError::EffectsError(format!(
                "Invalid resample ratio: {}",
                ratio
            )));
        }

        if frames == 0 {
            return Err(VoiceError::EffectsError(
                "Cannot resample an empty block".into(),
            ));
        }

        // Short sinc: blocks are a few hundred samples, so a long filter would
        // mostly see the zero padding
        let params = SincInterpolationParameters {
            sinc_len: 64,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 128,
            window: WindowFunction::BlackmanHarris2,
        };

        let resampler = SincFixedIn::<f32>::new(ratio, 1.1, params, frames, 1).map_err(|e| {
            VoiceError::EffectsError(format!("Failed to create resampler: {}", e))
        })?;

        Ok(Self { resampler, ratio })
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Resample `input` and return exactly `out_len` samples, delay-compensated
    ///
    /// The output is truncated or zero-padded to `out_len`.
    pub fn resample_to_len(&mut self, input: &[f32], out_len: usize) -> Result<Vec<f32>> {
        let delay = self.resampler.output_delay();
        let needed = delay + out_len;

        let mut collected = self
            .resampler
            .process(&[input], None)
            .map_err(|e| VoiceError::EffectsError(format!("Resampling failed: {}", e)))?
            .swap_remove(0);

        let mut passes = 0;
        while collected.len() < needed && passes < MAX_FLUSH_PASSES {
            let flushed = self
                .resampler
                .process_partial(None::<&[Vec<f32>]>, None)
                .map_err(|e| VoiceError::EffectsError(format!("Resampler flush failed: {}", e)))?;
            collected.extend_from_slice(&flushed[0]);
            passes += 1;
        }

        let mut output: Vec<f32> = collected.into_iter().skip(delay).take(out_len).collect();
        output.resize(out_len, 0.0);
        Ok(output)
    }
}

/// Resample a block by `ratio` into exactly `out_len` samples
pub fn resample_to_len(input: &[f32], ratio: f64, out_len: usize) -> Result<Vec<f32>> {
    if input.is_empty() {
        return Ok(vec![0.0; out_len]);
    }
    AudioResampler::new(ratio, input.len())?.resample_to_len(input, out_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_invalid_ratio_rejected() {
        assert!(AudioResampler::new(0.0, 100).is_err());
        assert!(AudioResampler::new(f64::NAN, 100).is_err());
        assert!(AudioResampler::new(1.0, 0).is_err());
    }

    #[test]
    fn test_exact_output_length() {
        let input: Vec<f32> = (0..500).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        for ratio in [0.93, 1.0, 1.07] {
            let out = resample_to_len(&input, ratio, 500).unwrap();
            assert_eq!(out.len(), 500);
        }
    }

    #[test]
    fn test_unity_ratio_preserves_low_frequency_signal() {
        let input: Vec<f32> = (0..800)
            .map(|i| (2.0 * PI * 200.0 * i as f32 / 16000.0).sin() * 0.5)
            .collect();
        let out = resample_to_len(&input, 1.0, input.len()).unwrap();

        // Edges see the filter ramp; compare the interior only
        for i in 100..700 {
            assert!(
                (out[i] - input[i]).abs() < 0.05,
                "sample {} differs: {} vs {}",
                i,
                out[i],
                input[i]
            );
        }
    }

    #[test]
    fn test_empty_input_yields_silence() {
        let out = resample_to_len(&[], 1.05, 10).unwrap();
        assert_eq!(out, vec![0.0; 10]);
    }
}

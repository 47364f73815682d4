//! First-order high-pass filter over 16-bit PCM

use crate::{Result, VoiceError};

/// First-order RC high-pass filter
///
/// `y[i] = a * (y[i-1] + x[i] - x[i-1])` with `a = RC / (RC + dt)`; the first
/// output sample equals the first input sample.
pub fn high_pass(samples: &[i16], sample_rate: u32, cutoff_hz: f32) -> Result<Vec<i16>> {
    if sample_rate == 0 {
        return Err(VoiceError::EffectsError(
            "High-pass filter needs a non-zero sample rate".into(),
        ));
    }
    if !(cutoff_hz.is_finite() && cutoff_hz > 0.0) {
        return Err(VoiceError::EffectsError(format!(
            "Invalid high-pass cutoff: {} Hz",
            cutoff_hz
        )));
    }

    let Some(&first) = samples.first() else {
        return Ok(Vec::new());
    };

    let rc = 1.0 / (cutoff_hz as f64 * 2.0 * std::f64::consts::PI);
    let dt = 1.0 / sample_rate as f64;
    let alpha = rc / (rc + dt);

    let mut output = Vec::with_capacity(samples.len());
    output.push(first);

    let mut previous_out = first as f64;
    for pair in samples.windows(2) {
        let y = alpha * (previous_out + pair[1] as f64 - pair[0] as f64);
        output.push(y.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16);
        previous_out = y;
    }

    Ok(output)
}

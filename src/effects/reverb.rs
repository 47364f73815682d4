//! Two-tap echo reverb over 16-bit PCM

use crate::audio::AudioBuffer;

/// Number of echo taps mixed into the faded signal
pub const ECHO_TAPS: usize = 2;

/// Linear gain reached at the end of a fade-out (-120 dB)
const FADE_FLOOR: f64 = 1e-6;

/// Convert decibels to a linear amplitude factor
pub fn db_to_gain(db: f32) -> f64 {
    10f64.powf(db as f64 / 20.0)
}

/// Ramp the last `fade_len` samples linearly from unity down to -120 dB
pub fn fade_out(samples: &[i16], fade_len: usize) -> Vec<i16> {
    let mut out = samples.to_vec();
    let fade_len = fade_len.min(out.len());
    if fade_len == 0 {
        return out;
    }

    let start = out.len() - fade_len;
    let step = (FADE_FLOOR - 1.0) / fade_len as f64;
    for (i, sample) in out[start..].iter_mut().enumerate() {
        let gain = 1.0 + step * i as f64;
        *sample = saturate(*sample as f64 * gain);
    }
    out
}

/// Scale every sample by `gain_db` decibels, clipping at the 16-bit range
pub fn apply_gain_db(samples: &[i16], gain_db: f32) -> Vec<i16> {
    let gain = db_to_gain(gain_db);
    samples.iter().map(|&s| saturate(s as f64 * gain)).collect()
}

/// Mix `layer` into `base` starting at `position`
///
/// Samples are summed with saturation. The base length never changes, so the
/// part of `layer` that would run past the end is dropped.
pub fn overlay(base: &mut [i16], layer: &[i16], position: usize) {
    if position >= base.len() {
        return;
    }
    for (dst, &src) in base[position..].iter_mut().zip(layer) {
        *dst = dst.saturating_add(src);
    }
}

/// Fade the signal over `delay_ms`, then overlay two attenuated echoes of the
/// unfaded original at one and two delays
pub fn add_reverb(input: &AudioBuffer, delay_ms: f32, decay_db: f32) -> AudioBuffer {
    let original = &input.samples;
    let mut result = fade_out(original, input.ms_to_samples(delay_ms));

    for tap in 0..ECHO_TAPS {
        let factor = (tap + 1) as f32;
        let echo = apply_gain_db(original, -(decay_db * factor));
        overlay(&mut result, &echo, input.ms_to_samples(delay_ms * factor));
    }

    input.with_samples(result)
}

fn saturate(value: f64) -> i16 {
    value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

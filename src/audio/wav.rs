use crate::audio::buffer::{AudioBuffer, BITS_PER_SAMPLE, CHANNELS};
use crate::{Result, VoiceError};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;
use tracing::debug;

/// Write a buffer as a 16-bit PCM mono WAV file
pub fn write_wav<P: AsRef<Path>>(path: P, buffer: &AudioBuffer) -> Result<()> {
    let spec = WavSpec {
        channels: CHANNELS,
        sample_rate: buffer.sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path.as_ref(), spec)
        .map_err(|e| VoiceError::IOError(format!("Failed to create WAV writer: {}", e)))?;

    for &sample in &buffer.samples {
        writer
            .write_sample(sample)
            .map_err(|e| VoiceError::IOError(format!("Failed to write sample: {}", e)))?;
    }

    writer
        .finalize()
        .map_err(|e| VoiceError::IOError(format!("Failed to finalize WAV file: {}", e)))?;

    debug!(
        "Wrote {} samples ({} ms) to {:?}",
        buffer.samples.len(),
        buffer.duration_ms(),
        path.as_ref()
    );
    Ok(())
}

/// Read a WAV file into a mono 16-bit buffer
///
/// Backends are free to emit float or wider integer PCM and more than one
/// channel; everything is folded down to the pipeline's mono 16-bit format.
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<AudioBuffer> {
    let mut reader = WavReader::open(path.as_ref())
        .map_err(|e| VoiceError::IOError(format!("Failed to open WAV file: {}", e)))?;

    let spec = reader.spec();
    debug!(
        "Reading WAV file: {} Hz, {} channels, {} bits",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    );

    if spec.channels == 0 {
        return Err(VoiceError::IOError("WAV file declares zero channels".into()));
    }

    let read_err = |e: hound::Error| VoiceError::IOError(format!("Failed to read sample: {}", e));

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(read_err)?,
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| v as f32 / 128.0))
            .collect::<std::result::Result<_, _>>()
            .map_err(read_err)?,
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<std::result::Result<_, _>>()
            .map_err(read_err)?,
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8_388_608.0)) // 2^23
            .collect::<std::result::Result<_, _>>()
            .map_err(read_err)?,
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 2_147_483_648.0)) // 2^31
            .collect::<std::result::Result<_, _>>()
            .map_err(read_err)?,
        (format, bits) => {
            return Err(VoiceError::IOError(format!(
                "Unsupported WAV sample format: {:?} {} bit",
                format, bits
            )));
        }
    };

    let mono = downmix(&interleaved, spec.channels as usize);
    Ok(AudioBuffer::from_f32(&mono, spec.sample_rate))
}

/// Average interleaved frames down to one channel
pub fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

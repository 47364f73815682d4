//! Shared test backends

#![allow(dead_code)]

use avatar_voice::audio::{write_wav, AudioBuffer};
use avatar_voice::speech::SynthesisBackend;
use avatar_voice::{Result, VoiceError};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

pub const TONE_SAMPLE_RATE: u32 = 16000;

/// Samples written per character of input text
pub const SAMPLES_PER_CHAR: usize = 320;

/// Texts every backend call received, in order
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Deterministic backend writing a voiced tone whose length follows the text
pub struct ToneBackend {
    calls: CallLog,
    gate: Option<Receiver<()>>,
}

impl ToneBackend {
    pub fn new(calls: CallLog) -> Self {
        Self { calls, gate: None }
    }

    /// Block every synthesis until the gate yields a token or its sender drops
    pub fn gated(calls: CallLog, gate: Receiver<()>) -> Self {
        Self {
            calls,
            gate: Some(gate),
        }
    }
}

pub fn tone(len: usize) -> AudioBuffer {
    let samples = (0..len)
        .map(|i| {
            let t = i as f32 / TONE_SAMPLE_RATE as f32;
            let v = (2.0 * std::f32::consts::PI * 220.0 * t).sin() * 7000.0
                + (2.0 * std::f32::consts::PI * 1800.0 * t).sin() * 3000.0;
            v as i16
        })
        .collect();
    AudioBuffer::new(samples, TONE_SAMPLE_RATE)
}

impl SynthesisBackend for ToneBackend {
    fn name(&self) -> &str {
        "tone"
    }

    fn synthesize_to_file(&mut self, text: &str, output: &Path) -> Result<()> {
        if let Some(gate) = &self.gate {
            let _ = gate.recv();
        }
        self.calls.lock().push(text.to_string());
        write_wav(output, &tone(text.chars().count() * SAMPLES_PER_CHAR))
    }
}

/// Backend whose engine always errors
pub struct FailingBackend;

impl SynthesisBackend for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    fn synthesize_to_file(&mut self, _text: &str, _output: &Path) -> Result<()> {
        Err(VoiceError::SynthesisError("engine unavailable".into()))
    }
}

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Factory closure producing a [`ToneBackend`] that records into `calls`
pub fn tone_factory(
    calls: CallLog,
) -> impl FnOnce() -> Result<Box<dyn SynthesisBackend>> + Send + 'static {
    move || Ok(Box::new(ToneBackend::new(calls)) as Box<dyn SynthesisBackend>)
}

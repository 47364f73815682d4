//! Speech synthesis and recognition
//!
//! This module provides:
//! - Markdown sanitization of replies before synthesis
//! - Pluggable TTS backends and a content-keyed synthesis cache
//! - The background worker that turns replies into processed WAV files
//! - The speech-to-text contract

pub mod backend;
pub mod cache;
pub mod recognition;
pub mod sanitizer;
#[cfg(feature = "sherpa")]
pub mod sherpa;
pub mod worker;

// Re-export commonly used types
pub use backend::{
    BackendConfig, CommandBackend, CommandBackendConfig, SynthesisBackend, VitsBackendConfig,
};
pub use cache::{cache_key, CachedAudio, SynthesisCache};
pub use recognition::{transcribe_or_empty, RecognitionFailure, SpeechRecognizer};
pub use sanitizer::{strip_markdown, MarkdownSanitizer};
#[cfg(feature = "sherpa")]
pub use sherpa::VitsBackend;
pub use worker::{
    ProgressStage, SpeechCommand, SpeechEvent, SpeechJob, SpeechQueueWorker, WorkerSettings,
    WorkerState,
};

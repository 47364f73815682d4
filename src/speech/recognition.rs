//! Speech-to-text contract
//!
//! Capturing and transcribing the microphone is left to the host application;
//! this module fixes how recognition failures surface to the chat flow.

use crate::audio::AudioBuffer;
use thiserror::Error;
use tracing::warn;

/// Why a recognizer could not produce a transcript
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecognitionFailure {
    /// Audio was captured but no words could be made out
    #[error("speech was unintelligible")]
    Unintelligible,

    /// The recognition service could not be reached
    #[error("recognition service unreachable: {0}")]
    ServiceUnreachable(String),
}

/// Turns a recorded utterance into text
pub trait SpeechRecognizer {
    fn recognize(&mut self, audio: &AudioBuffer) -> std::result::Result<String, RecognitionFailure>;
}

/// Transcribe `audio`, mapping any failure to an empty string
///
/// An empty transcript means "nothing to send"; the caller should not issue a
/// chat request for it.
pub fn transcribe_or_empty<R: SpeechRecognizer + ?Sized>(
    recognizer: &mut R,
    audio: &AudioBuffer,
) -> String {
    match recognizer.recognize(audio) {
        Ok(text) => text.trim().to_string(),
        Err(RecognitionFailure::Unintelligible) => {
            warn!("Could not understand audio");
            String::new()
        }
        Err(e @ RecognitionFailure::ServiceUnreachable(_)) => {
            warn!("Speech recognition failed: {}", e);
            String::new()
        }
    }
}

pub mod audio;
pub mod effects;
pub mod integration;
pub mod llm;
pub mod speech;

pub use integration::{VoiceConfig, VoicePipeline, VoiceSession};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VoiceError {
    #[error("Synthesis failed: {0}")]
    SynthesisError(String),

    #[error("Effects processing failed: {0}")]
    EffectsError(String),

    #[error("Model load error: {0}")]
    ModelLoadError(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

impl From<std::io::Error> for VoiceError {
    fn from(e: std::io::Error) -> Self {
        VoiceError::IOError(e.to_string())
    }
}

impl VoiceError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // The next utterance may synthesize fine
            VoiceError::SynthesisError(_) => true,
            VoiceError::EffectsError(_) => true,
            VoiceError::PipelineError(_) => true,
            // Model errors require restarting
            VoiceError::ModelLoadError(_) => false,
            VoiceError::IOError(_) => false,
            VoiceError::ConfigError(_) => false,
            VoiceError::ChannelError(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            VoiceError::SynthesisError(_) => {
                "Text-to-speech failed. Response will be shown as text.".to_string()
            }
            VoiceError::EffectsError(_) => {
                "Voice effects processing failed. Please try again.".to_string()
            }
            VoiceError::ModelLoadError(_) => {
                "Failed to load the voice model. Please verify model files are present.".to_string()
            }
            VoiceError::IOError(_) => "File system error occurred.".to_string(),
            VoiceError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
            VoiceError::ChannelError(_) => {
                "Voice worker is unavailable. Please restart the application.".to_string()
            }
            VoiceError::PipelineError(_) => {
                "Voice pipeline error. Please try again.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, VoiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.wav");
        let err: VoiceError = io.into();
        assert!(matches!(err, VoiceError::IOError(ref msg) if msg.contains("missing.wav")));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_job_errors_are_recoverable() {
        assert!(VoiceError::SynthesisError("x".into()).is_recoverable());
        assert!(VoiceError::EffectsError("x".into()).is_recoverable());
        assert!(!VoiceError::ChannelError("x".into()).is_recoverable());
    }

    #[test]
    fn test_display_keeps_detail() {
        let err = VoiceError::EffectsError("malformed buffer".into());
        assert_eq!(err.to_string(), "Effects processing failed: malformed buffer");
        assert!(err.user_message().contains("effects"));
    }
}

//! VITS synthesis through sherpa-rs

use super::backend::{SynthesisBackend, VitsBackendConfig};
use crate::audio::{write_wav, AudioBuffer};
use crate::{Result, VoiceError};
use sherpa_rs::tts::{VitsTts, VitsTtsConfig};
use std::path::Path;
use tracing::{debug, info};

pub struct VitsBackend {
    tts: VitsTts,
    config: VitsBackendConfig,
}

impl VitsBackend {
    /// Load the model; fails fast when files are missing
    pub fn new(config: &VitsBackendConfig) -> Result<Self> {
        if config.model_path.is_empty() {
            return Err(VoiceError::ConfigError("Model path is required".into()));
        }

        if config.tokens_path.is_empty() {
            return Err(VoiceError::ConfigError("Tokens path is required".into()));
        }

        for (label, path) in [("Model", &config.model_path), ("Tokens file", &config.tokens_path)] {
            if !Path::new(path).exists() {
                return Err(VoiceError::ModelLoadError(format!(
                    "{} not found: {}",
                    label, path
                )));
            }
        }

        info!("Loading VITS TTS model from: {}", config.model_path);

        let vits_config = VitsTtsConfig {
            model: config.model_path.clone(),
            tokens: config.tokens_path.clone(),
            lexicon: config.lexicon_path.clone().unwrap_or_default(),
            data_dir: config.data_dir.clone().unwrap_or_default(),
            dict_dir: config.dict_dir.clone().unwrap_or_default(),
            length_scale: config.length_scale,
            noise_scale: config.noise_scale,
            noise_scale_w: config.noise_scale_w,
            ..Default::default()
        };

        let tts = VitsTts::new(vits_config);

        info!("VITS model loaded");

        Ok(Self {
            tts,
            config: config.clone(),
        })
    }
}

impl SynthesisBackend for VitsBackend {
    fn name(&self) -> &str {
        "vits"
    }

    fn synthesize_to_file(&mut self, text: &str, output: &Path) -> Result<()> {
        let audio = self
            .tts
            .create(text, self.config.speaker_id, self.config.speed)
            .map_err(|e| VoiceError::SynthesisError(format!("Synthesis failed: {}", e)))?;

        let buffer = AudioBuffer::from_f32(&audio.samples, audio.sample_rate as u32);
        debug!(
            "Synthesized {} samples ({} ms)",
            buffer.len(),
            buffer.duration_ms()
        );

        write_wav(output, &buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_is_load_error() {
        let config = VitsBackendConfig::new("/nonexistent/model.onnx", "/nonexistent/tokens.txt");
        assert!(matches!(
            VitsBackend::new(&config),
            Err(VoiceError::ModelLoadError(_))
        ));
    }

    #[test]
    fn test_empty_paths_are_config_errors() {
        assert!(matches!(
            VitsBackend::new(&VitsBackendConfig::default()),
            Err(VoiceError::ConfigError(_))
        ));
    }
}

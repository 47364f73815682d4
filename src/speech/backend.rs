//! Text-to-speech backends
//!
//! A backend turns sanitized text into a WAV file on disk. The effects chain
//! only ever sees the file, so engines can be swapped freely.

use crate::{Result, VoiceError};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Placeholder replaced by the text to speak in command arguments
pub const TEXT_PLACEHOLDER: &str = "{text}";

/// Placeholder replaced by the output WAV path in command arguments
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// A speech synthesizer that writes raw audio files
///
/// Backends are created and used on the speech worker thread only, so they
/// need not be `Send` or `Sync`.
pub trait SynthesisBackend {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Synthesize `text` into a WAV file at `output`
    fn synthesize_to_file(&mut self, text: &str, output: &Path) -> Result<()>;
}

/// Which engine to build, tagged by `kind` in configuration files
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// External engine invoked per utterance (espeak-ng, piper, say, ...)
    Command(CommandBackendConfig),

    /// VITS ONNX model through sherpa-rs (requires the `sherpa` feature)
    Vits(VitsBackendConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Command(CommandBackendConfig::default())
    }
}

impl BackendConfig {
    /// Build the configured backend
    pub fn build(&self) -> Result<Box<dyn SynthesisBackend>> {
        match self {
            BackendConfig::Command(config) => Ok(Box::new(CommandBackend::new(config.clone())?)),
            #[cfg(feature = "sherpa")]
            BackendConfig::Vits(config) => Ok(Box::new(super::sherpa::VitsBackend::new(config)?)),
            #[cfg(not(feature = "sherpa"))]
            BackendConfig::Vits(_) => Err(VoiceError::ConfigError(
                "VITS backend requires building with the `sherpa` feature".into(),
            )),
        }
    }
}

/// Configuration for [`CommandBackend`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandBackendConfig {
    /// Program to run
    pub program: String,

    /// Arguments; `{text}` and `{output}` are substituted
    pub args: Vec<String>,

    /// Write the text to the program's stdin instead of (or as well as) arguments
    pub text_via_stdin: bool,
}

impl Default for CommandBackendConfig {
    fn default() -> Self {
        Self {
            program: "espeak-ng".to_string(),
            args: vec![
                "-w".to_string(),
                OUTPUT_PLACEHOLDER.to_string(),
                // End of options: replies starting with `-` stay text
                "--".to_string(),
                TEXT_PLACEHOLDER.to_string(),
            ],
            text_via_stdin: false,
        }
    }
}

impl CommandBackendConfig {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            text_via_stdin: false,
        }
    }

    /// Deliver the text on stdin (e.g. `piper --output_file {output}`)
    pub fn with_stdin(mut self) -> Self {
        self.text_via_stdin = true;
        self
    }
}

/// Configuration for the VITS model backend
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VitsBackendConfig {
    /// Path to the ONNX model file
    pub model_path: String,

    /// Path to the tokens file
    pub tokens_path: String,

    /// Path to the lexicon file (optional for some models)
    pub lexicon_path: Option<String>,

    /// Path to the espeak-ng data directory (optional)
    pub data_dir: Option<String>,

    /// Path to dict directory (optional)
    pub dict_dir: Option<String>,

    /// Length scale for speech rate (1.0 = normal, <1.0 = faster, >1.0 = slower)
    pub length_scale: f32,

    /// Noise scale for variation
    pub noise_scale: f32,

    /// Noise scale width
    pub noise_scale_w: f32,

    /// Speaker ID for multi-speaker models
    pub speaker_id: i32,

    /// Playback speed multiplier passed to the model
    pub speed: f32,
}

impl Default for VitsBackendConfig {
    fn default() -> Self {
        Self {
            model_path: String::new(),
            tokens_path: String::new(),
            lexicon_path: None,
            data_dir: None,
            dict_dir: None,
            length_scale: 1.0,
            noise_scale: 0.667,
            noise_scale_w: 0.8,
            speaker_id: 0,
            speed: 1.0,
        }
    }
}

impl VitsBackendConfig {
    /// Create a new VITS config with required paths
    pub fn new(model_path: impl Into<String>, tokens_path: impl Into<String>) -> Self {
        Self {
            model_path: model_path.into(),
            tokens_path: tokens_path.into(),
            ..Default::default()
        }
    }

    /// Set the espeak-ng data directory
    pub fn with_data_dir(mut self, data_dir: impl Into<String>) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }

    /// Set the speaker ID for multi-speaker models
    pub fn with_speaker(mut self, speaker_id: i32) -> Self {
        self.speaker_id = speaker_id;
        self
    }
}

/// Runs an external TTS program once per utterance
#[derive(Clone, Debug)]
pub struct CommandBackend {
    config: CommandBackendConfig,
}

impl CommandBackend {
    pub fn new(config: CommandBackendConfig) -> Result<Self> {
        if config.program.trim().is_empty() {
            return Err(VoiceError::ConfigError(
                "TTS command program is required".into(),
            ));
        }
        if !config.args.iter().any(|a| a.contains(OUTPUT_PLACEHOLDER)) {
            return Err(VoiceError::ConfigError(format!(
                "TTS command arguments must contain {}",
                OUTPUT_PLACEHOLDER
            )));
        }
        Ok(Self { config })
    }

    /// Arguments with placeholders substituted
    pub fn render_args(&self, text: &str, output: &Path) -> Vec<String> {
        let output = output.to_string_lossy();
        self.config
            .args
            .iter()
            .map(|arg| {
                arg.replace(OUTPUT_PLACEHOLDER, &output)
                    .replace(TEXT_PLACEHOLDER, text)
            })
            .collect()
    }
}

impl SynthesisBackend for CommandBackend {
    fn name(&self) -> &str {
        &self.config.program
    }

    fn synthesize_to_file(&mut self, text: &str, output: &Path) -> Result<()> {
        let args = self.render_args(text, output);
        debug!("Running TTS command: {} {:?}", self.config.program, args);

        let mut cmd = Command::new(&self.config.program);
        cmd.args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .stdin(if self.config.text_via_stdin {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let mut child = cmd.spawn().map_err(|e| {
            VoiceError::SynthesisError(format!(
                "Failed to start {}: {}",
                self.config.program, e
            ))
        })?;

        if self.config.text_via_stdin {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(text.as_bytes()).map_err(|e| {
                    VoiceError::SynthesisError(format!("Failed to write text to stdin: {}", e))
                })?;
            }
        }

        let result = child.wait_with_output().map_err(|e| {
            VoiceError::SynthesisError(format!("Failed to wait for {}: {}", self.config.program, e))
        })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            warn!(
                "TTS command failed; program={} code={:?} stderr={}",
                self.config.program,
                result.status.code(),
                stderr.trim()
            );
            return Err(VoiceError::SynthesisError(format!(
                "{} exited with code {:?}",
                self.config.program,
                result.status.code()
            )));
        }

        if !output.exists() {
            return Err(VoiceError::SynthesisError(format!(
                "{} did not produce {:?}",
                self.config.program, output
            )));
        }

        Ok(())
    }
}

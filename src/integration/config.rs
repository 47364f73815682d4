//! Configuration for the voice pipeline
//!
//! Every field has a default, so a JSON file only needs to name what differs.

use crate::effects::EffectsConfig;
use crate::speech::backend::{BackendConfig, CommandBackendConfig};
use crate::speech::worker::WorkerSettings;
use crate::{Result, VoiceError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the temp directory created under the system temp dir
pub const DEFAULT_TEMP_DIR_NAME: &str = "ai_assistant_speech";

/// Configuration for the complete voice pipeline
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Where raw and processed WAV files are written
    pub temp_dir: PathBuf,

    /// Maximum number of pending speech jobs
    pub queue_size: usize,

    /// Delete cached raw synthesis files when the worker stops
    pub purge_cache_on_shutdown: bool,

    /// Lines of conversation kept as chat context
    pub context_lines: usize,

    pub effects: EffectsConfig,

    pub backend: BackendConfig,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir().join(DEFAULT_TEMP_DIR_NAME),
            queue_size: 100,
            purge_cache_on_shutdown: true,
            context_lines: 10,
            effects: EffectsConfig::default(),
            backend: BackendConfig::default(),
        }
    }
}

impl VoiceConfig {
    /// Load a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            VoiceError::ConfigError(format!("Failed to read {:?}: {}", path, e))
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            VoiceError::ConfigError(format!("Invalid config {:?}: {}", path, e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }

    /// Use an external TTS program
    pub fn with_command(mut self, command: CommandBackendConfig) -> Self {
        self.backend = BackendConfig::Command(command);
        self
    }

    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }

    pub fn with_effects(mut self, effects: EffectsConfig) -> Self {
        self.effects = effects;
        self
    }

    /// Keep raw synthesis files after shutdown
    pub fn keep_cache(mut self) -> Self {
        self.purge_cache_on_shutdown = false;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.temp_dir.as_os_str().is_empty() {
            return Err(VoiceError::ConfigError("Temp dir must not be empty".into()));
        }
        if self.queue_size == 0 {
            return Err(VoiceError::ConfigError(
                "Queue size must be greater than 0".into(),
            ));
        }
        if self.context_lines == 0 {
            return Err(VoiceError::ConfigError(
                "Context must keep at least one line".into(),
            ));
        }
        self.effects.validate()
    }

    pub(crate) fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            temp_dir: self.temp_dir.clone(),
            queue_size: self.queue_size,
            effects: self.effects.clone(),
            purge_cache_on_shutdown: self.purge_cache_on_shutdown,
        }
    }
}
